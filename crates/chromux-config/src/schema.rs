// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Configuration schema for the relay.
//!
//! Every field has a serde default, so an empty (or absent) config file gives
//! a fully working setup: HTTP API on port 2229, browser debug endpoint on
//! port 9222, platform-default browser executable.
//!
//! # Example full config
//! ```toml
//! [api]
//! port = 2229
//!
//! [browser]
//! debug_port = 9222
//! # executable = "/usr/bin/chromium"
//! launch_poll_ms = 200
//! launch_attempts = 30
//!
//! [cdp]
//! request_timeout_secs = 30
//! ```

use serde::{Deserialize, Serialize};

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub cdp: CdpConfig,
}

/// HTTP API front-end configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Port the HTTP API listens on (loopback only).
    /// Overridable with `CDP_PORT` or `chromux serve --port`.
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_port() -> u16 {
    2229
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
        }
    }
}

/// Browser process and debug endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Remote debugging port the browser is started with (and probed on).
    #[serde(default = "default_debug_port")]
    pub debug_port: u16,

    /// Explicit browser executable. When absent a platform default is used:
    /// the standard Google Chrome install path on macOS and Windows,
    /// `google-chrome` from `$PATH` everywhere else.
    pub executable: Option<String>,

    /// Interval between readiness probes after spawning the browser.
    #[serde(default = "default_launch_poll_ms")]
    pub launch_poll_ms: u64,

    /// How many readiness probes to attempt before giving up.
    /// 30 attempts at 200 ms is ~6 s, enough for a cold browser start.
    #[serde(default = "default_launch_attempts")]
    pub launch_attempts: u32,
}

fn default_debug_port() -> u16 {
    9222
}
fn default_launch_poll_ms() -> u64 {
    200
}
fn default_launch_attempts() -> u32 {
    30
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            debug_port: default_debug_port(),
            executable: None,
            launch_poll_ms: default_launch_poll_ms(),
            launch_attempts: default_launch_attempts(),
        }
    }
}

impl BrowserConfig {
    /// HTTP base of the browser's debug endpoint, e.g. `http://127.0.0.1:9222`.
    pub fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}", self.debug_port)
    }
}

/// Behaviour of the CDP request broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdpConfig {
    /// Upper bound on a single CDP round trip, in seconds. A request whose
    /// response never arrives fails with a timeout error instead of hanging
    /// its caller forever.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
