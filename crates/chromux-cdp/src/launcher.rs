// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Lazily starts the browser when nothing answers the debug endpoint.
//!
//! The launcher never stops or restarts the browser: once spawned, the child
//! handle is kept for the lifetime of the process and never awaited. If a
//! browser is already listening on the debug port (started by hand or by a
//! previous relay run), [`Launcher::ensure_reachable`] returns without
//! spawning anything.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info};

use chromux_config::BrowserConfig;

use crate::error::CdpError;

/// Standard Google Chrome install locations for the platforms we know about;
/// anything else is expected to have `google-chrome` on the search path.
fn default_executable() -> &'static str {
    if cfg!(target_os = "macos") {
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"
    } else if cfg!(target_os = "windows") {
        r"C:\Program Files\Google\Chrome\Application\chrome.exe"
    } else {
        "google-chrome"
    }
}

pub struct Launcher {
    endpoint: String,
    debug_port: u16,
    executable: Option<String>,
    poll_interval: Duration,
    poll_attempts: u32,
    http: reqwest::Client,
    /// Held for the process lifetime; never waited on.
    child: Mutex<Option<Child>>,
}

impl Launcher {
    pub fn new(cfg: &BrowserConfig) -> Self {
        Self {
            endpoint: cfg.endpoint(),
            debug_port: cfg.debug_port,
            executable: cfg.executable.clone(),
            poll_interval: Duration::from_millis(cfg.launch_poll_ms),
            poll_attempts: cfg.launch_attempts,
            http: reqwest::Client::new(),
            child: Mutex::new(None),
        }
    }

    /// HTTP base of the debug endpoint, e.g. `http://127.0.0.1:9222`.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Make sure a browser answers on the debug endpoint, starting one if
    /// needed. Never starts a second browser when the probe already answers.
    pub async fn ensure_reachable(&self) -> Result<(), CdpError> {
        if self.probe().await {
            return Ok(());
        }
        self.start_browser().await
    }

    /// One liveness probe: `GET /json/version` answered with a 2xx.
    async fn probe(&self) -> bool {
        match self
            .http
            .get(format!("{}/json/version", self.endpoint))
            .send()
            .await
        {
            Ok(res) => res.status().is_success(),
            Err(_) => false,
        }
    }

    async fn start_browser(&self) -> Result<(), CdpError> {
        let exe = self
            .executable
            .clone()
            .unwrap_or_else(|| default_executable().to_string());

        info!(executable = %exe, port = self.debug_port, "starting browser with remote debugging");

        let child = Command::new(&exe)
            .arg(format!("--remote-debugging-port={}", self.debug_port))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| CdpError::Launch(format!("failed to spawn {exe}: {e}")))?;

        *self.child.lock().await = Some(child);

        for attempt in 1..=self.poll_attempts {
            tokio::time::sleep(self.poll_interval).await;
            if self.probe().await {
                info!(attempts = attempt, "browser is up");
                return Ok(());
            }
            debug!(attempt, "debug endpoint not answering yet");
        }

        Err(CdpError::Launch(format!(
            "debug endpoint did not answer after {} probes",
            self.poll_attempts
        )))
    }

    #[cfg(test)]
    pub(crate) async fn spawned_browser(&self) -> bool {
        self.child.lock().await.is_some()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
