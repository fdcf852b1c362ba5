// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Three-layer config discovery, lowest to highest priority:
//!
//! 1. `/etc/chromux/config.toml` — system-wide
//! 2. `<config dir>/chromux/config.toml` — per user
//! 3. `chromux.toml` — working directory
//!
//! An explicit `--config` path is merged on top of all three and, unlike the
//! discovered layers, must exist. Tables merge recursively with the higher
//! layer winning per key, so a user file can override `browser.debug_port`
//! without clobbering the rest of the `[browser]` section.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::Config;

fn discovered_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/chromux/config.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("chromux/config.toml"));
    }
    paths.push(PathBuf::from("chromux.toml"));
    paths
}

/// Merge every discovered layer plus the optional explicit path into one
/// [`Config`]. A file that exists but does not match the schema is an error,
/// never silently replaced with defaults.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = toml::Table::new();

    for path in discovered_paths() {
        if !path.is_file() {
            continue;
        }
        merge_table(&mut merged, read_layer(&path)?);
        debug!(path = %path.display(), "merged config layer");
    }
    if let Some(path) = explicit {
        merge_table(&mut merged, read_layer(path)?);
        debug!(path = %path.display(), "merged explicit config");
    }

    merged
        .try_into()
        .context("config does not match the expected schema")
}

fn read_layer(path: &Path) -> anyhow::Result<toml::Table> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Key-wise overlay: tables recurse, everything else is replaced.
fn merge_table(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(b)), toml::Value::Table(o)) => merge_table(b, o),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn table(s: &str) -> toml::Table {
        toml::from_str(s).unwrap()
    }

    fn merged(base: &str, overlay: &str) -> toml::Table {
        let mut base = table(base);
        merge_table(&mut base, table(overlay));
        base
    }

    #[test]
    fn higher_layer_wins_per_key() {
        let out = merged(
            "[api]\nport = 2229\n\n[cdp]\nrequest_timeout_secs = 30",
            "[api]\nport = 3001",
        );
        assert_eq!(out["api"]["port"].as_integer(), Some(3001));
        // Sibling section untouched by the overlay.
        assert_eq!(out["cdp"]["request_timeout_secs"].as_integer(), Some(30));
    }

    #[test]
    fn overlay_fills_gaps_without_clobbering_the_section() {
        let out = merged(
            "[browser]\ndebug_port = 9222\nlaunch_attempts = 30",
            "[browser]\ndebug_port = 9333\nexecutable = \"/usr/bin/chromium\"",
        );
        assert_eq!(out["browser"]["debug_port"].as_integer(), Some(9333));
        assert_eq!(out["browser"]["launch_attempts"].as_integer(), Some(30));
        assert_eq!(
            out["browser"]["executable"].as_str(),
            Some("/usr/bin/chromium")
        );
    }

    #[test]
    fn overlay_may_introduce_whole_sections() {
        let out = merged("[api]\nport = 2229", "[browser]\ndebug_port = 9333");
        assert_eq!(out["api"]["port"].as_integer(), Some(2229));
        assert_eq!(out["browser"]["debug_port"].as_integer(), Some(9333));
    }

    #[test]
    fn explicit_file_overrides_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[api]\nport = 3001\n\n[browser]\ndebug_port = 9333").unwrap();
        let cfg = load(Some(f.path())).unwrap();
        assert_eq!(cfg.api.port, 3001);
        assert_eq!(cfg.browser.debug_port, 9333);
        // Untouched section keeps its default.
        assert_eq!(cfg.cdp.request_timeout_secs, 30);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let err = load(Some(Path::new("/tmp/chromux_nonexistent_config_xyz.toml")))
            .unwrap_err();
        assert!(format!("{err:#}").contains("reading"));
    }

    #[test]
    fn mistyped_config_is_an_error_not_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[api]\nport = \"not a number\"").unwrap();
        let err = load(Some(f.path())).unwrap_err();
        assert!(format!("{err:#}").contains("schema"));
    }
}
