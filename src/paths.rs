//! Path resolution for the manifest and state file
//!
//! # Manifest Resolution Priority
//!
//! 1. `--config` flag (or `SQLCONVERGE_CONFIG`)
//! 2. `./converge.toml`
//! 3. `<config dir>/converge.toml`, where the config dir is
//!    `SQLCONVERGE_CONFIG_DIR`, then `XDG_CONFIG_HOME/sqlconverge`, then
//!    `~/.config/sqlconverge`
//!
//! The state file defaults to `converge.state.toml` next to the manifest.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "SQLCONVERGE_CONFIG_DIR";

pub const MANIFEST_FILE: &str = "converge.toml";
pub const STATE_FILE: &str = "converge.state.toml";

/// Get the sqlconverge config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!("Using config dir from {}: {}", ENV_CONFIG_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("sqlconverge");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("sqlconverge");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Locate the manifest
pub fn manifest_path(flag: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(expand(path));
    }

    let local = PathBuf::from(MANIFEST_FILE);
    if local.exists() {
        return Ok(local);
    }

    let global = config_dir()?.join(MANIFEST_FILE);
    if global.exists() {
        return Ok(global);
    }

    anyhow::bail!(
        "No {MANIFEST_FILE} found in the current directory or {}; pass --config",
        global.display()
    )
}

/// Locate the state file for a manifest
pub fn state_path(flag: Option<&str>, manifest: &Path) -> PathBuf {
    match flag {
        Some(path) => expand(path),
        None => manifest
            .parent()
            .map_or_else(|| PathBuf::from(STATE_FILE), |dir| dir.join(STATE_FILE)),
    }
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand("~/converge.toml"), home.join("converge.toml"));
    }

    #[test]
    fn test_expand_plain_path_unchanged() {
        assert_eq!(expand("/etc/converge.toml"), PathBuf::from("/etc/converge.toml"));
    }

    #[test]
    fn test_state_next_to_manifest() {
        assert_eq!(
            state_path(None, Path::new("/srv/db/converge.toml")),
            PathBuf::from("/srv/db/converge.state.toml")
        );
        assert_eq!(
            state_path(Some("/tmp/s.toml"), Path::new("/srv/db/converge.toml")),
            PathBuf::from("/tmp/s.toml")
        );
    }

    #[test]
    fn test_explicit_manifest_wins() {
        assert_eq!(
            manifest_path(Some("/nowhere/x.toml")).unwrap(),
            PathBuf::from("/nowhere/x.toml")
        );
    }
}
