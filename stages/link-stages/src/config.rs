//! Polled stage configuration.
//!
//! The attack mode and link parameters are read fresh for every processed
//! datagram so an operator edit takes effect on the next packet. Callers
//! fall back to defaults when a read fails; a stale cached value is never
//! kept.

use attack_channel::{AttackError, AttackMode, LinkParams};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Mode(#[from] AttackError),
    #[error("bad link parameter file: {0}")]
    Json(#[from] serde_json::Error),
}

fn path_from_env(var: &str, default: &str) -> PathBuf {
    std::env::var(var).unwrap_or_else(|_| default.to_string()).into()
}

pub fn attack_mode_path() -> PathBuf {
    path_from_env("SATLINK_ATTACK_MODE_FILE", "data/attack_mode.txt")
}

pub fn link_params_path() -> PathBuf {
    path_from_env("SATLINK_LINK_PARAMS_FILE", "data/link_params.json")
}

pub fn sent_log_path() -> PathBuf {
    path_from_env("SATLINK_SENT_LOG", "data/sent_log.csv")
}

pub fn recv_log_path() -> PathBuf {
    path_from_env("SATLINK_RECV_LOG", "data/recv_log.csv")
}

/// Read the externally-written attack mode value.
pub fn read_attack_mode(path: &Path) -> Result<AttackMode, ConfigError> {
    Ok(std::fs::read_to_string(path)?.parse()?)
}

/// Load the link parameter file written by the operator UI.
pub fn load_link_params(path: &Path) -> Result<LinkParams, ConfigError> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_read_attack_mode_trims_whitespace() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mode.txt");
        fs::write(&path, "jamming\n").unwrap();
        assert_eq!(read_attack_mode(&path).unwrap(), AttackMode::Jamming);
    }

    #[test]
    fn test_unknown_mode_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mode.txt");
        fs::write(&path, "replay").unwrap();
        assert!(matches!(
            read_attack_mode(&path),
            Err(ConfigError::Mode(AttackError::UnknownMode(_)))
        ));
    }

    #[test]
    fn test_missing_mode_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            read_attack_mode(&dir.path().join("absent.txt")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_load_link_params() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("link.json");
        fs::write(
            &path,
            r#"{"transmit_power_dbm": 5.0, "antenna_gain_dbi": 12.0, "distance_km": 800.0, "frequency_ghz": 8.2}"#,
        )
        .unwrap();
        let params = load_link_params(&path).unwrap();
        assert_eq!(params.distance_km, 800.0);
        assert_eq!(params.frequency_ghz, 8.2);
    }

    #[test]
    fn test_partial_link_params_use_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("link.json");
        fs::write(&path, r#"{"distance_km": 1200.0}"#).unwrap();
        let params = load_link_params(&path).unwrap();
        assert_eq!(params.distance_km, 1200.0);
        assert_eq!(params.antenna_gain_dbi, LinkParams::default().antenna_gain_dbi);
    }
}
