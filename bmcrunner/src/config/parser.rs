//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::time::Duration;

use super::duration::parse_duration;
use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [runner] section
    if let Some(section) = ini.section(Some("runner")) {
        if let Some(v) = section.get("max_workers") {
            config.runner.max_workers = parse_positive("runner", "max_workers", v)?;
        }
        if let Some(v) = section.get("worker_idle_timeout") {
            config.runner.worker_idle_timeout =
                parse_nonzero_duration("runner", "worker_idle_timeout", v)?;
        }
        if let Some(v) = section.get("reporter_interval") {
            config.runner.reporter_interval =
                parse_nonzero_duration("runner", "reporter_interval", v)?;
        }
    }

    // [repository] section
    if let Some(section) = ini.section(Some("repository")) {
        if let Some(v) = section.get("capacity") {
            let v = v.trim();
            config.repository.capacity = if v.is_empty() {
                None
            } else {
                Some(parse_positive("repository", "capacity", v)?)
            };
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_positive(section: &str, key: &str, value: &str) -> Result<usize, ConfigFileError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid(section, key, value, "must be a positive integer")),
    }
}

fn parse_nonzero_duration(
    section: &str,
    key: &str,
    value: &str,
) -> Result<Duration, ConfigFileError> {
    match parse_duration(value) {
        Ok(d) if !d.is_zero() => Ok(d),
        Ok(_) => Err(invalid(section, key, value, "must be greater than zero")),
        Err(_) => Err(invalid(
            section,
            key,
            value,
            "expected format like '30s', '250ms', or '2m'",
        )),
    }
}

/// Expand a leading `~/` to the user's home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn load(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        std::fs::write(&config_path, content).unwrap();
        ConfigFile::load_from(&config_path)
    }

    #[test]
    fn test_runner_section() {
        let config = load(
            r#"
[runner]
max_workers = 17
worker_idle_timeout = 2s
reporter_interval = 500ms
"#,
        )
        .unwrap();

        assert_eq!(config.runner.max_workers, 17);
        assert_eq!(config.runner.worker_idle_timeout, Duration::from_secs(2));
        assert_eq!(config.runner.reporter_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_missing_keys_keep_defaults() {
        let config = load("[runner]\nmax_workers = 8\n").unwrap();
        let default = ConfigFile::default();

        assert_eq!(config.runner.max_workers, 8);
        assert_eq!(
            config.runner.worker_idle_timeout,
            default.runner.worker_idle_timeout
        );
        assert_eq!(config.repository, default.repository);
    }

    #[test]
    fn test_zero_max_workers_rejected() {
        let err = load("[runner]\nmax_workers = 0\n").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("runner.max_workers"));
        assert!(msg.contains("positive integer"));
    }

    #[test]
    fn test_invalid_duration_rejected() {
        let err = load("[runner]\nworker_idle_timeout = forever\n").unwrap_err();
        match err {
            ConfigFileError::InvalidValue {
                section,
                key,
                value,
                ..
            } => {
                assert_eq!(section, "runner");
                assert_eq!(key, "worker_idle_timeout");
                assert_eq!(value, "forever");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_duration_rejected() {
        let err = load("[runner]\nreporter_interval = 0s\n").unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_repository_capacity() {
        let config = load("[repository]\ncapacity = 500\n").unwrap();
        assert_eq!(config.repository.capacity, Some(500));

        let config = load("[repository]\ncapacity =\n").unwrap();
        assert_eq!(config.repository.capacity, None);

        assert!(load("[repository]\ncapacity = lots\n").is_err());
    }

    #[test]
    fn test_logging_file_expands_tilde() {
        let config = load("[logging]\nfile = ~/logs/runner.log\n").unwrap();
        if let Some(home) = dirs::home_dir() {
            assert_eq!(config.logging.file, home.join("logs/runner.log"));
        }
    }

    #[test]
    fn test_expand_tilde_leaves_absolute_paths() {
        assert_eq!(
            expand_tilde("/var/log/bmcrunner.log"),
            PathBuf::from("/var/log/bmcrunner.log")
        );
    }
}
