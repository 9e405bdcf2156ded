use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracker_engine::{parse_base_url, ApiError, ApiSettings, DEFAULT_MAX_FRAME_BYTES};
use tracker_logging::{parse_level, tracker_info};

use super::logging::LogDestination;

pub const CONFIG_FILENAME: &str = "tracker.ron";

/// Settings read from `tracker.ron`; every field may be omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server_url: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub log_destination: LogDestination,
    pub log_level: String,
    /// Upper bound on how long the binary waits for jobs to settle. Zero waits forever.
    pub watch_timeout_secs: u64,
    pub max_frame_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000/".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            log_destination: LogDestination::File,
            log_level: "info".to_string(),
            watch_timeout_secs: 0,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("invalid server url: {0}")]
    ServerUrl(#[source] ApiError),
}

impl AppConfig {
    /// Loads `explicit` when given; otherwise `tracker.ron` in the working
    /// directory if it exists, falling back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let path = PathBuf::from(CONFIG_FILENAME);
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = ron::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracker_info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn api_settings(&self, server_override: Option<&str>) -> Result<ApiSettings, ConfigError> {
        let raw = server_override.unwrap_or(&self.server_url);
        Ok(ApiSettings {
            base_url: parse_base_url(raw).map_err(ConfigError::ServerUrl)?,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_frame_bytes: self.max_frame_bytes,
        })
    }

    pub fn watch_timeout(&self) -> Option<Duration> {
        (self.watch_timeout_secs > 0).then(|| Duration::from_secs(self.watch_timeout_secs))
    }

    /// Unknown level names fall back to `Info`.
    pub fn level_filter(&self) -> log::LevelFilter {
        parse_level(&self.log_level).unwrap_or(log::LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let file = write_config(r#"(server_url: "http://media-box:8080", log_destination: Both)"#);
        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(
            config,
            AppConfig {
                server_url: "http://media-box:8080".to_string(),
                log_destination: LogDestination::Both,
                ..AppConfig::default()
            }
        );
        assert_eq!(config.watch_timeout(), None);
    }

    #[test]
    fn api_settings_prefer_override_and_convert_timeouts() {
        let config = AppConfig {
            request_timeout_secs: 5,
            max_frame_bytes: 4096,
            ..AppConfig::default()
        };
        let settings = config.api_settings(Some("http://other:1/base")).unwrap();
        assert_eq!(settings.base_url.as_str(), "http://other:1/base/");
        assert_eq!(settings.request_timeout, Duration::from_secs(5));
        assert_eq!(settings.connect_timeout, Duration::from_secs(10));
        assert_eq!(settings.max_frame_bytes, 4096);
    }

    #[test]
    fn bad_inputs_are_reported() {
        let file = write_config("(server_url: 12");
        assert!(matches!(
            AppConfig::load(Some(file.path())),
            Err(ConfigError::Parse { .. })
        ));

        let missing = file.path().with_extension("absent");
        assert!(matches!(
            AppConfig::load(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));

        let config = AppConfig {
            server_url: "::nope".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.api_settings(None),
            Err(ConfigError::ServerUrl(_))
        ));
    }

    #[test]
    fn level_names_are_parsed_leniently() {
        let config = AppConfig {
            log_level: "DEBUG".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.level_filter(), log::LevelFilter::Debug);
        let config = AppConfig {
            log_level: " warn\n".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.level_filter(), log::LevelFilter::Warn);
        let config = AppConfig {
            log_level: "chatty".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.level_filter(), log::LevelFilter::Info);
    }
}
