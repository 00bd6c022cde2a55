use serde::{Deserialize, Serialize};
use config::{Config, Environment, File};
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::core::platform::container::sync_state::PollGate;
use crate::core::platform::manager::scheduler::DEFAULT_POLL_INTERVAL;
use crate::error::ConfigurationError;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// Root of the dashboard API; notification routes live under `api/notifications`
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn parsed_base_url(&self) -> Result<Url, ConfigurationError> {
        let url = Url::parse(&self.base_url).map_err(|e| ConfigurationError::Invalid {
            key: "api.base_url",
            message: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigurationError::Invalid {
                key: "api.base_url",
                message: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        Ok(url)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SyncSettings {
    pub poll_interval_secs: u64,
    pub poll_gate: PollGate,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            poll_gate: PollGate::Global,
        }
    }
}

impl SyncSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub api: ApiConfig,
    pub sync: SyncSettings,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            sync: SyncSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Layers an optional `notification-sync` file, an optional `notification-sync.<APP_ENV>`
    /// overlay and `NOTIFY_*` environment variables (`__` separates nested keys)
    pub fn new() -> Result<Self, ConfigurationError> {
        let mut builder = Config::builder()
            .add_source(File::with_name("notification-sync").required(false));

        if let Ok(env) = std::env::var("APP_ENV") {
            builder = builder
                .add_source(File::with_name(&format!("notification-sync.{}", env)).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("NOTIFY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from_file(filename: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let content = fs::read_to_string(filename)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.api.parsed_base_url()?;
        if self.sync.poll_interval_secs == 0 {
            return Err(ConfigurationError::Invalid {
                key: "sync.poll_interval_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_settings(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.sync.poll_interval(), Duration::from_secs(30));
        assert_eq!(settings.sync.poll_gate, PollGate::Global);
        assert_eq!(settings.log_level, "info");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let file = write_settings(
            r#"
log_level = "debug"

[api]
base_url = "https://dash.example.com/backend/"

[sync]
poll_interval_secs = 10
poll_gate = "per_id"
"#,
        );

        let settings = Settings::load_from_file(file.path()).unwrap();

        assert_eq!(settings.api.base_url, "https://dash.example.com/backend/");
        assert_eq!(settings.sync.poll_interval(), Duration::from_secs(10));
        assert_eq!(settings.sync.poll_gate, PollGate::PerId);
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_settings("[sync]\npoll_gate = \"per_id\"\n");

        let settings = Settings::load_from_file(file.path()).unwrap();

        assert_eq!(settings.sync.poll_interval_secs, 30);
        assert_eq!(settings.api, ApiConfig::default());
    }

    #[test]
    fn test_new_layers_environment_variables() {
        std::env::set_var("NOTIFY_SYNC__POLL_GATE", "per_id");
        std::env::set_var("NOTIFY_SYNC__POLL_INTERVAL_SECS", "12");
        std::env::set_var("NOTIFY_API__BASE_URL", "https://dash.example.com/");

        let settings = Settings::new();

        std::env::remove_var("NOTIFY_SYNC__POLL_GATE");
        std::env::remove_var("NOTIFY_SYNC__POLL_INTERVAL_SECS");
        std::env::remove_var("NOTIFY_API__BASE_URL");

        let settings = settings.unwrap();
        assert_eq!(settings.sync.poll_gate, PollGate::PerId);
        assert_eq!(settings.sync.poll_interval(), Duration::from_secs(12));
        assert_eq!(settings.api.base_url, "https://dash.example.com/");
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_zero_interval_rejected() {
        let file = write_settings("[sync]\npoll_interval_secs = 0\n");

        let result = Settings::load_from_file(file.path());

        assert!(matches!(
            result,
            Err(ConfigurationError::Invalid { key: "sync.poll_interval_secs", .. })
        ));
    }

    #[test]
    fn test_base_url_must_be_http() {
        let mut settings = Settings::default();
        settings.api.base_url = "ftp://files.example.com".to_string();
        assert!(settings.validate().is_err());

        settings.api.base_url = "not a url".to_string();
        assert!(matches!(
            settings.validate(),
            Err(ConfigurationError::Invalid { key: "api.base_url", .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = Settings::load_from_file("/nonexistent/notification-sync.toml");
        assert!(matches!(result, Err(ConfigurationError::Io(_))));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let file = write_settings("[sync\npoll_interval_secs = ");
        let result = Settings::load_from_file(file.path());
        assert!(matches!(result, Err(ConfigurationError::Parse(_))));
    }
}
