use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::{error_handler::DEFAULT_ERROR_AUTO_HIDE, notifications::DEFAULT_NOTIFICATION_TTL};

pub const SETTINGS_FILE: &str = "console.toml";
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_DEVICE_NAME: &str = "Inventory Management UI";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse settings file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid API base url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid value '{value}' for {key}; expected milliseconds")]
    InvalidDuration { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub device_name: String,
    pub request_timeout: Duration,
    pub notification_ttl: Duration,
    pub error_auto_hide: Duration,
    pub credential_path: PathBuf,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            device_name: DEFAULT_DEVICE_NAME.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            notification_ttl: DEFAULT_NOTIFICATION_TTL,
            error_auto_hide: DEFAULT_ERROR_AUTO_HIDE,
            credential_path: default_credential_path(),
        }
    }
}

impl ClientSettings {
    pub fn base_url(&self) -> Result<Url, SettingsError> {
        Url::parse(self.api_base_url.trim()).map_err(|source| SettingsError::InvalidUrl {
            url: self.api_base_url.clone(),
            source,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    api_base_url: Option<String>,
    device_name: Option<String>,
    request_timeout_ms: Option<u64>,
    notification_ttl_ms: Option<u64>,
    error_auto_hide_ms: Option<u64>,
    credential_path: Option<PathBuf>,
}

/// Defaults, then `console.toml` in the working directory, then environment.
pub fn load_settings() -> Result<ClientSettings, SettingsError> {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClientSettings, SettingsError> {
    let mut settings = ClientSettings::default();

    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg: FileSettings =
                toml::from_str(&raw).map_err(|source| SettingsError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?;
            apply_file(&mut settings, file_cfg);
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    apply_env(&mut settings, env)?;
    settings.base_url()?;
    Ok(settings)
}

fn apply_file(settings: &mut ClientSettings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = file_cfg.device_name {
        settings.device_name = v;
    }
    if let Some(v) = file_cfg.request_timeout_ms {
        settings.request_timeout = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg.notification_ttl_ms {
        settings.notification_ttl = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg.error_auto_hide_ms {
        settings.error_auto_hide = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg.credential_path {
        settings.credential_path = v;
    }
}

fn apply_env(
    settings: &mut ClientSettings,
    env: impl Fn(&str) -> Option<String>,
) -> Result<(), SettingsError> {
    if let Some(v) = env("VITE_API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__DEVICE_NAME") {
        settings.device_name = v;
    }
    if let Some(v) = env("APP__REQUEST_TIMEOUT_MS") {
        settings.request_timeout = parse_millis("APP__REQUEST_TIMEOUT_MS", &v)?;
    }
    if let Some(v) = env("APP__NOTIFICATION_TTL_MS") {
        settings.notification_ttl = parse_millis("APP__NOTIFICATION_TTL_MS", &v)?;
    }
    if let Some(v) = env("APP__ERROR_AUTO_HIDE_MS") {
        settings.error_auto_hide = parse_millis("APP__ERROR_AUTO_HIDE_MS", &v)?;
    }
    if let Some(v) = env("APP__CREDENTIAL_PATH") {
        settings.credential_path = PathBuf::from(v);
    }
    Ok(())
}

fn parse_millis(key: &str, value: &str) -> Result<Duration, SettingsError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| SettingsError::InvalidDuration {
            key: key.to_string(),
            value: value.to_string(),
        })
}

fn default_credential_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("inventory-console")
        .join("auth_token")
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
