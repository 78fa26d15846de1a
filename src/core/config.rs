use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::core::error::ConfigError;

/// Local development backend
const DEFAULT_BASE_URL: &str = "http://localhost:8000";

const DEFAULT_API_PREFIX: &str = "/api/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Backend origin, without the API prefix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Seed token; the local store takes precedence once a login happened
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Owner id used for sessions and profile calls
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_nickname_debounce_ms")]
    pub nickname_debounce_ms: u64,

    #[serde(default)]
    pub debug: bool,
}

fn default_working_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_data_dir() -> String {
    ".htp-client".into()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

fn default_api_prefix() -> String {
    DEFAULT_API_PREFIX.into()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_nickname_debounce_ms() -> u64 {
    800
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            data_dir: default_data_dir(),
            base_url: default_base_url(),
            api_prefix: default_api_prefix(),
            auth_token: None,
            user_id: None,
            request_timeout_secs: default_request_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            nickname_debounce_ms: default_nickname_debounce_ms(),
            debug: false,
        }
    }
}

pub fn load_config(working_dir: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let wd = working_dir.unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    let mut config = AppConfig {
        working_dir: wd.clone(),
        ..AppConfig::default()
    };

    // Global config
    if let Some(config_dir) = dirs::config_dir() {
        let global_path = config_dir.join("htp-client").join("config.json");
        if global_path.exists() {
            merge_config(&mut config, read_config_file(&global_path)?);
        }
    }

    // Project-local config
    let local_path = wd.join("htp-client.json");
    if local_path.exists() {
        merge_config(&mut config, read_config_file(&local_path)?);
    }

    apply_env(&mut config);
    config.validate()?;

    Ok(config)
}

fn read_config_file(path: &std::path::Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::File(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| ConfigError::Invalid(format!("{}: {e}", path.display())))
}

fn merge_config(base: &mut AppConfig, overlay: AppConfig) {
    if overlay.data_dir != default_data_dir() {
        base.data_dir = overlay.data_dir;
    }
    if overlay.base_url != default_base_url() {
        base.base_url = overlay.base_url;
    }
    if overlay.api_prefix != default_api_prefix() {
        base.api_prefix = overlay.api_prefix;
    }
    if overlay.auth_token.is_some() {
        base.auth_token = overlay.auth_token;
    }
    if overlay.user_id.is_some() {
        base.user_id = overlay.user_id;
    }
    if overlay.request_timeout_secs != default_request_timeout_secs() {
        base.request_timeout_secs = overlay.request_timeout_secs;
    }
    if overlay.poll_interval_ms != default_poll_interval_ms() {
        base.poll_interval_ms = overlay.poll_interval_ms;
    }
    if overlay.nickname_debounce_ms != default_nickname_debounce_ms() {
        base.nickname_debounce_ms = overlay.nickname_debounce_ms;
    }
    if overlay.debug {
        base.debug = true;
    }
}

fn apply_env(config: &mut AppConfig) {
    if let Some(url) = non_empty_env("HTP_API_URL") {
        config.base_url = url;
    }
    if let Some(token) = non_empty_env("HTP_AUTH_TOKEN") {
        config.auth_token = Some(token);
    }
    if let Some(user) = non_empty_env("HTP_USER_ID") {
        config.user_id = Some(user);
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "base_url must start with http:// or https://, got {}",
                self.base_url
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn data_path(&self) -> PathBuf {
        self.working_dir.join(&self.data_dir)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn nickname_debounce(&self) -> Duration {
        Duration::from_millis(self.nickname_debounce_ms)
    }
}
