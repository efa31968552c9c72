//! Configuration (layered: defaults < config file < environment < code).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};

const DEFAULT_BASE_URL: &str = "http://localhost:8081/api/v2/auth/trakt";

/// Backend location and polling cadence for one coordinator.
///
/// # Example
/// ```
/// use devicelink::config::LinkConfig;
///
/// let config = LinkConfig::default().with_base_url("http://127.0.0.1:8081/api/auth");
/// assert_eq!(config.timing.device_code_interval().as_secs(), 2);
/// config.validate()?;
/// # Ok::<(), devicelink::error::LinkError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    pub base_url: String,
    pub endpoints: Endpoints,
    pub timing: Timing,
    pub request_timeout_secs: u64,
}

/// Paths of the four backend endpoints, relative to `base_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Endpoints {
    pub authorize: String,
    pub device_code: String,
    pub token: String,
    pub errors: String,
}

/// Poll intervals and the device-code ceiling, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timing {
    pub device_code_interval_secs: u64,
    pub device_code_ceiling_secs: u64,
    pub token_interval_secs: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoints: Endpoints::default(),
            timing: Timing::default(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            authorize: "authorize".to_string(),
            device_code: "device-code".to_string(),
            token: "token".to_string(),
            errors: "errors".to_string(),
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            device_code_interval_secs: 2,
            device_code_ceiling_secs: 10,
            token_interval_secs: 3,
        }
    }
}

impl Timing {
    pub fn device_code_interval(&self) -> Duration {
        Duration::from_secs(self.device_code_interval_secs)
    }

    pub fn device_code_ceiling(&self) -> Duration {
        Duration::from_secs(self.device_code_ceiling_secs)
    }

    pub fn token_interval(&self) -> Duration {
        Duration::from_secs(self.token_interval_secs)
    }
}

impl LinkConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Join `base_url` and an endpoint path with exactly one slash.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Default config file path (`<config dir>/devicelink/config.toml`).
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "devicelink")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".devicelink/config.toml"))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        Ok(config)
    }

    /// Load a config file; a missing file yields the defaults.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(LinkError::Io(err)),
        };
        Self::from_toml_str(&raw)
    }

    /// Load the default config file, then apply environment overrides.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::load_from_path(Self::default_path())?;
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `DEVICELINK_*` environment overrides on top of the current values.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("DEVICELINK_BASE_URL") {
            self.base_url = url;
        }

        let secs_mappings: [(&str, &mut u64); 4] = [
            (
                "DEVICELINK_DEVICE_CODE_INTERVAL_SECS",
                &mut self.timing.device_code_interval_secs,
            ),
            (
                "DEVICELINK_DEVICE_CODE_CEILING_SECS",
                &mut self.timing.device_code_ceiling_secs,
            ),
            (
                "DEVICELINK_TOKEN_INTERVAL_SECS",
                &mut self.timing.token_interval_secs,
            ),
            (
                "DEVICELINK_REQUEST_TIMEOUT_SECS",
                &mut self.request_timeout_secs,
            ),
        ];

        for (env_var, slot) in secs_mappings {
            if let Ok(raw) = std::env::var(env_var) {
                *slot = raw.trim().parse().map_err(|_| {
                    LinkError::Configuration(format!("{env_var} must be a whole number of seconds, got {raw:?}"))
                })?;
            }
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(LinkError::Configuration("base_url is empty".to_string()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(LinkError::Configuration(format!(
                "base_url must be an http(s) URL, got {}",
                self.base_url
            )));
        }
        for (name, value) in [
            ("device_code_interval_secs", self.timing.device_code_interval_secs),
            ("device_code_ceiling_secs", self.timing.device_code_ceiling_secs),
            ("token_interval_secs", self.timing.token_interval_secs),
            ("request_timeout_secs", self.request_timeout_secs),
        ] {
            if value == 0 {
                return Err(LinkError::Configuration(format!("{name} must be positive")));
            }
        }
        Ok(())
    }
}
