//! Environment overrides for `LinkConfig`.

use std::sync::{Mutex, OnceLock};

use devicelink::config::LinkConfig;
use devicelink::error::LinkError;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const CONFIG_ENV_VARS: [&str; 5] = [
    "DEVICELINK_BASE_URL",
    "DEVICELINK_DEVICE_CODE_INTERVAL_SECS",
    "DEVICELINK_DEVICE_CODE_CEILING_SECS",
    "DEVICELINK_TOKEN_INTERVAL_SECS",
    "DEVICELINK_REQUEST_TIMEOUT_SECS",
];

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn clear(keys: &[&str]) -> Self {
        let saved = keys
            .iter()
            .map(|key| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        for key in keys {
            std::env::remove_var(key);
        }
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[test]
fn env_overrides_file_values() {
    let _env_lock = env_lock_guard();
    let _env_guard = EnvGuard::clear(&CONFIG_ENV_VARS);

    std::env::set_var("DEVICELINK_BASE_URL", "https://env.example/trakt");
    std::env::set_var("DEVICELINK_TOKEN_INTERVAL_SECS", " 9 ");

    let mut config = LinkConfig::from_toml_str(
        r#"
        base_url = "https://file.example/trakt"
        [timing]
        token_interval_secs = 4
        device_code_interval_secs = 1
        "#,
    )
    .unwrap();
    config.apply_env().unwrap();

    assert_eq!(config.base_url, "https://env.example/trakt");
    assert_eq!(config.timing.token_interval_secs, 9);
    assert_eq!(config.timing.device_code_interval_secs, 1);
    assert_eq!(config.timing.device_code_ceiling_secs, 10);
}

#[test]
fn env_without_overrides_leaves_config_untouched() {
    let _env_lock = env_lock_guard();
    let _env_guard = EnvGuard::clear(&CONFIG_ENV_VARS);

    let mut config = LinkConfig::default();
    config.apply_env().unwrap();
    assert_eq!(config, LinkConfig::default());
}

#[test]
fn non_numeric_interval_is_a_configuration_error() {
    let _env_lock = env_lock_guard();
    let _env_guard = EnvGuard::clear(&CONFIG_ENV_VARS);

    std::env::set_var("DEVICELINK_DEVICE_CODE_CEILING_SECS", "ten");

    let mut config = LinkConfig::default();
    match config.apply_env() {
        Err(LinkError::Configuration(message)) => {
            assert!(message.contains("DEVICELINK_DEVICE_CODE_CEILING_SECS"), "{message}");
        }
        other => panic!("expected Configuration error, got {other:?}"),
    }
}
