use std::{collections::HashMap, fs, path::Path, time::Duration};

use shared::protocol::InitializePayloadStyle;
use storage::DEFAULT_DATABASE_URL;
use tracing::warn;

pub const DEFAULT_SETTINGS_FILE: &str = "interview.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub backend_url: String,
    pub database_url: String,
    pub request_timeout: Option<Duration>,
    pub voice_input_enabled: bool,
    pub auto_send_transcription: bool,
    pub preference_debounce: Duration,
    pub initialize_payload: InitializePayloadStyle,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:5001".into(),
            database_url: DEFAULT_DATABASE_URL.into(),
            request_timeout: None,
            voice_input_enabled: true,
            auto_send_transcription: true,
            preference_debounce: Duration::from_millis(500),
            initialize_payload: InitializePayloadStyle::Background,
        }
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// File values first, then environment overrides. Unparseable values are ignored.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(file_cfg) => {
                for (key, value) in file_cfg {
                    let value = match value {
                        toml::Value::String(v) => v,
                        other => other.to_string(),
                    };
                    apply(&mut settings, &key, &value);
                }
            }
            Err(err) => warn!(path = %path.display(), "config: ignoring unreadable settings file: {err}"),
        }
    }

    let overrides = [
        ("INTERVIEW_BACKEND_URL", "backend_url"),
        ("APP__BACKEND_URL", "backend_url"),
        ("INTERVIEW_DATABASE_URL", "database_url"),
        ("APP__DATABASE_URL", "database_url"),
        ("APP__REQUEST_TIMEOUT_SECS", "request_timeout_secs"),
        ("APP__VOICE_INPUT_ENABLED", "voice_input_enabled"),
        ("APP__AUTO_SEND_TRANSCRIPTION", "auto_send_transcription"),
        ("APP__PREFERENCE_DEBOUNCE_MS", "preference_debounce_ms"),
        ("APP__INITIALIZE_PAYLOAD", "initialize_payload"),
    ];
    for (var, key) in overrides {
        if let Some(v) = env(var) {
            apply(&mut settings, key, &v);
        }
    }

    settings
}

fn apply(settings: &mut Settings, key: &str, value: &str) {
    match key {
        "backend_url" => settings.backend_url = value.trim().to_string(),
        "database_url" => settings.database_url = value.trim().to_string(),
        "request_timeout_secs" => {
            if let Ok(secs) = value.trim().parse::<u64>() {
                settings.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
            }
        }
        "voice_input_enabled" => {
            if let Some(flag) = parse_flag(value) {
                settings.voice_input_enabled = flag;
            }
        }
        "auto_send_transcription" => {
            if let Some(flag) = parse_flag(value) {
                settings.auto_send_transcription = flag;
            }
        }
        "preference_debounce_ms" => {
            if let Ok(ms) = value.trim().parse::<u64>() {
                settings.preference_debounce = Duration::from_millis(ms);
            }
        }
        "initialize_payload" => {
            if let Ok(style) = value.parse() {
                settings.initialize_payload = style;
            }
        }
        other => warn!(key = other, "config: unknown settings key"),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
