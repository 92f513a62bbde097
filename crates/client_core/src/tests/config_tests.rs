use super::*;

use std::time::{SystemTime, UNIX_EPOCH};

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn missing_file_yields_defaults() {
    let settings = load_settings_from(Path::new("/nonexistent/interview.toml"), no_env);
    assert_eq!(settings, Settings::default());
}

#[test]
fn file_values_then_env_overrides() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = std::env::temp_dir().join(format!("interview_settings_{suffix}.toml"));
    fs::write(
        &path,
        r#"
backend_url = "http://file:9000"
auto_send_transcription = false
request_timeout_secs = 30
initialize_payload = "additional_context"
"#,
    )
    .expect("write settings");

    let settings = load_settings_from(&path, |key| match key {
        "APP__BACKEND_URL" => Some("http://env:9100".to_string()),
        "APP__PREFERENCE_DEBOUNCE_MS" => Some("50".to_string()),
        _ => None,
    });

    assert_eq!(settings.backend_url, "http://env:9100");
    assert!(!settings.auto_send_transcription);
    assert_eq!(settings.request_timeout, Some(Duration::from_secs(30)));
    assert_eq!(
        settings.initialize_payload,
        InitializePayloadStyle::AdditionalContext
    );
    assert_eq!(settings.preference_debounce, Duration::from_millis(50));

    fs::remove_file(path).expect("cleanup");
}

#[test]
fn unparseable_values_keep_defaults() {
    let settings = load_settings_from(Path::new("/nonexistent"), |key| match key {
        "APP__VOICE_INPUT_ENABLED" => Some("maybe".to_string()),
        "APP__REQUEST_TIMEOUT_SECS" => Some("soon".to_string()),
        _ => None,
    });
    assert!(settings.voice_input_enabled);
    assert_eq!(settings.request_timeout, None);
}

#[test]
fn zero_timeout_means_transport_default() {
    let settings = load_settings_from(Path::new("/nonexistent"), |key| {
        (key == "APP__REQUEST_TIMEOUT_SECS").then(|| "0".to_string())
    });
    assert_eq!(settings.request_timeout, None);
}
