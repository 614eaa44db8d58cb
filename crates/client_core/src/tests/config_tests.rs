use super::*;

use std::collections::HashMap;

fn scratch_file(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("console-config-{}-{name}", std::process::id()));
    fs::create_dir_all(&dir).expect("create scratch dir");
    let path = dir.join(SETTINGS_FILE);
    fs::write(&path, contents).expect("write settings");
    path
}

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn missing_file_yields_defaults() {
    let path = std::env::temp_dir().join("console-config-does-not-exist.toml");
    let settings = load_settings_from(&path, |_| None).expect("defaults load");

    assert_eq!(settings.api_base_url, DEFAULT_API_BASE_URL);
    assert_eq!(settings.device_name, DEFAULT_DEVICE_NAME);
    assert_eq!(settings.notification_ttl, Duration::from_secs(5));
    assert_eq!(settings.error_auto_hide, Duration::from_secs(10));
    assert!(settings.credential_path.ends_with("inventory-console/auth_token"));
}

#[test]
fn file_values_override_defaults() {
    let path = scratch_file(
        "file",
        r#"
api_base_url = "https://inventory.example.org/api"
device_name = "Back office"
notification_ttl_ms = 2500
credential_path = "/tmp/console-token"
"#,
    );
    let settings = load_settings_from(&path, |_| None).expect("file load");

    assert_eq!(settings.api_base_url, "https://inventory.example.org/api");
    assert_eq!(settings.device_name, "Back office");
    assert_eq!(settings.notification_ttl, Duration::from_millis(2500));
    assert_eq!(settings.error_auto_hide, DEFAULT_ERROR_AUTO_HIDE);
    assert_eq!(settings.credential_path, PathBuf::from("/tmp/console-token"));
}

#[test]
fn environment_wins_over_file() {
    let path = scratch_file("env", "api_base_url = \"https://file.example.org/api\"\n");
    let env = env_from(&[
        ("VITE_API_BASE_URL", "https://vite.example.org/api"),
        ("APP__ERROR_AUTO_HIDE_MS", "1500"),
        ("APP__REQUEST_TIMEOUT_MS", " 750 "),
        ("APP__DEVICE_NAME", "Kiosk"),
    ]);
    let settings = load_settings_from(&path, env).expect("env load");

    assert_eq!(settings.api_base_url, "https://vite.example.org/api");
    assert_eq!(settings.error_auto_hide, Duration::from_millis(1500));
    assert_eq!(settings.request_timeout, Duration::from_millis(750));
    assert_eq!(settings.device_name, "Kiosk");
}

#[test]
fn app_prefixed_url_beats_vite_variable() {
    let path = std::env::temp_dir().join("console-config-absent-prefix.toml");
    let env = env_from(&[
        ("VITE_API_BASE_URL", "https://vite.example.org/api"),
        ("APP__API_BASE_URL", "https://app.example.org/api"),
    ]);
    let settings = load_settings_from(&path, env).expect("env load");
    assert_eq!(settings.api_base_url, "https://app.example.org/api");
}

#[test]
fn invalid_duration_is_rejected() {
    let path = std::env::temp_dir().join("console-config-absent-duration.toml");
    let err = load_settings_from(&path, env_from(&[("APP__NOTIFICATION_TTL_MS", "soon")]))
        .expect_err("invalid duration");
    match err {
        SettingsError::InvalidDuration { key, value } => {
            assert_eq!(key, "APP__NOTIFICATION_TTL_MS");
            assert_eq!(value, "soon");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn invalid_url_is_rejected() {
    let path = std::env::temp_dir().join("console-config-absent-url.toml");
    let err = load_settings_from(&path, env_from(&[("APP__API_BASE_URL", "not a url")]))
        .expect_err("invalid url");
    assert!(matches!(err, SettingsError::InvalidUrl { .. }));
}

#[test]
fn unknown_keys_fail_to_parse() {
    let path = scratch_file("unknown", "api_url = \"http://localhost\"\n");
    let err = load_settings_from(&path, |_| None).expect_err("unknown key");
    assert!(matches!(err, SettingsError::Parse { .. }));
}
