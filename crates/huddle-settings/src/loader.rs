//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`HuddleSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `HUDDLE_*` environment variable overrides (highest priority)
//! 4. Validate cross-field constraints
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use huddle_core::logging::LogFormat;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::HuddleSettings;

/// Resolve the default settings file path (`~/.huddle/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".huddle").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<HuddleSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. A file with invalid JSON, or values that
/// fail validation, is an error.
pub fn load_settings_from_path(path: &Path) -> Result<HuddleSettings> {
    load_with_env(path, |name| std::env::var(name).ok())
}

fn load_with_env(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<HuddleSettings> {
    let defaults = serde_json::to_value(HuddleSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: HuddleSettings = serde_json::from_value(merged)?;
    apply_overrides(&mut settings, env);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `HUDDLE_*` environment overrides read through `env`.
///
/// Invalid values are ignored with a warning and the file/default value is kept.
pub fn apply_overrides(settings: &mut HuddleSettings, env: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| env(name).filter(|v| !v.is_empty());

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read("HUDDLE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = parsed(&read, "HUDDLE_PORT", |v| parse_range::<u16>(v, 0, u16::MAX)) {
        settings.server.port = v;
    }
    if let Some(v) = parsed(&read, "HUDDLE_MAX_CONNECTIONS", |v| parse_range(v, 1, 1_000_000)) {
        settings.server.max_connections = v;
    }
    if let Some(v) = parsed(&read, "HUDDLE_HEARTBEAT_INTERVAL_SECS", |v| parse_range(v, 1, 3600)) {
        settings.server.heartbeat_interval_secs = v;
    }
    if let Some(v) = parsed(&read, "HUDDLE_HEARTBEAT_TIMEOUT_SECS", |v| parse_range(v, 1, 86_400)) {
        settings.server.heartbeat_timeout_secs = v;
    }
    if let Some(v) = parsed(&read, "HUDDLE_MAX_MESSAGE_SIZE", |v| {
        parse_range(v, 1024, 64 * 1024 * 1024)
    }) {
        settings.server.max_message_size = v;
    }
    if let Some(v) = parsed(&read, "HUDDLE_CLOSE_ON_MALFORMED", parse_bool) {
        settings.server.close_on_malformed = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read("HUDDLE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = parsed(&read, "HUDDLE_LOG_FORMAT", LogFormat::parse) {
        settings.logging.format = v;
    }
}

fn parsed<T>(
    read: &impl Fn(&str) -> Option<String>,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let val = read(name)?;
    let result = parse(&val);
    if result.is_none() {
        warn!(key = name, value = %val, "invalid env var, ignoring");
    }
    result
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse an integer and accept it only within `min..=max`.
pub fn parse_range<T>(val: &str, min: T, max: T) -> Option<T>
where
    T: std::str::FromStr + PartialOrd,
{
    let n: T = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 8080, "host": "localhost"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_null_preserves_target() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"a": null}));
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_array_replace() {
        let merged = deep_merge(
            serde_json::json!({"items": [1, 2, 3]}),
            serde_json::json!({"items": [4]}),
        );
        assert_eq!(merged["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_new_keys_added() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"b": 2}));
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    // ── load_with_env ───────────────────────────────────────────────

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_with_env(&dir.path().join("nope.json"), no_env).unwrap();
        assert_eq!(s.server.port, 8080);
        assert!(s.server.close_on_malformed);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server":{"port":9100,"maxConnections":3},"logging":{"format":"json"}}"#,
        )
        .unwrap();
        let s = load_with_env(&path, no_env).unwrap();
        assert_eq!(s.server.port, 9100);
        assert_eq!(s.server.max_connections, 3);
        assert_eq!(s.server.host, "127.0.0.1");
        assert_eq!(s.logging.format, LogFormat::Json);
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert_matches!(load_with_env(&path, no_env), Err(SettingsError::Json(_)));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server":{"heartbeatIntervalSecs":60,"heartbeatTimeoutSecs":5}}"#,
        )
        .unwrap();
        assert_matches!(load_with_env(&path, no_env), Err(SettingsError::InvalidValue(_)));
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server":{"port":9100}}"#).unwrap();
        let env = env_of(&[
            ("HUDDLE_PORT", "9200"),
            ("HUDDLE_HOST", "0.0.0.0"),
            ("HUDDLE_CLOSE_ON_MALFORMED", "off"),
            ("HUDDLE_LOG_LEVEL", "debug"),
        ]);
        let s = load_with_env(&path, env).unwrap();
        assert_eq!(s.server.port, 9200);
        assert_eq!(s.server.host, "0.0.0.0");
        assert!(!s.server.close_on_malformed);
        assert_eq!(s.logging.level, "debug");
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut s = HuddleSettings::default();
        apply_overrides(
            &mut s,
            env_of(&[
                ("HUDDLE_PORT", "not-a-port"),
                ("HUDDLE_MAX_CONNECTIONS", "0"),
                ("HUDDLE_LOG_FORMAT", "yaml"),
            ]),
        );
        assert_eq!(s.server.port, 8080);
        assert_eq!(s.server.max_connections, 1024);
        assert_eq!(s.logging.format, LogFormat::Compact);
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut s = HuddleSettings::default();
        apply_overrides(&mut s, env_of(&[("HUDDLE_HOST", "")]));
        assert_eq!(s.server.host, "127.0.0.1");
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for t in ["true", "1", "YES", "On"] {
            assert_eq!(parse_bool(t), Some(true));
        }
        for f in ["false", "0", "no", "OFF"] {
            assert_eq!(parse_bool(f), Some(false));
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_range_bounds() {
        assert_eq!(parse_range::<u64>("5", 1, 10), Some(5));
        assert_eq!(parse_range::<u64>("0", 1, 10), None);
        assert_eq!(parse_range::<u64>("11", 1, 10), None);
        assert_eq!(parse_range::<u16>("70000", 0, u16::MAX), None);
        assert_eq!(parse_range::<usize>(" 7 ", 1, 10), Some(7));
    }
}
