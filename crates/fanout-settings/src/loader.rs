//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`FanoutSettings::default()`]
//! 2. If `~/.fanout/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. [`FanoutSettings::validate`] the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::FanoutSettings;

/// Resolve the path to the settings file (`~/.fanout/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".fanout").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<FanoutSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. Invalid JSON or a result
/// that fails validation is an error.
pub fn load_settings_from_path(path: &Path) -> Result<FanoutSettings> {
    let mut settings = read_settings_file(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Defaults deep-merged with the file at `path`, without env overrides.
pub fn read_settings_file(path: &Path) -> Result<FanoutSettings> {
    let defaults = serde_json::to_value(FanoutSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
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

/// Apply `FANOUT_*` (and plain `PORT`) environment overrides.
///
/// Invalid values are ignored with a warning.
pub fn apply_env_overrides(settings: &mut FanoutSettings) {
    apply_overrides(settings, &|name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable source.
pub fn apply_overrides(settings: &mut FanoutSettings, lookup: &dyn Fn(&str) -> Option<String>) {
    let env = Env { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("FANOUT_HOST") {
        settings.server.host = v;
    }
    // Plain PORT is what most hosting platforms set; FANOUT_PORT wins.
    if let Some(v) = env.u16("PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.u16("FANOUT_PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.string("FANOUT_WS_PATH") {
        settings.server.ws_path = v;
    }
    if let Some(v) = env.bool("FANOUT_CORS") {
        settings.server.cors_enabled = v;
    }

    // ── Hub ─────────────────────────────────────────────────────────
    if let Some(v) = env.usize("FANOUT_OUTBOUND_CAPACITY", 1, 1_048_576) {
        settings.hub.outbound_capacity = v;
    }
    if let Some(v) = env.usize("FANOUT_EVENT_CAPACITY", 1, 1_048_576) {
        settings.hub.event_capacity = v;
    }
    if let Some(v) = env.usize("FANOUT_MAX_CONNECTIONS", 1, 1_000_000) {
        settings.hub.max_connections = v;
    }
    if let Some(v) = env.usize("FANOUT_MAX_MESSAGE_SIZE", 1, 64 * 1024 * 1024) {
        settings.hub.max_message_size = v;
    }
    if let Some(v) = env.u64("FANOUT_PING_INTERVAL_MS", 100, 3_600_000) {
        settings.hub.ping_interval_ms = v;
    }
    if let Some(v) = env.u64("FANOUT_PONG_WAIT_MS", 100, 3_600_000) {
        settings.hub.pong_wait_ms = v;
    }
    if let Some(v) = env.u64("FANOUT_WRITE_TIMEOUT_MS", 100, 600_000) {
        settings.hub.write_timeout_ms = v;
    }
    if let Some(v) = env.bool("FANOUT_ECHO_TO_SENDER") {
        settings.hub.echo_to_sender = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.variant("FANOUT_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.variant("FANOUT_LOG_FORMAT") {
        settings.logging.format = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

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

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a lowercase serde enum name (`"debug"`, `"json"`, ...).
pub fn parse_variant<T: DeserializeOwned>(val: &str) -> Option<T> {
    serde_json::from_value(Value::String(val.to_lowercase())).ok()
}

// ── Variable readers (thin wrappers) ────────────────────────────────────────

struct Env<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Env<'_> {
    fn raw(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn string(&self, name: &str) -> Option<String> {
        self.raw(name)
    }

    fn checked<T>(&self, name: &str, kind: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        let val = self.raw(name)?;
        let result = parse(&val);
        if result.is_none() {
            warn!(key = name, value = %val, kind, "invalid env var, ignoring");
        }
        result
    }

    fn bool(&self, name: &str) -> Option<bool> {
        self.checked(name, "bool", parse_bool)
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        self.checked(name, "u16", |v| parse_u16_range(v, min, max))
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        self.checked(name, "u64", |v| parse_u64_range(v, min, max))
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        self.checked(name, "usize", |v| parse_usize_range(v, min, max))
    }

    fn variant<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.checked(name, "enum", parse_variant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LogFormat, LogLevel};
    use std::collections::HashMap;

    fn overrides(vars: &[(&str, &str)]) -> FanoutSettings {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let mut settings = FanoutSettings::default();
        apply_overrides(&mut settings, &|name| map.get(name).cloned());
        settings
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
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4, 5]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4, 5]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    #[test]
    fn merge_new_keys_added() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"b": 2}));
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    // ── files ───────────────────────────────────────────────────────

    #[test]
    fn missing_file_returns_defaults() {
        let settings = read_settings_file(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings, FanoutSettings::default());
    }

    #[test]
    fn partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 9090}, "hub": {"outboundCapacity": 16, "echoToSender": true}}"#,
        )
        .unwrap();

        let settings = read_settings_file(&path).unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.server.ws_path, "/ws");
        assert_eq!(settings.hub.outbound_capacity, 16);
        assert!(settings.hub.echo_to_sender);
        assert_eq!(settings.hub.event_capacity, 1024);
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();
        assert!(matches!(
            read_settings_file(&path),
            Err(SettingsError::Malformed(_))
        ));
    }

    #[test]
    fn unreadable_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        match read_settings_file(dir.path()) {
            Err(SettingsError::Read { path, .. }) => assert_eq!(path, dir.path()),
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_values_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"hub": {"pingIntervalMs": 90000}}"#).unwrap();
        assert!(matches!(
            load_settings_from_path(&path),
            Err(SettingsError::Constraint { .. })
        ));
    }

    #[test]
    fn settings_path_under_home() {
        let path = settings_path();
        assert!(path.ends_with(".fanout/settings.json"));
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn overrides_apply() {
        let s = overrides(&[
            ("FANOUT_HOST", "127.0.0.1"),
            ("FANOUT_PORT", "9001"),
            ("FANOUT_CORS", "off"),
            ("FANOUT_OUTBOUND_CAPACITY", "32"),
            ("FANOUT_PONG_WAIT_MS", "5000"),
            ("FANOUT_ECHO_TO_SENDER", "yes"),
            ("FANOUT_LOG_LEVEL", "DEBUG"),
            ("FANOUT_LOG_FORMAT", "json"),
        ]);
        assert_eq!(s.server.host, "127.0.0.1");
        assert_eq!(s.server.port, 9001);
        assert!(!s.server.cors_enabled);
        assert_eq!(s.hub.outbound_capacity, 32);
        assert_eq!(s.hub.pong_wait_ms, 5000);
        assert!(s.hub.echo_to_sender);
        assert_eq!(s.logging.level, LogLevel::Debug);
        assert_eq!(s.logging.format, LogFormat::Json);
    }

    #[test]
    fn fanout_port_beats_plain_port() {
        assert_eq!(overrides(&[("PORT", "3000")]).server.port, 3000);
        assert_eq!(
            overrides(&[("PORT", "3000"), ("FANOUT_PORT", "4000")]).server.port,
            4000
        );
    }

    #[test]
    fn invalid_overrides_ignored() {
        let s = overrides(&[
            ("FANOUT_PORT", "99999"),
            ("FANOUT_OUTBOUND_CAPACITY", "0"),
            ("FANOUT_CORS", "maybe"),
            ("FANOUT_LOG_LEVEL", "loud"),
            ("FANOUT_HOST", ""),
        ]);
        assert_eq!(s, FanoutSettings::default());
    }

    // ── parsers ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for val in ["true", "1", "yes", "on", "TRUE", "On"] {
            assert_eq!(parse_bool(val), Some(true), "failed for {val}");
        }
        for val in ["false", "0", "no", "off", "FALSE"] {
            assert_eq!(parse_bool(val), Some(false), "failed for {val}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("0", 0, 65535), Some(0));
        assert_eq!(parse_u16_range("99999", 0, 65535), None);
        assert_eq!(parse_u64_range("500", 1000, 600_000), None);
        assert_eq!(parse_u64_range("30000", 1000, 600_000), Some(30_000));
        assert_eq!(parse_usize_range("abc", 1, 10), None);
        assert_eq!(parse_usize_range("5", 1, 10), Some(5));
    }

    #[test]
    fn parse_variant_is_case_insensitive() {
        assert_eq!(parse_variant::<LogLevel>("WARN"), Some(LogLevel::Warn));
        assert_eq!(parse_variant::<LogFormat>("Pretty"), Some(LogFormat::Pretty));
        assert_eq!(parse_variant::<LogFormat>("xml"), None);
    }
}
