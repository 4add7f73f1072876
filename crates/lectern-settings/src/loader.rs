//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`LecternSettings::default()`]
//! 2. If the config file exists, deep-merge its values over defaults
//! 3. Apply `LECTERN_*` environment variable overrides (highest priority)
//! 4. Normalize path fields and validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::LecternSettings;

/// Config file consulted when no path is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, or the result fails validation, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<LecternSettings> {
    load_with(path, |name| std::env::var(name).ok())
}

/// [`load_settings_from_path`] with an explicit variable lookup.
pub fn load_with(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<LecternSettings> {
    let defaults = serde_json::to_value(LecternSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: LecternSettings = serde_json::from_value(merged)?;
    apply_overrides(&mut settings, lookup);
    settings.normalize();
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
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

/// Apply `LECTERN_*` overrides read through `lookup`.
///
/// Each variable has strict parsing rules:
/// - Integers must be valid and within the specified range
/// - Booleans accept: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`
/// - Invalid values are logged and ignored (fall back to file/default)
pub fn apply_overrides(settings: &mut LecternSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("LECTERN_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("LECTERN_PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.string("LECTERN_SERVER_PATH") {
        settings.server.server_path = v;
    }
    if let Some(v) = env.string("LECTERN_SERVER_NAME") {
        settings.server.server_name = v;
    }
    if let Some(v) = env.u64("LECTERN_PING_INTERVAL_SECS", 1, 3600) {
        settings.server.ping_interval_secs = v;
    }
    if let Some(v) = env.u64("LECTERN_PONG_TIMEOUT_SECS", 1, 3600) {
        settings.server.pong_timeout_secs = v;
    }

    // ── Sessions ────────────────────────────────────────────────────
    if let Some(v) = env.u64("LECTERN_REAPER_INTERVAL_SECS", 1, 86_400) {
        settings.sessions.reaper_interval_secs = v;
    }
    if let Some(v) = env.u64("LECTERN_TICK_INTERVAL_MS", 10, 60_000) {
        settings.sessions.tick_interval_ms = v;
    }
    if let Some(v) = env.usize("LECTERN_OUTBOUND_CAPACITY", 1, 65_536) {
        settings.sessions.outbound_capacity = v;
    }
    if let Some(v) = env.usize("LECTERN_INBOUND_CAPACITY", 1, 65_536) {
        settings.sessions.inbound_capacity = v;
    }

    // ── Auth ────────────────────────────────────────────────────────
    if let Some(v) = env.bool("LECTERN_REQUIRE_AUTH_FOR_NEW") {
        settings.auth.require_auth_for_new = v;
    }
    if let Some(v) = env.bool("LECTERN_LOG_FAILED_LOGIN") {
        settings.auth.log_failed_login = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("LECTERN_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("LECTERN_LOG_JSON") {
        settings.logging.json = v;
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

// ── Variable readers (thin wrappers) ────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn raw(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
    }

    fn string(&self, name: &str) -> Option<String> {
        self.raw(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = self.raw(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        let val = self.raw(name)?;
        let result = parse_u16_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = self.raw(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        let val = self.raw(name)?;
        let result = parse_usize_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
