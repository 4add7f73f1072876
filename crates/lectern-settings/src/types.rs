//! Settings types with compiled defaults.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LecternSettings {
    /// Network and HTTP surface.
    pub server: ServerSettings,
    /// Session hub and reaper tuning.
    pub sessions: SessionSettings,
    /// Session-creation authentication.
    pub auth: AuthSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl LecternSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let s = &self.sessions;
        let positive = [
            ("sessions.reaperIntervalSecs", s.reaper_interval_secs),
            ("sessions.tickIntervalMs", s.tick_interval_ms),
            ("sessions.inboundTimeoutMs", s.inbound_timeout_ms),
            ("server.pingIntervalSecs", self.server.ping_interval_secs),
            ("server.pongTimeoutSecs", self.server.pong_timeout_secs),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(SettingsError::InvalidValue(format!("{name} must be > 0")));
            }
        }
        let capacities = [
            ("sessions.outboundCapacity", s.outbound_capacity),
            ("sessions.inboundCapacity", s.inbound_capacity),
            ("sessions.elementQueueCapacity", s.element_queue_capacity),
        ];
        for (name, value) in capacities {
            if value == 0 {
                return Err(SettingsError::InvalidValue(format!("{name} must be > 0")));
            }
        }
        Ok(())
    }

    /// Apply path normalization in place.
    ///
    /// `serverPath` gains a leading `/` and loses any trailing `/`;
    /// `serverName` loses any trailing `/`.
    pub fn normalize(&mut self) {
        let path = self.server.server_path.trim_end_matches('/');
        self.server.server_path = if path.is_empty() || path.starts_with('/') {
            path.to_string()
        } else {
            tracing::info!(
                server_path = %path,
                "serverPath does not start with '/', adding it as a prefix"
            );
            format!("/{path}")
        };
        self.server.server_name = self.server.server_name.trim_end_matches('/').to_string();
    }
}

/// Network and HTTP settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` for auto-assign).
    pub port: u16,
    /// Path prefix the server is mounted under (e.g. `/live`).
    pub server_path: String,
    /// Public base URL used when presenting a session's link.
    pub server_name: String,
    /// Interval between server-initiated WebSocket pings.
    pub ping_interval_secs: u64,
    /// Close a connection that has not answered a ping for this long.
    pub pong_timeout_secs: u64,
    /// Maximum accepted WebSocket message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            server_path: String::new(),
            server_name: "http://localhost:8080".to_string(),
            ping_interval_secs: 30,
            pong_timeout_secs: 60,
            max_message_size: 1024 * 1024,
        }
    }
}

impl ServerSettings {
    /// `ping_interval_secs` as a [`Duration`].
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// `pong_timeout_secs` as a [`Duration`].
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }
}

/// Session hub, queue, and reaper tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Seconds between idle-session sweeps.
    pub reaper_interval_secs: u64,
    /// Period of the hub tick that republishes the connected count.
    pub tick_interval_ms: u64,
    /// Capacity of each connection's outbound queue.
    pub outbound_capacity: usize,
    /// Capacity of each hub's inbound queue.
    pub inbound_capacity: usize,
    /// Capacity of each element channel.
    pub element_queue_capacity: usize,
    /// How long a reader waits to hand a frame to its hub before dropping it.
    pub inbound_timeout_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            reaper_interval_secs: 600,
            tick_interval_ms: 1000,
            outbound_capacity: 64,
            inbound_capacity: 64,
            element_queue_capacity: 10,
            inbound_timeout_ms: 1000,
        }
    }
}

impl SessionSettings {
    /// `reaper_interval_secs` as a [`Duration`].
    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }

    /// `tick_interval_ms` as a [`Duration`].
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// `inbound_timeout_ms` as a [`Duration`].
    pub fn inbound_timeout(&self) -> Duration {
        Duration::from_millis(self.inbound_timeout_ms)
    }
}

/// Session-creation authentication settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Require a username/password before a new session key is created.
    pub require_auth_for_new: bool,
    /// Log failed attempts with the caller's best-effort real address.
    pub log_failed_login: bool,
    /// Username → password table for the built-in authenticator.
    pub credentials: BTreeMap<String, String>,
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit one JSON object per line instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_uses_camel_case() {
        let json = serde_json::to_value(LecternSettings::default()).unwrap();
        assert!(json["server"]["serverPath"].is_string());
        assert!(json["sessions"]["reaperIntervalSecs"].is_number());
        assert!(json["auth"]["requireAuthForNew"].is_boolean());
    }

    #[test]
    fn durations_follow_fields() {
        let s = SessionSettings::default();
        assert_eq!(s.reaper_interval(), Duration::from_secs(600));
        assert_eq!(s.tick_interval(), Duration::from_secs(1));
        assert_eq!(s.inbound_timeout(), Duration::from_secs(1));
        let srv = ServerSettings::default();
        assert_eq!(srv.ping_interval(), Duration::from_secs(30));
        assert_eq!(srv.pong_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn zero_capacity_rejected() {
        let mut settings = LecternSettings::default();
        settings.sessions.outbound_capacity = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("outboundCapacity"));
    }

    #[test]
    fn zero_interval_rejected() {
        let mut settings = LecternSettings::default();
        settings.sessions.tick_interval_ms = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn normalize_adds_leading_slash() {
        let mut settings = LecternSettings::default();
        settings.server.server_path = "live/".into();
        settings.normalize();
        assert_eq!(settings.server.server_path, "/live");
    }

    #[test]
    fn normalize_keeps_empty_path_and_trims_name() {
        let mut settings = LecternSettings::default();
        settings.server.server_path = "/".into();
        settings.server.server_name = "https://example.org/".into();
        settings.normalize();
        assert_eq!(settings.server.server_path, "");
        assert_eq!(settings.server.server_name, "https://example.org");
    }
}
