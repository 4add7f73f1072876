//! Server configuration.

use std::time::Duration;

use lectern_settings::LecternSettings;

/// Per-hub queue sizes and timings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HubConfig {
    /// Period of the connected-count tick.
    pub tick_interval: Duration,
    /// Capacity of the hub's inbound queue.
    pub inbound_capacity: usize,
    /// How long a reader waits to enqueue a frame before dropping it.
    pub inbound_timeout: Duration,
    /// Capacity of each connection's outbound queue.
    pub outbound_capacity: usize,
    /// Capacity of each element channel.
    pub element_queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            inbound_capacity: 64,
            inbound_timeout: Duration::from_secs(1),
            outbound_capacity: 64,
            element_queue_capacity: 10,
        }
    }
}

/// Configuration for the Lectern server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Mount prefix, either empty or starting with `/` without a trailing `/`.
    pub server_path: String,
    /// Public base URL shown to admins, without a trailing `/`.
    pub server_name: String,
    /// Interval between server-initiated Ping frames.
    pub ping_interval: Duration,
    /// Disconnect a client that has not answered for this long.
    pub pong_timeout: Duration,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Interval between idle-session sweeps.
    pub reaper_interval: Duration,
    /// Log rejected logins with the caller's address.
    pub log_failed_login: bool,
    /// Hub tuning.
    pub hub: HubConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            server_path: String::new(),
            server_name: "http://localhost".into(),
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(60),
            max_message_size: 1024 * 1024,
            reaper_interval: Duration::from_secs(600),
            log_failed_login: false,
            hub: HubConfig::default(),
        }
    }
}

impl From<&LecternSettings> for ServerConfig {
    fn from(settings: &LecternSettings) -> Self {
        let server = &settings.server;
        let sessions = &settings.sessions;
        Self {
            host: server.host.clone(),
            port: server.port,
            server_path: server.server_path.clone(),
            server_name: server.server_name.clone(),
            ping_interval: server.ping_interval(),
            pong_timeout: server.pong_timeout(),
            max_message_size: server.max_message_size,
            reaper_interval: sessions.reaper_interval(),
            log_failed_login: settings.auth.log_failed_login,
            hub: HubConfig {
                tick_interval: sessions.tick_interval(),
                inbound_capacity: sessions.inbound_capacity,
                inbound_timeout: sessions.inbound_timeout(),
                outbound_capacity: sessions.outbound_capacity,
                element_queue_capacity: sessions.element_queue_capacity,
            },
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Public URL of a session.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.server_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_on_random_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:0");
    }

    #[test]
    fn from_settings_copies_every_section() {
        let mut settings = LecternSettings::default();
        settings.server.port = 9000;
        settings.server.server_path = "/live".into();
        settings.sessions.tick_interval_ms = 250;
        settings.sessions.outbound_capacity = 8;
        settings.auth.log_failed_login = true;

        let cfg = ServerConfig::from(&settings);
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.server_path, "/live");
        assert_eq!(cfg.hub.tick_interval, Duration::from_millis(250));
        assert_eq!(cfg.hub.outbound_capacity, 8);
        assert_eq!(cfg.hub.element_queue_capacity, 10);
        assert_eq!(cfg.reaper_interval, Duration::from_secs(600));
        assert!(cfg.log_failed_login);
    }

    #[test]
    fn public_url_joins_name_and_key() {
        let cfg = ServerConfig {
            server_name: "https://live.example.org".into(),
            ..ServerConfig::default()
        };
        assert_eq!(cfg.public_url("lecture-1"), "https://live.example.org/lecture-1");
    }
}
