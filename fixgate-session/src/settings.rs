use std::time::Duration;

use fixgate_core::FixString;

#[cfg(feature = "serde-serialize")]
use serde::Deserialize;

fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_sending_time_window() -> Duration {
    Duration::from_millis(120_000)
}

/// Per-session configuration (§6, "Configuration (enumerated options)").
/// One `SessionSettings` per `(sender, target)` pair the gateway is
/// willing to terminate, shared by its initiator and acceptor role.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Deserialize))]
pub struct SessionSettings {
    /// `heartbeat_interval_seconds`, default 30.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_heartbeat_interval"))]
    pub heartbeat_interval: Duration,
    /// `sending_time_window_ms`, default 120000.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_sending_time_window"))]
    pub sending_time_window: Duration,
    /// How long to wait for the peer's Logon before disconnecting an
    /// acceptor that is still `CONNECTED`.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_heartbeat_interval"))]
    pub logon_timeout: Duration,
    /// How long to wait for the peer's Logout after `start_logout()`.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_logout_timeout"))]
    pub logout_timeout: Duration,
    /// Reject comp-id mismatches instead of silently accepting them.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_true"))]
    pub check_comp_id: bool,
    /// Enforce the sending-time window (anti-replay).
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_true"))]
    pub check_latency: bool,
    pub reset_on_logon: bool,
    pub reset_on_logout: bool,
    pub reset_on_disconnect: bool,
    /// Persist sent bytes so a `ResendRequest` can be answered after a
    /// reconnect, not only within the lifetime of one TCP connection.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_true"))]
    pub persist: bool,
    /// `log_inbound_messages` / `log_outbound_messages`; §6 requires
    /// both true whenever the gateway is clustered.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_true"))]
    pub log_inbound_messages: bool,
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_true"))]
    pub log_outbound_messages: bool,
    /// Username/password fields offered on our own Logon, if any.
    pub username: Option<FixString>,
    pub password: Option<FixString>,
}

fn default_logout_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_true() -> bool {
    true
}

impl Default for SessionSettings {
    fn default() -> SessionSettings {
        SessionSettings {
            heartbeat_interval: default_heartbeat_interval(),
            sending_time_window: default_sending_time_window(),
            logon_timeout: default_heartbeat_interval(),
            logout_timeout: default_logout_timeout(),
            check_comp_id: true,
            check_latency: true,
            reset_on_logon: false,
            reset_on_logout: false,
            reset_on_disconnect: false,
            persist: true,
            log_inbound_messages: true,
            log_outbound_messages: true,
            username: None,
            password: None,
        }
    }
}

impl SessionSettings {
    /// `1.2x` the heartbeat interval, the grace period past which a
    /// missing inbound message triggers a `TestRequest` (§4.1).
    pub fn test_request_grace_period(&self) -> Duration {
        self.heartbeat_interval.mul_f64(1.2)
    }
}
