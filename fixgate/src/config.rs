//! Config loading (§6 "Configuration (enumerated options)"). Listed as
//! an external collaborator in scope terms, but still gets a real
//! loader in the ambient stack's own idiom: `serde` + `toml`, the
//! format the rest of the pack reaches for.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use fixgate_core::{FixString, NodeId};
use fixgate_session::{Role, SessionSettings};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct GatewayConfig {
    pub node_id: NodeId,
    #[serde(default)]
    pub peer_ids: Vec<NodeId>,
    pub sessions: Vec<SessionConfig>,
}

impl GatewayConfig {
    pub fn load(path: &Path) -> anyhow::Result<GatewayConfig> {
        let text = fs::read_to_string(path)?;
        let config: GatewayConfig = toml::from_str(&text)?;
        config.validate().context("validating gateway config")?;
        Ok(config)
    }

    /// §6: a cluster node needs at least one peer to reach quorum.
    pub fn is_clustered(&self) -> bool {
        !self.peer_ids.is_empty()
    }

    /// §6: `log_inbound_messages`/`log_outbound_messages` must both be
    /// `true` whenever the gateway is clustered, so every committed
    /// replicated entry has a durable record of the bytes it carries.
    fn validate(&self) -> anyhow::Result<()> {
        if !self.is_clustered() {
            return Ok(());
        }
        for session in &self.sessions {
            if !session.log_inbound_messages || !session.log_outbound_messages {
                bail!(
                    "session {}/{} must set log_inbound_messages and log_outbound_messages to true while clustered",
                    session.sender_comp_id,
                    session.target_comp_id,
                );
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    Initiator,
    Acceptor,
}

impl SessionRole {
    pub fn to_session_role(self) -> Role {
        match self {
            SessionRole::Initiator => Role::Initiator,
            SessionRole::Acceptor => Role::Acceptor,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    pub role: SessionRole,
    pub begin_string: String,
    pub sender_comp_id: String,
    pub target_comp_id: String,
    /// `host:port` to dial, initiator-only.
    pub connect: Option<String>,
    /// `host:port` to bind, acceptor-only.
    pub listen: Option<String>,
    #[serde(default = "default_heartbeat_interval_seconds")]
    pub heartbeat_interval_seconds: u64,
    #[serde(default = "default_sending_time_window_ms")]
    pub sending_time_window_ms: u64,
    #[serde(default = "default_true")]
    pub check_comp_id: bool,
    #[serde(default = "default_true")]
    pub check_latency: bool,
    #[serde(default)]
    pub reset_on_logon: bool,
    #[serde(default)]
    pub reset_on_logout: bool,
    #[serde(default)]
    pub reset_on_disconnect: bool,
    #[serde(default = "default_true")]
    pub persist: bool,
    #[serde(default = "default_true")]
    pub log_inbound_messages: bool,
    #[serde(default = "default_true")]
    pub log_outbound_messages: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

fn default_heartbeat_interval_seconds() -> u64 {
    30
}

fn default_sending_time_window_ms() -> u64 {
    120_000
}

fn default_true() -> bool {
    true
}

impl SessionConfig {
    pub fn to_session_settings(&self) -> SessionSettings {
        let fix_string = |s: &str| FixString::from_ascii(s.as_bytes().to_vec()).expect("config value is ASCII");
        SessionSettings {
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_seconds),
            sending_time_window: Duration::from_millis(self.sending_time_window_ms),
            logon_timeout: Duration::from_secs(self.heartbeat_interval_seconds),
            logout_timeout: Duration::from_secs(10),
            check_comp_id: self.check_comp_id,
            check_latency: self.check_latency,
            reset_on_logon: self.reset_on_logon,
            reset_on_logout: self.reset_on_logout,
            reset_on_disconnect: self.reset_on_disconnect,
            persist: self.persist,
            log_inbound_messages: self.log_inbound_messages,
            log_outbound_messages: self.log_outbound_messages,
            username: self.username.as_deref().map(fix_string),
            password: self.password.as_deref().map(fix_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_acceptor_config() {
        let toml = r#"
            node_id = 1
            peer_ids = [2, 3]

            [[sessions]]
            role = "acceptor"
            begin_string = "FIX.4.4"
            sender_comp_id = "GATEWAY"
            target_comp_id = "CLIENT1"
            listen = "127.0.0.1:9000"
        "#;
        let config: GatewayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.node_id, 1);
        assert!(config.is_clustered());
        assert_eq!(config.sessions.len(), 1);
        assert_eq!(config.sessions[0].heartbeat_interval_seconds, 30);
        assert_eq!(config.sessions[0].role, SessionRole::Acceptor);
        assert!(config.sessions[0].log_inbound_messages);
        assert!(config.sessions[0].log_outbound_messages);
    }

    fn solo_config(log_inbound: bool, log_outbound: bool) -> GatewayConfig {
        GatewayConfig {
            node_id: 1,
            peer_ids: Vec::new(),
            sessions: vec![SessionConfig {
                role: SessionRole::Acceptor,
                begin_string: "FIX.4.4".to_string(),
                sender_comp_id: "GATEWAY".to_string(),
                target_comp_id: "CLIENT1".to_string(),
                connect: None,
                listen: Some("127.0.0.1:9000".to_string()),
                heartbeat_interval_seconds: default_heartbeat_interval_seconds(),
                sending_time_window_ms: default_sending_time_window_ms(),
                check_comp_id: true,
                check_latency: true,
                reset_on_logon: false,
                reset_on_logout: false,
                reset_on_disconnect: false,
                persist: true,
                log_inbound_messages: log_inbound,
                log_outbound_messages: log_outbound,
                username: None,
                password: None,
            }],
        }
    }

    #[test]
    fn solo_gateway_may_disable_message_logging() {
        let config = solo_config(false, false);
        assert!(!config.is_clustered());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn clustered_gateway_rejects_disabled_message_logging() {
        let mut config = solo_config(false, true);
        config.peer_ids = vec![2, 3];
        assert!(config.is_clustered());
        assert!(config.validate().is_err());
    }

    #[test]
    fn clustered_gateway_accepts_logging_enabled() {
        let mut config = solo_config(true, true);
        config.peer_ids = vec![2, 3];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn to_session_settings_threads_logging_flags() {
        let settings = solo_config(false, true).sessions[0].to_session_settings();
        assert!(!settings.log_inbound_messages);
        assert!(settings.log_outbound_messages);
    }
}
