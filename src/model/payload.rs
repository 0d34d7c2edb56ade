//! Main gateway payload envelope and command bodies.

use crate::{
    constants::intents,
    id::{ChannelId, GuildId},
    model::{entity::UserData, GatewayOpcode},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope shared by every frame on the main gateway.
#[derive(Debug, Deserialize)]
pub struct GatewayPayload {
    /// Opcode of the frame.
    pub op: u8,
    /// Opcode-specific payload; left opaque until the opcode is known.
    #[serde(default)]
    pub d: Value,
    /// Sequence number, present on dispatch frames only.
    #[serde(default)]
    pub s: Option<u64>,
    /// Event name, present on dispatch frames only.
    #[serde(default)]
    pub t: Option<String>,
}

/// Envelope for commands sent towards the gateway.
#[derive(Debug, Serialize)]
pub struct Command<T> {
    op: u8,
    d: T,
}

impl<T: Serialize> Command<T> {
    /// Wraps a command body under the given main-gateway opcode.
    pub fn gateway(op: GatewayOpcode, d: T) -> Self {
        Self { op: op.into(), d }
    }

    /// Wraps a command body under the given voice-gateway opcode.
    pub fn voice(op: crate::model::VoiceOpcode, d: T) -> Self {
        Self { op: op.into(), d }
    }
}

/// `HELLO` payload body.
#[derive(Debug, Deserialize)]
pub struct Hello {
    /// How often (in milliseconds) the client must heartbeat.
    pub heartbeat_interval: u64,
}

/// `READY` dispatch body; the embedded user is the bot's own identity.
#[derive(Debug, Deserialize)]
pub struct Ready {
    /// Session ID used for resuming.
    pub session_id: String,
    /// The account the token authenticated as.
    pub user: UserData,
}

/// Client properties reported at identify time.
#[derive(Debug, Serialize)]
pub struct ConnectionProperties {
    #[serde(rename = "$os")]
    os: &'static str,
    #[serde(rename = "$browser")]
    browser: &'static str,
    #[serde(rename = "$device")]
    device: &'static str,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: "linux",
            browser: "linux",
            device: "linux",
        }
    }
}

/// `IDENTIFY` command body.
#[derive(Debug, Serialize)]
pub struct Identify {
    /// Bot token.
    pub token: String,
    /// Reported client properties.
    pub properties: ConnectionProperties,
    /// Intent bitmask limiting which events the gateway will send.
    pub intents: u64,
}

impl Identify {
    /// Builds an identify request with the library's default intents.
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_owned(),
            properties: ConnectionProperties::default(),
            intents: intents::DEFAULT,
        }
    }
}

/// `RESUME` command body.
#[derive(Debug, Serialize)]
pub struct Resume {
    /// Bot token.
    pub token: String,
    /// Session ID captured from `READY`.
    pub session_id: String,
    /// Last dispatch sequence number seen before the drop.
    pub seq: Option<u64>,
}

/// `VOICE_STATE_UPDATE` command body, used to join and leave voice channels.
#[derive(Debug, Serialize)]
pub struct UpdateVoiceState {
    /// Guild whose voice state is changing.
    pub guild_id: GuildId,
    /// Channel to move into; `None` disconnects.
    pub channel_id: Option<ChannelId>,
    /// Whether the bot mutes itself.
    pub self_mute: bool,
    /// Whether the bot deafens itself.
    pub self_deaf: bool,
}

impl UpdateVoiceState {
    /// Connects to (or moves within) a guild's voice channel.
    pub fn join(guild_id: GuildId, channel_id: ChannelId) -> Self {
        Self {
            guild_id,
            channel_id: Some(channel_id),
            self_mute: false,
            self_deaf: false,
        }
    }

    /// Disconnects from voice in the given guild.
    pub fn leave(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            channel_id: None,
            self_mute: false,
            self_deaf: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_records_sequence_and_event_name() {
        let raw = r#"{"op":0,"s":42,"t":"MESSAGE_CREATE","d":{"id":"1"}}"#;
        let payload: GatewayPayload = serde_json::from_str(raw).unwrap();

        assert_eq!(payload.op, 0);
        assert_eq!(payload.s, Some(42));
        assert_eq!(payload.t.as_deref(), Some("MESSAGE_CREATE"));
    }

    #[test]
    fn envelope_tolerates_bare_frames() {
        let payload: GatewayPayload = serde_json::from_str(r#"{"op":11}"#).unwrap();

        assert_eq!(payload.op, 11);
        assert!(payload.s.is_none());
        assert!(payload.t.is_none());
        assert!(payload.d.is_null());
    }

    #[test]
    fn identify_reports_linux_and_default_intents() {
        let cmd = Command::gateway(GatewayOpcode::Identify, Identify::new("token"));
        let value = serde_json::to_value(&cmd).unwrap();

        assert_eq!(value["op"], 2);
        assert_eq!(value["d"]["intents"], 0x1281);
        assert_eq!(value["d"]["properties"]["$os"], "linux");
        assert_eq!(value["d"]["properties"]["$browser"], "linux");
        assert_eq!(value["d"]["properties"]["$device"], "linux");
    }

    #[test]
    fn leaving_voice_sends_a_null_channel() {
        let cmd = Command::gateway(
            GatewayOpcode::VoiceStateUpdate,
            UpdateVoiceState::leave(GuildId::from("41771983423143937")),
        );
        let value = serde_json::to_value(&cmd).unwrap();

        assert_eq!(value["op"], 4);
        assert_eq!(value["d"]["guild_id"], "41771983423143937");
        assert_eq!(value["d"]["channel_id"], json!(null));
        assert_eq!(value["d"]["self_mute"], false);
        assert_eq!(value["d"]["self_deaf"], false);
    }
}
