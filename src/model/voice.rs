//! Voice gateway payload envelope and bodies.

use crate::id::{GuildId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope shared by every frame on the voice gateway.
#[derive(Debug, Deserialize)]
pub struct VoicePayload {
    /// Opcode of the frame.
    pub op: u8,
    /// Opcode-specific payload; left opaque until the opcode is known.
    #[serde(default)]
    pub d: Value,
}

/// Voice `HELLO` body.
///
/// Unlike the main gateway, the voice gateway reports its heartbeat
/// interval as a float.
#[derive(Debug, Deserialize)]
pub struct Hello {
    /// How often (in milliseconds) the client must heartbeat.
    pub heartbeat_interval: f64,
}

/// Voice `IDENTIFY` body.
#[derive(Debug, Serialize)]
pub struct Identify {
    /// Guild whose voice server is being joined.
    pub server_id: GuildId,
    /// The bot's voice session ID, taken from its gateway voice state.
    pub session_id: String,
    /// The bot's user ID.
    pub user_id: UserId,
    /// Ephemeral voice token from `VOICE_SERVER_UPDATE`.
    pub token: String,
}

/// Voice `RESUME` body.
#[derive(Debug, Serialize)]
pub struct Resume {
    /// Guild whose voice server is being rejoined.
    pub server_id: GuildId,
    /// The bot's voice session ID.
    pub session_id: String,
    /// Ephemeral voice token from `VOICE_SERVER_UPDATE`.
    pub token: String,
}

/// Voice `READY` body.
#[derive(Debug, Deserialize)]
pub struct Ready {
    /// RTP synchronization source assigned to this session.
    pub ssrc: u32,
    /// UDP endpoint address.
    pub ip: String,
    /// UDP endpoint port.
    pub port: u16,
    /// Encryption modes offered by the server.
    #[serde(default)]
    pub modes: Vec<String>,
}

/// Voice `SESSION_DESCRIPTION` body.
#[derive(Debug, Deserialize)]
pub struct SessionDescription {
    /// Negotiated encryption mode.
    #[serde(default)]
    pub mode: String,
    /// 32-byte secretbox key.
    pub secret_key: Vec<u8>,
}

/// Voice `SELECT_PROTOCOL` body.
#[derive(Debug, Serialize)]
pub struct SelectProtocol {
    /// Transport protocol; always `"udp"` here.
    pub protocol: &'static str,
    /// Externally visible transport parameters.
    pub data: ProtocolData,
}

/// Transport parameters discovered via IP discovery.
#[derive(Debug, Serialize)]
pub struct ProtocolData {
    /// The bot's external IP address as echoed by the voice server.
    pub address: String,
    /// The bot's external UDP port.
    pub port: u16,
    /// Requested encryption mode.
    pub mode: &'static str,
}

/// Voice `SPEAKING` body.
#[derive(Debug, Serialize)]
pub struct Speaking {
    /// Speaking flags: microphone + voice activity, or zero for silence.
    pub speaking: u8,
    /// Opus frame delay; Discord expects zero from bots.
    pub delay: u8,
    /// RTP synchronization source of this session.
    pub ssrc: u32,
}

impl Speaking {
    /// Microphone + priority flags used while frames are flowing.
    pub const ACTIVE: u8 = 5;
    /// Flag value announcing the end of transmission.
    pub const INACTIVE: u8 = 0;

    /// Builds a speaking notification for the given state.
    pub fn new(speaking: bool, ssrc: u32) -> Self {
        Self {
            speaking: if speaking { Self::ACTIVE } else { Self::INACTIVE },
            delay: 0,
            ssrc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{payload::Command, VoiceOpcode};

    #[test]
    fn hello_and_ready_parse() {
        let hello: Hello =
            serde_json::from_str(r#"{"heartbeat_interval":41250.0,"v":4}"#).unwrap();
        assert!((hello.heartbeat_interval - 41250.0).abs() < f64::EPSILON);

        let ready: Ready = serde_json::from_str(
            r#"{"ssrc":1234,"ip":"1.2.3.4","port":50000,"modes":["xsalsa20_poly1305"]}"#,
        )
        .unwrap();
        assert_eq!(ready.ssrc, 1234);
        assert_eq!(ready.ip, "1.2.3.4");
        assert_eq!(ready.port, 50000);
    }

    #[test]
    fn select_protocol_wire_shape() {
        let cmd = Command::voice(
            VoiceOpcode::SelectProtocol,
            SelectProtocol {
                protocol: "udp",
                data: ProtocolData {
                    address: "5.6.7.8".into(),
                    port: 5000,
                    mode: "xsalsa20_poly1305",
                },
            },
        );
        let value = serde_json::to_value(&cmd).unwrap();

        assert_eq!(value["op"], 1);
        assert_eq!(value["d"]["protocol"], "udp");
        assert_eq!(value["d"]["data"]["address"], "5.6.7.8");
        assert_eq!(value["d"]["data"]["port"], 5000);
        assert_eq!(value["d"]["data"]["mode"], "xsalsa20_poly1305");
    }

    #[test]
    fn speaking_flag_values() {
        assert_eq!(Speaking::new(true, 1).speaking, 5);
        assert_eq!(Speaking::new(false, 1).speaking, 0);
    }
}
