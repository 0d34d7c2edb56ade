//! Opcode enums for both gateway dialects.

/// Main gateway opcodes handled or sent by the library.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
#[repr(u8)]
pub enum GatewayOpcode {
    /// An event was dispatched.
    Dispatch = 0,
    /// Fired periodically by the client to keep the connection alive.
    Heartbeat = 1,
    /// Starts a new session during the initial handshake.
    Identify = 2,
    /// Joins, moves within, or leaves voice channels.
    VoiceStateUpdate = 4,
    /// Resumes a previous session that was disconnected.
    Resume = 6,
    /// Request to reconnect and resume immediately.
    Reconnect = 7,
    /// The session has been invalidated.
    InvalidSession = 9,
    /// Received immediately after connecting, contains the `heartbeat_interval`.
    Hello = 10,
    /// Received in response to a heartbeat.
    HeartbeatAck = 11,
}

impl GatewayOpcode {
    /// Tries to match an integer value to an opcode.
    ///
    /// Returns [`None`] if no match is found.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Dispatch),
            1 => Some(Self::Heartbeat),
            2 => Some(Self::Identify),
            4 => Some(Self::VoiceStateUpdate),
            6 => Some(Self::Resume),
            7 => Some(Self::Reconnect),
            9 => Some(Self::InvalidSession),
            10 => Some(Self::Hello),
            11 => Some(Self::HeartbeatAck),
            _ => None,
        }
    }
}

impl From<GatewayOpcode> for u8 {
    fn from(val: GatewayOpcode) -> Self {
        val as u8
    }
}

/// Voice gateway opcodes handled or sent by the library.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
#[repr(u8)]
pub enum VoiceOpcode {
    /// Starts a voice websocket connection.
    Identify = 0,
    /// Selects the voice protocol and encryption mode.
    SelectProtocol = 1,
    /// Completion of the websocket handshake; carries SSRC and UDP endpoint.
    Ready = 2,
    /// Fired periodically to keep the connection alive.
    Heartbeat = 3,
    /// Carries the session's encryption key.
    SessionDescription = 4,
    /// Sent and received to indicate speaking status.
    Speaking = 5,
    /// Received in response to a heartbeat.
    HeartbeatAck = 6,
    /// Resumes a previously disconnected session.
    Resume = 7,
    /// Received after connecting, contains the `heartbeat_interval`.
    Hello = 8,
    /// Received to indicate a successful resume.
    Resumed = 9,
}

impl VoiceOpcode {
    /// Tries to match an integer value to an opcode.
    ///
    /// Returns [`None`] if no match is found.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Identify),
            1 => Some(Self::SelectProtocol),
            2 => Some(Self::Ready),
            3 => Some(Self::Heartbeat),
            4 => Some(Self::SessionDescription),
            5 => Some(Self::Speaking),
            6 => Some(Self::HeartbeatAck),
            7 => Some(Self::Resume),
            8 => Some(Self::Hello),
            9 => Some(Self::Resumed),
            _ => None,
        }
    }
}

impl From<VoiceOpcode> for u8 {
    fn from(val: VoiceOpcode) -> Self {
        val as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_codes_survive_conversion() {
        for op in [
            GatewayOpcode::Dispatch,
            GatewayOpcode::Heartbeat,
            GatewayOpcode::Identify,
            GatewayOpcode::VoiceStateUpdate,
            GatewayOpcode::Resume,
            GatewayOpcode::InvalidSession,
            GatewayOpcode::Hello,
            GatewayOpcode::HeartbeatAck,
        ] {
            assert_eq!(GatewayOpcode::from_u8(op.into()), Some(op));
        }
        assert_eq!(GatewayOpcode::from_u8(3), None);
    }

    #[test]
    fn voice_codes_survive_conversion() {
        for op in [
            VoiceOpcode::Identify,
            VoiceOpcode::SelectProtocol,
            VoiceOpcode::Ready,
            VoiceOpcode::Heartbeat,
            VoiceOpcode::SessionDescription,
            VoiceOpcode::Speaking,
            VoiceOpcode::HeartbeatAck,
            VoiceOpcode::Resume,
            VoiceOpcode::Hello,
            VoiceOpcode::Resumed,
        ] {
            assert_eq!(VoiceOpcode::from_u8(op.into()), Some(op));
        }
        assert_eq!(VoiceOpcode::from_u8(12), None);
    }
}
