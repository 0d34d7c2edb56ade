//! Wire-format types for Discord's main and voice gateways.
//!
//! Everything here mirrors the JSON Discord actually sends; the richer,
//! cross-referenced runtime entities live in [`crate::cache`].

pub mod entity;
pub mod opcode;
pub mod payload;
pub mod voice;

pub use self::{
    opcode::{GatewayOpcode, VoiceOpcode},
    payload::GatewayPayload,
    voice::VoicePayload,
};
