//! Constants affecting gateway behaviour and audio framing.

use audiopus::SampleRate;
use discortp::rtp::RtpType;
use std::time::Duration;

/// The main gateway version spoken by the library.
pub const GATEWAY_VERSION: u8 = 6;

/// The voice gateway version spoken by the library.
pub const VOICE_GATEWAY_VERSION: u8 = 4;

/// Base URL for Discord's HTTP API.
pub const API_BASE_URL: &str = "https://discordapp.com/api";

/// Sample rate of audio to be sent to Discord.
pub const SAMPLE_RATE: SampleRate = SampleRate::Hz48000;

/// Sample rate of audio to be sent to Discord.
pub const SAMPLE_RATE_RAW: usize = 48_000;

/// Number of interleaved audio channels sent to Discord.
pub const CHANNEL_COUNT: usize = 2;

/// Number of audio frames/packets to be sent per second.
pub const AUDIO_FRAME_RATE: usize = 50;

/// Length (in milliseconds) of any audio frame.
pub const FRAME_LEN_MS: usize = 1000 / AUDIO_FRAME_RATE;

/// Length of time between any two audio frames.
pub const TIMESTEP_LENGTH: Duration = Duration::from_millis(1000 / AUDIO_FRAME_RATE as u64);

/// Number of samples in one complete frame of audio per channel.
pub const MONO_FRAME_SIZE: usize = SAMPLE_RATE_RAW / AUDIO_FRAME_RATE;

/// Number of individual samples in one complete frame of stereo audio.
pub const STEREO_FRAME_SIZE: usize = CHANNEL_COUNT * MONO_FRAME_SIZE;

/// Upper bound on the encoded size of a single Opus frame.
///
/// 20 ms of 48 kHz audio at voice bitrates stays well below this.
pub const OPUS_BUFFER_SIZE: usize = STEREO_FRAME_SIZE;

/// Maximum packet size for a voice packet.
///
/// Set a safe amount below the Ethernet MTU to avoid fragmentation/rejection.
pub const VOICE_PACKET_MAX: usize = 1460;

/// Delay between sends of UDP keepalive frames.
///
/// Passive monitoring of Discord itself shows that these fire every 5 seconds
/// irrespective of outgoing UDP traffic.
pub const UDP_KEEPALIVE_GAP: Duration = Duration::from_millis(5_000);

/// The one (and only) RTP version.
pub const RTP_VERSION: u8 = 2;

/// Profile type used by Discord's Opus audio traffic.
pub const RTP_PROFILE_TYPE: RtpType = RtpType::Dynamic(120);

/// Grace period between announcing speech and the first audio frame.
pub const SPEAKING_LEAD_IN: Duration = Duration::from_millis(100);

/// How long the playback task dozes between pause-flag checks.
pub const PAUSE_POLL: Duration = Duration::from_millis(100);

/// Delay applied before reopening a dropped gateway connection.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(1_000);

/// Gateway intent bits requested at identify time.
pub mod intents {
    /// Guild create/update/delete and channel events.
    pub const GUILDS: u64 = 1;
    /// Voice state updates within guilds.
    pub const GUILD_VOICE_STATES: u64 = 1 << 7;
    /// Messages sent in guild channels.
    pub const GUILD_MESSAGES: u64 = 1 << 9;
    /// Messages sent in DMs.
    pub const DIRECT_MESSAGES: u64 = 1 << 12;

    /// Everything the library needs to drive its cache and voice sessions.
    pub const DEFAULT: u64 = GUILDS | GUILD_VOICE_STATES | GUILD_MESSAGES | DIRECT_MESSAGES;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_arithmetic() {
        assert_eq!(MONO_FRAME_SIZE, 960);
        assert_eq!(STEREO_FRAME_SIZE, 1920);
        assert_eq!(FRAME_LEN_MS, 20);
    }

    #[test]
    fn default_intent_mask() {
        assert_eq!(intents::DEFAULT, 0x1281);
    }
}
