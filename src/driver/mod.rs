//! Per-guild voice connections and the audio pipeline behind them.
//!
//! A [`VoiceSession`] is created by the gateway when Discord assigns a
//! voice server, and lives until the bot leaves the channel, the guild
//! disappears, or the session handle is dropped.

mod connection;
pub(crate) mod crypto;
pub mod error;
mod playback;
mod task;

use crate::{
    id::{GuildId, UserId},
    input::AudioSource,
};
use flume::Sender;
use std::fmt;
use tokio::spawn;

/// Parameters needed to open one guild's voice gateway.
#[derive(Clone)]
pub(crate) struct ConnectionInfo {
    /// Voice server host, as handed out by `VOICE_SERVER_UPDATE`.
    pub endpoint: String,
    /// Guild this connection belongs to.
    pub guild_id: GuildId,
    /// The bot's voice session ID from its gateway voice state.
    pub session_id: String,
    /// Ephemeral voice token; not the bot token.
    pub token: String,
    /// The bot's user ID.
    pub user_id: UserId,
}

impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("endpoint", &self.endpoint)
            .field("guild_id", &self.guild_id)
            .field("session_id", &self.session_id)
            .field("token", &"<secret>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Control messages accepted by a session task.
pub(crate) enum VoiceControl {
    /// Attach (or replace) the audio source and start streaming.
    Speak(Box<dyn AudioSource>),
    /// Suspend frame transmission, keeping the source.
    Pause,
    /// Resume a paused stream.
    Resume,
    /// Drop the source and stop streaming.
    Stop,
    /// Orderly session teardown.
    Quit,
}

/// Notifications surfaced from voice sessions back to the gateway task.
pub(crate) enum DriverEvent {
    /// The audio pipeline for a guild wound down.
    SpeakFinished(GuildId),
}

/// Handle to one guild's live voice session.
///
/// Dropping the handle tears the session down.
pub struct VoiceSession {
    guild_id: GuildId,
    tx: Sender<VoiceControl>,
}

impl VoiceSession {
    pub(crate) fn spawn(info: ConnectionInfo, events: Sender<DriverEvent>) -> Self {
        let guild_id = info.guild_id.clone();
        let (tx, rx) = flume::unbounded();

        spawn(task::runner(info, rx, events));

        Self { guild_id, tx }
    }

    /// The guild this session serves.
    pub fn guild_id(&self) -> &GuildId {
        &self.guild_id
    }

    pub(crate) fn start_speaking(&self, source: Box<dyn AudioSource>) {
        let _ = self.tx.send(VoiceControl::Speak(source));
    }

    pub(crate) fn pause_speaking(&self) {
        let _ = self.tx.send(VoiceControl::Pause);
    }

    pub(crate) fn resume_speaking(&self) {
        let _ = self.tx.send(VoiceControl::Resume);
    }

    pub(crate) fn stop_speaking(&self) {
        let _ = self.tx.send(VoiceControl::Stop);
    }

    pub(crate) fn quit(&self) {
        let _ = self.tx.send(VoiceControl::Quit);
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        let _ = self.tx.send(VoiceControl::Quit);
    }
}
