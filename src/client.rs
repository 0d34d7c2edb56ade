//! The top-level client surface.

use crate::{
    cache::{
        entity::{Channel, ChannelKind},
        Cache,
    },
    driver::VoiceSession,
    error::{Error, Result},
    events::EventHandler,
    gateway::{Shard, ShardControl},
    http::Rest,
    input::AudioSource,
    model::{
        payload::{Command, UpdateVoiceState},
        GatewayOpcode,
    },
};
use flume::Sender;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::warn;

/// A Discord bot client: one gateway connection, a shared entity cache,
/// and any number of per-guild voice sessions.
///
/// Voice-related operations on channels without a guild, or channels of
/// the wrong type, are silently ignored.
pub struct Client {
    token: String,
    cache: Arc<Cache>,
    handler: Arc<dyn EventHandler>,
    rest: Rest,
    control: OnceCell<Sender<ShardControl>>,
}

impl Client {
    /// Creates a client for the given bot token.
    pub fn new(token: impl Into<String>, handler: Arc<dyn EventHandler>) -> Arc<Self> {
        let token = token.into();

        Arc::new(Self {
            rest: Rest::new(&token),
            cache: Arc::new(Cache::new()),
            handler,
            token,
            control: OnceCell::new(),
        })
    }

    /// The entity cache mirroring Discord's view of the world.
    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    /// Discovers the gateway over REST, connects, and blocks until
    /// [`Client::quit`] is called or the session is invalidated beyond
    /// recovery.
    pub async fn run(&self) -> Result<()> {
        let gateway_url = self.rest.gateway_url().await?;

        let (tx, rx) = flume::unbounded();
        if self.control.set(tx).is_err() {
            return Err(Error::AlreadyRunning);
        }

        let mut shard = Shard::new(
            self.token.clone(),
            gateway_url,
            self.cache.clone(),
            self.handler.clone(),
            rx,
        );
        shard.run().await
    }

    /// Requests an orderly shutdown.
    ///
    /// Safe to call repeatedly, from any task, or before [`Client::run`].
    pub fn quit(&self) {
        if let Some(control) = self.control.get() {
            let _ = control.send(ShardControl::Quit);
        }
    }

    /// Asks Discord to move the bot into a voice channel.
    pub fn join(&self, channel: &Channel) {
        let Some(guild_id) = channel.guild_id.clone() else {
            return;
        };

        self.command(Command::gateway(
            GatewayOpcode::VoiceStateUpdate,
            UpdateVoiceState::join(guild_id, channel.id.clone()),
        ));
    }

    /// Disconnects the bot from voice in the channel's guild.
    pub fn leave(&self, channel: &Channel) {
        let Some(guild_id) = channel.guild_id.clone() else {
            return;
        };

        self.command(Command::gateway(
            GatewayOpcode::VoiceStateUpdate,
            UpdateVoiceState::leave(guild_id),
        ));
    }

    /// Streams an audio source into the guild owning `channel`.
    ///
    /// While the voice session is still being negotiated the source is
    /// queued, and attached as soon as Discord assigns a voice server.
    pub fn start_speaking(&self, channel: &Channel, source: Box<dyn AudioSource>) {
        let Some(guild_id) = channel.guild_id.clone() else {
            return;
        };

        match self.cache.voice_sessions.get(&guild_id) {
            Some(session) => session.start_speaking(source),
            None => {
                self.cache.pending_sources.insert(guild_id, source);
            },
        }
    }

    /// Pauses the active audio stream, if any.
    pub fn pause_speaking(&self, channel: &Channel) {
        self.with_session(channel, VoiceSession::pause_speaking);
    }

    /// Resumes a paused audio stream.
    pub fn resume_speaking(&self, channel: &Channel) {
        self.with_session(channel, VoiceSession::resume_speaking);
    }

    /// Stops the active audio stream and drops its source.
    pub fn stop_speaking(&self, channel: &Channel) {
        self.with_session(channel, VoiceSession::stop_speaking);
    }

    /// Posts a text message. Only guild text channels are accepted.
    pub async fn send_message(&self, channel: &Channel, content: &str, tts: bool) -> Result<()> {
        if channel.kind != ChannelKind::GuildText {
            return Ok(());
        }

        self.rest.create_message(&channel.id, content, tts).await
    }

    fn command<T: serde::Serialize>(&self, command: Command<T>) {
        let value = match serde_json::to_value(&command) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to encode gateway command: {e}");
                return;
            },
        };

        match self.control.get() {
            Some(control) => {
                let _ = control.send(ShardControl::Command(value));
            },
            None => warn!("Dropping gateway command: client is not running."),
        }
    }

    fn with_session(&self, channel: &Channel, f: impl FnOnce(&VoiceSession)) {
        let Some(guild_id) = &channel.guild_id else {
            return;
        };

        if let Some(session) = self.cache.voice_sessions.get(guild_id) {
            f(&session);
        }
    }
}
