//! User-facing event callbacks.

use crate::cache::entity::{Guild, GuildMember, Message};
use async_trait::async_trait;
use std::sync::Arc;

/// Receives high-level events from a running [`Client`].
///
/// Every method defaults to a no-op, so implementors only write the
/// callbacks they care about. Callbacks are awaited on the gateway task
/// and therefore observe the cache at or after the event that fired
/// them; anything long-running should be spawned off.
///
/// The library never panics through these callbacks: cache handles stay
/// valid until the next cache-invalidating event (guild removal or a
/// full reconnect flush).
///
/// [`Client`]: crate::Client
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// The gateway handshake completed and the bot identity is known.
    async fn ready(&self) {}

    /// A dropped session was resumed without losing state.
    async fn resume(&self) {}

    /// A message arrived in a guild channel or DM.
    async fn message(&self, _message: Message) {}

    /// A member's voice presence changed.
    async fn voice_state_update(&self, _member: Arc<GuildMember>) {}

    /// The audio source streaming into a guild ran out or was stopped.
    async fn end_speaking(&self, _guild: Arc<Guild>) {}

    /// The gateway connection dropped; a reconnect may follow.
    async fn disconnect(&self) {}

    /// The client shut down for good.
    async fn quit(&self) {}
}
