#![warn(missing_docs)]
//! Mockingbird is an async Discord client library, written in Rust.
//! The library offers:
//!  * A single-connection gateway session which mirrors Discord's view of
//!    guilds, channels, members and voice states into an in-process cache,
//!    and hands high-level events to an [`EventHandler`].
//!  * A per-guild voice driver speaking Discord's voice gateway and UDP
//!    protocols: IP discovery, key exchange, and an Opus/SRTP send pipeline
//!    timed to 20 ms frames.
//!  * A pull-based [`AudioSource`] contract for streaming raw PCM into a
//!    voice channel.
//!
//! ## Intents
//! The gateway identifies with the `GUILDS`, `GUILD_VOICE_STATES`,
//! `GUILD_MESSAGES` and `DIRECT_MESSAGES` intents.
//!
//! [`EventHandler`]: crate::events::EventHandler
//! [`AudioSource`]: crate::input::AudioSource

pub mod cache;
mod client;
pub mod constants;
pub mod driver;
pub mod error;
pub mod events;
mod gateway;
mod http;
pub mod id;
pub mod input;
pub mod model;
mod ws;

pub use crate::{client::Client, driver::VoiceSession, events::EventHandler, input::AudioSource};
