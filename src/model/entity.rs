//! Raw entity payloads as Discord sends them.
//!
//! These are straight serde projections of the JSON; resolution against the
//! cache (user dedup, member linkage) happens in [`crate::cache`].

use crate::id::{ChannelId, GuildId, MessageId, UserId};
use serde::Deserialize;

/// A user object on the wire.
#[derive(Clone, Debug, Deserialize)]
pub struct UserData {
    /// User snowflake.
    pub id: UserId,
    /// Account name.
    #[serde(default)]
    pub username: String,
    /// Four-digit tag disambiguating equal usernames.
    #[serde(default)]
    pub discriminator: String,
    /// Avatar hash.
    #[serde(default)]
    pub avatar: Option<String>,
    /// Whether the account belongs to an OAuth application.
    #[serde(default)]
    pub bot: bool,
    /// Whether the account is an official system user.
    #[serde(default)]
    pub system: bool,
    /// Whether multi-factor auth is enabled.
    #[serde(default)]
    pub mfa_enabled: bool,
    /// Chosen language.
    #[serde(default)]
    pub locale: Option<String>,
    /// Whether the account's email is verified.
    #[serde(default)]
    pub verified: bool,
    /// Account email, if shared.
    #[serde(default)]
    pub email: Option<String>,
    /// User flag bitmask.
    #[serde(default)]
    pub flags: u64,
    /// Nitro subscription tier.
    #[serde(default)]
    pub premium_type: u8,
    /// Publicly visible flag bitmask.
    #[serde(default)]
    pub public_flags: u64,
}

/// A guild member object on the wire.
#[derive(Clone, Debug, Deserialize)]
pub struct MemberData {
    /// The user this member wraps; omitted inside `MESSAGE_CREATE`.
    #[serde(default)]
    pub user: Option<UserData>,
    /// Guild-local nickname.
    #[serde(default)]
    pub nick: Option<String>,
    /// Role snowflakes.
    #[serde(default)]
    pub roles: Vec<String>,
    /// When the member joined the guild.
    #[serde(default)]
    pub joined_at: String,
    /// When the member started boosting, if ever.
    #[serde(default)]
    pub premium_since: Option<String>,
    /// Whether the member is deafened server-wide.
    #[serde(default)]
    pub deaf: bool,
    /// Whether the member is muted server-wide.
    #[serde(default)]
    pub mute: bool,
}

/// A permission overwrite entry on a channel.
#[derive(Clone, Debug, Deserialize)]
pub struct PermissionOverwriteData {
    /// Role or user snowflake the overwrite applies to.
    pub id: String,
    /// `"role"` or `"member"`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Allowed permission bits.
    #[serde(default)]
    pub allow: u64,
    /// Denied permission bits.
    #[serde(default)]
    pub deny: u64,
}

/// A channel object on the wire.
#[derive(Clone, Debug, Deserialize)]
pub struct ChannelData {
    /// Channel snowflake.
    pub id: ChannelId,
    /// Raw channel type discriminant.
    #[serde(rename = "type", default)]
    pub kind: u8,
    /// Owning guild; absent for DMs and group DMs.
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    /// Sort position within the guild.
    #[serde(default)]
    pub position: i64,
    /// Permission overwrites.
    #[serde(default)]
    pub permission_overwrites: Vec<PermissionOverwriteData>,
    /// Channel name.
    #[serde(default)]
    pub name: Option<String>,
    /// Channel topic.
    #[serde(default)]
    pub topic: Option<String>,
    /// Whether the channel is age-restricted.
    #[serde(default)]
    pub nsfw: bool,
    /// Snowflake of the most recent message.
    #[serde(default)]
    pub last_message_id: Option<MessageId>,
    /// Voice bitrate in bits per second.
    #[serde(default)]
    pub bitrate: Option<u32>,
    /// Voice user cap.
    #[serde(default)]
    pub user_limit: Option<u32>,
    /// Slowmode interval in seconds.
    #[serde(default)]
    pub rate_limit_per_user: Option<u32>,
    /// DM/group-DM recipients.
    #[serde(default)]
    pub recipients: Vec<UserData>,
    /// Group-DM icon hash.
    #[serde(default)]
    pub icon: Option<String>,
    /// Group-DM owner.
    #[serde(default)]
    pub owner_id: Option<UserId>,
    /// Creating application, for bot-made group DMs.
    #[serde(default)]
    pub application_id: Option<String>,
    /// Parent category.
    #[serde(default)]
    pub parent_id: Option<ChannelId>,
    /// When the last pin changed.
    #[serde(default)]
    pub last_pin_timestamp: Option<String>,
}

/// A voice state object on the wire.
#[derive(Clone, Debug, Deserialize)]
pub struct VoiceStateData {
    /// Guild this state belongs to; omitted inside `GUILD_CREATE`.
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    /// Channel the user sits in; `null` when disconnecting.
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    /// The user whose state this is.
    pub user_id: UserId,
    /// Member payload, attached on guild dispatches.
    #[serde(default)]
    pub member: Option<MemberData>,
    /// Voice session ID for this user.
    #[serde(default)]
    pub session_id: String,
    /// Whether the user is deafened server-wide.
    #[serde(default)]
    pub deaf: bool,
    /// Whether the user is muted server-wide.
    #[serde(default)]
    pub mute: bool,
    /// Whether the user deafened themselves.
    #[serde(default)]
    pub self_deaf: bool,
    /// Whether the user muted themselves.
    #[serde(default)]
    pub self_mute: bool,
    /// Whether the user is streaming.
    #[serde(default)]
    pub self_stream: bool,
    /// Whether the user is suppressed.
    #[serde(default)]
    pub suppress: bool,
}

/// A guild object as delivered by `GUILD_CREATE`.
#[derive(Clone, Debug, Deserialize)]
pub struct GuildData {
    /// Guild snowflake.
    pub id: GuildId,
    /// Guild name.
    #[serde(default)]
    pub name: String,
    /// Channels, delivered inline on create.
    #[serde(default)]
    pub channels: Vec<ChannelData>,
    /// Members, delivered inline on create.
    #[serde(default)]
    pub members: Vec<MemberData>,
    /// Voice states of currently connected members.
    #[serde(default)]
    pub voice_states: Vec<VoiceStateData>,
}

/// The `GUILD_DELETE` body; only the ID matters to the cache.
#[derive(Clone, Debug, Deserialize)]
pub struct GuildDeleteData {
    /// Guild snowflake.
    pub id: GuildId,
}

/// The `VOICE_SERVER_UPDATE` body.
#[derive(Clone, Debug, Deserialize)]
pub struct VoiceServerUpdateData {
    /// Ephemeral voice connection token.
    pub token: String,
    /// Guild whose voice server is being assigned.
    pub guild_id: GuildId,
    /// Voice server host, possibly with a `:port` suffix; may be `null`
    /// while Discord reallocates servers.
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// A message object on the wire.
#[derive(Clone, Debug, Deserialize)]
pub struct MessageData {
    /// Message snowflake.
    pub id: MessageId,
    /// Channel the message was posted in.
    pub channel_id: ChannelId,
    /// Guild the channel belongs to; absent for DMs.
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    /// Author of the message.
    #[serde(default)]
    pub author: Option<UserData>,
    /// The author's member object, on guild messages.
    #[serde(default)]
    pub member: Option<MemberData>,
    /// Message text.
    #[serde(default)]
    pub content: String,
    /// When the message was sent.
    #[serde(default)]
    pub timestamp: String,
    /// When the message was last edited.
    #[serde(default)]
    pub edited_timestamp: Option<String>,
    /// Whether this was a TTS message.
    #[serde(default)]
    pub tts: bool,
    /// Whether `@everyone` was mentioned.
    #[serde(default)]
    pub mention_everyone: bool,
    /// Users mentioned in the message.
    #[serde(default)]
    pub mentions: Vec<UserData>,
}
