//! Cached entities handed to event handlers.
//!
//! Entities are shared by `Arc` handle: one [`User`] instance backs every
//! member, voice state and message that references it. Fields which change
//! over a session sit behind locks or atomics so handler tasks can read
//! them while the gateway task applies updates.

use crate::{
    id::{ChannelId, GuildId, MessageId, UserId},
    model::entity::{ChannelData, MemberData, PermissionOverwriteData, UserData},
};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// What a channel is for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ChannelKind {
    /// A text channel within a guild.
    GuildText,
    /// A direct message between two users.
    Dm,
    /// A voice channel within a guild.
    GuildVoice,
    /// A direct message between multiple users.
    GroupDm,
    /// An organizational category.
    Category,
    /// A news/announcement channel.
    News,
    /// A store-page channel.
    Store,
    /// A type this library does not recognize.
    Unknown,
}

impl ChannelKind {
    pub(crate) fn from_u8(kind: u8) -> Self {
        match kind {
            0 => Self::GuildText,
            1 => Self::Dm,
            2 => Self::GuildVoice,
            3 => Self::GroupDm,
            4 => Self::Category,
            5 => Self::News,
            6 => Self::Store,
            _ => Self::Unknown,
        }
    }
}

/// The mutable portion of a [`User`].
#[derive(Clone, Debug, Default)]
pub struct UserProfile {
    /// Account name.
    pub username: String,
    /// Four-digit tag disambiguating equal usernames.
    pub discriminator: String,
    /// Avatar hash.
    pub avatar: Option<String>,
    /// Whether the account belongs to an OAuth application.
    pub bot: bool,
    /// Whether the account is an official system user.
    pub system: bool,
    /// Whether multi-factor auth is enabled.
    pub mfa_enabled: bool,
    /// Chosen language.
    pub locale: Option<String>,
    /// Whether the account's email is verified.
    pub verified: bool,
    /// Account email, if shared.
    pub email: Option<String>,
    /// User flag bitmask.
    pub flags: u64,
    /// Nitro subscription tier.
    pub premium_type: u8,
    /// Publicly visible flag bitmask.
    pub public_flags: u64,
}

impl From<&UserData> for UserProfile {
    fn from(data: &UserData) -> Self {
        Self {
            username: data.username.clone(),
            discriminator: data.discriminator.clone(),
            avatar: data.avatar.clone(),
            bot: data.bot,
            system: data.system,
            mfa_enabled: data.mfa_enabled,
            locale: data.locale.clone(),
            verified: data.verified,
            email: data.email.clone(),
            flags: data.flags,
            premium_type: data.premium_type,
            public_flags: data.public_flags,
        }
    }
}

/// A Discord account.
///
/// Exactly one instance exists per user ID; every cached entity that
/// refers to the user holds a handle to it.
#[derive(Debug)]
pub struct User {
    /// User snowflake.
    pub id: UserId,
    profile: RwLock<UserProfile>,
}

impl User {
    pub(crate) fn from_data(data: &UserData) -> Arc<Self> {
        Arc::new(Self {
            id: data.id.clone(),
            profile: RwLock::new(UserProfile::from(data)),
        })
    }

    pub(crate) fn update(&self, data: &UserData) {
        *self.profile.write() = UserProfile::from(data);
    }

    /// Snapshot of the user's profile fields.
    pub fn profile(&self) -> UserProfile {
        self.profile.read().clone()
    }

    /// The account name.
    pub fn username(&self) -> String {
        self.profile.read().username.clone()
    }

    /// Whether the account belongs to an OAuth application.
    pub fn is_bot(&self) -> bool {
        self.profile.read().bot
    }
}

/// A user's membership of one guild.
#[derive(Debug)]
pub struct GuildMember {
    /// The account behind this membership.
    pub user: Arc<User>,
    nick: RwLock<Option<String>>,
    roles: RwLock<Vec<String>>,
    joined_at: RwLock<String>,
    premium_since: RwLock<Option<String>>,
    deaf: AtomicBool,
    mute: AtomicBool,
    voice: RwLock<Option<Arc<VoiceState>>>,
}

impl GuildMember {
    pub(crate) fn new(user: Arc<User>, data: &MemberData) -> Arc<Self> {
        Arc::new(Self {
            user,
            nick: RwLock::new(data.nick.clone()),
            roles: RwLock::new(data.roles.clone()),
            joined_at: RwLock::new(data.joined_at.clone()),
            premium_since: RwLock::new(data.premium_since.clone()),
            deaf: AtomicBool::new(data.deaf),
            mute: AtomicBool::new(data.mute),
            voice: RwLock::new(None),
        })
    }

    /// A bare membership shell for users seen outside any guild context,
    /// e.g. mentions inside a DM.
    pub(crate) fn shell(user: Arc<User>) -> Arc<Self> {
        Arc::new(Self {
            user,
            nick: RwLock::new(None),
            roles: RwLock::new(Vec::new()),
            joined_at: RwLock::new(String::new()),
            premium_since: RwLock::new(None),
            deaf: AtomicBool::new(false),
            mute: AtomicBool::new(false),
            voice: RwLock::new(None),
        })
    }

    pub(crate) fn apply(&self, data: &MemberData) {
        *self.nick.write() = data.nick.clone();
        *self.roles.write() = data.roles.clone();
        if !data.joined_at.is_empty() {
            *self.joined_at.write() = data.joined_at.clone();
        }
        *self.premium_since.write() = data.premium_since.clone();
        self.deaf.store(data.deaf, Ordering::Release);
        self.mute.store(data.mute, Ordering::Release);
    }

    pub(crate) fn set_voice_state(&self, state: Option<Arc<VoiceState>>) {
        *self.voice.write() = state;
    }

    /// Guild-local nickname.
    pub fn nick(&self) -> Option<String> {
        self.nick.read().clone()
    }

    /// Role snowflakes held by this member.
    pub fn roles(&self) -> Vec<String> {
        self.roles.read().clone()
    }

    /// When the member joined the guild.
    pub fn joined_at(&self) -> String {
        self.joined_at.read().clone()
    }

    /// When the member started boosting, if ever.
    pub fn premium_since(&self) -> Option<String> {
        self.premium_since.read().clone()
    }

    /// Whether the member is deafened server-wide.
    pub fn is_deaf(&self) -> bool {
        self.deaf.load(Ordering::Acquire)
    }

    /// Whether the member is muted server-wide.
    pub fn is_mute(&self) -> bool {
        self.mute.load(Ordering::Acquire)
    }

    /// The member's current voice state, if connected to voice.
    pub fn voice_state(&self) -> Option<Arc<VoiceState>> {
        self.voice.read().clone()
    }
}

/// A permission overwrite entry on a channel.
#[derive(Clone, Debug)]
pub struct PermissionOverwrite {
    /// Role or user snowflake the overwrite applies to.
    pub id: String,
    /// `"role"` or `"member"`.
    pub kind: String,
    /// Allowed permission bits.
    pub allow: u64,
    /// Denied permission bits.
    pub deny: u64,
}

impl From<PermissionOverwriteData> for PermissionOverwrite {
    fn from(data: PermissionOverwriteData) -> Self {
        Self {
            id: data.id,
            kind: data.kind,
            allow: data.allow,
            deny: data.deny,
        }
    }
}

/// A text, voice, or DM channel.
///
/// Channels are snapshots: the gateway replaces the whole handle when a
/// channel changes shape.
#[derive(Debug)]
pub struct Channel {
    /// Channel snowflake.
    pub id: ChannelId,
    /// What the channel is for.
    pub kind: ChannelKind,
    /// Owning guild; `None` for DMs and group DMs.
    pub guild_id: Option<GuildId>,
    /// Sort position within the guild.
    pub position: i64,
    /// Permission overwrites.
    pub overwrites: Vec<PermissionOverwrite>,
    /// Channel name.
    pub name: Option<String>,
    /// Channel topic.
    pub topic: Option<String>,
    /// Whether the channel is age-restricted.
    pub nsfw: bool,
    /// Snowflake of the most recent message.
    pub last_message_id: Option<MessageId>,
    /// Voice bitrate in bits per second.
    pub bitrate: Option<u32>,
    /// Voice user cap.
    pub user_limit: Option<u32>,
    /// Slowmode interval in seconds.
    pub rate_limit_per_user: Option<u32>,
    /// DM/group-DM recipients, resolved against the user cache.
    pub recipients: Vec<Arc<User>>,
    /// Group-DM icon hash.
    pub icon: Option<String>,
    /// Group-DM owner.
    pub owner_id: Option<UserId>,
    /// Creating application, for bot-made group DMs.
    pub application_id: Option<String>,
    /// Parent category.
    pub parent_id: Option<ChannelId>,
    /// When the last pin changed.
    pub last_pin_timestamp: Option<String>,
}

impl Channel {
    pub(crate) fn from_data(
        data: ChannelData,
        guild_id: Option<GuildId>,
        recipients: Vec<Arc<User>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: data.id,
            kind: ChannelKind::from_u8(data.kind),
            guild_id: guild_id.or(data.guild_id),
            position: data.position,
            overwrites: data
                .permission_overwrites
                .into_iter()
                .map(PermissionOverwrite::from)
                .collect(),
            name: data.name,
            topic: data.topic,
            nsfw: data.nsfw,
            last_message_id: data.last_message_id,
            bitrate: data.bitrate,
            user_limit: data.user_limit,
            rate_limit_per_user: data.rate_limit_per_user,
            recipients,
            icon: data.icon,
            owner_id: data.owner_id,
            application_id: data.application_id,
            parent_id: data.parent_id,
            last_pin_timestamp: data.last_pin_timestamp,
        })
    }

    /// Synthesizes a minimal stand-in for a channel the cache has never
    /// observed, as happens for DM messages.
    pub(crate) fn synthesized(id: ChannelId) -> Arc<Self> {
        Arc::new(Self {
            id,
            kind: ChannelKind::Dm,
            guild_id: None,
            position: 0,
            overwrites: Vec::new(),
            name: None,
            topic: None,
            nsfw: false,
            last_message_id: None,
            bitrate: None,
            user_limit: None,
            rate_limit_per_user: None,
            recipients: Vec::new(),
            icon: None,
            owner_id: None,
            application_id: None,
            parent_id: None,
            last_pin_timestamp: None,
        })
    }
}

/// A guild and the channels/members it owns.
#[derive(Debug)]
pub struct Guild {
    /// Guild snowflake.
    pub id: GuildId,
    name: RwLock<String>,
    /// Channels, keyed by ID.
    pub channels: DashMap<ChannelId, Arc<Channel>>,
    /// Members, keyed by user ID.
    pub members: DashMap<UserId, Arc<GuildMember>>,
}

impl Guild {
    pub(crate) fn new(id: GuildId, name: String) -> Arc<Self> {
        Arc::new(Self {
            id,
            name: RwLock::new(name),
            channels: DashMap::new(),
            members: DashMap::new(),
        })
    }

    pub(crate) fn set_name(&self, name: String) {
        *self.name.write() = name;
    }

    /// The guild's name.
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    /// Looks up a channel owned by this guild.
    pub fn channel(&self, id: &ChannelId) -> Option<Arc<Channel>> {
        self.channels.get(id).map(|c| c.clone())
    }

    /// Looks up a member of this guild.
    pub fn member(&self, id: &UserId) -> Option<Arc<GuildMember>> {
        self.members.get(id).map(|m| m.clone())
    }
}

/// One user's presence in a guild's voice system.
///
/// States are immutable snapshots; an update replaces the member's handle
/// wholesale, so at most one state exists per (guild, user) pair.
#[derive(Debug)]
pub struct VoiceState {
    /// Guild the state belongs to.
    pub guild_id: GuildId,
    /// The user whose state this is.
    pub user: Arc<User>,
    /// Channel the user sits in; `None` while disconnecting.
    pub channel: Option<Arc<Channel>>,
    /// Voice session ID for this user.
    pub session_id: String,
    /// Whether the user is deafened server-wide.
    pub deaf: bool,
    /// Whether the user is muted server-wide.
    pub mute: bool,
    /// Whether the user deafened themselves.
    pub self_deaf: bool,
    /// Whether the user muted themselves.
    pub self_mute: bool,
    /// Whether the user is streaming.
    pub self_stream: bool,
    /// Whether the user is suppressed.
    pub suppress: bool,
}

/// A chat message, resolved against the cache.
#[derive(Clone, Debug)]
pub struct Message {
    /// Message snowflake.
    pub id: MessageId,
    /// Channel the message was posted in; synthesized for unseen DMs.
    pub channel: Arc<Channel>,
    /// Guild the channel belongs to; `None` for DMs.
    pub guild: Option<Arc<Guild>>,
    /// Author of the message.
    pub author: Arc<User>,
    /// The author's membership, on guild messages.
    pub member: Option<Arc<GuildMember>>,
    /// Message text.
    pub content: String,
    /// When the message was sent.
    pub timestamp: String,
    /// When the message was last edited.
    pub edited_timestamp: Option<String>,
    /// Whether this was a TTS message.
    pub tts: bool,
    /// Whether `@everyone` was mentioned.
    pub mention_everyone: bool,
    /// Members mentioned in the message.
    pub mentions: Vec<Arc<GuildMember>>,
}
