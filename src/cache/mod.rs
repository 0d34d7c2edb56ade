//! The in-process entity cache.
//!
//! The gateway task owns all mutation; voice sessions and user callbacks
//! read through shared handles. Parsing helpers check the cache before
//! constructing anything, and a cache hit always returns the existing
//! handle, which keeps a single [`User`] instance authoritative across
//! members, voice states and messages.

pub mod entity;

use crate::{
    driver::VoiceSession,
    id::{ChannelId, GuildId, UserId},
    input::AudioSource,
    model::entity::{ChannelData, GuildData, MemberData, MessageData, UserData, VoiceStateData},
};
use dashmap::DashMap;
use entity::{Channel, Guild, GuildMember, Message, User, VoiceState};
use std::sync::Arc;
use tracing::debug;

/// Outcome of applying a voice state update to the cache.
pub(crate) struct VoiceStateEvent {
    /// Guild the state lives in.
    pub guild: Arc<Guild>,
    /// The member the state was attached to, when known.
    pub member: Option<Arc<GuildMember>>,
    /// The freshly built state.
    pub state: Arc<VoiceState>,
}

/// Shared view of everything the gateway has observed.
pub struct Cache {
    pub(crate) users: DashMap<UserId, Arc<User>>,
    pub(crate) guilds: DashMap<GuildId, Arc<Guild>>,
    pub(crate) voice_sessions: DashMap<GuildId, VoiceSession>,
    pub(crate) pending_sources: DashMap<GuildId, Box<dyn AudioSource>>,
}

impl Cache {
    pub(crate) fn new() -> Self {
        Self {
            users: DashMap::new(),
            guilds: DashMap::new(),
            voice_sessions: DashMap::new(),
            pending_sources: DashMap::new(),
        }
    }

    /// Looks up a user by ID.
    pub fn user(&self, id: &UserId) -> Option<Arc<User>> {
        self.users.get(id).map(|u| u.clone())
    }

    /// Looks up a guild by ID.
    pub fn guild(&self, id: &GuildId) -> Option<Arc<Guild>> {
        self.guilds.get(id).map(|g| g.clone())
    }

    /// Looks up a channel by ID across all cached guilds.
    pub fn channel(&self, id: &ChannelId) -> Option<Arc<Channel>> {
        self.guilds
            .iter()
            .find_map(|guild| guild.channel(id))
    }

    /// Drops every cached user and guild, as happens when the gateway
    /// connection is rebuilt from scratch.
    pub(crate) fn flush(&self) {
        self.users.clear();
        self.guilds.clear();
    }

    /// Inserts a user, or refreshes the profile on the existing handle.
    pub(crate) fn upsert_user(&self, data: &UserData) -> Arc<User> {
        if let Some(existing) = self.users.get(&data.id) {
            existing.update(data);
            return existing.clone();
        }

        let user = User::from_data(data);
        self.users.insert(data.id.clone(), user.clone());
        user
    }

    /// Inserts a member into `guild`, or refreshes the existing handle.
    ///
    /// Returns `None` when the payload carries no user object to anchor
    /// the membership to.
    pub(crate) fn upsert_member(
        &self,
        guild: &Arc<Guild>,
        data: &MemberData,
    ) -> Option<Arc<GuildMember>> {
        let user = self.upsert_user(data.user.as_ref()?);

        if let Some(existing) = guild.member(&user.id) {
            existing.apply(data);
            return Some(existing);
        }

        let member = GuildMember::new(user.clone(), data);
        guild.members.insert(user.id.clone(), member.clone());
        Some(member)
    }

    /// Builds (or refreshes) a guild from a `GUILD_CREATE` payload,
    /// folding its channels, members and voice states into the cache.
    pub(crate) fn insert_guild(&self, data: GuildData) -> Arc<Guild> {
        let guild = match self.guilds.get(&data.id) {
            Some(existing) => existing.clone(),
            None => {
                let guild = Guild::new(data.id.clone(), data.name.clone());
                self.guilds.insert(data.id.clone(), guild.clone());
                guild
            },
        };
        guild.set_name(data.name);

        for channel in data.channels {
            let channel = self.build_channel(channel, Some(guild.id.clone()));
            guild.channels.insert(channel.id.clone(), channel);
        }

        for member in &data.members {
            self.upsert_member(&guild, member);
        }

        for state in data.voice_states {
            self.apply_voice_state(state, Some(&guild));
        }

        guild
    }

    /// Removes a guild and all the members it owns.
    pub(crate) fn remove_guild(&self, id: &GuildId) -> Option<Arc<Guild>> {
        self.guilds.remove(id).map(|(_, guild)| guild)
    }

    /// Resolves a channel payload, deduplicating any DM recipients
    /// through the user cache.
    pub(crate) fn build_channel(
        &self,
        mut data: ChannelData,
        guild_id: Option<GuildId>,
    ) -> Arc<Channel> {
        let recipients = data
            .recipients
            .drain(..)
            .map(|user| self.upsert_user(&user))
            .collect();

        Channel::from_data(data, guild_id, recipients)
    }

    /// Applies a voice state to the member it belongs to.
    ///
    /// States arriving before their guild (or for users the cache cannot
    /// resolve) are dropped.
    pub(crate) fn apply_voice_state(
        &self,
        data: VoiceStateData,
        guild: Option<&Arc<Guild>>,
    ) -> Option<VoiceStateEvent> {
        let guild = match guild {
            Some(guild) => guild.clone(),
            None => {
                let id = data.guild_id.as_ref()?;
                match self.guild(id) {
                    Some(guild) => guild,
                    None => {
                        debug!("Dropping voice state for unknown guild {id}");
                        return None;
                    },
                }
            },
        };

        let member = match guild.member(&data.user_id) {
            Some(member) => Some(member),
            None => data
                .member
                .as_ref()
                .and_then(|member| self.upsert_member(&guild, member)),
        };

        let user = match &member {
            Some(member) => member.user.clone(),
            None => self.user(&data.user_id)?,
        };

        let channel = data
            .channel_id
            .as_ref()
            .and_then(|id| guild.channel(id));

        let state = Arc::new(VoiceState {
            guild_id: guild.id.clone(),
            user,
            channel: channel.clone(),
            session_id: data.session_id,
            deaf: data.deaf,
            mute: data.mute,
            self_deaf: data.self_deaf,
            self_mute: data.self_mute,
            self_stream: data.self_stream,
            suppress: data.suppress,
        });

        if let Some(member) = &member {
            member.set_voice_state(channel.is_some().then(|| state.clone()));
        }

        Some(VoiceStateEvent {
            guild,
            member,
            state,
        })
    }

    /// Resolves a `MESSAGE_CREATE` payload against the cache.
    ///
    /// Returns `None` for authorless payloads, which the library has no
    /// use for.
    pub(crate) fn build_message(&self, data: MessageData) -> Option<Message> {
        let guild = data.guild_id.as_ref().and_then(|id| self.guild(id));

        let channel = guild
            .as_ref()
            .and_then(|guild| guild.channel(&data.channel_id))
            .unwrap_or_else(|| Channel::synthesized(data.channel_id.clone()));

        let author = self.upsert_user(data.author.as_ref()?);

        let member = guild.as_ref().and_then(|guild| {
            guild.member(&author.id).or_else(|| {
                let member_data = data.member.as_ref()?;
                let member = GuildMember::new(author.clone(), member_data);
                guild.members.insert(author.id.clone(), member.clone());
                Some(member)
            })
        });

        let mentions = data
            .mentions
            .iter()
            .map(|mention| {
                let user = self.upsert_user(mention);
                guild
                    .as_ref()
                    .and_then(|guild| guild.member(&user.id))
                    .unwrap_or_else(|| GuildMember::shell(user))
            })
            .collect();

        Some(Message {
            id: data.id,
            channel,
            guild,
            author,
            member,
            content: data.content,
            timestamp: data.timestamp,
            edited_timestamp: data.edited_timestamp,
            tts: data.tts,
            mention_everyone: data.mention_everyone,
            mentions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entity::{GuildData, MessageData, VoiceStateData};
    use serde_json::json;

    fn sample_guild() -> GuildData {
        serde_json::from_value(json!({
            "id": "g1",
            "name": "testing grounds",
            "channels": [
                {"id": "c1", "type": 0, "name": "general", "position": 0},
                {"id": "c2", "type": 2, "name": "couch", "position": 1, "bitrate": 64000},
            ],
            "members": [
                {"user": {"id": "u1", "username": "ada"}, "roles": ["r1"], "joined_at": "2020-01-01T00:00:00Z"},
                {"user": {"id": "u2", "username": "grace"}, "joined_at": "2020-02-01T00:00:00Z"},
            ],
            "voice_states": [
                {"user_id": "u2", "channel_id": "c2", "session_id": "sess-2"},
            ],
        }))
        .unwrap()
    }

    #[test]
    fn guild_create_builds_linked_entities() {
        let cache = Cache::new();
        let guild = cache.insert_guild(sample_guild());

        assert_eq!(guild.name(), "testing grounds");
        assert_eq!(guild.channels.len(), 2);
        assert_eq!(guild.members.len(), 2);

        let member = guild.member(&"u2".into()).unwrap();
        let state = member.voice_state().unwrap();
        assert_eq!(state.session_id, "sess-2");
        assert_eq!(state.channel.as_ref().unwrap().id.as_str(), "c2");

        // A member's user and the top-level cache entry are one instance.
        let cached = cache.user(&"u2".into()).unwrap();
        assert!(Arc::ptr_eq(&cached, &member.user));
        assert!(Arc::ptr_eq(&cached, &state.user));
    }

    #[test]
    fn replaying_guild_create_is_idempotent() {
        let cache = Cache::new();
        cache.insert_guild(sample_guild());
        let user_before = cache.user(&"u1".into()).unwrap();

        let guild = cache.insert_guild(sample_guild());

        assert_eq!(cache.guilds.len(), 1);
        assert_eq!(cache.users.len(), 2);
        assert_eq!(guild.channels.len(), 2);
        assert_eq!(guild.members.len(), 2);
        assert!(Arc::ptr_eq(&user_before, &cache.user(&"u1".into()).unwrap()));
    }

    #[test]
    fn guild_create_round_trips_ids() {
        let data = sample_guild();
        let channel_ids: Vec<_> = data.channels.iter().map(|c| c.id.clone()).collect();
        let member_ids: Vec<_> = data
            .members
            .iter()
            .map(|m| m.user.as_ref().unwrap().id.clone())
            .collect();

        let cache = Cache::new();
        let guild = cache.insert_guild(data);

        let mut cached_channels: Vec<_> =
            guild.channels.iter().map(|c| c.id.clone()).collect();
        cached_channels.sort();
        let mut expected_channels = channel_ids;
        expected_channels.sort();
        assert_eq!(cached_channels, expected_channels);

        let mut cached_members: Vec<_> =
            guild.members.iter().map(|m| m.user.id.clone()).collect();
        cached_members.sort();
        let mut expected_members = member_ids;
        expected_members.sort();
        assert_eq!(cached_members, expected_members);

        let state = guild.member(&"u2".into()).unwrap().voice_state().unwrap();
        assert_eq!(
            (
                state.user.id.as_str(),
                state.channel.as_ref().unwrap().id.as_str(),
                state.session_id.as_str(),
            ),
            ("u2", "c2", "sess-2"),
        );
    }

    #[test]
    fn voice_state_before_guild_create_is_dropped() {
        let cache = Cache::new();
        let data: VoiceStateData = serde_json::from_value(json!({
            "guild_id": "nowhere",
            "channel_id": "c9",
            "user_id": "u9",
            "session_id": "sess-9",
        }))
        .unwrap();

        assert!(cache.apply_voice_state(data, None).is_none());
        assert!(cache.guilds.is_empty());
    }

    #[test]
    fn null_channel_clears_the_member_state() {
        let cache = Cache::new();
        cache.insert_guild(sample_guild());

        let data: VoiceStateData = serde_json::from_value(json!({
            "guild_id": "g1",
            "channel_id": null,
            "user_id": "u2",
            "session_id": "sess-2",
        }))
        .unwrap();

        let event = cache.apply_voice_state(data, None).unwrap();
        assert!(event.state.channel.is_none());
        assert!(event.member.unwrap().voice_state().is_none());
    }

    #[test]
    fn voice_state_with_member_payload_fills_the_guild() {
        let cache = Cache::new();
        cache.insert_guild(sample_guild());

        let data: VoiceStateData = serde_json::from_value(json!({
            "guild_id": "g1",
            "channel_id": "c2",
            "user_id": "u3",
            "session_id": "sess-3",
            "member": {"user": {"id": "u3", "username": "edsger"}, "joined_at": "2020-03-01T00:00:00Z"},
        }))
        .unwrap();

        let event = cache.apply_voice_state(data, None).unwrap();
        let member = event.member.unwrap();
        assert_eq!(member.user.username(), "edsger");
        assert!(cache.guild(&"g1".into()).unwrap().member(&"u3".into()).is_some());
    }

    #[test]
    fn message_resolves_author_and_mentions_through_cache() {
        let cache = Cache::new();
        cache.insert_guild(sample_guild());

        let data: MessageData = serde_json::from_value(json!({
            "id": "m1",
            "channel_id": "c1",
            "guild_id": "g1",
            "author": {"id": "u2", "username": "grace"},
            "content": "hello <@u1>",
            "timestamp": "2020-05-01T00:00:00Z",
            "mentions": [{"id": "u1", "username": "ada"}],
        }))
        .unwrap();

        let message = cache.build_message(data).unwrap();
        assert!(Arc::ptr_eq(
            &message.author,
            &cache.user(&"u2".into()).unwrap()
        ));
        assert!(message.member.is_some());
        assert_eq!(message.mentions.len(), 1);
        assert!(Arc::ptr_eq(
            &message.mentions[0].user,
            &cache.user(&"u1".into()).unwrap()
        ));
        // The mention resolved to the real guild member, not a shell.
        assert!(Arc::ptr_eq(
            &message.mentions[0],
            &message.guild.as_ref().unwrap().member(&"u1".into()).unwrap()
        ));
    }

    #[test]
    fn dm_message_synthesizes_a_channel() {
        let cache = Cache::new();

        let data: MessageData = serde_json::from_value(json!({
            "id": "m2",
            "channel_id": "dm1",
            "author": {"id": "u5", "username": "alan"},
            "content": "psst",
            "timestamp": "2020-06-01T00:00:00Z",
            "mentions": [{"id": "u6", "username": "kurt"}],
        }))
        .unwrap();

        let message = cache.build_message(data).unwrap();
        assert!(message.guild.is_none());
        assert!(message.member.is_none());
        assert_eq!(message.channel.id.as_str(), "dm1");
        assert_eq!(message.channel.kind, entity::ChannelKind::Dm);

        // Mentions in DMs become shell members around the cached user.
        assert!(Arc::ptr_eq(
            &message.mentions[0].user,
            &cache.user(&"u6".into()).unwrap()
        ));
    }

    #[test]
    fn upsert_refreshes_profile_on_the_same_handle() {
        let cache = Cache::new();
        let first = cache.upsert_user(
            &serde_json::from_value(json!({"id": "u7", "username": "old"})).unwrap(),
        );
        let second = cache.upsert_user(
            &serde_json::from_value(json!({"id": "u7", "username": "new"})).unwrap(),
        );

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.username(), "new");
    }
}
