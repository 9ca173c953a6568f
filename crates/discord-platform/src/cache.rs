//! In-Memory Session Cache
//!
//! Populated by gateway dispatches (`GUILD_CREATE`, channel/thread events,
//! voice state updates) and by REST fallbacks. Owned by the client behind a
//! `tokio::sync::RwLock`; all mutation goes through [`Cache::apply`] or the
//! explicit insert helpers.

use crate::model::{Channel, Guild, GuildSummary, Member, Role, User, VoiceState};
use crate::permissions::{compute_permissions, PermissionContext};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Everything cached for one guild
#[derive(Debug, Clone, Default)]
pub struct GuildState {
    pub id: String,
    pub name: String,
    pub member_count: u64,
    pub owner_id: Option<String>,
    pub roles: Vec<Role>,
    /// Channels and threads by id
    pub channels: HashMap<String, Channel>,
    /// user id → voice channel id
    pub voice_states: HashMap<String, String>,
    /// The session's own member, when known
    pub me: Option<Member>,
}

impl GuildState {
    fn summary(&self) -> GuildSummary {
        GuildSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            member_count: self.member_count,
        }
    }
}

#[derive(Debug, Default)]
pub struct Cache {
    current_user: Option<User>,
    guilds: HashMap<String, GuildState>,
}

#[derive(Deserialize)]
struct ChannelDelete {
    id: String,
    #[serde(default)]
    guild_id: Option<String>,
}

#[derive(Deserialize)]
struct GuildDelete {
    id: String,
    #[serde(default)]
    unavailable: bool,
}

#[derive(Deserialize)]
struct ThreadListSync {
    guild_id: String,
    #[serde(default)]
    channel_ids: Option<Vec<String>>,
    #[serde(default)]
    threads: Vec<Channel>,
}

/// Orders ids by creation time (numeric snowflake order).
fn snowflake_key(id: &str) -> (u64, String) {
    (id.parse().unwrap_or(u64::MAX), id.to_string())
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    pub fn set_current_user(&mut self, user: User) {
        self.current_user = Some(user);
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Apply a gateway dispatch. Unknown events are ignored.
    pub fn apply(&mut self, event: &str, data: Value) -> crate::Result<()> {
        trace!(event = %event, "Applying dispatch to cache");
        match event {
            "GUILD_CREATE" => self.insert_guild(serde_json::from_value(data)?),
            "GUILD_UPDATE" => self.update_guild(serde_json::from_value(data)?),
            "GUILD_DELETE" => {
                let deleted: GuildDelete = serde_json::from_value(data)?;
                // An outage keeps the stale entry; a removal drops it
                if !deleted.unavailable {
                    self.guilds.remove(&deleted.id);
                }
            }
            "CHANNEL_CREATE" | "CHANNEL_UPDATE" | "THREAD_CREATE" | "THREAD_UPDATE" => {
                self.insert_channel(serde_json::from_value(data)?)
            }
            "CHANNEL_DELETE" | "THREAD_DELETE" => {
                let deleted: ChannelDelete = serde_json::from_value(data)?;
                self.remove_channel(deleted.guild_id.as_deref(), &deleted.id);
            }
            "THREAD_LIST_SYNC" => {
                let sync: ThreadListSync = serde_json::from_value(data)?;
                self.sync_threads(&sync.guild_id, sync.channel_ids.as_deref(), sync.threads);
            }
            "VOICE_STATE_UPDATE" => self.update_voice_state(serde_json::from_value(data)?),
            _ => {}
        }
        Ok(())
    }

    pub fn insert_guild(&mut self, guild: Guild) {
        let me_id = self.current_user.as_ref().map(|u| u.id.clone());
        let member_count = guild.member_count();

        let mut channels = HashMap::new();
        for mut channel in guild.channels.into_iter().chain(guild.threads) {
            channel.guild_id.get_or_insert_with(|| guild.id.clone());
            channels.insert(channel.id.clone(), channel);
        }

        let voice_states = guild
            .voice_states
            .into_iter()
            .filter_map(|vs| vs.channel_id.map(|c| (vs.user_id, c)))
            .collect();

        let me = guild.members.into_iter().find(|m| {
            matches!((&m.user, &me_id), (Some(user), Some(me)) if user.id == *me)
        });

        debug!(guild = %guild.id, name = %guild.name, channels = channels.len(), "Cached guild");
        self.guilds.insert(
            guild.id.clone(),
            GuildState {
                id: guild.id,
                name: guild.name,
                member_count,
                owner_id: guild.owner_id,
                roles: guild.roles,
                channels,
                voice_states,
                me,
            },
        );
    }

    fn update_guild(&mut self, guild: Guild) {
        match self.guilds.get_mut(&guild.id) {
            Some(state) => {
                state.name = guild.name;
                state.owner_id = guild.owner_id.or(state.owner_id.take());
                if !guild.roles.is_empty() {
                    state.roles = guild.roles;
                }
                if let Some(count) = guild.member_count.or(guild.approximate_member_count) {
                    state.member_count = count;
                }
            }
            None => self.insert_guild(guild),
        }
    }

    pub fn insert_channel(&mut self, channel: Channel) {
        let Some(guild_id) = channel.guild_id.clone() else {
            return;
        };
        if let Some(state) = self.guilds.get_mut(&guild_id) {
            state.channels.insert(channel.id.clone(), channel);
        }
    }

    fn remove_channel(&mut self, guild_id: Option<&str>, channel_id: &str) {
        match guild_id.and_then(|g| self.guilds.get_mut(g)) {
            Some(state) => {
                state.channels.remove(channel_id);
            }
            None => {
                for state in self.guilds.values_mut() {
                    state.channels.remove(channel_id);
                }
            }
        }
    }

    fn sync_threads(&mut self, guild_id: &str, parents: Option<&[String]>, threads: Vec<Channel>) {
        let Some(state) = self.guilds.get_mut(guild_id) else {
            return;
        };
        state.channels.retain(|_, c| {
            if !c.is_thread() {
                return true;
            }
            match (parents, &c.parent_id) {
                (None, _) => false,
                (Some(ids), Some(parent)) => !ids.contains(parent),
                (Some(_), None) => true,
            }
        });
        for mut thread in threads {
            thread.guild_id.get_or_insert_with(|| guild_id.to_string());
            state.channels.insert(thread.id.clone(), thread);
        }
    }

    pub fn update_voice_state(&mut self, voice_state: VoiceState) {
        let Some(state) = voice_state
            .guild_id
            .as_deref()
            .and_then(|g| self.guilds.get_mut(g))
        else {
            return;
        };
        match voice_state.channel_id {
            Some(channel_id) => {
                state.voice_states.insert(voice_state.user_id, channel_id);
            }
            None => {
                state.voice_states.remove(&voice_state.user_id);
            }
        }
    }

    pub fn set_member(&mut self, guild_id: &str, member: Member) {
        if let Some(state) = self.guilds.get_mut(guild_id) {
            state.me = Some(member);
        }
    }

    // =========================================================================
    // READS
    // =========================================================================

    pub fn guild_ids(&self) -> Vec<String> {
        self.guilds.keys().cloned().collect()
    }

    pub fn guild(&self, guild_id: &str) -> Option<&GuildState> {
        self.guilds.get(guild_id)
    }

    pub fn guild_summary(&self, guild_id: &str) -> Option<GuildSummary> {
        self.guilds.get(guild_id).map(GuildState::summary)
    }

    /// Every cached guild, oldest first
    pub fn guild_summaries(&self) -> Vec<GuildSummary> {
        let mut summaries: Vec<_> = self.guilds.values().map(GuildState::summary).collect();
        summaries.sort_by_key(|g| snowflake_key(&g.id));
        summaries
    }

    pub fn channel(&self, channel_id: &str) -> Option<Channel> {
        self.guilds
            .values()
            .find_map(|g| g.channels.get(channel_id))
            .cloned()
    }

    /// Cached channels and threads of a guild, oldest first
    pub fn guild_channels(&self, guild_id: &str) -> Option<Vec<Channel>> {
        let state = self.guilds.get(guild_id)?;
        let mut channels: Vec<_> = state.channels.values().cloned().collect();
        channels.sort_by_key(|c| snowflake_key(&c.id));
        Some(channels)
    }

    pub fn voice_occupancy(&self, guild_id: &str, channel_id: &str) -> usize {
        self.guilds
            .get(guild_id)
            .map(|g| g.voice_states.values().filter(|c| *c == channel_id).count())
            .unwrap_or(0)
    }

    /// Whether the session's own member is cached for this guild
    pub fn has_self_member(&self, guild_id: &str) -> bool {
        self.guilds.get(guild_id).map_or(false, |g| g.me.is_some())
    }

    /// Effective permission bits of the session in a guild channel.
    /// `None` when the guild, the current user or the own member is unknown.
    pub fn self_permissions(&self, channel: &Channel) -> Option<u64> {
        let user = self.current_user.as_ref()?;
        let guild_id = channel.guild_id.as_deref()?;
        let state = self.guilds.get(guild_id)?;
        let me = state.me.as_ref()?;

        // Threads use their parent's overwrites
        let overwrites = if channel.is_thread() {
            channel
                .parent_id
                .as_deref()
                .and_then(|p| state.channels.get(p))
                .map(|p| p.permission_overwrites.as_slice())
                .unwrap_or(&[])
        } else {
            channel.permission_overwrites.as_slice()
        };

        Some(compute_permissions(&PermissionContext {
            guild_id,
            owner_id: state.owner_id.as_deref(),
            user_id: &user.id,
            member_roles: &me.roles,
            guild_roles: &state.roles,
            overwrites,
        }))
    }
}
