//! `list_channels`: filtered, sorted view of a guild's channels

use super::{pretty_json, snowflake_key};
use crate::channel_types::{type_label, ChannelTypeTag};
use crate::error::BridgeError;
use crate::tool_registry::Tool;
use crate::validation::{ArgReader, ValidationErrors};
use async_trait::async_trait;
use chrono::SecondsFormat;
use discord_platform::{Channel, ChannelKind, PermissionSummary, Platform};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    Name,
    #[default]
    Position,
    Created,
}

const SORT_KEYS: &[(&str, SortBy)] = &[
    ("name", SortBy::Name),
    ("position", SortBy::Position),
    ("created", SortBy::Created),
];

/// Validated `list_channels` arguments
#[derive(Debug, Clone, PartialEq)]
pub struct ListChannelsRequest {
    pub guild_id: String,
    pub channel_types: Option<Vec<ChannelTypeTag>>,
    pub include_archived: bool,
    pub include_private: bool,
    pub category_id: Option<String>,
    pub sort_by: SortBy,
    pub include_permissions: bool,
    pub include_topic: bool,
    pub include_stats: bool,
}

impl ListChannelsRequest {
    pub fn parse(arguments: &Value) -> Result<Self, ValidationErrors> {
        let mut args = ArgReader::new(arguments);

        let guild_id = args.required_id("guildId");
        let channel_types = args.optional_choices("channelTypes", &ChannelTypeTag::choices());
        let include_archived = args.bool_or("includeArchived", false);
        let include_private = args.bool_or("includePrivate", false);
        let category_id = args.optional_id("categoryId");
        let sort_by = args.choice("sortBy", SORT_KEYS, SortBy::Position);
        let include_permissions = args.bool_or("includePermissions", false);
        let include_topic = args.bool_or("includeTopic", true);
        let include_stats = args.bool_or("includeStats", false);

        args.finish()?;
        Ok(Self {
            guild_id,
            channel_types,
            include_archived,
            include_private,
            category_id,
            sort_by,
            include_permissions,
            include_topic,
            include_stats,
        })
    }

    /// A channel is kept iff it passes every active filter.
    pub fn keeps(&self, channel: &Channel) -> bool {
        if let Some(types) = &self.channel_types {
            if !types.iter().any(|tag| tag.matches(channel.kind)) {
                return false;
            }
        }

        if let (Some(category), Some(parent)) = (&self.category_id, &channel.parent_id) {
            if parent != category {
                return false;
            }
        }

        if channel.is_thread() && channel.is_archived() && !self.include_archived {
            return false;
        }

        if channel.is_private_thread() && !self.include_private {
            return false;
        }

        true
    }

    /// Filter and order a guild's channels
    pub fn select(&self, channels: &[Channel]) -> Vec<Channel> {
        let mut kept: Vec<Channel> = channels.iter().filter(|c| self.keeps(c)).cloned().collect();

        match self.sort_by {
            SortBy::Name => kept.sort_by_cached_key(|c| c.name.clone().unwrap_or_default().to_lowercase()),
            SortBy::Created => kept.sort_by_key(|c| snowflake_key(&c.id)),
            SortBy::Position => kept.sort_by_key(|c| c.position.unwrap_or(i64::MAX)),
        }
        kept
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ParentView {
    pub id: String,
    pub name: Option<String>,
}

/// Voice occupancy or thread metadata
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_archive_duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagView {
    pub id: String,
    pub name: String,
    pub moderated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}

/// Transport-safe projection of a Discord channel
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelView {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<PermissionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ChannelStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtc_region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_auto_archive_duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_tags: Option<Vec<TagView>>,
}

fn is_voice(kind: ChannelKind) -> bool {
    matches!(kind, ChannelKind::GuildVoice | ChannelKind::GuildStageVoice)
}

fn is_forum_like(kind: ChannelKind) -> bool {
    matches!(kind, ChannelKind::GuildForum | ChannelKind::GuildMedia)
}

impl ChannelView {
    /// Base projection; permissions and voice stats are filled in by the caller.
    fn project(channel: &Channel, names: &HashMap<&str, &str>, request: &ListChannelsRequest) -> Self {
        let voice = is_voice(channel.kind);
        let forum = is_forum_like(channel.kind);

        let stats = match &channel.thread_metadata {
            Some(meta) if request.include_stats && channel.is_thread() => Some(ChannelStats {
                member_count: channel.member_count,
                message_count: channel.message_count,
                archived: Some(meta.archived),
                locked: Some(meta.locked),
                auto_archive_duration: meta.auto_archive_duration,
                archive_timestamp: meta.archive_timestamp.clone(),
            }),
            _ => None,
        };

        Self {
            id: channel.id.clone(),
            name: channel.name.clone().unwrap_or_default(),
            kind: type_label(channel.kind),
            created_at: channel
                .created_at()
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true)),
            position: channel.position,
            parent: channel.parent_id.as_ref().map(|id| ParentView {
                id: id.clone(),
                name: names.get(id.as_str()).map(|n| n.to_string()),
            }),
            topic: channel.topic.clone().filter(|_| request.include_topic),
            permissions: None,
            stats,
            bitrate: channel.bitrate.filter(|_| voice),
            user_limit: channel.user_limit.filter(|_| voice),
            rtc_region: channel.rtc_region.clone().filter(|_| voice),
            default_auto_archive_duration: channel.default_auto_archive_duration.filter(|_| forum),
            available_tags: forum.then(|| {
                channel
                    .available_tags
                    .iter()
                    .map(|t| TagView {
                        id: t.id.clone(),
                        name: t.name.clone(),
                        moderated: t.moderated,
                        emoji: t.emoji_name.clone().or_else(|| t.emoji_id.clone()),
                    })
                    .collect()
            }),
        }
    }
}

pub struct ListChannelsTool;

#[async_trait]
impl Tool for ListChannelsTool {
    fn name(&self) -> &str {
        "list_channels"
    }

    fn description(&self) -> &str {
        "List the channels of a Discord guild with type, category, archive and \
         privacy filters, sorting and optional permissions and statistics."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "guildId": {
                    "type": "string",
                    "description": "ID of the guild"
                },
                "channelTypes": {
                    "type": "array",
                    "items": { "type": "string", "enum": ChannelTypeTag::names() },
                    "description": "Only these channel types. \"thread\" matches every thread kind."
                },
                "includeArchived": { "type": "boolean", "default": false },
                "includePrivate": { "type": "boolean", "default": false },
                "categoryId": {
                    "type": "string",
                    "description": "Only channels under this category"
                },
                "sortBy": {
                    "type": "string",
                    "enum": ["name", "position", "created"],
                    "default": "position"
                },
                "includePermissions": { "type": "boolean", "default": false },
                "includeTopic": { "type": "boolean", "default": true },
                "includeStats": { "type": "boolean", "default": false }
            },
            "required": ["guildId"]
        })
    }

    async fn execute(&self, platform: &dyn Platform, arguments: Value) -> Result<String, BridgeError> {
        let request = ListChannelsRequest::parse(&arguments)?;

        let guild = match platform.fetch_guild(&request.guild_id).await {
            Ok(guild) => guild,
            Err(e) if e.is_not_found() => {
                return Err(BridgeError::invalid_request(format!(
                    "Guild {} not found",
                    request.guild_id
                )))
            }
            Err(e) => return Err(BridgeError::platform("fetch guild")(e)),
        };

        let channels = platform
            .guild_channels(&guild.id)
            .await
            .map_err(BridgeError::platform("list channels"))?;
        let names: HashMap<&str, &str> = channels
            .iter()
            .filter_map(|c| Some((c.id.as_str(), c.name.as_deref()?)))
            .collect();

        let selected = request.select(&channels);
        debug!(guild = %guild.id, total = channels.len(), selected = selected.len(), "Listing channels");

        let mut views = Vec::with_capacity(selected.len());
        for channel in &selected {
            let mut view = ChannelView::project(channel, &names, &request);

            if request.include_permissions {
                let permissions = platform
                    .permissions_for_self(channel)
                    .await
                    .map_err(BridgeError::platform("resolve permissions"))?;
                view.permissions = Some(permissions);
            }

            if request.include_stats && is_voice(channel.kind) {
                let occupancy = platform.voice_occupancy(&guild.id, &channel.id).await;
                view.stats = Some(ChannelStats {
                    member_count: Some(occupancy as u64),
                    ..Default::default()
                });
            }

            views.push(view);
        }

        pretty_json(&views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discord_platform::{ForumTag, ThreadMetadata};

    fn channel(id: &str, kind: ChannelKind, name: &str) -> Channel {
        Channel {
            id: id.into(),
            kind,
            guild_id: Some("1".into()),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    fn thread(id: &str, kind: ChannelKind, parent: &str, archived: bool) -> Channel {
        Channel {
            parent_id: Some(parent.into()),
            thread_metadata: Some(ThreadMetadata {
                archived,
                ..Default::default()
            }),
            ..channel(id, kind, id)
        }
    }

    fn request(arguments: Value) -> ListChannelsRequest {
        ListChannelsRequest::parse(&arguments).unwrap()
    }

    fn ids(channels: &[Channel]) -> Vec<&str> {
        channels.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_defaults() {
        let req = request(json!({"guildId": "1"}));
        assert_eq!(req.sort_by, SortBy::Position);
        assert!(req.include_topic);
        assert!(!req.include_stats);
        assert!(!req.include_archived);
        assert_eq!(req.channel_types, None);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let errors =
            ListChannelsRequest::parse(&json!({"guildId": "1", "channelTypes": ["dm"], "sortBy": "size"}))
                .unwrap_err();
        let fields: Vec<_> = errors.fields().collect();
        assert_eq!(fields, vec!["channelTypes[0]", "sortBy"]);
    }

    #[test]
    fn test_thread_type_matches_all_thread_kinds() {
        let channels = vec![
            channel("10", ChannelKind::GuildText, "general"),
            thread("11", ChannelKind::PublicThread, "10", false),
            thread("12", ChannelKind::AnnouncementThread, "10", false),
            thread("13", ChannelKind::PrivateThread, "10", false),
        ];
        let req = request(json!({
            "guildId": "1", "channelTypes": ["thread"], "includePrivate": true, "sortBy": "created"
        }));
        assert_eq!(ids(&req.select(&channels)), vec!["11", "12", "13"]);
    }

    #[test]
    fn test_archive_and_private_filters() {
        let channels = vec![
            thread("11", ChannelKind::PublicThread, "10", true),
            thread("12", ChannelKind::PrivateThread, "10", false),
            thread("13", ChannelKind::PublicThread, "10", false),
        ];

        let default = request(json!({"guildId": "1", "sortBy": "created"}));
        assert_eq!(ids(&default.select(&channels)), vec!["13"]);

        let all = request(json!({
            "guildId": "1", "sortBy": "created", "includeArchived": true, "includePrivate": true
        }));
        assert_eq!(ids(&all.select(&channels)), vec!["11", "12", "13"]);
    }

    #[test]
    fn test_category_filter_keeps_unparented() {
        let channels = vec![
            channel("5", ChannelKind::GuildCategory, "Text"),
            Channel {
                parent_id: Some("5".into()),
                ..channel("6", ChannelKind::GuildText, "a")
            },
            Channel {
                parent_id: Some("7".into()),
                ..channel("8", ChannelKind::GuildText, "b")
            },
        ];
        let req = request(json!({"guildId": "1", "categoryId": "5", "sortBy": "created"}));
        assert_eq!(ids(&req.select(&channels)), vec!["5", "6"]);
    }

    #[test]
    fn test_name_sort_is_case_insensitive() {
        let channels = vec![
            channel("1", ChannelKind::GuildText, "beta"),
            channel("2", ChannelKind::GuildText, "Alpha"),
            channel("3", ChannelKind::GuildText, "alpha-2"),
            channel("4", ChannelKind::GuildText, "Gamma"),
        ];
        let req = request(json!({"guildId": "1", "sortBy": "name"}));
        assert_eq!(ids(&req.select(&channels)), vec!["2", "3", "1", "4"]);
    }

    #[test]
    fn test_position_sort_puts_missing_last() {
        let channels = vec![
            Channel {
                position: None,
                ..channel("1", ChannelKind::GuildText, "a")
            },
            Channel {
                position: Some(2),
                ..channel("2", ChannelKind::GuildText, "b")
            },
            Channel {
                position: Some(0),
                ..channel("3", ChannelKind::GuildText, "c")
            },
        ];
        let req = request(json!({"guildId": "1"}));
        assert_eq!(ids(&req.select(&channels)), vec!["3", "2", "1"]);
    }

    #[test]
    fn test_projection_sections() {
        let forum = Channel {
            topic: Some("Ask here".into()),
            default_auto_archive_duration: Some(1440),
            available_tags: vec![ForumTag {
                id: "t1".into(),
                name: "bug".into(),
                emoji_name: Some("🐛".into()),
                ..Default::default()
            }],
            parent_id: Some("5".into()),
            bitrate: Some(64000),
            ..channel("175928847299117063", ChannelKind::GuildForum, "help")
        };
        let mut names = HashMap::new();
        names.insert("5", "Support");

        let req = request(json!({"guildId": "1", "includeTopic": false}));
        let value = serde_json::to_value(ChannelView::project(&forum, &names, &req)).unwrap();

        assert_eq!(value["type"], "forum");
        assert_eq!(value["createdAt"], "2016-04-30T11:18:25.796Z");
        assert_eq!(value["parent"], json!({"id": "5", "name": "Support"}));
        assert!(value.get("topic").is_none());
        assert!(value.get("bitrate").is_none());
        assert_eq!(value["defaultAutoArchiveDuration"], 1440);
        assert_eq!(value["availableTags"][0]["emoji"], "🐛");
    }
}
