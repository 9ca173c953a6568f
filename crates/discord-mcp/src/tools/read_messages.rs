//! `read_messages`: fetch recent messages from a text channel

use super::{pretty_json, resolve_text_channel, snowflake_key};
use crate::error::BridgeError;
use crate::tool_registry::Tool;
use crate::validation::{ArgReader, ValidationErrors};
use async_trait::async_trait;
use discord_platform::{Embed, Message, MessageQuery, Platform};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

pub const DEFAULT_LIMIT: u8 = 10;
pub const MAX_LIMIT: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

const SORT_ORDERS: &[(&str, SortOrder)] = &[("asc", SortOrder::Asc), ("desc", SortOrder::Desc)];

/// Validated `read_messages` arguments
#[derive(Debug, Clone, PartialEq)]
pub struct ReadMessagesRequest {
    pub channel_id: String,
    pub query: MessageQuery,
    pub author_id: Option<String>,
    pub include_content: bool,
    pub include_embeds: bool,
    pub include_reactions: bool,
    pub sort_order: SortOrder,
}

impl ReadMessagesRequest {
    pub fn parse(arguments: &Value) -> Result<Self, ValidationErrors> {
        let mut args = ArgReader::new(arguments);

        let channel_id = args.required_id("channelId");
        let limit = args
            .optional_int("limit", 1, MAX_LIMIT as u64)
            .map_or(DEFAULT_LIMIT, |n| n as u8);
        let query = MessageQuery {
            limit,
            before: args.optional_id("before"),
            after: args.optional_id("after"),
            around: args.optional_id("around"),
        };
        let author_id = args.optional_id("authorId");
        let include_content = args.bool_or("includeContent", true);
        let include_embeds = args.bool_or("includeEmbeds", false);
        let include_reactions = args.bool_or("includeReactions", false);
        let sort_order = args.choice("sortOrder", SORT_ORDERS, SortOrder::Desc);

        args.finish()?;
        Ok(Self {
            channel_id,
            query,
            author_id,
            include_content,
            include_embeds,
            include_reactions,
            sort_order,
        })
    }

    /// Filter, order and project fetched messages. Never backfills.
    pub fn render(&self, mut messages: Vec<Message>) -> Vec<MessageView> {
        if let Some(author) = &self.author_id {
            messages.retain(|m| &m.author.id == author);
        }

        messages.sort_by_key(|m| std::cmp::Reverse(snowflake_key(&m.id)));
        if self.sort_order == SortOrder::Asc {
            messages.reverse();
        }

        messages
            .into_iter()
            .take(self.query.limit as usize)
            .map(|m| MessageView::project(m, self))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorView {
    pub id: String,
    pub username: String,
    pub is_bot: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentView {
    pub name: String,
    pub url: String,
    pub size: u64,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReactionView {
    pub emoji: String,
    pub count: u64,
    pub me: bool,
}

/// Transport-safe projection of a Discord message
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub author: AuthorView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub timestamp: String,
    pub edited_timestamp: Option<String>,
    pub attachments: Vec<AttachmentView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeds: Option<Vec<Embed>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reactions: Option<Vec<ReactionView>>,
}

impl MessageView {
    fn project(message: Message, request: &ReadMessagesRequest) -> Self {
        let reactions = message
            .reactions
            .into_iter()
            .map(|r| ReactionView {
                emoji: r.emoji.name.or(r.emoji.id).unwrap_or_default(),
                count: r.count,
                me: r.me,
            })
            .collect::<Vec<_>>();

        Self {
            id: message.id,
            author: AuthorView {
                id: message.author.id,
                username: message.author.username,
                is_bot: message.author.bot,
            },
            content: request.include_content.then_some(message.content),
            timestamp: message.timestamp,
            edited_timestamp: message.edited_timestamp,
            attachments: message
                .attachments
                .into_iter()
                .map(|a| AttachmentView {
                    name: a.filename,
                    url: a.url,
                    size: a.size,
                    content_type: a.content_type,
                })
                .collect(),
            embeds: (request.include_embeds && !message.embeds.is_empty())
                .then_some(message.embeds),
            reactions: (request.include_reactions && !reactions.is_empty()).then_some(reactions),
        }
    }
}

pub struct ReadMessagesTool;

#[async_trait]
impl Tool for ReadMessagesTool {
    fn name(&self) -> &str {
        "read_messages"
    }

    fn description(&self) -> &str {
        "Read recent messages from a Discord channel, with optional anchors, \
         author filter and control over which fields are returned."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channelId": {
                    "type": "string",
                    "description": "ID of the channel to read from"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_LIMIT,
                    "default": DEFAULT_LIMIT
                },
                "before": { "type": "string", "description": "Only messages before this message ID" },
                "after": { "type": "string", "description": "Only messages after this message ID" },
                "around": { "type": "string", "description": "Only messages around this message ID" },
                "authorId": {
                    "type": "string",
                    "description": "Keep only messages by this user. Applied after fetching."
                },
                "includeContent": { "type": "boolean", "default": true },
                "includeEmbeds": { "type": "boolean", "default": false },
                "includeReactions": { "type": "boolean", "default": false },
                "sortOrder": {
                    "type": "string",
                    "enum": ["asc", "desc"],
                    "default": "desc"
                }
            },
            "required": ["channelId"]
        })
    }

    async fn execute(&self, platform: &dyn Platform, arguments: Value) -> Result<String, BridgeError> {
        let request = ReadMessagesRequest::parse(&arguments)?;
        let channel = resolve_text_channel(platform, &request.channel_id).await?;

        let messages = platform
            .fetch_messages(&channel.id, &request.query)
            .await
            .map_err(BridgeError::platform("read messages"))?;
        debug!(channel = %channel.id, fetched = messages.len(), "Fetched messages");

        pretty_json(&request.render(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discord_platform::{Emoji, Reaction, User};

    fn message(id: &str, author: &str) -> Message {
        Message {
            id: id.into(),
            channel_id: "10".into(),
            author: User {
                id: author.into(),
                username: format!("user-{}", author),
                global_name: None,
                bot: false,
            },
            content: format!("message {}", id),
            timestamp: "2024-01-01T00:00:00+00:00".into(),
            edited_timestamp: None,
            attachments: Vec::new(),
            embeds: Vec::new(),
            reactions: Vec::new(),
        }
    }

    #[test]
    fn test_defaults() {
        let request = ReadMessagesRequest::parse(&json!({"channelId": "10"})).unwrap();
        assert_eq!(request.query.limit, DEFAULT_LIMIT);
        assert_eq!(request.query.before, None);
        assert!(request.include_content);
        assert!(!request.include_embeds);
        assert!(!request.include_reactions);
        assert_eq!(request.sort_order, SortOrder::Desc);
    }

    #[test]
    fn test_limit_bounds() {
        for limit in [0, 101] {
            let errors =
                ReadMessagesRequest::parse(&json!({"channelId": "10", "limit": limit})).unwrap_err();
            assert_eq!(errors.0[0].field, "limit");
        }
        let request = ReadMessagesRequest::parse(&json!({"channelId": "10", "limit": 100})).unwrap();
        assert_eq!(request.query.limit, 100);
    }

    #[test]
    fn test_anchors_passed_through_together() {
        let request = ReadMessagesRequest::parse(&json!({
            "channelId": "10", "before": "9", "after": "1", "around": "5"
        }))
        .unwrap();
        assert_eq!(request.query.before.as_deref(), Some("9"));
        assert_eq!(request.query.after.as_deref(), Some("1"));
        assert_eq!(request.query.around.as_deref(), Some("5"));
    }

    #[test]
    fn test_ascending_order() {
        let request =
            ReadMessagesRequest::parse(&json!({"channelId": "10", "sortOrder": "asc"})).unwrap();
        let views = request.render(vec![message("3", "a"), message("1", "a"), message("2", "b")]);
        let ids: Vec<_> = views.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_optional_sections() {
        let mut with_extras = message("5", "a");
        with_extras.embeds.push(Embed {
            title: Some("t".into()),
            ..Default::default()
        });
        with_extras.reactions.push(Reaction {
            count: 2,
            me: true,
            emoji: Emoji {
                id: None,
                name: Some("👍".into()),
            },
        });

        let request = ReadMessagesRequest::parse(&json!({
            "channelId": "10",
            "includeContent": false,
            "includeEmbeds": true,
            "includeReactions": true
        }))
        .unwrap();

        let views = request.render(vec![with_extras, message("4", "a")]);
        let value = serde_json::to_value(&views).unwrap();

        assert!(value[0].get("content").is_none());
        assert_eq!(value[0]["embeds"][0]["title"], "t");
        assert_eq!(value[0]["reactions"][0], json!({"emoji": "👍", "count": 2, "me": true}));
        assert_eq!(value[0]["editedTimestamp"], Value::Null);
        // Nothing to show, so the sections are left out
        assert!(value[1].get("embeds").is_none());
        assert!(value[1].get("reactions").is_none());
    }
}
