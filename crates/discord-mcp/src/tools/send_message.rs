//! `send_message`: post a message, optionally with embeds, to a text channel

use super::resolve_text_channel;
use crate::error::BridgeError;
use crate::tool_registry::Tool;
use crate::validation::{ArgReader, ValidationErrors};
use async_trait::async_trait;
use chrono::DateTime;
use discord_platform::model::message_flags;
use discord_platform::{
    AllowedMentions, CreateMessage, Embed, EmbedAuthor, EmbedField, EmbedFooter, EmbedMedia,
    MessageReference, Platform,
};
use serde_json::{json, Value};
use tracing::{debug, info};

const MAX_COLOR: u64 = 0xFF_FFFF;

const MENTION_TYPES: &[(&str, &str)] = &[
    ("everyone", "everyone"),
    ("roles", "roles"),
    ("users", "users"),
];

/// Validated `send_message` arguments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendMessageRequest {
    pub channel_id: String,
    pub content: Option<String>,
    pub reply_to: Option<String>,
    pub tts: bool,
    pub suppress_embeds: bool,
    pub suppress_notifications: bool,
    pub embeds: Vec<Embed>,
    pub allowed_mentions: Option<AllowedMentions>,
}

impl SendMessageRequest {
    pub fn parse(arguments: &Value) -> Result<Self, ValidationErrors> {
        let mut args = ArgReader::new(arguments);

        let channel_id = args.required_id("channelId");
        let content = args.optional_text("content");
        let reply_to = args.optional_id("replyTo");
        let tts = args.bool_or("tts", false);
        let suppress_embeds = args.bool_or("suppressEmbeds", false);
        let suppress_notifications = args.bool_or("suppressNotifications", false);

        let mut embeds = Vec::new();
        if let Some(items) = args.optional_array("embeds") {
            for (i, item) in items.iter().enumerate() {
                let mut reader = args.nested(item, &format!("embeds[{}]", i));
                let embed = parse_embed(&mut reader);
                args.absorb(reader);
                embeds.extend(embed);
            }
        }

        let allowed_mentions = args.object("allowedMentions").map(|mut reader| {
            let mentions = AllowedMentions {
                parse: reader
                    .optional_choices("parse", MENTION_TYPES)
                    .map(|kinds| kinds.into_iter().map(String::from).collect()),
                roles: reader.optional_string_array("roles"),
                users: reader.optional_string_array("users"),
                replied_user: reader.optional_bool("repliedUser"),
            };
            args.absorb(reader);
            mentions
        });

        args.finish()?;
        Ok(Self {
            channel_id,
            content,
            reply_to,
            tts,
            suppress_embeds,
            suppress_notifications,
            embeds,
            allowed_mentions,
        })
    }

    pub fn flags(&self) -> Option<u64> {
        let mut flags = 0;
        if self.suppress_embeds {
            flags |= message_flags::SUPPRESS_EMBEDS;
        }
        if self.suppress_notifications {
            flags |= message_flags::SUPPRESS_NOTIFICATIONS;
        }
        (flags != 0).then_some(flags)
    }

    /// Outgoing body. A stale `replyTo` does not fail the send.
    pub fn to_payload(&self) -> CreateMessage {
        CreateMessage {
            content: self.content.clone(),
            tts: self.tts,
            embeds: self.embeds.clone(),
            allowed_mentions: self.allowed_mentions.clone(),
            message_reference: self.reply_to.as_ref().map(|id| MessageReference {
                message_id: id.clone(),
                fail_if_not_exists: false,
            }),
            flags: self.flags(),
        }
    }
}

fn parse_embed(reader: &mut ArgReader<'_>) -> Option<Embed> {
    let title = reader.optional_text("title");
    let description = reader.optional_text("description");
    let url = reader.optional_text("url");
    let color = reader
        .optional_int("color", 0, MAX_COLOR)
        .map(|c| c as u32);

    let timestamp = reader.optional_text("timestamp");
    if let Some(ts) = &timestamp {
        if DateTime::parse_from_rfc3339(ts).is_err() {
            reader.error("timestamp", "must be an ISO 8601 timestamp");
        }
    }

    let mut fields = Vec::new();
    if let Some(items) = reader.optional_array("fields") {
        for (i, item) in items.iter().enumerate() {
            let mut field = reader.nested(item, &format!("fields[{}]", i));
            let name = field.required_text("name");
            let value = field.required_text("value");
            let inline = field.optional_bool("inline");
            reader.absorb(field);
            fields.push(EmbedField {
                name,
                value,
                inline,
            });
        }
    }

    let author = reader.object("author").and_then(|mut author| {
        let name = author.required_text("name");
        let url = author.optional_text("url");
        let icon_url = author.optional_text("iconUrl");
        reader.absorb(author);
        (!name.is_empty()).then(|| EmbedAuthor {
            name,
            url,
            icon_url,
        })
    });

    let thumbnail = media(reader, "thumbnail");
    let image = media(reader, "image");

    let footer = reader.object("footer").and_then(|mut footer| {
        let text = footer.required_text("text");
        let icon_url = footer.optional_text("iconUrl");
        reader.absorb(footer);
        (!text.is_empty()).then(|| EmbedFooter { text, icon_url })
    });

    let embed = Embed {
        title,
        description,
        url,
        color,
        timestamp,
        fields,
        author,
        thumbnail,
        image,
        footer,
    };

    if embed == Embed::default() {
        reader.error("", "embed must set at least one field");
        return None;
    }
    Some(embed)
}

fn media(reader: &mut ArgReader<'_>, field: &str) -> Option<EmbedMedia> {
    let mut media = reader.object(field)?;
    let url = media.required_text("url");
    reader.absorb(media);
    (!url.is_empty()).then_some(EmbedMedia { url })
}

pub struct SendMessageTool;

#[async_trait]
impl Tool for SendMessageTool {
    fn name(&self) -> &str {
        "send_message"
    }

    fn description(&self) -> &str {
        "Send a message to a Discord channel. Supports replies, embeds, TTS, \
         notification and embed suppression, and mention controls."
    }

    fn input_schema(&self) -> Value {
        let media = json!({
            "type": "object",
            "properties": { "url": { "type": "string" } },
            "required": ["url"]
        });

        json!({
            "type": "object",
            "properties": {
                "channelId": {
                    "type": "string",
                    "description": "ID of the channel to send to"
                },
                "content": {
                    "type": "string",
                    "description": "Message text. Required unless embeds are given."
                },
                "replyTo": {
                    "type": "string",
                    "description": "ID of a message to reply to"
                },
                "tts": { "type": "boolean", "default": false },
                "suppressEmbeds": { "type": "boolean", "default": false },
                "suppressNotifications": { "type": "boolean", "default": false },
                "embeds": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "description": { "type": "string" },
                            "url": { "type": "string" },
                            "color": { "type": "integer", "minimum": 0, "maximum": MAX_COLOR },
                            "timestamp": {
                                "type": "string",
                                "description": "ISO 8601 timestamp"
                            },
                            "fields": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "properties": {
                                        "name": { "type": "string" },
                                        "value": { "type": "string" },
                                        "inline": { "type": "boolean" }
                                    },
                                    "required": ["name", "value"]
                                }
                            },
                            "author": {
                                "type": "object",
                                "properties": {
                                    "name": { "type": "string" },
                                    "url": { "type": "string" },
                                    "iconUrl": { "type": "string" }
                                },
                                "required": ["name"]
                            },
                            "thumbnail": media.clone(),
                            "image": media,
                            "footer": {
                                "type": "object",
                                "properties": {
                                    "text": { "type": "string" },
                                    "iconUrl": { "type": "string" }
                                },
                                "required": ["text"]
                            }
                        }
                    }
                },
                "allowedMentions": {
                    "type": "object",
                    "properties": {
                        "parse": {
                            "type": "array",
                            "items": { "type": "string", "enum": ["everyone", "roles", "users"] }
                        },
                        "roles": { "type": "array", "items": { "type": "string" } },
                        "users": { "type": "array", "items": { "type": "string" } },
                        "repliedUser": { "type": "boolean" }
                    }
                }
            },
            "required": ["channelId"]
        })
    }

    async fn execute(&self, platform: &dyn Platform, arguments: Value) -> Result<String, BridgeError> {
        let request = SendMessageRequest::parse(&arguments)?;
        let channel = resolve_text_channel(platform, &request.channel_id).await?;

        if request.content.is_none() && request.embeds.is_empty() {
            return Err(BridgeError::invalid_request(
                "Message must have content or at least one embed",
            ));
        }

        let payload = request.to_payload();
        debug!(channel = %channel.id, embeds = payload.embeds.len(), "Sending message");

        let message = platform
            .send_message(&channel.id, &payload)
            .await
            .map_err(BridgeError::platform("send message"))?;

        info!(channel = %channel.id, message = %message.id, "Message sent");
        Ok(format!(
            "Message sent successfully to channel {}. Message ID: {}",
            channel.id, message.id
        ))
    }
}
