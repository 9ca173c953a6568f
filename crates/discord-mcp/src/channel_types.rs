//! Channel type tags
//!
//! The one table that maps request-facing type names to Discord channel
//! kinds. `list_channels` consults it for the `channelTypes` filter, the
//! `type` field of its output and the enum in its input schema.

use discord_platform::ChannelKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelTypeTag {
    Text,
    Voice,
    Category,
    News,
    Stage,
    Forum,
    Media,
    Thread,
}

/// Name and member kinds of every tag, in schema order
pub const CHANNEL_TYPES: &[(&str, ChannelTypeTag, &[ChannelKind])] = &[
    ("text", ChannelTypeTag::Text, &[ChannelKind::GuildText]),
    ("voice", ChannelTypeTag::Voice, &[ChannelKind::GuildVoice]),
    ("category", ChannelTypeTag::Category, &[ChannelKind::GuildCategory]),
    ("news", ChannelTypeTag::News, &[ChannelKind::GuildAnnouncement]),
    ("stage", ChannelTypeTag::Stage, &[ChannelKind::GuildStageVoice]),
    ("forum", ChannelTypeTag::Forum, &[ChannelKind::GuildForum]),
    ("media", ChannelTypeTag::Media, &[ChannelKind::GuildMedia]),
    (
        "thread",
        ChannelTypeTag::Thread,
        &[
            ChannelKind::AnnouncementThread,
            ChannelKind::PublicThread,
            ChannelKind::PrivateThread,
        ],
    ),
];

impl ChannelTypeTag {
    /// Tag a Discord channel kind resolves to, if any
    pub fn of(kind: ChannelKind) -> Option<Self> {
        CHANNEL_TYPES
            .iter()
            .find(|(_, _, kinds)| kinds.contains(&kind))
            .map(|(_, tag, _)| *tag)
    }

    pub fn name(self) -> &'static str {
        CHANNEL_TYPES
            .iter()
            .find(|(_, tag, _)| *tag == self)
            .map_or("unknown", |(name, _, _)| *name)
    }

    pub fn matches(self, kind: ChannelKind) -> bool {
        Self::of(kind) == Some(self)
    }

    /// `(name, tag)` pairs for argument parsing
    pub fn choices() -> Vec<(&'static str, ChannelTypeTag)> {
        CHANNEL_TYPES.iter().map(|(name, tag, _)| (*name, *tag)).collect()
    }

    pub fn names() -> Vec<&'static str> {
        CHANNEL_TYPES.iter().map(|(name, _, _)| *name).collect()
    }
}

/// Output `type` of a channel
pub fn type_label(kind: ChannelKind) -> &'static str {
    match ChannelTypeTag::of(kind) {
        Some(tag) => tag.name(),
        None if kind.is_thread() => "thread",
        None => "unknown",
    }
}
