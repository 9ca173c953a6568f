//! Effective Permission Resolution
//!
//! Computes what the acting identity may do in a channel:
//!
//! 1. Guild owner → everything
//! 2. Base = `@everyone` role ∪ member roles
//! 3. `ADMINISTRATOR` in base → everything
//! 4. Channel overwrites: `@everyone`, then all member roles (deny, then allow), then the member
//!
//! Threads inherit the overwrites of their parent channel; callers pass the
//! parent's overwrites in that case.

use crate::model::{PermissionOverwrite, Role, OVERWRITE_MEMBER, OVERWRITE_ROLE};
use serde::Serialize;

pub const ADMINISTRATOR: u64 = 1 << 3;
pub const MANAGE_CHANNELS: u64 = 1 << 4;
pub const ADD_REACTIONS: u64 = 1 << 6;
pub const VIEW_CHANNEL: u64 = 1 << 10;
pub const SEND_MESSAGES: u64 = 1 << 11;
pub const MANAGE_MESSAGES: u64 = 1 << 13;
pub const EMBED_LINKS: u64 = 1 << 14;
pub const ATTACH_FILES: u64 = 1 << 15;
pub const READ_MESSAGE_HISTORY: u64 = 1 << 16;
pub const MENTION_EVERYONE: u64 = 1 << 17;
pub const CONNECT: u64 = 1 << 20;
pub const SPEAK: u64 = 1 << 21;
pub const SEND_MESSAGES_IN_THREADS: u64 = 1 << 38;

pub const ALL: u64 = u64::MAX;

/// Inputs for a permission computation in one guild channel
#[derive(Debug, Clone, Copy)]
pub struct PermissionContext<'a> {
    pub guild_id: &'a str,
    pub owner_id: Option<&'a str>,
    pub user_id: &'a str,
    pub member_roles: &'a [String],
    pub guild_roles: &'a [Role],
    pub overwrites: &'a [PermissionOverwrite],
}

/// Guild-level permissions before channel overwrites.
pub fn base_permissions(ctx: &PermissionContext<'_>) -> u64 {
    if ctx.owner_id == Some(ctx.user_id) {
        return ALL;
    }

    // The @everyone role shares the guild id
    let mut perms = ctx
        .guild_roles
        .iter()
        .find(|r| r.id == ctx.guild_id)
        .map(|r| r.permissions)
        .unwrap_or(0);

    for role in ctx.guild_roles {
        if ctx.member_roles.iter().any(|id| *id == role.id) {
            perms |= role.permissions;
        }
    }

    if perms & ADMINISTRATOR == ADMINISTRATOR {
        return ALL;
    }
    perms
}

/// Effective permissions in the channel the overwrites belong to.
pub fn compute_permissions(ctx: &PermissionContext<'_>) -> u64 {
    let base = base_permissions(ctx);
    if base == ALL {
        return ALL;
    }

    let mut perms = base;

    if let Some(everyone) = ctx
        .overwrites
        .iter()
        .find(|o| o.kind == OVERWRITE_ROLE && o.id == ctx.guild_id)
    {
        perms &= !everyone.deny;
        perms |= everyone.allow;
    }

    let (mut allow, mut deny) = (0u64, 0u64);
    for overwrite in ctx
        .overwrites
        .iter()
        .filter(|o| o.kind == OVERWRITE_ROLE && ctx.member_roles.iter().any(|id| *id == o.id))
    {
        allow |= overwrite.allow;
        deny |= overwrite.deny;
    }
    perms &= !deny;
    perms |= allow;

    if let Some(member) = ctx
        .overwrites
        .iter()
        .find(|o| o.kind == OVERWRITE_MEMBER && o.id == ctx.user_id)
    {
        perms &= !member.deny;
        perms |= member.allow;
    }

    perms
}

/// Named view of a permission bitset for the acting identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSummary {
    pub view_channel: bool,
    pub send_messages: bool,
    pub send_messages_in_threads: bool,
    pub read_message_history: bool,
    pub manage_messages: bool,
    pub manage_channels: bool,
    pub embed_links: bool,
    pub attach_files: bool,
    pub add_reactions: bool,
    pub mention_everyone: bool,
    pub connect: bool,
    pub speak: bool,
}

impl From<u64> for PermissionSummary {
    fn from(bits: u64) -> Self {
        let has = |flag: u64| bits & flag == flag;
        Self {
            view_channel: has(VIEW_CHANNEL),
            send_messages: has(SEND_MESSAGES),
            send_messages_in_threads: has(SEND_MESSAGES_IN_THREADS),
            read_message_history: has(READ_MESSAGE_HISTORY),
            manage_messages: has(MANAGE_MESSAGES),
            manage_channels: has(MANAGE_CHANNELS),
            embed_links: has(EMBED_LINKS),
            attach_files: has(ATTACH_FILES),
            add_reactions: has(ADD_REACTIONS),
            mention_everyone: has(MENTION_EVERYONE),
            connect: has(CONNECT),
            speak: has(SPEAK),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(id: &str, permissions: u64) -> Role {
        Role {
            id: id.into(),
            name: id.into(),
            permissions,
            position: 0,
        }
    }

    fn overwrite(id: &str, kind: u8, allow: u64, deny: u64) -> PermissionOverwrite {
        PermissionOverwrite {
            id: id.into(),
            kind,
            allow,
            deny,
        }
    }

    #[test]
    fn test_owner_has_everything() {
        let ctx = PermissionContext {
            guild_id: "g",
            owner_id: Some("me"),
            user_id: "me",
            member_roles: &[],
            guild_roles: &[],
            overwrites: &[overwrite("g", OVERWRITE_ROLE, 0, VIEW_CHANNEL)],
        };
        assert_eq!(compute_permissions(&ctx), ALL);
    }

    #[test]
    fn test_administrator_bypasses_overwrites() {
        let roles = vec![role("g", VIEW_CHANNEL), role("admin", ADMINISTRATOR)];
        let member_roles = vec!["admin".to_string()];
        let overwrites = vec![overwrite("g", OVERWRITE_ROLE, 0, VIEW_CHANNEL)];
        let ctx = PermissionContext {
            guild_id: "g",
            owner_id: Some("owner"),
            user_id: "me",
            member_roles: &member_roles,
            guild_roles: &roles,
            overwrites: &overwrites,
        };
        assert_eq!(compute_permissions(&ctx), ALL);
    }

    #[test]
    fn test_overwrite_order() {
        let roles = vec![
            role("g", VIEW_CHANNEL | SEND_MESSAGES),
            role("mod", MANAGE_MESSAGES),
        ];
        let member_roles = vec!["mod".to_string()];
        let overwrites = vec![
            // @everyone cannot send here
            overwrite("g", OVERWRITE_ROLE, 0, SEND_MESSAGES),
            // mods can again
            overwrite("mod", OVERWRITE_ROLE, SEND_MESSAGES, 0),
            // but this member may not add reactions
            overwrite("me", OVERWRITE_MEMBER, 0, ADD_REACTIONS),
        ];
        let ctx = PermissionContext {
            guild_id: "g",
            owner_id: None,
            user_id: "me",
            member_roles: &member_roles,
            guild_roles: &roles,
            overwrites: &overwrites,
        };

        let perms = PermissionSummary::from(compute_permissions(&ctx));
        assert!(perms.view_channel);
        assert!(perms.send_messages);
        assert!(perms.manage_messages);
        assert!(!perms.add_reactions);
        assert!(!perms.connect);
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let value = serde_json::to_value(PermissionSummary::from(VIEW_CHANNEL)).unwrap();
        assert_eq!(value["viewChannel"], true);
        assert_eq!(value["sendMessages"], false);
    }
}
