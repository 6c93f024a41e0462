//! Key factories of the social network feature domains.
//!
//! Every factory labels its keys and leaves out those whose identifying fields the record lacks, so the same factory
//! serves a full row, a partial descriptor used for invalidation, and an optimistic placeholder.

use crate::cache_key;
use crate::key_factory::{KeyFactory, KeySet};
use crate::matcher::Matcher;
use crate::record::Entity;
use serde_json::Value;

pub const PROFILES: &str = "profiles";
pub const POSTS: &str = "posts";
pub const COMMENTS: &str = "comments";
pub const COMMENT_LIKES: &str = "comment_likes";
pub const GROUPS: &str = "groups";
pub const GROUP_MEMBERS: &str = "group_members";
pub const MESSAGES: &str = "messages";
pub const MATCHES: &str = "matches";

// Identifiers arrive as strings (uuids) or numbers depending on the table.
fn id_of(record: &Entity, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn profile_keys() -> KeyFactory<Entity> {
    KeyFactory::derived(|profile: &Entity| {
        KeySet::labeled([
            ("all", Some(cache_key![PROFILES])),
            ("single", id_of(profile, "id").map(|id| cache_key![PROFILES, id])),
        ])
    })
}

/// Posts live in the paginated feed and in per-author and per-group lists.
pub fn post_keys() -> KeyFactory<Entity> {
    KeyFactory::derived(|post: &Entity| {
        KeySet::labeled([
            ("feed", Some(cache_key![POSTS, "feed"])),
            ("single", id_of(post, "id").map(|id| cache_key![POSTS, id])),
            ("by_author", id_of(post, "author_id").map(|a| cache_key![POSTS, "author", a])),
            ("by_group", id_of(post, "group_id").map(|g| cache_key![POSTS, "group", g])),
        ])
    })
}

pub fn comment_keys() -> KeyFactory<Entity> {
    KeyFactory::derived(|comment: &Entity| {
        KeySet::labeled([
            ("by_post", id_of(comment, "post_id").map(|p| cache_key![COMMENTS, p])),
            ("single", id_of(comment, "id").map(|id| cache_key![COMMENTS, "single", id])),
        ])
    })
}

pub fn comment_like_keys() -> KeyFactory<Entity> {
    KeyFactory::derived(|like: &Entity| {
        KeySet::labeled([("by_comment", id_of(like, "comment_id").map(|c| cache_key![COMMENT_LIKES, c]))])
    })
}

/// A like is identified by who liked what; the row id only exists once the backend confirms it.
pub fn comment_like_matcher() -> Matcher<Entity> {
    Matcher::by_fields(["comment_id", "profile_id"])
}

pub fn group_keys() -> KeyFactory<Entity> {
    KeyFactory::derived(|group: &Entity| {
        KeySet::labeled([
            ("all", Some(cache_key![GROUPS])),
            ("single", id_of(group, "id").map(|id| cache_key![GROUPS, id])),
        ])
    })
}

pub fn group_member_keys() -> KeyFactory<Entity> {
    KeyFactory::derived(|member: &Entity| {
        KeySet::labeled([
            ("by_group", id_of(member, "group_id").map(|g| cache_key![GROUP_MEMBERS, g])),
            ("by_profile", id_of(member, "profile_id").map(|p| cache_key![GROUP_MEMBERS, "profile", p])),
        ])
    })
}

pub fn group_member_matcher() -> Matcher<Entity> {
    Matcher::by_fields(["group_id", "profile_id"])
}

/// Chat history is paginated per chat, newest page first.
pub fn message_keys() -> KeyFactory<Entity> {
    KeyFactory::derived(|message: &Entity| {
        KeySet::labeled([
            ("by_chat", id_of(message, "chat_id").map(|c| cache_key![MESSAGES, c])),
            ("single", id_of(message, "id").map(|id| cache_key![MESSAGES, "single", id])),
        ])
    })
}

pub fn match_keys() -> KeyFactory<Entity> {
    KeyFactory::derived(|candidate: &Entity| {
        KeySet::labeled([("by_profile", id_of(candidate, "profile_id").map(|p| cache_key![MATCHES, p]))])
    })
}
