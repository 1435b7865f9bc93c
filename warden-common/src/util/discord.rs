use regex::Regex;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, RoleMarker, UserMarker};

use super::regex::{CHANNEL_MENTION, ROLE_MENTION, SNOWFLAKE, USER_MENTION};

fn capture_id<T>(regex: &Regex, input: &str) -> Option<Id<T>> {
    let captures = regex.captures(input)?;
    Id::new_checked(captures.get(1)?.as_str().parse().ok()?)
}

/// Parses `<@id>` or `<@!id>`.
pub fn user_mention_to_id(input: &str) -> Option<Id<UserMarker>> {
    capture_id(&USER_MENTION, input)
}

/// Parses `<@&id>`.
pub fn role_mention_to_id(input: &str) -> Option<Id<RoleMarker>> {
    capture_id(&ROLE_MENTION, input)
}

/// Parses `<#id>`.
pub fn channel_mention_to_id(input: &str) -> Option<Id<ChannelMarker>> {
    capture_id(&CHANNEL_MENTION, input)
}

/// Parses a bare, non-zero snowflake.
pub fn parse_snowflake<T>(input: &str) -> Option<Id<T>> {
    if !SNOWFLAKE.is_match(input) {
        return None;
    }

    Id::new_checked(input.parse().ok()?)
}

/// Returns the mention of `bot_id` that `content` starts with, if any.
pub fn message_mention_prefix(content: &str, bot_id: u64) -> Option<String> {
    let mention_no_nickname = format!("<@{bot_id}>");
    let mention_nickname = format!("<@!{bot_id}>");

    if content.starts_with(&mention_no_nickname) {
        Some(mention_no_nickname)
    } else if content.starts_with(&mention_nickname) {
        Some(mention_nickname)
    } else {
        None
    }
}
