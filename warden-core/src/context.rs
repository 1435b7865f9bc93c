use std::cmp::Reverse;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use twilight_model::application::interaction::application_command::CommandDataOption;
use twilight_model::guild::Permissions;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, RoleMarker, UserMarker};

use crate::command::Command;
use crate::command::arguments::Arguments;

/// Where an invocation came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    RawMessage,
    Interaction,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleData {
    pub id: Id<RoleMarker>,
    /// Position in the guild's role hierarchy. Higher is more senior.
    pub position: i64,
}

/// Guild membership of the invoking user, resolved by the host before dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberData {
    pub roles: Vec<RoleData>,
    pub permissions: Permissions,
}

impl MemberData {
    /// The most senior role. Equal positions are ordered by ID, lower IDs being more senior.
    pub fn highest_role(&self) -> Option<&RoleData> {
        self.roles.iter().max_by_key(|role| (role.position, Reverse(role.id)))
    }

    pub fn has_role(&self, id: Id<RoleMarker>) -> bool {
        self.roles.iter().any(|role| role.id == id)
    }
}

/// Who invoked a command, and where.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Origin {
    pub author_id: Id<UserMarker>,
    pub guild_id: Option<Id<GuildMarker>>,
    pub channel_id: Id<ChannelMarker>,
    /// The category the channel is filed under, if any.
    pub category_id: Option<Id<ChannelMarker>>,
    pub member: Option<MemberData>,
    pub channel_age_restricted: bool,
}

impl Origin {
    pub fn new(author_id: Id<UserMarker>, channel_id: Id<ChannelMarker>) -> Self {
        Self {
            author_id,
            guild_id: None,
            channel_id,
            category_id: None,
            member: None,
            channel_age_restricted: false,
        }
    }

    pub fn in_guild(mut self, guild_id: Id<GuildMarker>, member: MemberData) -> Self {
        self.guild_id = Some(guild_id);
        self.member = Some(member);
        self
    }

    pub fn in_category(mut self, category_id: Id<ChannelMarker>) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn age_restricted(mut self, age_restricted: bool) -> Self {
        self.channel_age_restricted = age_restricted;
        self
    }
}

/// The raw input of an invocation, after the command itself has been resolved.
#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    Text {
        prefix: String,
        /// The command path as typed, e.g. `tag create`.
        invoked_with: String,
        /// Everything after the command path.
        remainder: String,
    },
    Structured {
        options: Vec<CommandDataOption>,
    },
}

impl Input {
    pub fn source(&self) -> Source {
        match self {
            Self::Text { .. } => Source::RawMessage,
            Self::Structured { .. } => Source::Interaction,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageBuilder {
    pub content: Option<String>,
    /// Only honoured for interaction responses.
    pub ephemeral: bool,
}

impl MessageBuilder {
    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }
}

impl From<&str> for MessageBuilder {
    fn from(value: &str) -> Self {
        Self {
            content: Some(value.into()),
            ephemeral: false,
        }
    }
}
impl From<String> for MessageBuilder {
    fn from(value: String) -> Self {
        Self {
            content: Some(value),
            ephemeral: false,
        }
    }
}

/// Sends responses for one invocation. Implemented by the host for each event source: a message
/// reply for text invocations, an interaction response for structured ones.
#[async_trait]
pub trait Respond: Send + Sync {
    async fn respond(&self, message: MessageBuilder) -> anyhow::Result<()>;
}

/// Name lookups backed by the host's entity cache or the REST API. Every lookup defaults to "not
/// found".
#[async_trait]
pub trait EntitySource: Send + Sync {
    async fn find_user(
        &self,
        _guild_id: Option<Id<GuildMarker>>,
        _name: &str,
    ) -> anyhow::Result<Option<Id<UserMarker>>> {
        Ok(None)
    }

    async fn find_channel(
        &self,
        _guild_id: Option<Id<GuildMarker>>,
        _name: &str,
    ) -> anyhow::Result<Option<Id<ChannelMarker>>> {
        Ok(None)
    }

    async fn find_role(&self, _guild_id: Id<GuildMarker>, _name: &str) -> anyhow::Result<Option<Id<RoleMarker>>> {
        Ok(None)
    }
}

/// An [`EntitySource`] that never finds anything.
pub struct NoEntities;
impl EntitySource for NoEntities {}

/// One user-triggered attempt to run a command.
///
/// Read-only after creation, apart from the parsed arguments, which are bound once argument
/// parsing succeeds so that post-call hooks can see them.
#[derive(Clone)]
pub struct InvocationContext {
    pub origin: Origin,
    pub command: Arc<Command>,
    pub input: Input,
    responder: Arc<dyn Respond>,
    entities: Arc<dyn EntitySource>,
    arguments: OnceLock<Arguments>,
}

impl InvocationContext {
    pub fn new(
        origin: Origin,
        command: Arc<Command>,
        input: Input,
        responder: Arc<dyn Respond>,
        entities: Arc<dyn EntitySource>,
    ) -> Self {
        Self {
            origin,
            command,
            input,
            responder,
            entities,
            arguments: OnceLock::new(),
        }
    }

    pub fn source(&self) -> Source {
        self.input.source()
    }

    pub fn author_id(&self) -> Id<UserMarker> {
        self.origin.author_id
    }

    pub fn guild_id(&self) -> Option<Id<GuildMarker>> {
        self.origin.guild_id
    }

    pub fn channel_id(&self) -> Id<ChannelMarker> {
        self.origin.channel_id
    }

    pub fn member(&self) -> Option<&MemberData> {
        self.origin.member.as_ref()
    }

    pub fn entities(&self) -> &dyn EntitySource {
        &*self.entities
    }

    pub async fn reply(&self, builder: impl Into<MessageBuilder>) -> anyhow::Result<()> {
        self.responder.respond(builder.into()).await
    }

    /// The parsed arguments, once argument parsing has succeeded.
    pub fn arguments(&self) -> Option<&Arguments> {
        self.arguments.get()
    }

    pub(crate) fn bind_arguments(&self, arguments: Arguments) {
        let _ = self.arguments.set(arguments);
    }
}

impl std::fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationContext")
            .field("origin", &self.origin)
            .field("command", &self.command.qualified_name())
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_role_prefers_position_then_lower_id() {
        let member = MemberData {
            roles: vec![
                RoleData { id: Id::new(30), position: 2 },
                RoleData { id: Id::new(10), position: 5 },
                RoleData { id: Id::new(20), position: 5 },
            ],
            permissions: Permissions::empty(),
        };

        assert_eq!(member.highest_role().map(|r| r.id), Some(Id::new(10)));
        assert!(member.has_role(Id::new(30)));
        assert!(!member.has_role(Id::new(40)));

        let no_roles = MemberData {
            roles: vec![],
            permissions: Permissions::empty(),
        };
        assert_eq!(no_roles.highest_role(), None);
    }

    #[tokio::test]
    async fn arguments_bind_once() {
        let ctxt = crate::testing::context(crate::testing::origin());
        assert!(ctxt.arguments().is_none());

        let mut first = Arguments::new();
        first.push("a", Some(1i64.into()));
        ctxt.bind_arguments(first.clone());
        ctxt.bind_arguments(Arguments::new());

        assert_eq!(ctxt.arguments(), Some(&first));
        assert_eq!(ctxt.source(), Source::RawMessage);
    }
}
