use std::any::Any;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use twilight_model::application::interaction::application_command::CommandOptionValue;
use twilight_model::id::Id;
use twilight_model::id::marker::{AttachmentMarker, ChannelMarker, GenericMarker, RoleMarker, UserMarker};

/// The runtime type tag of a command argument.
///
/// Kinds form a small subtype lattice: `Integer <: Number`, `User <: Mentionable` and
/// `Role <: Mentionable`. More relations between custom kinds can be declared on the
/// [`ConverterRegistry`](crate::converter::registry::ConverterRegistry).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArgKind {
    String,
    Integer,
    Number,
    Boolean,
    User,
    Channel,
    Role,
    Mentionable,
    Attachment,
    Duration,
    Custom(&'static str),
}

impl ArgKind {
    /// Direct supertypes that hold for every registry.
    pub fn builtin_supertypes(self) -> &'static [ArgKind] {
        match self {
            Self::Integer => &[Self::Number],
            Self::User | Self::Role => &[Self::Mentionable],
            _ => &[],
        }
    }
}

impl Display for ArgKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::String => "string",
                Self::Integer => "integer",
                Self::Number => "number",
                Self::Boolean => "boolean",
                Self::User => "user",
                Self::Channel => "channel",
                Self::Role => "role",
                Self::Mentionable => "mentionable",
                Self::Attachment => "attachment",
                Self::Duration => "duration",
                Self::Custom(t) => t,
            }
        )
    }
}

/// A parsed argument value. [`ArgValue::kind`] is always the most specific kind of the value.
#[derive(Clone)]
pub enum ArgValue {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    User(Id<UserMarker>),
    Channel(Id<ChannelMarker>),
    Role(Id<RoleMarker>),
    /// A mentionable whose concrete kind is unknown (structured input only).
    Mentionable(Id<GenericMarker>),
    Attachment(Id<AttachmentMarker>),
    Duration(Duration),
    Custom {
        kind: &'static str,
        value: Arc<dyn Any + Send + Sync>,
    },
}

impl ArgValue {
    pub fn custom<T: Any + Send + Sync>(kind: &'static str, value: T) -> Self {
        Self::Custom {
            kind,
            value: Arc::new(value),
        }
    }

    pub fn kind(&self) -> ArgKind {
        match self {
            Self::String(_) => ArgKind::String,
            Self::Integer(_) => ArgKind::Integer,
            Self::Number(_) => ArgKind::Number,
            Self::Boolean(_) => ArgKind::Boolean,
            Self::User(_) => ArgKind::User,
            Self::Channel(_) => ArgKind::Channel,
            Self::Role(_) => ArgKind::Role,
            Self::Mentionable(_) => ArgKind::Mentionable,
            Self::Attachment(_) => ArgKind::Attachment,
            Self::Duration(_) => ArgKind::Duration,
            Self::Custom { kind, .. } => ArgKind::Custom(kind),
        }
    }

    /// Maps a raw structured (interaction) option. Sub-command and autocomplete values have no
    /// argument equivalent.
    pub fn from_option(value: &CommandOptionValue) -> Option<Self> {
        Some(match value {
            CommandOptionValue::String(s) => Self::String(s.clone()),
            CommandOptionValue::Integer(i) => Self::Integer(*i),
            CommandOptionValue::Number(n) => Self::Number(*n),
            CommandOptionValue::Boolean(b) => Self::Boolean(*b),
            CommandOptionValue::User(id) => Self::User(*id),
            CommandOptionValue::Channel(id) => Self::Channel(*id),
            CommandOptionValue::Role(id) => Self::Role(*id),
            CommandOptionValue::Mentionable(id) => Self::Mentionable(*id),
            CommandOptionValue::Attachment(id) => Self::Attachment(*id),
            _ => return None,
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        if let Self::String(s) = self { Some(s) } else { None }
    }

    pub fn as_i64(&self) -> Option<i64> {
        if let Self::Integer(i) = self { Some(*i) } else { None }
    }

    /// Integers widen to numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let Self::Boolean(b) = self { Some(*b) } else { None }
    }

    pub fn as_user(&self) -> Option<Id<UserMarker>> {
        if let Self::User(id) = self { Some(*id) } else { None }
    }

    pub fn as_channel(&self) -> Option<Id<ChannelMarker>> {
        if let Self::Channel(id) = self { Some(*id) } else { None }
    }

    pub fn as_role(&self) -> Option<Id<RoleMarker>> {
        if let Self::Role(id) = self { Some(*id) } else { None }
    }

    /// Any user, role or untyped mentionable, as a generic ID.
    pub fn as_mentionable(&self) -> Option<Id<GenericMarker>> {
        match self {
            Self::User(id) => Some(id.cast()),
            Self::Role(id) => Some(id.cast()),
            Self::Mentionable(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        if let Self::Duration(d) = self { Some(*d) } else { None }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        if let Self::Custom { value, .. } = self {
            value.downcast_ref()
        } else {
            None
        }
    }
}

impl std::fmt::Debug for ArgValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::Integer(i) => f.debug_tuple("Integer").field(i).finish(),
            Self::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Self::Boolean(b) => f.debug_tuple("Boolean").field(b).finish(),
            Self::User(id) => f.debug_tuple("User").field(id).finish(),
            Self::Channel(id) => f.debug_tuple("Channel").field(id).finish(),
            Self::Role(id) => f.debug_tuple("Role").field(id).finish(),
            Self::Mentionable(id) => f.debug_tuple("Mentionable").field(id).finish(),
            Self::Attachment(id) => f.debug_tuple("Attachment").field(id).finish(),
            Self::Duration(d) => f.debug_tuple("Duration").field(d).finish(),
            Self::Custom { kind, .. } => f.debug_struct("Custom").field("kind", kind).finish_non_exhaustive(),
        }
    }
}

impl PartialEq for ArgValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::User(a), Self::User(b)) => a == b,
            (Self::Channel(a), Self::Channel(b)) => a == b,
            (Self::Role(a), Self::Role(b)) => a == b,
            (Self::Mentionable(a), Self::Mentionable(b)) => a == b,
            (Self::Attachment(a), Self::Attachment(b)) => a == b,
            (Self::Duration(a), Self::Duration(b)) => a == b,
            (Self::Custom { kind: ka, value: va }, Self::Custom { kind: kb, value: vb }) => {
                ka == kb && Arc::ptr_eq(va, vb)
            },
            _ => false,
        }
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}
impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}
impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}
impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}
impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}
impl From<Duration> for ArgValue {
    fn from(value: Duration) -> Self {
        Self::Duration(value)
    }
}

/// Parsed arguments of one invocation, in declaration order. Optional parameters that were not
/// supplied and have no default are present with a `None` value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Arguments {
    values: Vec<(String, Option<ArgValue>)>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: Option<ArgValue>) {
        self.values.push((name.into(), value));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&ArgValue>)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value.as_ref()))
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, value)| value.as_ref())
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_str()
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name)?.as_i64()
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name)?.as_f64()
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.get(name)?.as_bool()
    }

    pub fn user(&self, name: &str) -> Option<Id<UserMarker>> {
        self.get(name)?.as_user()
    }

    pub fn channel(&self, name: &str) -> Option<Id<ChannelMarker>> {
        self.get(name)?.as_channel()
    }

    pub fn role(&self, name: &str) -> Option<Id<RoleMarker>> {
        self.get(name)?.as_role()
    }

    pub fn duration(&self, name: &str) -> Option<Duration> {
        self.get(name)?.as_duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_values_keep_their_kind() {
        let value = ArgValue::from_option(&CommandOptionValue::Integer(4)).unwrap();
        assert_eq!(value.kind(), ArgKind::Integer);
        assert_eq!(value.as_f64(), Some(4.0));

        let value = ArgValue::from_option(&CommandOptionValue::User(Id::new(42))).unwrap();
        assert_eq!(value.as_mentionable(), Some(Id::new(42)));
        assert!(ArgValue::from_option(&CommandOptionValue::SubCommand(vec![])).is_none());
    }

    #[test]
    fn custom_values_downcast() {
        #[derive(Debug, PartialEq)]
        struct Colour(u32);

        let value = ArgValue::custom("colour", Colour(0xff00ff));
        assert_eq!(value.kind(), ArgKind::Custom("colour"));
        assert_eq!(value.downcast_ref::<Colour>(), Some(&Colour(0xff00ff)));
        assert_eq!(value.downcast_ref::<u32>(), None);
    }

    #[test]
    fn arguments_lookup_by_name() {
        let mut args = Arguments::new();
        args.push("name", Some("John Doe".into()));
        args.push("loud", Some(true.into()));
        args.push("count", None);

        assert_eq!(args.len(), 3);
        assert_eq!(args.string("name"), Some("John Doe"));
        assert_eq!(args.boolean("loud"), Some(true));
        assert_eq!(args.get("count"), None);
        assert_eq!(args.integer("name"), None);
        assert_eq!(
            args.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            vec!["name", "loud", "count"]
        );
    }
}
