use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use warden_common::util::discord::{channel_mention_to_id, parse_snowflake, role_mention_to_id, user_mention_to_id};
use warden_common::util::parse_to_millis;

use super::{BasicConverter, Choice, Converter, ConverterRef, ConverterResult, FallbackConverter};
use crate::command::arguments::{ArgKind, ArgValue};
use crate::command::errors::ParsingError;
use crate::context::InvocationContext;
use crate::cursor::TextCursor;

/// Every stock converter, one per built-in kind except attachments, which only structured input
/// can carry.
pub(crate) fn defaults() -> Vec<ConverterRef> {
    vec![
        string(),
        integer(),
        number(),
        boolean(),
        user(),
        channel(),
        role(),
        mentionable(),
        duration(),
    ]
}

pub fn string() -> ConverterRef {
    Arc::new(BasicConverter::new("string", ArgKind::String, |word, _| {
        Ok(Some(word.into()))
    }))
}

pub fn integer() -> ConverterRef {
    Arc::new(BasicConverter::new("integer", ArgKind::Integer, |word, _| {
        Ok(Some(ArgValue::Integer(word.parse()?)))
    }))
}

pub fn number() -> ConverterRef {
    Arc::new(BasicConverter::new("number", ArgKind::Number, |word, _| {
        let number: f64 = word.parse()?;
        if !number.is_finite() {
            return Err(ParsingError::new(format!("'{word}' is not a finite number")));
        }

        Ok(Some(ArgValue::Number(number)))
    }))
}

pub fn boolean() -> ConverterRef {
    Arc::new(BasicConverter::new("boolean", ArgKind::Boolean, |word, _| {
        match &*word.to_lowercase() {
            "true" | "yes" | "y" | "on" | "enable" | "1" => Ok(Some(true.into())),
            "false" | "no" | "n" | "off" | "disable" | "0" => Ok(Some(false.into())),
            _ => Err(ParsingError::new(format!("'{word}' is not yes or no"))),
        }
    }))
}

pub fn duration() -> ConverterRef {
    Arc::new(BasicConverter::new("duration", ArgKind::Duration, |word, _| {
        Ok(Some(Duration::from_millis(parse_to_millis(word)?).into()))
    }))
}

/// A user mention or ID, falling back to a lookup by name.
pub fn user() -> ConverterRef {
    let by_id = BasicConverter::new("user_mention", ArgKind::User, |word, _| {
        Ok(user_mention_to_id(word).or_else(|| parse_snowflake(word)).map(ArgValue::User))
    });

    id_or_name("user", by_id)
}

/// A channel mention or ID, falling back to a lookup by name.
pub fn channel() -> ConverterRef {
    let by_id = BasicConverter::new("channel_mention", ArgKind::Channel, |word, _| {
        Ok(channel_mention_to_id(word)
            .or_else(|| parse_snowflake(word))
            .map(ArgValue::Channel))
    });

    id_or_name("channel", by_id)
}

/// A role mention or ID, falling back to a lookup by name in the current guild.
pub fn role() -> ConverterRef {
    let by_id = BasicConverter::new("role_mention", ArgKind::Role, |word, _| {
        Ok(role_mention_to_id(word).or_else(|| parse_snowflake(word)).map(ArgValue::Role))
    });

    id_or_name("role", by_id)
}

/// A user or role mention. A bare ID could be either and stays untyped.
pub fn mentionable() -> ConverterRef {
    Arc::new(BasicConverter::new("mentionable", ArgKind::Mentionable, |word, _| {
        Ok(user_mention_to_id(word)
            .map(ArgValue::User)
            .or_else(|| role_mention_to_id(word).map(ArgValue::Role))
            .or_else(|| parse_snowflake(word).map(ArgValue::Mentionable)))
    }))
}

/// `true` if the next word is `--name`. Declines anything else, so an optional parameter using
/// it falls back to its default.
pub fn flag(name: &str) -> ConverterRef {
    let expected = format!("--{name}");
    Arc::new(BasicConverter::new(format!("flag({name})"), ArgKind::Boolean, move |word, _| {
        Ok((word == expected).then_some(ArgValue::Boolean(true)))
    }))
}

/// Restricts `inner` to a fixed set of choices. Input may name a choice or give its value.
pub fn choice(inner: ConverterRef, choices: Vec<Choice>) -> ConverterRef {
    Arc::new(ChoiceConverter {
        name: format!("choice({})", inner.name()),
        inner,
        choices,
    })
}

struct ChoiceConverter {
    name: String,
    inner: ConverterRef,
    choices: Vec<Choice>,
}

#[async_trait]
impl Converter for ChoiceConverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ArgKind {
        self.inner.kind()
    }

    async fn convert(&self, cursor: &mut TextCursor, ctxt: &InvocationContext) -> ConverterResult {
        let mut by_name = cursor.fork();
        if let Some(word) = by_name.next_quoted_word()?
            && let Some(choice) = self.choices.iter().find(|c| c.name.eq_ignore_ascii_case(&word))
        {
            cursor.commit(by_name);
            return Ok(Some(choice.value.clone()));
        }

        match self.inner.convert(cursor, ctxt).await? {
            Some(value) if self.choices.iter().any(|c| c.value == value) => Ok(Some(value)),
            Some(_) => {
                let names = self.choices.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
                Err(ParsingError::new(format!("expected one of: {}", names.join(", "))))
            },
            None => Ok(None),
        }
    }

    fn choices(&self) -> Option<Vec<Choice>> {
        Some(self.choices.clone())
    }
}

fn id_or_name(name: &str, by_id: BasicConverter) -> ConverterRef {
    let kind = by_id.kind();
    Arc::new(FallbackConverter {
        name: name.to_owned(),
        kind,
        children: vec![Arc::new(by_id) as ConverterRef, Arc::new(ByName::new(kind))],
    })
}

/// Resolves a name through the invocation's entity source.
struct ByName {
    name: String,
    kind: ArgKind,
}

impl ByName {
    fn new(kind: ArgKind) -> Self {
        Self {
            name: format!("{kind}_by_name"),
            kind,
        }
    }
}

#[async_trait]
impl Converter for ByName {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ArgKind {
        self.kind
    }

    async fn convert(&self, cursor: &mut TextCursor, ctxt: &InvocationContext) -> ConverterResult {
        let Some(word) = cursor.next_quoted_word()? else {
            return Ok(None);
        };

        let guild_id = ctxt.guild_id();
        let entities = ctxt.entities();

        Ok(match self.kind {
            ArgKind::User => entities.find_user(guild_id, &word).await?.map(ArgValue::User),
            ArgKind::Channel => entities.find_channel(guild_id, &word).await?.map(ArgValue::Channel),
            ArgKind::Role => match guild_id {
                Some(guild_id) => entities.find_role(guild_id, &word).await?.map(ArgValue::Role),
                None => None,
            },
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use twilight_model::guild::Permissions;
    use twilight_model::id::Id;
    use twilight_model::id::marker::{GuildMarker, UserMarker};

    use super::*;
    use crate::context::{EntitySource, MemberData};
    use crate::testing::{context, context_with_entities, origin};

    async fn convert(converter: &ConverterRef, input: &str) -> ConverterResult {
        converter.convert(&mut TextCursor::new(input), &context(origin())).await
    }

    #[tokio::test]
    async fn scalars() {
        assert_eq!(convert(&string(), "\"hello there\"").await, Ok(Some("hello there".into())));
        assert_eq!(convert(&integer(), "-12").await, Ok(Some(ArgValue::Integer(-12))));
        assert!(convert(&integer(), "twelve").await.is_err());
        assert_eq!(convert(&number(), "2.5").await, Ok(Some(ArgValue::Number(2.5))));
        assert!(convert(&number(), "inf").await.is_err());
        assert_eq!(convert(&boolean(), "Yes").await, Ok(Some(true.into())));
        assert_eq!(convert(&boolean(), "off").await, Ok(Some(false.into())));
        assert!(convert(&boolean(), "maybe").await.is_err());
        assert_eq!(
            convert(&duration(), "1h30m").await,
            Ok(Some(Duration::from_secs(5400).into()))
        );
        assert_eq!(convert(&integer(), "   ").await, Ok(None));
    }

    #[tokio::test]
    async fn mentions_and_ids() {
        assert_eq!(convert(&user(), "<@!42>").await, Ok(Some(ArgValue::User(Id::new(42)))));
        assert_eq!(convert(&user(), "42").await, Ok(Some(ArgValue::User(Id::new(42)))));
        assert_eq!(convert(&channel(), "<#7>").await, Ok(Some(ArgValue::Channel(Id::new(7)))));
        assert_eq!(convert(&role(), "<@&9>").await, Ok(Some(ArgValue::Role(Id::new(9)))));
        assert_eq!(convert(&mentionable(), "<@&9>").await, Ok(Some(ArgValue::Role(Id::new(9)))));
        assert_eq!(
            convert(&mentionable(), "9").await,
            Ok(Some(ArgValue::Mentionable(Id::new(9))))
        );
        assert_eq!(convert(&user(), "nobody").await, Ok(None));
    }

    #[tokio::test]
    async fn names_resolve_through_the_entity_source() {
        struct Directory;
        #[async_trait]
        impl EntitySource for Directory {
            async fn find_user(
                &self,
                _guild_id: Option<Id<GuildMarker>>,
                name: &str,
            ) -> anyhow::Result<Option<Id<UserMarker>>> {
                Ok((name == "John Doe").then(|| Id::new(5)))
            }
        }

        let ctxt = context_with_entities(origin(), Arc::new(Directory));
        let mut cursor = TextCursor::new("\"John Doe\" rest");
        assert_eq!(
            user().convert(&mut cursor, &ctxt).await,
            Ok(Some(ArgValue::User(Id::new(5))))
        );
        assert_eq!(cursor.remaining(), " rest");

        // roles can only be looked up inside a guild
        let guild = context(origin().in_guild(Id::new(1), MemberData {
            roles: vec![],
            permissions: Permissions::empty(),
        }));
        assert_eq!(role().convert(&mut TextCursor::new("admins"), &guild).await, Ok(None));
    }

    #[tokio::test]
    async fn flags_match_exactly() {
        let loud = flag("loud");
        assert_eq!(convert(&loud, "--loud").await, Ok(Some(true.into())));
        assert_eq!(convert(&loud, "--quiet").await, Ok(None));
        assert_eq!(loud.kind(), ArgKind::Boolean);
    }

    #[tokio::test]
    async fn choices_accept_names_or_values() {
        let size = choice(integer(), vec![Choice::new("small", 1i64), Choice::new("large", 3i64)]);

        assert_eq!(convert(&size, "LARGE").await, Ok(Some(ArgValue::Integer(3))));
        assert_eq!(convert(&size, "1").await, Ok(Some(ArgValue::Integer(1))));
        assert_eq!(
            convert(&size, "2").await,
            Err(ParsingError::new("expected one of: small, large"))
        );
        assert_eq!(size.choices().map(|c| c.len()), Some(2));
    }
}
