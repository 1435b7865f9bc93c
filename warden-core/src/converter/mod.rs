//! Turning raw input into typed argument values.
//!
//! A [`Converter`] reads from a [`TextCursor`] and produces an [`ArgValue`] of one [`ArgKind`].
//! `Ok(None)` means "this input is not mine" and lets the caller try something else, whereas an
//! `Err` carries a message for the invoking user. Converters compose:
//!
//! - [`BasicConverter`]: one word in, one value out.
//! - [`CombineConverter`]: post-processes the value of another converter.
//! - [`FallbackConverter`]: tries several converters in order on isolated forks of the input.

use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::command::arguments::{ArgKind, ArgValue};
use crate::command::errors::{CommandRegistrationError, ParsingError};
use crate::context::InvocationContext;
use crate::cursor::TextCursor;

pub mod builtin;
pub mod registry;

/// The most choices a platform UI can offer for one parameter.
pub const MAX_CHOICES: usize = 25;

pub type ConverterResult = Result<Option<ArgValue>, ParsingError>;

#[async_trait]
pub trait Converter: Send + Sync {
    fn name(&self) -> &str;

    /// The kind of every value this converter produces.
    fn kind(&self) -> ArgKind;

    async fn convert(&self, cursor: &mut TextCursor, ctxt: &InvocationContext) -> ConverterResult;

    /// A fixed set of values the platform UI may offer. `None` means unrestricted.
    fn choices(&self) -> Option<Vec<Choice>> {
        None
    }
}

pub type ConverterRef = Arc<dyn Converter>;

#[derive(Clone, Debug, PartialEq)]
pub struct Choice {
    pub name: String,
    pub value: ArgValue,
}

impl Choice {
    pub fn new(name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Display for Choice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// The union of several choice sets.
///
/// There are no choices at all if any set is unrestricted, if two sets map the same name to
/// different values, or if the union exceeds [`MAX_CHOICES`].
pub fn merge_choices(sets: impl IntoIterator<Item = Option<Vec<Choice>>>) -> Option<Vec<Choice>> {
    let mut merged: Vec<Choice> = Vec::new();

    for set in sets {
        for choice in set? {
            match merged.iter().find(|existing| existing.name == choice.name) {
                Some(existing) if existing.value != choice.value => return None,
                Some(_) => {},
                None => merged.push(choice),
            }
        }
    }

    (merged.len() <= MAX_CHOICES).then_some(merged)
}

type ParseFn = dyn Fn(&str, &InvocationContext) -> ConverterResult + Send + Sync;

/// Converts the next (possibly quoted) word.
pub struct BasicConverter {
    name: String,
    kind: ArgKind,
    parse: Box<ParseFn>,
    choices: Option<Vec<Choice>>,
}

impl BasicConverter {
    pub fn new<F>(name: impl Into<String>, kind: ArgKind, parse: F) -> Self
    where
        F: Fn(&str, &InvocationContext) -> ConverterResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind,
            parse: Box::new(parse),
            choices: None,
        }
    }

    pub fn with_choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = Some(choices);
        self
    }
}

#[async_trait]
impl Converter for BasicConverter {
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

        (self.parse)(&word, ctxt)
    }

    fn choices(&self) -> Option<Vec<Choice>> {
        self.choices.clone()
    }
}

type RefineFn = dyn Fn(ArgValue, &InvocationContext) -> ConverterResult + Send + Sync;

/// Feeds the value of `source` through a refinement. A `None` from the source is passed on
/// without calling the refinement.
pub struct CombineConverter {
    name: String,
    kind: ArgKind,
    source: ConverterRef,
    refine: Box<RefineFn>,
}

impl CombineConverter {
    pub fn new<F>(name: impl Into<String>, kind: ArgKind, source: ConverterRef, refine: F) -> Self
    where
        F: Fn(ArgValue, &InvocationContext) -> ConverterResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind,
            source,
            refine: Box::new(refine),
        }
    }
}

#[async_trait]
impl Converter for CombineConverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ArgKind {
        self.kind
    }

    async fn convert(&self, cursor: &mut TextCursor, ctxt: &InvocationContext) -> ConverterResult {
        match self.source.convert(cursor, ctxt).await? {
            Some(value) => (self.refine)(value, ctxt),
            None => Ok(None),
        }
    }
}

/// Tries each child on its own fork of the input and commits the first that produces a value.
///
/// If none does, the last error is returned, or `None` if every child declined.
pub struct FallbackConverter {
    name: String,
    kind: ArgKind,
    children: Vec<ConverterRef>,
}

impl FallbackConverter {
    pub fn new(
        name: impl Into<String>,
        kind: ArgKind,
        children: Vec<ConverterRef>,
    ) -> Result<Self, CommandRegistrationError> {
        if children.is_empty() {
            return Err(CommandRegistrationError::EmptyCombinator("fallback"));
        }

        Ok(Self {
            name: name.into(),
            kind,
            children,
        })
    }

    pub fn children(&self) -> &[ConverterRef] {
        &self.children
    }
}

#[async_trait]
impl Converter for FallbackConverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ArgKind {
        self.kind
    }

    async fn convert(&self, cursor: &mut TextCursor, ctxt: &InvocationContext) -> ConverterResult {
        let mut last_error = None;

        for child in &self.children {
            let mut attempt = cursor.fork();
            match child.convert(&mut attempt, ctxt).await {
                Ok(Some(value)) => {
                    cursor.commit(attempt);
                    return Ok(Some(value));
                },
                Ok(None) => trace!("{}: {} declined", self.name, child.name()),
                Err(e) => {
                    trace!("{}: {} failed: {e}", self.name, child.name());
                    last_error = Some(e);
                },
            }
        }

        last_error.map_or(Ok(None), Err)
    }

    fn choices(&self) -> Option<Vec<Choice>> {
        merge_choices(self.children.iter().map(|child| child.choices()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, origin};

    fn integer() -> ConverterRef {
        Arc::new(BasicConverter::new("integer", ArgKind::Integer, |word, _| {
            Ok(word.parse::<i64>().ok().map(ArgValue::Integer))
        }))
    }

    fn strict_integer() -> ConverterRef {
        Arc::new(BasicConverter::new("strict_integer", ArgKind::Integer, |word, _| {
            Ok(Some(ArgValue::Integer(word.parse::<i64>()?)))
        }))
    }

    fn word() -> ConverterRef {
        Arc::new(BasicConverter::new("word", ArgKind::String, |word, _| {
            Ok(Some(word.into()))
        }))
    }

    #[tokio::test]
    async fn combine_refines_and_propagates_none() {
        let ctxt = context(origin());
        let doubled = CombineConverter::new("doubled", ArgKind::Integer, integer(), |value, _| {
            Ok(value.as_i64().map(|i| ArgValue::Integer(i * 2)))
        });

        let mut cursor = TextCursor::new("21");
        assert_eq!(doubled.convert(&mut cursor, &ctxt).await, Ok(Some(ArgValue::Integer(42))));

        let mut cursor = TextCursor::new("abc");
        assert_eq!(doubled.convert(&mut cursor, &ctxt).await, Ok(None));
    }

    #[tokio::test]
    async fn fallback_commits_only_the_winner() {
        let ctxt = context(origin());
        let either = FallbackConverter::new("either", ArgKind::String, vec![integer(), word()]).unwrap();

        let mut cursor = TextCursor::new("\"two words\" rest");
        let mut alone = cursor.fork();
        assert_eq!(word().convert(&mut alone, &ctxt).await, Ok(Some(ArgValue::String("two words".to_owned()))));

        let value = either.convert(&mut cursor, &ctxt).await.unwrap();
        assert_eq!(value, Some(ArgValue::String("two words".to_owned())));
        assert_eq!(cursor.remaining(), " rest");
        assert_eq!(cursor.position(), alone.position());
        assert_eq!(cursor.history_len(), alone.history_len());
        assert_eq!(cursor.history_len(), 1);

        // the integer attempt left nothing behind
        assert!(cursor.undo());
        assert_eq!(cursor.position(), 0);
        assert!(!cursor.undo());
    }

    #[tokio::test]
    async fn fallback_reports_the_last_error() {
        let ctxt = context(origin());
        let failing = FallbackConverter::new("failing", ArgKind::Integer, vec![integer(), strict_integer()]).unwrap();

        let mut cursor = TextCursor::new("abc");
        let error = failing.convert(&mut cursor, &ctxt).await.unwrap_err();
        assert!(error.message.starts_with("failed to parse an argument as a number"));
        assert_eq!(cursor.position(), 0);

        let declining = FallbackConverter::new("declining", ArgKind::Integer, vec![integer()]).unwrap();
        assert_eq!(declining.convert(&mut cursor, &ctxt).await, Ok(None));
        assert_eq!(cursor.position(), 0);

        assert!(FallbackConverter::new("empty", ArgKind::Integer, vec![]).is_err());
    }

    #[test]
    fn choices_merge() {
        let red = Choice::new("red", "#f00");
        let blue = Choice::new("blue", "#00f");

        assert_eq!(
            merge_choices([Some(vec![red.clone()]), Some(vec![blue.clone(), red.clone()])]),
            Some(vec![red.clone(), blue.clone()])
        );
        assert_eq!(merge_choices([Some(vec![red.clone()]), None]), None);
        assert_eq!(
            merge_choices([Some(vec![red]), Some(vec![Choice::new("red", "#ff0000")])]),
            None
        );

        let many = (0..30).map(|i| Choice::new(format!("c{i}"), i as i64)).collect::<Vec<_>>();
        assert_eq!(merge_choices([Some(many)]), None);
    }

    #[test]
    fn fallback_choices_merge_children() {
        let colours: ConverterRef = Arc::new(
            BasicConverter::new("colour", ArgKind::String, |w, _| Ok(Some(w.into())))
                .with_choices(vec![Choice::new("red", "#f00")]),
        );
        let more: ConverterRef = Arc::new(
            BasicConverter::new("more", ArgKind::String, |w, _| Ok(Some(w.into())))
                .with_choices(vec![Choice::new("blue", "#00f")]),
        );

        let both = FallbackConverter::new("both", ArgKind::String, vec![colours.clone(), more]).unwrap();
        assert_eq!(both.choices().map(|c| c.len()), Some(2));

        let unrestricted = FallbackConverter::new("any", ArgKind::String, vec![colours, word()]).unwrap();
        assert_eq!(unrestricted.choices(), None);
    }
}
