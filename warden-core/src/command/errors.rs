use std::fmt::Display;
use std::num::{ParseFloatError, ParseIntError};
use std::time::Duration;

use warden_common::util::ParseToMillisError;

use super::arguments::ArgKind;
use crate::cursor::CursorError;

pub trait GetErrorSeverity {
    fn get_severity(&self) -> ErrorSeverity;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Expected during normal operation, e.g. an unknown command. Not worth telling anyone about.
    Low,
    /// Something the invoking user or the bot developer should hear about.
    High,
}

/// A converter could not make sense of its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsingError {
    pub message: String,
}
impl ParsingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
impl Display for ParsingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
impl std::error::Error for ParsingError {}

impl From<CursorError> for ParsingError {
    fn from(value: CursorError) -> Self {
        Self::new(value.to_string())
    }
}
impl From<ParseIntError> for ParsingError {
    fn from(value: ParseIntError) -> Self {
        Self::new(format!("failed to parse an argument as a number: {value}"))
    }
}
impl From<ParseFloatError> for ParsingError {
    fn from(value: ParseFloatError) -> Self {
        Self::new(format!("failed to parse an argument as a decimal number: {value}"))
    }
}
impl From<ParseToMillisError> for ParsingError {
    fn from(value: ParseToMillisError) -> Self {
        Self::new(format!("failed to parse an argument as time: {value}"))
    }
}
impl From<anyhow::Error> for ParsingError {
    fn from(value: anyhow::Error) -> Self {
        Self::new(format!("{value:#}"))
    }
}

/// Structural misconfiguration, raised eagerly while commands, checks and converters are set up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandRegistrationError {
    InvalidName(String),
    DuplicateName { name: String, parent: Option<String> },
    EmptyCombinator(&'static str),
    DuplicateConverter(ArgKind),
    DuplicateParameter { command: String, parameter: String },
    RequiredAfterOptional { command: String, parameter: String },
    RestNotLast { command: String, parameter: String },
    MissingHandler(String),
}
impl Display for CommandRegistrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(name) => write!(f, "'{name}' is not a valid command name"),
            Self::DuplicateName { name, parent: Some(parent) } => {
                write!(f, "'{name}' is registered more than once in group '{parent}'")
            },
            Self::DuplicateName { name, parent: None } => write!(f, "'{name}' is registered more than once"),
            Self::EmptyCombinator(combinator) => write!(f, "{combinator} requires at least one check"),
            Self::DuplicateConverter(kind) => write!(f, "a converter for {kind} is already registered"),
            Self::DuplicateParameter { command, parameter } => {
                write!(f, "command '{command}' declares parameter '{parameter}' twice")
            },
            Self::RequiredAfterOptional { command, parameter } => write!(
                f,
                "command '{command}' declares required parameter '{parameter}' after an optional one"
            ),
            Self::RestNotLast { command, parameter } => write!(
                f,
                "command '{command}' declares rest parameter '{parameter}' but it is not the last parameter"
            ),
            Self::MissingHandler(command) => write!(f, "command '{command}' has no handler"),
        }
    }
}
impl std::error::Error for CommandRegistrationError {}

/// Why an invocation did not complete. Every variant is reported to the error sink, never thrown
/// at the event source.
#[derive(Debug)]
pub enum DispatchError {
    /// The prefix matched, but no command did.
    CommandNotFound { input: String },
    CheckFailed { check: String, reason: Option<String> },
    BadInput { parameter: String, message: String },
    NotEnoughArguments { parameter: String },
    /// No converter is registered for, or can be assembled for, a parameter's kind.
    NoConverter { parameter: String, kind: ArgKind },
    UncaughtException { command: String, error: anyhow::Error },
    Timeout(Duration),
}
impl Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CommandNotFound { input } => write!(f, "no command matches '{input}'"),
            Self::CheckFailed { check, reason: Some(reason) } => write!(f, "check '{check}' failed: {reason}"),
            Self::CheckFailed { check, reason: None } => write!(f, "check '{check}' failed"),
            Self::BadInput { parameter, message } => write!(f, "invalid value for '{parameter}': {message}"),
            Self::NotEnoughArguments { parameter } => {
                write!(f, "an argument is required for '{parameter}' but none were found")
            },
            Self::NoConverter { parameter, kind } => {
                write!(f, "no converter can produce a {kind} for parameter '{parameter}'")
            },
            Self::UncaughtException { command, error } => write!(f, "command '{command}' failed: {error:#}"),
            Self::Timeout(after) => write!(f, "the invocation did not finish within {}ms", after.as_millis()),
        }
    }
}
impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::UncaughtException { error, .. } => Some(&**error),
            _ => None,
        }
    }
}
impl GetErrorSeverity for DispatchError {
    fn get_severity(&self) -> ErrorSeverity {
        match self {
            Self::CommandNotFound { .. } | Self::CheckFailed { .. } => ErrorSeverity::Low,
            _ => ErrorSeverity::High,
        }
    }
}
