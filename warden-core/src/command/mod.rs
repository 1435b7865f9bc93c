//! The command model.
//!
//! - [`Command`]: a named handler with its parameters and checks, built with [`CommandBuilder`].
//!   The handler is anything implementing [`CommandHandler`], which includes plain async
//!   functions taking an [`InvocationContext`] and the parsed [`Arguments`].
//!
//! - [`ParamSpec`]: one declared parameter. Its [`ArgKind`] selects a converter from the
//!   [`ConverterRegistry`](crate::converter::registry::ConverterRegistry) unless it carries its own.
//!
//! - [`group::CommandGroup`]: a named container of commands and nested groups, with an optional
//!   default command and checks that every descendant inherits.
//!
//! - [`registry::CommandTree`]: the registry the dispatcher resolves invocations against.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use twilight_model::guild::Permissions;
use warden_common::util::regex::COMMAND_NAME;

use self::arguments::{ArgKind, ArgValue, Arguments};
use self::errors::CommandRegistrationError;
use crate::check::Check;
use crate::context::InvocationContext;
use crate::converter::ConverterRef;

pub mod arguments;
pub mod errors;
pub mod group;
pub mod registry;

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(&self, ctxt: InvocationContext, args: Arguments) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> CommandHandler for F
where
    F: Fn(InvocationContext, Arguments) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn execute(&self, ctxt: InvocationContext, args: Arguments) -> anyhow::Result<()> {
        self(ctxt, args).await
    }
}

/// Validates a command or group name.
pub(crate) fn validate_name(name: &str) -> Result<(), CommandRegistrationError> {
    if COMMAND_NAME.is_match(name) {
        Ok(())
    } else {
        Err(CommandRegistrationError::InvalidName(name.to_owned()))
    }
}

#[derive(Clone)]
pub struct ParamSpec {
    pub name: String,
    pub description: String,
    pub kind: ArgKind,
    pub required: bool,
    /// Used when an optional parameter is not supplied or cannot be parsed.
    pub default: Option<ArgValue>,
    /// Consumes the whole remainder of the input as one token. Must be the last parameter.
    pub rest: bool,
    /// Takes precedence over the registry.
    pub converter: Option<ConverterRef>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, kind: ArgKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            kind,
            required: true,
            default: None,
            rest: false,
            converter: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Makes the parameter optional, falling back to `value`.
    pub fn default(mut self, value: impl Into<ArgValue>) -> Self {
        self.required = false;
        self.default = Some(value.into());
        self
    }

    pub fn rest(mut self) -> Self {
        self.rest = true;
        self
    }

    pub fn converter(mut self, converter: ConverterRef) -> Self {
        self.converter = Some(converter);
        self
    }

    /// `<name>` for required parameters, `[name]` for optional ones.
    pub fn usage(&self) -> String {
        let dots = if self.rest { "..." } else { "" };
        if self.required {
            format!("<{dots}{}>", self.name)
        } else {
            format!("[{dots}{}]", self.name)
        }
    }
}

impl std::fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("default", &self.default)
            .field("rest", &self.rest)
            .field("converter", &self.converter.as_ref().map(|c| c.name().to_owned()))
            .finish_non_exhaustive()
    }
}

pub struct Command {
    name: String,
    aliases: Vec<String>,
    description: String,
    category: Option<String>,
    examples: Vec<String>,
    params: Vec<ParamSpec>,
    checks: Vec<Arc<Check>>,
    handler: Arc<dyn CommandHandler>,
    /// Full path from the root of the tree, e.g. `tag create`. Set on registration.
    qualified_name: String,
    /// Checks of every enclosing group, outermost first. Set on registration.
    inherited_checks: Vec<Arc<Check>>,
}

impl Command {
    pub fn builder(name: impl Into<String>) -> CommandBuilder {
        CommandBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn examples(&self) -> &[String] {
        &self.examples
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Checks declared on the command itself, without those inherited from its groups.
    pub fn checks(&self) -> &[Arc<Check>] {
        &self.checks
    }

    pub fn handler(&self) -> &dyn CommandHandler {
        &*self.handler
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn usage(&self) -> String {
        let params = self.params.iter().map(ParamSpec::usage).collect::<Vec<_>>().join(" ");
        if params.is_empty() {
            self.qualified_name.clone()
        } else {
            format!("{} {params}", self.qualified_name)
        }
    }

    /// Inherited checks followed by the command's own.
    pub fn effective_checks(&self) -> Vec<Arc<Check>> {
        self.inherited_checks.iter().chain(&self.checks).cloned().collect()
    }

    /// Whether every effective check allows DMs.
    pub fn allows_dm(&self) -> bool {
        self.inherited_checks.iter().chain(&self.checks).all(|check| check.allows_dm())
    }

    /// Every permission some effective check requires. `None` if no check declares any.
    pub fn required_permissions(&self) -> Option<Permissions> {
        self.inherited_checks
            .iter()
            .chain(&self.checks)
            .filter_map(|check| check.required_permissions())
            .reduce(|acc, permissions| acc | permissions)
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    pub(crate) fn place(&mut self, qualified_name: String, inherited: &[Arc<Check>]) {
        self.qualified_name = qualified_name;
        self.inherited_checks = inherited.to_vec();
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("qualified_name", &self.qualified_name)
            .field("aliases", &self.aliases)
            .field("params", &self.params)
            .field("checks", &self.checks)
            .finish_non_exhaustive()
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.qualified_name)
    }
}

pub struct CommandBuilder {
    name: String,
    aliases: Vec<String>,
    description: String,
    category: Option<String>,
    examples: Vec<String>,
    params: Vec<ParamSpec>,
    checks: Vec<Arc<Check>>,
    handler: Option<Arc<dyn CommandHandler>>,
}

impl CommandBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            description: String::new(),
            category: None,
            examples: Vec::new(),
            params: Vec::new(),
            checks: Vec::new(),
            handler: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(Arc::new(check));
        self
    }

    /// Attaches a check that is shared with other commands, e.g. one cooldown for a family of
    /// commands.
    pub fn shared_check(mut self, check: Arc<Check>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn handler(mut self, handler: impl CommandHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> Result<Command, CommandRegistrationError> {
        validate_name(&self.name)?;
        for alias in &self.aliases {
            validate_name(alias)?;
        }

        let mut seen_optional = false;
        for (i, param) in self.params.iter().enumerate() {
            if self.params[..i].iter().any(|p| p.name == param.name) {
                return Err(CommandRegistrationError::DuplicateParameter {
                    command: self.name,
                    parameter: param.name.clone(),
                });
            }

            if param.required && seen_optional {
                return Err(CommandRegistrationError::RequiredAfterOptional {
                    command: self.name,
                    parameter: param.name.clone(),
                });
            }
            seen_optional |= !param.required;

            if param.rest && i + 1 != self.params.len() {
                return Err(CommandRegistrationError::RestNotLast {
                    command: self.name,
                    parameter: param.name.clone(),
                });
            }
        }

        let handler = self
            .handler
            .ok_or_else(|| CommandRegistrationError::MissingHandler(self.name.clone()))?;

        Ok(Command {
            qualified_name: self.name.clone(),
            name: self.name,
            aliases: self.aliases,
            description: self.description,
            category: self.category,
            examples: self.examples,
            params: self.params,
            checks: self.checks,
            handler,
            inherited_checks: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn noop(_: InvocationContext, _: Arguments) -> anyhow::Result<()> {
        Ok(())
    }

    #[test]
    fn builds_with_usage() {
        let command = Command::builder("greet")
            .alias("hi")
            .param(ParamSpec::new("name", ArgKind::String))
            .param(ParamSpec::new("loud", ArgKind::Boolean).default(false))
            .handler(noop)
            .build()
            .unwrap();

        assert_eq!(command.qualified_name(), "greet");
        assert_eq!(command.usage(), "greet <name> [loud]");
        assert_eq!(command.names().collect::<Vec<_>>(), vec!["greet", "hi"]);
        assert!(command.allows_dm());
        assert_eq!(command.required_permissions(), None);
    }

    #[test]
    fn metadata_covers_every_check() {
        let command = Command::builder("ban")
            .check(Check::from_fn("kick", |_| true).require_permissions(Permissions::KICK_MEMBERS))
            .check(
                Check::from_fn("ban", |_| true)
                    .require_permissions(Permissions::BAN_MEMBERS)
                    .allow_dm(false),
            )
            .check(Check::from_fn("anything", |_| true))
            .handler(noop)
            .build()
            .unwrap();

        assert_eq!(
            command.required_permissions(),
            Some(Permissions::KICK_MEMBERS | Permissions::BAN_MEMBERS)
        );
        assert!(!command.allows_dm());
    }

    #[test]
    fn rejects_malformed_declarations() {
        assert_eq!(
            Command::builder("Greet").handler(noop).build().unwrap_err(),
            CommandRegistrationError::InvalidName("Greet".to_owned())
        );
        assert_eq!(
            Command::builder("has space").handler(noop).build().unwrap_err(),
            CommandRegistrationError::InvalidName("has space".to_owned())
        );
        assert_eq!(
            Command::builder("greet").build().unwrap_err(),
            CommandRegistrationError::MissingHandler("greet".to_owned())
        );

        let duplicate = Command::builder("greet")
            .param(ParamSpec::new("name", ArgKind::String))
            .param(ParamSpec::new("name", ArgKind::String))
            .handler(noop)
            .build();
        assert!(matches!(
            duplicate,
            Err(CommandRegistrationError::DuplicateParameter { .. })
        ));

        let out_of_order = Command::builder("greet")
            .param(ParamSpec::new("name", ArgKind::String).optional())
            .param(ParamSpec::new("count", ArgKind::Integer))
            .handler(noop)
            .build();
        assert!(matches!(
            out_of_order,
            Err(CommandRegistrationError::RequiredAfterOptional { .. })
        ));

        let rest = Command::builder("say")
            .param(ParamSpec::new("text", ArgKind::String).rest())
            .param(ParamSpec::new("count", ArgKind::Integer).optional())
            .handler(noop)
            .build();
        assert!(matches!(rest, Err(CommandRegistrationError::RestNotLast { .. })));
    }

    #[test]
    fn usage_marks_rest_parameters() {
        let param = ParamSpec::new("text", ArgKind::String).rest();
        assert_eq!(param.usage(), "<...text>");
        assert_eq!(param.optional().usage(), "[...text]");
    }
}
