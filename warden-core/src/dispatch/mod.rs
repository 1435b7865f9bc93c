//! Turning inbound events into command invocations.
//!
//! Every event goes through the same states:
//!
//! 1. **Resolving the command**: text events must start with a prefix and name a command in the
//!    [`CommandTree`]; structured events name it by path. An unprefixed message is not an
//!    invocation at all and is dropped silently.
//! 2. **Running checks**: the command's effective checks run in order, and the first failure ends
//!    the invocation. Once all pass, their pre-call hooks fire.
//! 3. **Parsing arguments**: each declared parameter is bound in order from the remaining text or
//!    the structured options.
//! 4. **Invoking** the handler. Post-call hooks of the passed checks fire afterwards, whether the
//!    handler or argument parsing succeeded or not.
//!
//! Failures never escape [`Dispatcher::handle`]: they are reported to the configured
//! [`ErrorSink`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use futures_util::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};
use twilight_model::application::interaction::application_command::CommandDataOption;
use warden_common::config::WardenConfig;
use warden_common::util::discord::message_mention_prefix;

use self::event::{IncomingEvent, InteractionEvent, MessageEvent};
use self::sink::{ErrorSink, Failure, LoggingErrorSink};
use crate::command::ParamSpec;
use crate::command::arguments::{ArgKind, ArgValue, Arguments};
use crate::command::errors::DispatchError;
use crate::command::registry::CommandTree;
use crate::context::{EntitySource, Input, InvocationContext, NoEntities};
use crate::converter::registry::ConverterRegistry;
use crate::converter::{ConverterRef, ConverterResult};
use crate::cursor::TextCursor;

pub mod event;
pub mod sink;

#[derive(Clone, Debug)]
pub struct DispatchConfig {
    /// Text prefixes, tried in order after the mention prefix.
    pub prefixes: Vec<String>,
    pub mention_prefix: bool,
    pub bot_id: Option<u64>,
    /// Applies to prefixes and command names.
    pub case_sensitive: bool,
    pub invocation_timeout: Option<Duration>,
    pub concurrent: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            prefixes: vec!["!".to_owned()],
            mention_prefix: true,
            bot_id: None,
            case_sensitive: false,
            invocation_timeout: None,
            concurrent: false,
        }
    }
}

impl From<&WardenConfig> for DispatchConfig {
    fn from(config: &WardenConfig) -> Self {
        Self {
            prefixes: config.prefix.default.clone(),
            mention_prefix: config.prefix.mention,
            bot_id: config.dispatch.bot_id,
            case_sensitive: config.prefix.case_sensitive,
            invocation_timeout: config.dispatch.invocation_timeout(),
            concurrent: config.dispatch.concurrent,
        }
    }
}

pub struct Dispatcher {
    tree: CommandTree,
    converters: ConverterRegistry,
    config: DispatchConfig,
    entities: Arc<dyn EntitySource>,
    sink: Arc<dyn ErrorSink>,
}

impl Dispatcher {
    pub fn new(tree: CommandTree, converters: ConverterRegistry, config: DispatchConfig) -> Self {
        Self {
            tree: tree.case_sensitive(config.case_sensitive),
            converters,
            config,
            entities: Arc::new(NoEntities),
            sink: Arc::new(LoggingErrorSink),
        }
    }

    pub fn with_entities(mut self, entities: Arc<dyn EntitySource>) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Dispatches one event, reporting any failure to the error sink.
    pub async fn handle(&self, event: IncomingEvent) {
        if let Err(failure) = self.process(event).await {
            self.sink.report(failure).await;
        }
    }

    /// Dispatches one event. `Ok(None)` means the event was not an invocation.
    pub async fn dispatch(&self, event: IncomingEvent) -> Result<Option<()>, DispatchError> {
        self.process(event).await.map_err(|failure| failure.error)
    }

    /// Handles events until every sender is dropped.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<IncomingEvent>) {
        info!("Dispatcher started");

        while let Some(event) = events.recv().await {
            if self.config.concurrent {
                let dispatcher = self.clone();
                tokio::spawn(async move { dispatcher.handle(event).await });
            } else {
                self.handle(event).await;
            }
        }

        info!("Event feed closed, dispatcher stopped");
    }

    async fn process(&self, event: IncomingEvent) -> Result<Option<()>, Failure> {
        let Some(ctxt) = self.resolve(event)? else {
            return Ok(None);
        };

        // a panic in a check, converter or hook ends only this invocation
        let invocation = async {
            match AssertUnwindSafe(self.invoke(&ctxt)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => Err(DispatchError::UncaughtException {
                    command: ctxt.command.qualified_name().to_owned(),
                    error: anyhow!("the invocation panicked: {}", panic_message(panic.as_ref())),
                }),
            }
        };

        let outcome = match self.config.invocation_timeout {
            Some(limit) => tokio::time::timeout(limit, invocation)
                .await
                .unwrap_or(Err(DispatchError::Timeout(limit))),
            None => invocation.await,
        };

        match outcome {
            Ok(()) => {
                trace!("{}: completed", ctxt.command);
                Ok(Some(()))
            },
            Err(error) => {
                trace!("{}: failed", ctxt.command);
                Err(Failure {
                    error,
                    context: Some(ctxt),
                })
            },
        }
    }

    fn resolve(&self, event: IncomingEvent) -> Result<Option<InvocationContext>, Failure> {
        match event {
            IncomingEvent::Message(message) => self.resolve_message(message),
            IncomingEvent::Interaction(interaction) => self.resolve_interaction(interaction).map(Some),
        }
    }

    /// Splits off the prefix `content` starts with. The bot mention takes precedence over the
    /// configured prefixes.
    fn strip_prefix<'a>(&self, content: &'a str) -> Option<(String, &'a str)> {
        if self.config.mention_prefix
            && let Some(bot_id) = self.config.bot_id
            && let Some(mention) = message_mention_prefix(content, bot_id)
        {
            let rest = &content[mention.len()..];
            return Some((mention, rest));
        }

        self.config.prefixes.iter().find_map(|prefix| {
            let head = content.get(..prefix.len())?;
            let matches = if self.config.case_sensitive {
                head == prefix
            } else {
                head.to_lowercase() == prefix.to_lowercase()
            };

            matches.then(|| (head.to_owned(), &content[prefix.len()..]))
        })
    }

    fn resolve_message(&self, message: MessageEvent) -> Result<Option<InvocationContext>, Failure> {
        let Some((prefix, rest)) = self.strip_prefix(&message.content) else {
            return Ok(None);
        };

        let mut cursor = TextCursor::new(rest);
        if cursor.is_exhausted() {
            return Ok(None);
        }

        let Some(resolved) = self.tree.lookup_words(&mut cursor) else {
            let input = rest.split_whitespace().next().unwrap_or_default().to_owned();
            return Err(Failure {
                error: DispatchError::CommandNotFound { input },
                context: None,
            });
        };

        trace!("{}: resolved from text", resolved.command);
        let input = Input::Text {
            prefix,
            invoked_with: resolved.invoked_with,
            remainder: cursor.remaining().to_owned(),
        };

        Ok(Some(InvocationContext::new(
            message.origin,
            resolved.command,
            input,
            message.responder,
            self.entities.clone(),
        )))
    }

    fn resolve_interaction(&self, interaction: InteractionEvent) -> Result<InvocationContext, Failure> {
        let Some(command) = self.tree.lookup_path(interaction.path.as_slice()) else {
            return Err(Failure {
                error: DispatchError::CommandNotFound {
                    input: interaction.path.join(" "),
                },
                context: None,
            });
        };

        trace!("{command}: resolved from interaction");
        Ok(InvocationContext::new(
            interaction.origin,
            command,
            Input::Structured {
                options: interaction.options,
            },
            interaction.responder,
            self.entities.clone(),
        ))
    }

    async fn invoke(&self, ctxt: &InvocationContext) -> Result<(), DispatchError> {
        let command = ctxt.command.qualified_name();
        trace!("{command}: running checks");

        let checks = self.tree.effective_checks(&ctxt.command);
        let mut passed = Vec::with_capacity(checks.len());
        for check in &checks {
            let result = check.evaluate(ctxt).await;
            if !result.passed() {
                debug!("{command}: check '{}' failed", check.name());
                return Err(DispatchError::CheckFailed {
                    check: check.name().to_owned(),
                    reason: check.failure_reason(ctxt),
                });
            }
            passed.push(result);
        }

        for result in &passed {
            result
                .fire_pre_call(ctxt)
                .await
                .map_err(|error| DispatchError::UncaughtException {
                    command: command.to_owned(),
                    error: error.context("a pre-call hook failed"),
                })?;
        }

        trace!("{command}: parsing arguments");
        let outcome = match self.bind_arguments(ctxt).await {
            Ok(args) => {
                ctxt.bind_arguments(args.clone());
                trace!("{command}: invoking");
                self.execute(ctxt, args).await
            },
            Err(error) => Err(error),
        };

        for result in &passed {
            result.fire_post_call(ctxt).await;
        }

        outcome
    }

    async fn execute(&self, ctxt: &InvocationContext, args: Arguments) -> Result<(), DispatchError> {
        let command = ctxt.command.clone();
        let execution = command.handler().execute(ctxt.clone(), args);

        let error = match AssertUnwindSafe(execution).catch_unwind().await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(error)) => error,
            Err(panic) => anyhow!("the handler panicked: {}", panic_message(panic.as_ref())),
        };

        Err(DispatchError::UncaughtException {
            command: command.qualified_name().to_owned(),
            error,
        })
    }

    fn converter_for(&self, param: &ParamSpec) -> Result<ConverterRef, DispatchError> {
        param
            .converter
            .clone()
            .or_else(|| self.converters.resolve(param.kind))
            .ok_or_else(|| DispatchError::NoConverter {
                parameter: param.name.clone(),
                kind: param.kind,
            })
    }

    async fn bind_arguments(&self, ctxt: &InvocationContext) -> Result<Arguments, DispatchError> {
        match &ctxt.input {
            Input::Text { remainder, .. } => self.bind_text(ctxt, remainder).await,
            Input::Structured { options } => self.bind_structured(ctxt, options).await,
        }
    }

    async fn bind_text(&self, ctxt: &InvocationContext, remainder: &str) -> Result<Arguments, DispatchError> {
        let mut cursor = TextCursor::new(remainder);
        let mut args = Arguments::new();

        for param in ctxt.command.params() {
            if cursor.is_exhausted() {
                if param.required {
                    return Err(DispatchError::NotEnoughArguments {
                        parameter: param.name.clone(),
                    });
                }

                args.push(&param.name, param.default.clone());
                continue;
            }

            let converter = self.converter_for(param)?;
            let mut attempt = cursor.fork();
            attempt.set_rest_as_block(param.rest);
            let outcome = converter.convert(&mut attempt, ctxt).await;
            attempt.set_rest_as_block(false);

            if let Ok(Some(_)) = outcome {
                cursor.commit(attempt);
            }

            let shown = || cursor.peek_word().unwrap_or_default();
            args.push(&param.name, settle(param, outcome, shown)?);
        }

        Ok(args)
    }

    async fn bind_structured(
        &self,
        ctxt: &InvocationContext,
        options: &[CommandDataOption],
    ) -> Result<Arguments, DispatchError> {
        let mut args = Arguments::new();

        for param in ctxt.command.params() {
            let Some(option) = options.iter().find(|option| option.name == param.name) else {
                if param.required {
                    return Err(DispatchError::NotEnoughArguments {
                        parameter: param.name.clone(),
                    });
                }

                args.push(&param.name, param.default.clone());
                continue;
            };

            let value = match ArgValue::from_option(&option.value) {
                Some(ArgValue::String(text)) if param.kind != ArgKind::String || param.converter.is_some() => {
                    let converter = self.converter_for(param)?;
                    let mut cursor = TextCursor::new(text.as_str());
                    cursor.set_rest_as_block(true);

                    let outcome = converter.convert(&mut cursor, ctxt).await;
                    settle(param, outcome, || text.clone())?
                },
                Some(value) if self.converters.is_assignable(value.kind(), param.kind) => Some(value),
                Some(value) => {
                    return Err(DispatchError::BadInput {
                        parameter: param.name.clone(),
                        message: format!("expected {}, got {}", param.kind, value.kind()),
                    });
                },
                None => {
                    return Err(DispatchError::BadInput {
                        parameter: param.name.clone(),
                        message: "a sub-command cannot be an argument".to_owned(),
                    });
                },
            };

            args.push(&param.name, value);
        }

        Ok(args)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_owned())
}

/// Turns the outcome of a converter into the bound value. Defaults only cover missing input, so
/// a declined or failed conversion is a `BadInput` for optional parameters too.
fn settle(
    param: &ParamSpec,
    outcome: ConverterResult,
    shown: impl FnOnce() -> String,
) -> Result<Option<ArgValue>, DispatchError> {
    match outcome {
        Ok(Some(value)) => Ok(Some(value)),
        Ok(None) => Err(DispatchError::BadInput {
            parameter: param.name.clone(),
            message: format!("'{}' is not a valid {}", shown(), param.kind),
        }),
        Err(error) => Err(DispatchError::BadInput {
            parameter: param.name.clone(),
            message: error.message,
        }),
    }
}
