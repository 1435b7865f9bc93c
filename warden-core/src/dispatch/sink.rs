use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, warn};

use crate::command::errors::{DispatchError, ErrorSeverity, GetErrorSeverity};
use crate::context::{Input, InvocationContext};

/// A dispatch that did not complete, with the invocation it belonged to if one was created.
#[derive(Debug)]
pub struct Failure {
    pub error: DispatchError,
    pub context: Option<InvocationContext>,
}

/// Receives every failed dispatch.
#[async_trait]
pub trait ErrorSink: Send + Sync {
    async fn report(&self, failure: Failure);
}

fn log(failure: &Failure) {
    let command = failure
        .context
        .as_ref()
        .map_or("<none>", |ctxt| ctxt.command.qualified_name());

    match failure.error.get_severity() {
        ErrorSeverity::Low => debug!(command, "{}", failure.error),
        ErrorSeverity::High => error!(command, "{}", failure.error),
    }
}

/// Logs low-severity failures at debug level and everything else as errors.
pub struct LoggingErrorSink;

#[async_trait]
impl ErrorSink for LoggingErrorSink {
    async fn report(&self, failure: Failure) {
        log(&failure);
    }
}

/// Logs like [`LoggingErrorSink`] and also tells the invoking user what went wrong, where that is
/// useful to them.
pub struct ReplyingErrorSink;

impl ReplyingErrorSink {
    fn message(error: &DispatchError, ctxt: &InvocationContext) -> Option<String> {
        match error {
            DispatchError::CommandNotFound { .. } => None,
            DispatchError::CheckFailed { reason, .. } => reason.as_ref().map(|reason| format!(":warning: {reason}")),
            DispatchError::NotEnoughArguments { .. } | DispatchError::BadInput { .. } => {
                let prefix = match &ctxt.input {
                    Input::Text { prefix, .. } => prefix.as_str(),
                    Input::Structured { .. } => "/",
                };
                Some(format!(
                    ":warning: `{error}`\nUsage: `{prefix}{}`",
                    ctxt.command.usage()
                ))
            },
            DispatchError::UncaughtException { .. } => {
                Some(":warning: `An unexpected error occurred while running this command.`".to_owned())
            },
            _ => Some(format!(":warning: `{error}`")),
        }
    }
}

#[async_trait]
impl ErrorSink for ReplyingErrorSink {
    async fn report(&self, failure: Failure) {
        log(&failure);

        let Some(ctxt) = &failure.context else {
            return;
        };
        let Some(message) = Self::message(&failure.error, ctxt) else {
            return;
        };

        if let Err(e) = ctxt.reply(message).await {
            warn!("Failed to report an error to the invoking user: {e:#}");
        }
    }
}

/// Forwards failures to a channel, for hosts that handle them elsewhere.
pub struct ChannelErrorSink(pub UnboundedSender<Failure>);

#[async_trait]
impl ErrorSink for ChannelErrorSink {
    async fn report(&self, failure: Failure) {
        if let Err(e) = self.0.send(failure) {
            log(&e.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{RecordingResponder, context_with_responder, origin};

    #[tokio::test]
    async fn replies_with_usage() {
        let responder = Arc::new(RecordingResponder::default());
        let ctxt = context_with_responder(origin(), responder.clone());

        ReplyingErrorSink
            .report(Failure {
                error: DispatchError::NotEnoughArguments {
                    parameter: "name".to_owned(),
                },
                context: Some(ctxt.clone()),
            })
            .await;
        ReplyingErrorSink
            .report(Failure {
                error: DispatchError::CheckFailed {
                    check: "guild_only".to_owned(),
                    reason: None,
                },
                context: Some(ctxt),
            })
            .await;

        assert_eq!(responder.contents(), vec![
            ":warning: `an argument is required for 'name' but none were found`\nUsage: `!test`".to_owned()
        ]);
    }

    #[tokio::test]
    async fn channel_sink_forwards() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        ChannelErrorSink(tx)
            .report(Failure {
                error: DispatchError::CommandNotFound {
                    input: "nope".to_owned(),
                },
                context: None,
            })
            .await;

        let failure = rx.recv().await.unwrap();
        assert!(matches!(failure.error, DispatchError::CommandNotFound { .. }));
    }
}
