//! Fixtures shared by the unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use twilight_model::id::Id;

use crate::command::Command;
use crate::command::arguments::Arguments;
use crate::context::{EntitySource, Input, InvocationContext, MessageBuilder, NoEntities, Origin, Respond};

/// Keeps every response instead of sending it.
#[derive(Default)]
pub(crate) struct RecordingResponder(Mutex<Vec<MessageBuilder>>);

impl RecordingResponder {
    pub(crate) fn contents(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter_map(|message| message.content.clone())
            .collect()
    }
}

#[async_trait]
impl Respond for RecordingResponder {
    async fn respond(&self, message: MessageBuilder) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(message);
        Ok(())
    }
}

/// A DM from user 100 in channel 200.
pub(crate) fn origin() -> Origin {
    Origin::new(Id::new(100), Id::new(200))
}

async fn noop(_: InvocationContext, _: Arguments) -> anyhow::Result<()> {
    Ok(())
}

fn build(origin: Origin, responder: Arc<dyn Respond>, entities: Arc<dyn EntitySource>) -> InvocationContext {
    let command = Command::builder("test").handler(noop).build().unwrap();
    let input = Input::Text {
        prefix: "!".to_owned(),
        invoked_with: "test".to_owned(),
        remainder: String::new(),
    };

    InvocationContext::new(origin, Arc::new(command), input, responder, entities)
}

/// A text invocation of `!test`, a command without parameters.
pub(crate) fn context(origin: Origin) -> InvocationContext {
    build(origin, Arc::new(RecordingResponder::default()), Arc::new(NoEntities))
}

pub(crate) fn context_with_entities(origin: Origin, entities: Arc<dyn EntitySource>) -> InvocationContext {
    build(origin, Arc::new(RecordingResponder::default()), entities)
}

pub(crate) fn context_with_responder(origin: Origin, responder: Arc<RecordingResponder>) -> InvocationContext {
    build(origin, responder, Arc::new(NoEntities))
}
