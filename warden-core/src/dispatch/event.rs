use std::sync::Arc;

use twilight_model::application::interaction::application_command::{
    CommandData, CommandDataOption, CommandOptionValue,
};

use crate::context::{Origin, Respond};

/// An event the host wants dispatched.
pub enum IncomingEvent {
    Message(MessageEvent),
    Interaction(InteractionEvent),
}

/// A text message that may start with a command prefix.
pub struct MessageEvent {
    pub origin: Origin,
    pub content: String,
    pub responder: Arc<dyn Respond>,
}

/// An application command invocation.
pub struct InteractionEvent {
    pub origin: Origin,
    /// The command path, e.g. `["tag", "create"]`.
    pub path: Vec<String>,
    /// Options of the innermost sub-command.
    pub options: Vec<CommandDataOption>,
    pub responder: Arc<dyn Respond>,
}

impl InteractionEvent {
    pub fn from_command_data(origin: Origin, data: &CommandData, responder: Arc<dyn Respond>) -> Self {
        Self::from_options(origin, &data.name, &data.options, responder)
    }

    /// Follows sub-command groups and sub-commands down to the invoked command, collecting the
    /// path on the way.
    pub fn from_options(
        origin: Origin,
        name: &str,
        mut options: &[CommandDataOption],
        responder: Arc<dyn Respond>,
    ) -> Self {
        let mut path = vec![name.to_owned()];

        while let [option] = options
            && let CommandOptionValue::SubCommand(inner) | CommandOptionValue::SubCommandGroup(inner) = &option.value
        {
            path.push(option.name.clone());
            options = inner.as_slice();
        }

        Self {
            origin,
            path,
            options: options.to_vec(),
            responder,
        }
    }
}

#[cfg(test)]
mod tests {
    use twilight_model::id::Id;

    use super::*;
    use crate::testing::{RecordingResponder, origin};

    fn option(name: &str, value: CommandOptionValue) -> CommandDataOption {
        CommandDataOption {
            name: name.to_owned(),
            value,
        }
    }

    #[test]
    fn sub_commands_become_the_path() {
        let options = vec![option(
            "admin",
            CommandOptionValue::SubCommandGroup(vec![option(
                "purge",
                CommandOptionValue::SubCommand(vec![option("user", CommandOptionValue::User(Id::new(5)))]),
            )]),
        )];

        let event = InteractionEvent::from_options(origin(), "tag", &options, Arc::new(RecordingResponder::default()));
        assert_eq!(event.path, vec!["tag", "admin", "purge"]);
        assert_eq!(event.options, vec![option("user", CommandOptionValue::User(Id::new(5)))]);
    }

    #[test]
    fn plain_options_stay_put() {
        let options = vec![option("name", CommandOptionValue::String("x".to_owned()))];
        let event = InteractionEvent::from_options(origin(), "greet", &options, Arc::new(RecordingResponder::default()));
        assert_eq!(event.path, vec!["greet"]);
        assert_eq!(event.options, options);
    }
}
