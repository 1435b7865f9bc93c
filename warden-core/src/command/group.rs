use std::sync::Arc;

use super::Command;
use crate::check::Check;

pub enum Member {
    Command(Command),
    Group(CommandGroup),
}

impl Member {
    pub fn name(&self) -> &str {
        match self {
            Self::Command(c) => c.name(),
            Self::Group(g) => &g.name,
        }
    }

    pub(crate) fn names(&self) -> Vec<&str> {
        match self {
            Self::Command(c) => c.names().collect(),
            Self::Group(g) => g.names().collect(),
        }
    }
}

/// A named container of commands and nested groups.
///
/// A group's checks apply to every command below it, ahead of the command's own checks. If the
/// invocation names the group but none of its members, the default command runs instead, if
/// there is one.
pub struct CommandGroup {
    pub(crate) name: String,
    pub(crate) aliases: Vec<String>,
    pub(crate) description: String,
    pub(crate) checks: Vec<Arc<Check>>,
    pub(crate) members: Vec<Member>,
    pub(crate) default: Option<Command>,
}

impl CommandGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            description: String::new(),
            checks: Vec::new(),
            members: Vec::new(),
            default: None,
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

    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(Arc::new(check));
        self
    }

    pub fn command(mut self, command: Command) -> Self {
        self.members.push(Member::Command(command));
        self
    }

    pub fn group(mut self, group: CommandGroup) -> Self {
        self.members.push(Member::Group(group));
        self
    }

    /// Runs when the group is invoked without naming one of its members. The default command is
    /// reached through the group's own name, so its name is only used for logging.
    pub fn default_command(mut self, command: Command) -> Self {
        self.default = Some(command);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}
