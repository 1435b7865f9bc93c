use std::sync::Arc;

use tracing::debug;

use super::errors::CommandRegistrationError;
use super::group::{CommandGroup, Member};
use super::{Command, ParamSpec, validate_name};
use crate::check::Check;
use crate::cursor::TextCursor;

enum Node {
    Command(Arc<Command>),
    Group(GroupNode),
}

struct GroupNode {
    name: String,
    aliases: Vec<String>,
    description: String,
    children: Vec<Node>,
    default: Option<Arc<Command>>,
}

impl Node {
    fn names(&self) -> Vec<&str> {
        match self {
            Self::Command(c) => c.names().collect(),
            Self::Group(g) => std::iter::once(g.name.as_str())
                .chain(g.aliases.iter().map(String::as_str))
                .collect(),
        }
    }

    fn matches(&self, word: &str, case_sensitive: bool) -> bool {
        self.names().into_iter().any(|name| {
            if case_sensitive {
                name == word
            } else {
                name == word.to_lowercase()
            }
        })
    }

    fn collect_commands(&self, out: &mut Vec<Arc<Command>>) {
        match self {
            Self::Command(c) => out.push(c.clone()),
            Self::Group(g) => {
                out.extend(g.default.iter().cloned());
                for child in &g.children {
                    child.collect_commands(out);
                }
            },
        }
    }
}

/// A command resolved from text input.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub command: Arc<Command>,
    /// The words that named the command, as typed.
    pub invoked_with: String,
}

/// The registry of every command and group the dispatcher knows about.
///
/// Registration freezes a command: its qualified name and inherited checks are fixed from the
/// groups it was registered under.
#[derive(Default)]
pub struct CommandTree {
    roots: Vec<Node>,
    case_sensitive: bool,
}

impl CommandTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn register_command(&mut self, command: Command) -> Result<(), CommandRegistrationError> {
        self.register(Member::Command(command))
    }

    pub fn register_group(&mut self, group: CommandGroup) -> Result<(), CommandRegistrationError> {
        self.register(Member::Group(group))
    }

    pub fn register(&mut self, member: Member) -> Result<(), CommandRegistrationError> {
        let taken = self.roots.iter().flat_map(Node::names).collect::<Vec<_>>();
        if let Some(name) = member.names().into_iter().find(|name| taken.contains(name)) {
            return Err(CommandRegistrationError::DuplicateName {
                name: name.to_owned(),
                parent: None,
            });
        }

        let node = freeze(member, None, &[])?;
        debug!("Registered command tree entry {}", node.names().join("/"));
        self.roots.push(node);
        Ok(())
    }

    /// Resolves a command from the leading words of `cursor`, descending through groups.
    ///
    /// On success the cursor is left just past the words naming the command. A word that names
    /// nothing is put back, so that a group's default command sees it as its first argument.
    pub fn lookup_words(&self, cursor: &mut TextCursor) -> Option<Resolved> {
        let mut nodes = &self.roots;
        let mut path = Vec::new();
        let mut fallback: Option<&Arc<Command>> = None;

        loop {
            let Some(word) = cursor.next_word() else {
                break;
            };

            match nodes.iter().find(|node| node.matches(&word, self.case_sensitive)) {
                Some(Node::Command(command)) => {
                    path.push(word);
                    return Some(Resolved {
                        command: command.clone(),
                        invoked_with: path.join(" "),
                    });
                },
                Some(Node::Group(group)) => {
                    path.push(word);
                    nodes = &group.children;
                    fallback = group.default.as_ref();
                },
                None => {
                    cursor.undo();
                    break;
                },
            }
        }

        fallback.map(|command| Resolved {
            command: command.clone(),
            invoked_with: path.join(" "),
        })
    }

    /// Resolves a command by its exact path, as structured input names it.
    pub fn lookup_path<S: AsRef<str>>(&self, path: &[S]) -> Option<Arc<Command>> {
        let (last, groups) = path.split_last()?;
        let mut nodes = &self.roots;

        for segment in groups {
            match nodes.iter().find(|node| node.matches(segment.as_ref(), true))? {
                Node::Group(group) => nodes = &group.children,
                Node::Command(_) => return None,
            }
        }

        match nodes.iter().find(|node| node.matches(last.as_ref(), true))? {
            Node::Command(command) => Some(command.clone()),
            Node::Group(group) => group.default.clone(),
        }
    }

    /// The description of the group at `path`, for help listings.
    pub fn group_description<S: AsRef<str>>(&self, path: &[S]) -> Option<&str> {
        let mut nodes = &self.roots;
        let mut description = None;

        for segment in path {
            match nodes.iter().find(|node| node.matches(segment.as_ref(), true))? {
                Node::Group(group) => {
                    nodes = &group.children;
                    description = Some(group.description.as_str());
                },
                Node::Command(_) => return None,
            }
        }

        description
    }

    /// Checks of every enclosing group, outermost first, followed by the command's own.
    pub fn effective_checks(&self, command: &Command) -> Vec<Arc<Check>> {
        command.effective_checks()
    }

    pub fn parameter_schema<'c>(&self, command: &'c Command) -> &'c [ParamSpec] {
        command.params()
    }

    /// Every registered command, including group defaults.
    pub fn commands(&self) -> Vec<Arc<Command>> {
        let mut commands = Vec::new();
        for root in &self.roots {
            root.collect_commands(&mut commands);
        }
        commands
    }
}

fn qualify(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) => format!("{parent} {name}"),
        None => name.to_owned(),
    }
}

fn freeze(member: Member, parent: Option<&str>, inherited: &[Arc<Check>]) -> Result<Node, CommandRegistrationError> {
    match member {
        Member::Command(mut command) => {
            command.place(qualify(parent, command.name()), inherited);
            Ok(Node::Command(Arc::new(command)))
        },
        Member::Group(group) => {
            validate_name(&group.name)?;
            for alias in &group.aliases {
                validate_name(alias)?;
            }

            let mut seen = Vec::new();
            for name in group.members.iter().flat_map(Member::names) {
                if seen.contains(&name) {
                    return Err(CommandRegistrationError::DuplicateName {
                        name: name.to_owned(),
                        parent: Some(group.name.clone()),
                    });
                }
                seen.push(name);
            }

            let path = qualify(parent, &group.name);
            let inherited = inherited.iter().chain(&group.checks).cloned().collect::<Vec<_>>();

            let children = group
                .members
                .into_iter()
                .map(|member| freeze(member, Some(&path), &inherited))
                .collect::<Result<Vec<_>, _>>()?;

            let default = group.default.map(|mut command| {
                command.place(path.clone(), &inherited);
                Arc::new(command)
            });

            Ok(Node::Group(GroupNode {
                name: group.name,
                aliases: group.aliases,
                description: group.description,
                children,
                default,
            }))
        },
    }
}
