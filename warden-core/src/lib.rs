//! A command framework for Discord bots.
//!
//! Commands are declared with [`command::Command::builder`] and registered into a
//! [`command::registry::CommandTree`]. A [`dispatch::Dispatcher`] turns incoming messages and
//! interactions into invocations, gating them with [`check`]s such as [`cooldown::Cooldown`] and
//! parsing their arguments with the [`converter`]s registered for each argument kind.

pub mod check;
pub mod command;
pub mod context;
pub mod converter;
pub mod cooldown;
pub mod cursor;
pub mod dispatch;

#[cfg(test)]
mod testing;
