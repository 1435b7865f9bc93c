// See config.template.toml for information on the variables here.

#[allow(clippy::module_inception)]
pub mod config;

pub use config::{DevAttributes, DispatchAttributes, Prefixes, WardenConfig};

pub static CONFIG_LOCATION: &str = "./config.toml";
