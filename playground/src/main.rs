//! Runs the demo commands against lines read from stdin, as if each line were a message sent in a
//! guild channel.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use twilight_model::guild::Permissions;
use twilight_model::id::Id;
use warden_common::config::{CONFIG_LOCATION, WardenConfig};
use warden_common::{ok_or_break, tracing_init};
use warden_core::command::registry::CommandTree;
use warden_core::context::{MemberData, MessageBuilder, Origin, Respond};
use warden_core::converter::registry::ConverterRegistry;
use warden_core::dispatch::event::{IncomingEvent, MessageEvent};
use warden_core::dispatch::sink::ReplyingErrorSink;
use warden_core::dispatch::{DispatchConfig, Dispatcher};

mod commands;

const FALLBACK_CONFIG: &str = r#"
[prefix]
default = ["!"]

[dispatch]
invocation_timeout_ms = 30000
concurrent = true
"#;

struct Stdout;

#[async_trait]
impl Respond for Stdout {
    async fn respond(&self, message: MessageBuilder) -> anyhow::Result<()> {
        if let Some(content) = message.content {
            println!("> {content}");
        }

        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_init!();

    let config = match WardenConfig::load(CONFIG_LOCATION) {
        Ok(config) => config,
        Err(e) => {
            warn!("{e:#}, using the built-in defaults");
            WardenConfig::from_toml_str(FALLBACK_CONFIG)?
        },
    };

    let mut tree = CommandTree::new();
    commands::register(&mut tree, &config.dev.owner_ids)?;
    info!("Registered {} commands", tree.commands().len());

    let dispatcher = Dispatcher::new(tree, ConverterRegistry::with_defaults(), DispatchConfig::from(&config))
        .with_error_sink(Arc::new(ReplyingErrorSink));

    let author = config
        .dev
        .owner_ids
        .first()
        .copied()
        .and_then(Id::new_checked)
        .unwrap_or(Id::new(1));
    let origin = Origin::new(author, Id::new(2)).in_guild(Id::new(3), MemberData {
        roles: vec![],
        permissions: Permissions::ADMINISTRATOR,
    });

    let (tx, rx) = mpsc::channel(16);
    let runner = tokio::spawn(Arc::new(dispatcher).run(rx));
    let responder: Arc<dyn Respond> = Arc::new(Stdout);

    info!("Reading messages from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Some(content) = ok_or_break!(lines.next_line().await) else {
            break;
        };

        let event = IncomingEvent::Message(MessageEvent {
            origin: origin.clone(),
            content,
            responder: responder.clone(),
        });
        ok_or_break!(tx.send(event).await);
    }

    drop(tx);
    runner.await?;
    Ok(())
}
