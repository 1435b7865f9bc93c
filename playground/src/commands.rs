use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use tracing::warn;
use warden_core::check::builtin::{guild_only, owner_only};
use warden_core::command::arguments::{ArgKind, Arguments};
use warden_core::command::errors::CommandRegistrationError;
use warden_core::command::group::CommandGroup;
use warden_core::command::registry::CommandTree;
use warden_core::command::{Command, ParamSpec};
use warden_core::context::InvocationContext;
use warden_core::converter::Choice;
use warden_core::converter::builtin::{choice, flag, integer};
use warden_core::cooldown::{BucketType, Cooldown};

type Tags = Arc<Mutex<HashMap<String, String>>>;

async fn greet(ctxt: InvocationContext, args: Arguments) -> anyhow::Result<()> {
    let name = args.string("name").unwrap_or("stranger");
    let greeting = format!("Hello, {name}!");

    if args.boolean("loud").unwrap_or(false) {
        ctxt.reply(greeting.to_uppercase()).await
    } else {
        ctxt.reply(greeting).await
    }
}

async fn roll(ctxt: InvocationContext, args: Arguments) -> anyhow::Result<()> {
    let sides = args.integer("sides").unwrap_or(6).max(1);
    // good enough for a demo
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .subsec_nanos();
    let result = i64::from(nanos) % sides + 1;

    ctxt.reply(format!("You rolled a {result} (d{sides})")).await
}

async fn say(ctxt: InvocationContext, args: Arguments) -> anyhow::Result<()> {
    let text = args.string("text").context("text is required")?;
    ctxt.reply(text).await
}

async fn remind(ctxt: InvocationContext, args: Arguments) -> anyhow::Result<()> {
    let after = args.duration("after").context("duration is required")?;
    let note = args.string("note").unwrap_or("something").to_owned();

    ctxt.reply(format!("I'll remind you in {}s.", after.as_secs())).await?;
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        if let Err(e) = ctxt.reply(format!("Reminder: {note}")).await {
            warn!("Failed to deliver a reminder: {e:?}");
        }
    });

    Ok(())
}

async fn shutdown(ctxt: InvocationContext, _: Arguments) -> anyhow::Result<()> {
    ctxt.reply("Shutting down. Close stdin to exit.").await
}

fn tag_group(tags: &Tags) -> Result<CommandGroup, CommandRegistrationError> {
    let store = tags.clone();
    let create = Command::builder("create")
        .alias("add")
        .description("save a tag")
        .param(ParamSpec::new("name", ArgKind::String))
        .param(ParamSpec::new("content", ArgKind::String).rest())
        .check(guild_only())
        .handler(move |ctxt: InvocationContext, args: Arguments| {
            let store = store.clone();
            async move {
                let name = args.string("name").context("name is required")?.to_owned();
                let content = args.string("content").context("content is required")?.to_owned();

                let created = {
                    let mut tags = store.lock().map_err(|_| anyhow::anyhow!("tag store poisoned"))?;
                    tags.insert(name.clone(), content).is_none()
                };

                if created {
                    ctxt.reply(format!("Created tag {name}")).await
                } else {
                    ctxt.reply(format!("Updated tag {name}")).await
                }
            }
        })
        .build()?;

    let store = tags.clone();
    let show = Command::builder("show")
        .description("print a tag")
        .param(ParamSpec::new("name", ArgKind::String))
        .handler(move |ctxt: InvocationContext, args: Arguments| {
            let store = store.clone();
            async move {
                let name = args.string("name").context("name is required")?;
                let content = store
                    .lock()
                    .map_err(|_| anyhow::anyhow!("tag store poisoned"))?
                    .get(name)
                    .cloned();

                match content {
                    Some(content) => ctxt.reply(content).await,
                    None => ctxt.reply(format!("No tag named {name}")).await,
                }
            }
        })
        .build()?;

    Ok(CommandGroup::new("tag")
        .alias("t")
        .description("store and recall snippets")
        .command(create)
        .default_command(show))
}

/// Every demo command.
pub fn register(tree: &mut CommandTree, owners: &[u64]) -> Result<(), CommandRegistrationError> {
    tree.register_command(
        Command::builder("greet")
            .alias("hi")
            .description("say hello")
            .example("greet \"John Doe\" --loud")
            .param(ParamSpec::new("name", ArgKind::String))
            .param(
                ParamSpec::new("loud", ArgKind::Boolean)
                    .converter(flag("loud"))
                    .default(false),
            )
            .handler(greet)
            .build()?,
    )?;

    let sides = choice(integer(), vec![
        Choice::new("d6", 6i64),
        Choice::new("d20", 20i64),
        Choice::new("d100", 100i64),
    ]);
    tree.register_command(
        Command::builder("roll")
            .description("roll a die")
            .param(ParamSpec::new("sides", ArgKind::Integer).converter(sides).default(6i64))
            .check(Cooldown::new(BucketType::USER, Duration::from_secs(10)).tokens(2).into_check())
            .handler(roll)
            .build()?,
    )?;

    tree.register_command(
        Command::builder("say")
            .description("repeat after me")
            .param(ParamSpec::new("text", ArgKind::String).rest())
            .handler(say)
            .build()?,
    )?;

    tree.register_command(
        Command::builder("remind")
            .description("remind you of something later")
            .param(ParamSpec::new("after", ArgKind::Duration))
            .param(ParamSpec::new("note", ArgKind::String).rest().optional())
            .handler(remind)
            .build()?,
    )?;

    tree.register_command(
        Command::builder("shutdown")
            .category("dev")
            .check(owner_only(owners.iter().copied()))
            .handler(shutdown)
            .build()?,
    )?;

    let tags = Tags::default();
    tree.register_group(tag_group(&tags)?)
}
