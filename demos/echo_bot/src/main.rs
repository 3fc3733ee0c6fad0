//! Echo Bot Example
//!
//! A small bot on top of bronze. It connects to a OneBot v11 implementation,
//! logs every message and answers three commands:
//!
//! - `echo <text>` / `复读 <text>`: repeats the text
//! - `签到` / `sign`: daily sign-in for a few coins (profiles kept per `[storage]`,
//!   in memory with `uri = "memory://"`)
//! - `帮助` / `help`: lists the commands
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot -- --config bronze.toml --profile development
//! ```

mod sign;

use std::path::PathBuf;

use anyhow::Result;
use bronze::prelude::*;
use clap::Parser;

use crate::sign::SignCommand;

#[derive(Parser, Debug)]
#[command(name = "echo-bot", about = "A small demo bot for the bronze OneBot client")]
struct Cli {
    /// Configuration file. Defaults to `bronze.toml` in the current or user config directory.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. `development` or `production`.
    #[arg(short, long)]
    profile: Option<String>,
}

async fn log_message(ctx: EventContext) {
    let Some(event) = ctx.event().as_message() else {
        return;
    };
    let Some(common) = event.common() else {
        return;
    };
    let name = common.sender.display_name().unwrap_or("Unknown");

    match event {
        MessageEvent::Group(g) => {
            info!(
                "[Group {}] {} ({}): {}",
                g.group_id,
                name,
                common.user_id,
                common.message.plain_text()
            );
        }
        _ => {
            info!(
                "[Private] {} ({}): {}",
                name,
                common.user_id,
                common.message.plain_text()
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = BronzeRuntime::builder();
    if let Some(path) = &cli.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &cli.profile {
        builder = builder.profile(profile);
    }
    let runtime = builder.build()?;

    let profiles = sign::open_profiles(&runtime.config().storage);

    runtime
        .on(EventType::Message, log_message)
        .command(
            CommandDescriptor::new("复读", "复读一段文字").triggers(["echo", "复读"]),
            command_fn(|ctx: MessageContext| async move {
                let text = ctx.args();
                if text.is_empty() {
                    ctx.quick_reply("要复读什么呢？", QuickReplyOptions::default())
                        .await?;
                } else {
                    ctx.reply(text).await?;
                }
                anyhow::Ok(())
            }),
        )
        .command(
            CommandDescriptor::new("签到", "每日签到获取积分").triggers(["签到", "sign"]),
            SignCommand::new(profiles),
        )
        .help_command(["帮助", "help"]);

    info!("Starting echo bot");
    runtime.run().await?;
    Ok(())
}
