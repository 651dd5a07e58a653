//! Ping command plugin.
//!
//! Measures and displays Telegram API latency.

use std::time::Instant;

use anyhow::Context;
use async_trait::async_trait;

use super::{Plugin, PluginHost};
use crate::commands::CommandContext;

#[derive(Debug, Default)]
pub struct Ping;

#[async_trait]
impl Plugin for Ping {
    async fn setup(&self, host: &PluginHost) -> anyhow::Result<()> {
        host.add_command("ping", ping, "Check response time");
        Ok(())
    }
}

/// Handle the ping command - measures Telegram API latency.
async fn ping(ctx: CommandContext) -> anyhow::Result<()> {
    // getMe is the lightest authenticated call
    let start = Instant::now();
    ctx.client
        .backend()
        .get_me()
        .await
        .context("latency check failed")?;
    let ms = start.elapsed().as_millis();

    let indicator = if ms < 100 {
        "🟢"
    } else if ms < 300 {
        "🟡"
    } else {
        "🔴"
    };

    ctx.reply(&format!("{indicator} Pong! {ms}ms")).await?;
    Ok(())
}
