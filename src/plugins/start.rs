//! Start command plugin.
//!
//! Greets users who open a chat with the assistant bot.

use async_trait::async_trait;

use super::{Plugin, PluginHost};
use crate::client::Identity;
use crate::commands::CommandContext;

#[derive(Debug, Default)]
pub struct Start;

#[async_trait]
impl Plugin for Start {
    async fn setup(&self, host: &PluginHost) -> anyhow::Result<()> {
        if host.identity() == Identity::Assistant {
            host.add_command("start", start, "Greeting for new users");
        }
        Ok(())
    }
}

async fn start(ctx: CommandContext) -> anyhow::Result<()> {
    let config = ctx.client.config();
    let owner = config
        .owner_username
        .as_deref()
        .map_or_else(|| config.owner_name.clone(), |username| format!("{} (@{username})", config.owner_name));

    let mut text = format!(
        "👋 Hello! I'm the assistant of {owner}.\n\n\
         I work alongside {} to help with tasks that need a bot account.\n\
         Send {}help to see what I can do.",
        config.bot_name,
        ctx.client.prefix(),
    );
    if ctx.is_sudo {
        text.push_str("\n\nYou have sudo access.");
    }

    ctx.reply(&text).await?;
    Ok(())
}
