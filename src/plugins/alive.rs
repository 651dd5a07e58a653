//! Alive command plugin.

use async_trait::async_trait;

use super::{Plugin, PluginHost};
use crate::commands::CommandContext;
use crate::config::BOT_VERSION;

#[derive(Debug, Default)]
pub struct Alive;

#[async_trait]
impl Plugin for Alive {
    async fn setup(&self, host: &PluginHost) -> anyhow::Result<()> {
        host.add_command("alive", alive, "Show bot status and uptime");
        Ok(())
    }
}

async fn alive(ctx: CommandContext) -> anyhow::Result<()> {
    let client = &ctx.client;
    let config = client.config();

    let account = client
        .me()
        .map_or_else(|| "N/A".to_owned(), |me| format!("{} ({})", me.mention(), me.id));
    let since = client.started_at().map_or_else(
        || "N/A".to_owned(),
        |at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );
    let plugins = client.loaded_plugins().await.len();

    let text = format!(
        "✨ {} is alive!\n\n\
         Version: v{BOT_VERSION}\n\
         Client: {}\n\
         Account: {account}\n\
         Owner: {}\n\
         Uptime: {}\n\
         Since: {since}\n\
         Plugins: {plugins} loaded\n\
         Commands: {} available",
        config.bot_name,
        client.identity(),
        config.owner_name,
        client.uptime_string(),
        client.commands().len(),
    );

    ctx.reply(&text).await?;
    Ok(())
}
