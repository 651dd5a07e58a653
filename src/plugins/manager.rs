//! Plugin management commands: list, load, unload, reload.

use async_trait::async_trait;

use super::{Plugin, PluginHost};
use crate::commands::CommandContext;

#[derive(Debug, Default)]
pub struct Manager;

#[async_trait]
impl Plugin for Manager {
    async fn setup(&self, host: &PluginHost) -> anyhow::Result<()> {
        host.add_command("plugins", list, "List loaded and available plugins");
        host.add_command("load", load, "Load a plugin (sudo)");
        host.add_command("unload", unload, "Unload a plugin (sudo)");
        host.add_command("reload", reload, "Reload a plugin (sudo)");
        Ok(())
    }
}

async fn list(ctx: CommandContext) -> anyhow::Result<()> {
    if !ctx.require_sudo().await? {
        return Ok(());
    }

    let loaded = ctx.client.loaded_plugins().await;
    let available = ctx.client.available_plugins().await;

    let mut lines = vec![format!("🔌 Plugins ({}/{} loaded)\n", loaded.len(), available.len())];
    for name in &available {
        let marker = if loaded.contains(name) { "✅" } else { "⬜" };
        lines.push(format!("{marker} {name}"));
    }

    ctx.reply(&lines.join("\n")).await?;
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Load,
    Unload,
    Reload,
}

async fn load(ctx: CommandContext) -> anyhow::Result<()> {
    manage(ctx, Action::Load).await
}

async fn unload(ctx: CommandContext) -> anyhow::Result<()> {
    manage(ctx, Action::Unload).await
}

async fn reload(ctx: CommandContext) -> anyhow::Result<()> {
    manage(ctx, Action::Reload).await
}

async fn manage(ctx: CommandContext, action: Action) -> anyhow::Result<()> {
    if !ctx.require_sudo().await? {
        return Ok(());
    }

    let Some(name) = ctx.command.first_arg() else {
        let usage = match action {
            Action::Load => "load",
            Action::Unload => "unload",
            Action::Reload => "reload",
        };
        ctx.reply(&format!("Usage: {}{usage} <plugin>", ctx.client.prefix()))
            .await?;
        return Ok(());
    };
    let name = name.to_lowercase();

    let (done, verb, failure) = match action {
        Action::Load => (ctx.client.load_plugin(&name).await, "Loaded", "Failed to load plugin"),
        Action::Unload => (ctx.client.unload_plugin(&name).await, "Unloaded", "Plugin not loaded"),
        Action::Reload => (
            ctx.client.reload_plugin(&name).await,
            "Reloaded",
            "Failed to reload plugin",
        ),
    };
    let text = if done {
        format!("✅ {verb} plugin: {name}")
    } else {
        format!("❌ {failure}: {name}")
    };

    ctx.reply(&text).await?;
    Ok(())
}
