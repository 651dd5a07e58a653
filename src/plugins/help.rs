//! Help command plugin.

use async_trait::async_trait;

use super::{Plugin, PluginHost};
use crate::commands::CommandContext;

#[derive(Debug, Default)]
pub struct Help;

#[async_trait]
impl Plugin for Help {
    async fn setup(&self, host: &PluginHost) -> anyhow::Result<()> {
        host.add_command("help", help, "List commands, or describe one");
        Ok(())
    }
}

async fn help(ctx: CommandContext) -> anyhow::Result<()> {
    let prefix = ctx.client.prefix();
    let commands = ctx.client.commands();

    let text = match ctx.command.first_arg() {
        Some(name) => {
            let name = name.trim_start_matches(prefix).to_lowercase();
            match commands.get(&name) {
                Some(entry) => {
                    let plugin = entry.plugin.as_deref().unwrap_or("core");
                    format!("{prefix}{name}\n{}\n\nPlugin: {plugin}", entry.description)
                }
                None => format!("Unknown command: {name}\nUse {prefix}help to list commands."),
            }
        }
        None => {
            let mut lines = vec![format!(
                "📖 {} commands ({})\n",
                ctx.client.identity(),
                commands.len()
            )];
            for (name, description) in commands.descriptions() {
                lines.push(format!("{prefix}{name} - {description}"));
            }
            lines.join("\n")
        }
    };

    ctx.reply(&text).await?;
    Ok(())
}
