//! Persist configuration variables to the `.env` file.

use anyhow::Context;
use async_trait::async_trait;
use tracing::info;

use super::{Plugin, PluginHost};
use crate::commands::CommandContext;
use crate::config::Config;

#[derive(Debug, Default)]
pub struct SetVar;

#[async_trait]
impl Plugin for SetVar {
    async fn setup(&self, host: &PluginHost) -> anyhow::Result<()> {
        host.add_command("setvar", set_var, "Save a variable to .env (sudo)");
        Ok(())
    }
}

async fn set_var(ctx: CommandContext) -> anyhow::Result<()> {
    if !ctx.require_sudo().await? {
        return Ok(());
    }

    let Some((key, value)) = ctx.command.split_first().filter(|(_, value)| !value.is_empty()) else {
        ctx.reply(&format!("Usage: {}setvar <KEY> <value>", ctx.client.prefix()))
            .await?;
        return Ok(());
    };

    let key = key.to_uppercase();
    if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        ctx.reply(&format!("❌ Invalid variable name: {key}")).await?;
        return Ok(());
    }

    // The running config stays shared and immutable; the change takes
    // effect on the next start.
    let mut config = Config::clone(ctx.client.config());
    let known = config
        .update_env_var(&key, value)
        .with_context(|| format!("failed to save {key}"))?;
    info!("Saved {} to {}", key, config.paths.env_file.display());

    let note = if known {
        "Restart to apply."
    } else {
        "Not a Nexus setting, saved as-is."
    };
    ctx.reply(&format!("✅ {key} saved to .env\n{note}")).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::client::Identity;
    use crate::config::EnvFile;
    use crate::testing::{self, MockMessage};

    #[tokio::test]
    async fn test_setvar_persists() {
        let (_dir, _backend, client) = testing::started_client(Identity::Userbot, &[]).await;

        let replies =
            testing::replies_to(&client, MockMessage::outgoing(".setvar bot_name Nexus Prime")).await;
        assert_eq!(replies, vec!["✅ BOT_NAME saved to .env\nRestart to apply."]);

        let vars = EnvFile::new(&client.config().paths.env_file).read().unwrap();
        assert!(vars.contains(&("BOT_NAME".to_owned(), "Nexus Prime".to_owned())));
        // The running config is untouched
        assert_eq!(client.config().bot_name, "Nexus");
    }

    #[tokio::test]
    async fn test_setvar_usage_and_validation() {
        let (_dir, _backend, client) = testing::started_client(Identity::Userbot, &[]).await;

        let replies = testing::replies_to(&client, MockMessage::outgoing(".setvar ONLY_KEY")).await;
        assert_eq!(replies, vec!["Usage: .setvar <KEY> <value>"]);

        let replies = testing::replies_to(&client, MockMessage::outgoing(".setvar BAD-KEY 1")).await;
        assert_eq!(replies, vec!["❌ Invalid variable name: BAD-KEY"]);

        let replies = testing::replies_to(&client, MockMessage::outgoing(".setvar CUSTOM_FLAG on")).await;
        assert_eq!(replies, vec!["✅ CUSTOM_FLAG saved to .env\nNot a Nexus setting, saved as-is."]);
    }
}
