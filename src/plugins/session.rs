//! Session string health report for the userbot.

use async_trait::async_trait;

use super::{Plugin, PluginHost};
use crate::client::Identity;
use crate::commands::CommandContext;
use crate::session;

#[derive(Debug, Default)]
pub struct Session;

#[async_trait]
impl Plugin for Session {
    async fn setup(&self, host: &PluginHost) -> anyhow::Result<()> {
        // The assistant logs in with a bot token and has no session string
        if host.identity() == Identity::Userbot {
            host.add_command("session", report, "Analyze the session string (sudo)");
        }
        Ok(())
    }
}

async fn report(ctx: CommandContext) -> anyhow::Result<()> {
    if !ctx.require_sudo().await? {
        return Ok(());
    }

    let analysis = session::analyze(&ctx.client.config().session_string);
    let report = &analysis.report;

    let mut lines = vec!["🔐 Session Analysis\n".to_owned()];
    lines.push(format!(
        "Valid: {}",
        if report.valid { "yes" } else { "no" }
    ));
    if let Some(error) = &report.error {
        lines.push(format!("Error: {error}"));
    }
    if let Some(info) = &report.info {
        lines.push(format!("Length: {} chars, {} bytes", info.string_length, info.decoded_length));
        lines.push(format!(
            "Data center: {}",
            info.dc_id.map_or_else(|| "unknown".to_owned(), |dc| format!("DC{dc}"))
        ));
    }
    lines.push(format!("Security score: {}/100", analysis.security_score));

    for warning in &report.warnings {
        lines.push(format!("⚠️ {warning}"));
    }
    for recommendation in &analysis.recommendations {
        lines.push(format!("💡 {recommendation}"));
    }

    ctx.reply(&lines.join("\n")).await?;
    Ok(())
}
