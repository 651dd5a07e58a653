//! Interactive session string generator.
//!
//! Logs in once with a phone number (or a QR code) and exports the session
//! as a string the userbot can start from.

use std::io::{Write, stdout};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use clap::Parser;
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use dialoguer::{Input, Password};
use qrcode::QrCode;
use qrcode::render::unicode;

use nexus_userbot::config::{BOT_VERSION, EnvFile, Paths};
use nexus_userbot::session;
use nexus_userbot::telegram::{GrammersClient, QrAuthResult, TelegramError};

const SESSION_FILE: &str = "session_string.txt";
const QR_POLL_INTERVAL: Duration = Duration::from_secs(5);
const QR_ATTEMPTS: u32 = 24;

/// Generates a session string for the Nexus userbot.
#[derive(Parser, Debug)]
#[command(name = "generate_session")]
#[command(about = "Generate a session string for the Nexus userbot")]
#[command(version)]
struct Args {
    /// Log in by scanning a QR code instead of entering a login code.
    #[arg(long)]
    qr: bool,

    /// Where to write the session string.
    #[arg(short, long, default_value = SESSION_FILE)]
    output: PathBuf,

    /// Where to write the configuration template.
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    print_banner();

    let api_id = prompt_api_id()?;
    let api_hash = prompt_api_hash()?;

    let paths = Paths::from_env();
    std::fs::create_dir_all(&paths.sessions_dir)
        .with_context(|| format!("Failed to create {}", paths.sessions_dir.display()))?;
    let session_path = paths.sessions_dir.join("generate_session.session");
    // Always start from a blank session
    remove_if_exists(&session_path)?;

    println!("🔄 Connecting to Telegram...\n");
    let client = GrammersClient::connect(api_id, &session_path)
        .await
        .context("Failed to connect to Telegram")?;

    if args.qr {
        qr_login(&client, api_id, &api_hash).await?;
    } else {
        let phone = prompt_phone()?;
        phone_login(&client, &phone, &api_hash).await?;
    }

    let me = client.get_me().await.context("Failed to fetch account info")?;
    println!("✅ Session string generated successfully!\n");
    println!("👤 Account Information:");
    println!("   Name: {}", me.first_name);
    println!("   Username: @{}", me.username.as_deref().unwrap_or("N/A"));
    println!("   ID: {}", me.id);

    let exported = client
        .export_session(api_id, &api_hash, &me)
        .context("Failed to export the session")?;
    client.disconnect();
    remove_if_exists(&session_path)?;

    let session_string = exported.encode().context("Failed to encode the session")?;
    let report = session::validate(&session_string);
    if !report.valid || !report.warnings.is_empty() {
        println!("\n⚠️ The generated session string did not pass validation cleanly.");
        for warning in &report.warnings {
            println!("   - {warning}");
        }
    }

    print_session(&session_string);
    save_outputs(&args, api_id, &api_hash, &session_string);
    print_notes();

    Ok(())
}

fn print_banner() {
    let rule = "=".repeat(60);
    println!("\n{rule}");
    println!("🌟 NEXUS v{BOT_VERSION} SESSION STRING GENERATOR 🌟");
    println!("{rule}");
    println!("The session string is used instead of a phone number at startup");
    println!("{rule}\n");
}

fn prompt_api_id() -> Result<i32> {
    println!("📋 STEP 1: Get your API credentials");
    println!("Visit: https://my.telegram.org/apps");
    println!("Create an app and get your API_ID and API_HASH\n");

    let api_id: i32 = Input::new()
        .with_prompt("🔢 Enter your API_ID")
        .validate_with(|id: &i32| {
            if *id > 0 {
                Ok(())
            } else {
                Err("API_ID must be a positive number")
            }
        })
        .interact_text()?;
    Ok(api_id)
}

fn prompt_api_hash() -> Result<String> {
    let api_hash: String = Input::new()
        .with_prompt("🔑 Enter your API_HASH")
        .validate_with(|hash: &String| {
            if is_api_hash(hash.trim()) {
                Ok(())
            } else {
                Err("API_HASH should be 32 hexadecimal characters")
            }
        })
        .interact_text()?;

    println!("✅ API credentials received\n");
    Ok(api_hash.trim().to_owned())
}

/// API hashes from my.telegram.org are 32 hex digits.
fn is_api_hash(hash: &str) -> bool {
    hash.len() == 32 && hash.chars().all(|c| c.is_ascii_hexdigit())
}

/// Adds the leading `+` when missing.
fn normalize_phone(input: &str) -> String {
    let phone = input.trim();
    if phone.starts_with('+') {
        phone.to_owned()
    } else {
        format!("+{phone}")
    }
}

fn prompt_phone() -> Result<String> {
    println!("📱 STEP 2: Enter your phone number");
    println!("Include country code (e.g., +1234567890)\n");

    let phone: String = Input::new()
        .with_prompt("📞 Enter your phone number")
        .validate_with(|phone: &String| {
            if normalize_phone(phone).len() >= 8 {
                Ok(())
            } else {
                Err("Phone number seems too short, include the country code")
            }
        })
        .interact_text()?;

    println!("✅ Phone number received\n");
    Ok(normalize_phone(&phone))
}

async fn phone_login(client: &GrammersClient, phone: &str, api_hash: &str) -> Result<()> {
    println!("🔄 STEP 3: Generating session string...");
    println!("You will receive a login code via Telegram\n");

    let token = client
        .request_login_code(phone, api_hash)
        .await
        .context("Failed to request login code")?;

    let code: String = Input::new()
        .with_prompt("Enter the login code")
        .interact_text()?;

    match client.sign_in(&token, code.trim()).await {
        Ok(()) => Ok(()),
        Err(TelegramError::PasswordRequired(mut password_token)) => loop {
            let hint = password_token.hint().unwrap_or("no hint").to_owned();
            println!("🔐 Two-factor authentication is enabled (hint: {hint})");

            let password: String = Password::new()
                .with_prompt("Enter your 2FA password")
                .interact()?;

            match client.check_password(password_token, &password).await {
                Ok(()) => return Ok(()),
                Err(TelegramError::InvalidPassword(token)) => {
                    println!("❌ Invalid password, try again.");
                    password_token = token;
                }
                Err(e) => return Err(e).context("2FA authentication failed"),
            }
        },
        Err(e) => Err(e).context("Authentication failed"),
    }
}

async fn qr_login(client: &GrammersClient, api_id: i32, api_hash: &str) -> Result<()> {
    println!("📷 Open Telegram > Settings > Devices > Link Desktop Device");
    println!("and scan the code below.\n");

    for _ in 0..QR_ATTEMPTS {
        match client.export_login_token(api_id, api_hash).await? {
            QrAuthResult::Token { token, .. } => {
                show_qr(&token)?;
                tokio::time::sleep(QR_POLL_INTERVAL).await;
            }
            QrAuthResult::Success { user_id, .. } => {
                println!("✅ QR login accepted for account {user_id}");
                return Ok(());
            }
            QrAuthResult::MigrateTo { dc_id } => {
                bail!("Account lives on DC {dc_id}; log in with a phone number instead")
            }
            QrAuthResult::PasswordRequired => {
                bail!("Two-factor authentication is enabled; log in with a phone number instead")
            }
        }
    }

    bail!("QR code was not scanned in time")
}

fn login_url(token: &[u8]) -> String {
    format!("tg://login?token={}", URL_SAFE_NO_PAD.encode(token))
}

fn show_qr(token: &[u8]) -> Result<()> {
    let code = QrCode::new(login_url(token).as_bytes()).context("Failed to build QR code")?;
    let image = code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build();

    let mut out = stdout();
    execute!(out, Clear(ClearType::All), MoveTo(0, 0))?;
    writeln!(out, "{image}")?;
    writeln!(out, "Waiting for the code to be scanned...")?;
    out.flush()?;
    Ok(())
}

fn print_session(session_string: &str) {
    let rule = "=".repeat(60);
    println!("\n{rule}");
    println!("🎉 SESSION STRING GENERATED SUCCESSFULLY!");
    println!("{rule}");
    println!("📝 Your session string:\n");
    println!("{session_string}");
    println!("{rule}\n");
}

fn save_outputs(args: &Args, api_id: i32, api_hash: &str, session_string: &str) {
    match std::fs::write(&args.output, session_string) {
        Ok(()) => println!("💾 Session string saved to: {}", args.output.display()),
        Err(e) => println!("⚠️ Could not save to file: {e}"),
    }

    let env_file = EnvFile::new(&args.env_file);
    let vars = [
        ("API_ID", api_id.to_string()),
        ("API_HASH", api_hash.to_owned()),
        ("SESSION_STRING", session_string.to_owned()),
    ];
    let result = vars
        .iter()
        .try_for_each(|(key, value)| env_file.set(key, value));
    match result {
        Ok(()) => println!("📄 Configuration saved to: {}", env_file.path().display()),
        Err(e) => println!("⚠️ Could not update {}: {e}", env_file.path().display()),
    }
}

fn print_notes() {
    println!("\n🔒 SECURITY NOTES:");
    println!("• Keep your session string private");
    println!("• Anyone holding it controls your account");
    println!("• If it leaks, terminate the session from Telegram settings and regenerate");

    println!("\n📖 NEXT STEPS:");
    println!("1. Set SESSION_STRING in your deployment environment");
    println!("2. Optionally set BOT_TOKEN, LOG_GROUP_ID and OWNER_NAME");
    println!("3. Run: nexus");
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("1234567890"), "+1234567890");
        assert_eq!(normalize_phone(" +44123 "), "+44123");
    }

    #[test]
    fn test_is_api_hash() {
        assert!(is_api_hash("0123456789abcdef0123456789ABCDEF"));
        assert!(!is_api_hash("0123456789abcdef"));
        assert!(!is_api_hash("0123456789abcdef0123456789abcdeg"));
    }

    #[test]
    fn test_login_url() {
        assert_eq!(login_url(&[0xfb, 0xff]), "tg://login?token=-_8");
    }
}
