//! Application configuration loaded from the environment.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use super::{EnvFile, EnvFileError};
use crate::session::{MIN_DECODED_LENGTH, codec};

/// Version reported in startup messages and the `alive` command.
pub const BOT_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_COMMAND_PREFIX: &str = ".";
const DEFAULT_ASSISTANT_PREFIX: &str = "/";
const DEFAULT_BOT_NAME: &str = "Nexus";
const DEFAULT_OWNER_NAME: &str = "Nexus User";
const DEFAULT_MAX_MESSAGE_LENGTH: usize = 4096;
const DEFAULT_DOWNLOAD_DIRECTORY: &str = "./downloads";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "Configuration errors:\n{}\n\nFor help generating a session string, run: generate_session",
        format_problems(.0)
    )]
    Invalid(Vec<String>),

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    EnvFile(#[from] EnvFileError),
}

fn format_problems(problems: &[String]) -> String {
    problems
        .iter()
        .map(|p| format!("- {p}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Filesystem locations derived from the base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub base_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub sessions_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub downloads_dir: PathBuf,
    pub env_file: PathBuf,
}

impl Paths {
    /// Derives all paths from `base_dir`. A relative download directory is
    /// resolved against the base directory.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>, download_directory: impl AsRef<Path>) -> Self {
        let base_dir = base_dir.into();
        Self {
            assets_dir: base_dir.join("assets"),
            sessions_dir: base_dir.join("sessions"),
            logs_dir: base_dir.join("logs"),
            downloads_dir: base_dir.join(download_directory),
            env_file: base_dir.join(".env"),
            base_dir,
        }
    }

    /// Paths for the base directory named by `NEXUS_HOME` (default: current dir).
    #[must_use]
    pub fn from_env() -> Self {
        let base = std::env::var("NEXUS_HOME").unwrap_or_else(|_| ".".to_owned());
        let downloads = std::env::var("DOWNLOAD_DIRECTORY")
            .unwrap_or_else(|_| DEFAULT_DOWNLOAD_DIRECTORY.to_owned());
        Self::new(base, downloads)
    }

    /// Creates every working directory that does not exist yet.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        for dir in [
            &self.assets_dir,
            &self.sessions_dir,
            &self.logs_dir,
            &self.downloads_dir,
        ] {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Runtime configuration.
#[derive(Clone)]
pub struct Config {
    /// Telegram API ID (obtain from <https://my.telegram.org>).
    pub api_id: i32,
    /// Telegram API hash (obtain from <https://my.telegram.org>).
    pub api_hash: String,
    /// Pre-generated session string for the userbot account.
    pub session_string: String,

    /// Token of the assistant bot, if one is used.
    pub bot_token: Option<String>,
    pub bot_username: Option<String>,
    /// Chat receiving startup, log and error messages (Bot API style id).
    pub log_group_id: Option<i64>,

    pub sudo_users: Vec<i64>,
    pub pm_permit: bool,
    pub pm_log: bool,
    pub command_prefix: String,
    pub assistant_prefix: String,

    pub bot_name: String,
    pub owner_name: String,
    pub owner_username: Option<String>,

    pub database_url: Option<String>,
    pub redis_url: Option<String>,

    pub load_plugins: bool,
    pub plugin_channel: Option<String>,

    /// Replies longer than this are split into several messages.
    pub max_message_length: usize,
    pub download_directory: String,

    pub anti_spam: bool,
    pub log_errors: bool,

    pub heroku_app_name: Option<String>,
    pub heroku_api_key: Option<String>,

    /// Port for the health check server. The server only runs when set.
    pub port: Option<u16>,

    pub paths: Paths,
}

impl Config {
    /// Loads configuration from the process environment and creates the
    /// working directories.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.paths.ensure_directories()?;
        info!("Configuration validated successfully");
        Ok(config)
    }

    /// Builds configuration from an arbitrary variable lookup.
    ///
    /// All problems with required fields are collected and returned together.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        let mut problems = Vec::new();

        let api_id = match get("API_ID").map(|v| v.parse::<i32>()) {
            None | Some(Ok(0)) => {
                problems.push("API_ID is required - get it from https://my.telegram.org".to_owned());
                0
            }
            Some(Ok(id)) => id,
            Some(Err(_)) => {
                problems.push("API_ID must be an integer".to_owned());
                0
            }
        };

        let api_hash = get("API_HASH").unwrap_or_default();
        if api_hash.is_empty() {
            problems.push("API_HASH is required - get it from https://my.telegram.org".to_owned());
        }

        let session_string = get("SESSION_STRING").unwrap_or_default();
        if session_string.is_empty() {
            problems.push("SESSION_STRING is required - generate one with generate_session".to_owned());
        } else if !session_string_is_usable(&session_string) {
            problems.push(
                "SESSION_STRING appears to be invalid - please regenerate it with generate_session"
                    .to_owned(),
            );
        }

        if !problems.is_empty() {
            return Err(ConfigError::Invalid(problems));
        }

        let download_directory =
            get("DOWNLOAD_DIRECTORY").unwrap_or_else(|| DEFAULT_DOWNLOAD_DIRECTORY.to_owned());
        let base_dir = get("NEXUS_HOME").unwrap_or_else(|| ".".to_owned());

        Ok(Self {
            api_id,
            api_hash,
            session_string,
            bot_token: get("BOT_TOKEN"),
            bot_username: get("BOT_USERNAME").map(|s| s.trim_start_matches('@').to_owned()),
            // 0 means no log group
            log_group_id: get("LOG_GROUP_ID")
                .and_then(|v| parse_or_warn("LOG_GROUP_ID", &v))
                .filter(|&id: &i64| id != 0),
            sudo_users: get("SUDO_USERS").map(|v| parse_id_list(&v)).unwrap_or_default(),
            pm_permit: get("PM_PERMIT").is_none_or(|v| parse_bool(&v)),
            pm_log: get("PM_LOG").is_none_or(|v| parse_bool(&v)),
            command_prefix: get("COMMAND_PREFIX").unwrap_or_else(|| DEFAULT_COMMAND_PREFIX.to_owned()),
            assistant_prefix: get("ASSISTANT_PREFIX")
                .unwrap_or_else(|| DEFAULT_ASSISTANT_PREFIX.to_owned()),
            bot_name: get("BOT_NAME").unwrap_or_else(|| DEFAULT_BOT_NAME.to_owned()),
            owner_name: get("OWNER_NAME").unwrap_or_else(|| DEFAULT_OWNER_NAME.to_owned()),
            owner_username: get("OWNER_USERNAME").map(|s| s.trim_start_matches('@').to_owned()),
            database_url: get("DATABASE_URL"),
            redis_url: get("REDIS_URL"),
            load_plugins: get("LOAD_PLUGINS").is_none_or(|v| parse_bool(&v)),
            plugin_channel: get("PLUGIN_CHANNEL"),
            max_message_length: get("MAX_MESSAGE_LENGTH")
                .and_then(|v| parse_or_warn("MAX_MESSAGE_LENGTH", &v))
                .filter(|&len: &usize| len > 0)
                .unwrap_or(DEFAULT_MAX_MESSAGE_LENGTH),
            anti_spam: get("ANTI_SPAM").is_none_or(|v| parse_bool(&v)),
            log_errors: get("LOG_ERRORS").is_none_or(|v| parse_bool(&v)),
            heroku_app_name: get("HEROKU_APP_NAME"),
            heroku_api_key: get("HEROKU_API_KEY"),
            port: get("PORT").and_then(|v| parse_or_warn("PORT", &v)),
            paths: Paths::new(base_dir, &download_directory),
            download_directory,
        })
    }

    /// Whether every field needed for a fully featured setup is present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.api_id != 0
            && !self.api_hash.is_empty()
            && !self.session_string.is_empty()
            && self.bot_token.is_some()
            && self.log_group_id.is_some()
    }

    /// Whether `user_id` was granted sudo through `SUDO_USERS`.
    #[must_use]
    pub fn is_sudo_user(&self, user_id: i64) -> bool {
        self.sudo_users.contains(&user_id)
    }

    /// A serializable view with secrets hidden.
    #[must_use]
    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            api_id: self.api_id,
            api_hash: mask(&self.api_hash),
            session_string: if self.session_string.is_empty() { "" } else { "***" },
            bot_token: self.bot_token.as_deref().map(mask),
            bot_username: self.bot_username.clone(),
            log_group_id: self.log_group_id,
            bot_name: self.bot_name.clone(),
            bot_version: BOT_VERSION,
            owner_name: self.owner_name.clone(),
            pm_permit: self.pm_permit,
            command_prefix: self.command_prefix.clone(),
            assistant_prefix: self.assistant_prefix.clone(),
        }
    }

    /// Updates a variable in memory and persists it to the `.env` file.
    ///
    /// Keys that do not correspond to a field are still written to the file.
    /// Returns whether an in-memory field was changed.
    pub fn update_env_var(&mut self, key: &str, value: &str) -> Result<bool, ConfigError> {
        let applied = self.apply(key, value);
        EnvFile::new(&self.paths.env_file).set(key, value)?;
        Ok(applied)
    }

    fn apply(&mut self, key: &str, value: &str) -> bool {
        let optional = || Some(value.to_owned()).filter(|v| !v.is_empty());
        match key {
            "API_HASH" => value.clone_into(&mut self.api_hash),
            "SESSION_STRING" => value.clone_into(&mut self.session_string),
            "BOT_TOKEN" => self.bot_token = optional(),
            "BOT_USERNAME" => self.bot_username = optional(),
            "OWNER_USERNAME" => self.owner_username = optional(),
            "DATABASE_URL" => self.database_url = optional(),
            "REDIS_URL" => self.redis_url = optional(),
            "PLUGIN_CHANNEL" => self.plugin_channel = optional(),
            "HEROKU_APP_NAME" => self.heroku_app_name = optional(),
            "HEROKU_API_KEY" => self.heroku_api_key = optional(),
            "COMMAND_PREFIX" => value.clone_into(&mut self.command_prefix),
            "ASSISTANT_PREFIX" => value.clone_into(&mut self.assistant_prefix),
            "BOT_NAME" => value.clone_into(&mut self.bot_name),
            "OWNER_NAME" => value.clone_into(&mut self.owner_name),
            "PM_PERMIT" => self.pm_permit = parse_bool(value),
            "PM_LOG" => self.pm_log = parse_bool(value),
            "LOAD_PLUGINS" => self.load_plugins = parse_bool(value),
            "ANTI_SPAM" => self.anti_spam = parse_bool(value),
            "LOG_ERRORS" => self.log_errors = parse_bool(value),
            "SUDO_USERS" => self.sudo_users = parse_id_list(value),
            "API_ID" => match value.parse() {
                Ok(id) => self.api_id = id,
                Err(_) => return false,
            },
            "LOG_GROUP_ID" => match value.parse::<i64>() {
                Ok(id) => self.log_group_id = (id != 0).then_some(id),
                Err(_) => return false,
            },
            "MAX_MESSAGE_LENGTH" => match value.parse() {
                Ok(len) if len > 0 => self.max_message_length = len,
                _ => return false,
            },
            "PORT" => match value.parse() {
                Ok(port) => self.port = Some(port),
                Err(_) => return false,
            },
            _ => return false,
        }
        true
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Nexus Config (API_ID: {}, Session: {}, Configured: {})",
            self.api_id,
            if self.session_string.is_empty() { "missing" } else { "set" },
            self.is_configured()
        )
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_id", &self.api_id)
            .field("log_group_id", &self.log_group_id)
            .field("sudo_users", &self.sudo_users)
            .field("command_prefix", &self.command_prefix)
            .field("assistant_prefix", &self.assistant_prefix)
            .field("load_plugins", &self.load_plugins)
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

/// Redacted configuration view, safe to log or send to chats.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub api_id: i32,
    pub api_hash: String,
    pub session_string: &'static str,
    pub bot_token: Option<String>,
    pub bot_username: Option<String>,
    pub log_group_id: Option<i64>,
    pub bot_name: String,
    pub bot_version: &'static str,
    pub owner_name: String,
    pub pm_permit: bool,
    pub command_prefix: String,
    pub assistant_prefix: String,
}

/// Whether a session string decodes to a plausible session size.
fn session_string_is_usable(session_string: &str) -> bool {
    match codec::decode(session_string) {
        Ok(decoded) => decoded.len() >= MIN_DECODED_LENGTH,
        Err(e) => {
            warn!("Session string validation failed: {}", e);
            false
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Parses a comma-separated list of ids. Any bad entry empties the list.
fn parse_id_list(value: &str) -> Vec<i64> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<i64>, _>>()
        .unwrap_or_else(|_| {
            warn!("Invalid list format: {}", value);
            Vec::new()
        })
}

fn parse_or_warn<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    value.parse().map_or_else(
        |_| {
            warn!("Ignoring invalid {}: {:?}", key, value);
            None
        },
        Some,
    )
}

/// Keeps the first four characters of a secret.
fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{visible}***")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn valid_session() -> String {
        codec::encode(&[5_u8; 400])
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn required() -> Vec<(&'static str, String)> {
        vec![
            ("API_ID", "12345".to_owned()),
            ("API_HASH", "0123456789abcdef".to_owned()),
            ("SESSION_STRING", valid_session()),
        ]
    }

    fn load(extra: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let base = required();
        let mut vars: Vec<(&str, &str)> = base.iter().map(|(k, v)| (*k, v.as_str())).collect();
        vars.extend_from_slice(extra);
        Config::from_lookup(lookup(&vars))
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.api_id, 12345);
        assert_eq!(config.command_prefix, ".");
        assert_eq!(config.assistant_prefix, "/");
        assert_eq!(config.max_message_length, 4096);
        assert!(config.pm_permit);
        assert!(config.load_plugins);
        assert!(config.log_errors);
        assert!(config.bot_token.is_none());
        assert!(config.log_group_id.is_none());
        assert!(config.port.is_none());
        assert!(!config.is_configured());
        assert_eq!(config.paths.sessions_dir, PathBuf::from("./sessions"));
    }

    #[test]
    fn test_missing_api_id_is_reported() {
        let session = valid_session();
        let err = Config::from_lookup(lookup(&[
            ("API_HASH", "0123456789abcdef"),
            ("SESSION_STRING", session.as_str()),
        ]))
        .unwrap_err();

        assert!(err.to_string().contains("API_ID is required"));
    }

    #[test]
    fn test_all_problems_are_collected() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        let ConfigError::Invalid(problems) = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(problems.len(), 3);

        let message = err.to_string();
        assert!(message.contains("API_ID is required"));
        assert!(message.contains("API_HASH is required"));
        assert!(message.contains("SESSION_STRING is required"));
    }

    #[test]
    fn test_non_numeric_api_id() {
        let err = load(&[("API_ID", "abc")]).unwrap_err();
        assert!(err.to_string().contains("API_ID must be an integer"));
    }

    #[test]
    fn test_short_session_is_invalid() {
        let short = codec::encode(&[1_u8; 340]);
        let err = load(&[("SESSION_STRING", short.as_str())]).unwrap_err();
        assert!(err.to_string().contains("SESSION_STRING appears to be invalid"));
    }

    #[test]
    fn test_invalid_sudo_list_resolves_to_empty() {
        let config = load(&[("SUDO_USERS", "1, 2, three")]).unwrap();
        assert!(config.sudo_users.is_empty());

        let config = load(&[("SUDO_USERS", "1, 2,,3 ")]).unwrap();
        assert_eq!(config.sudo_users, vec![1, 2, 3]);
        assert!(config.is_sudo_user(2));
        assert!(!config.is_sudo_user(4));
    }

    #[test]
    fn test_flags_and_numbers() {
        let config = load(&[
            ("PM_PERMIT", "False"),
            ("LOAD_PLUGINS", "no"),
            ("ANTI_SPAM", "YES"),
            ("MAX_MESSAGE_LENGTH", "not a number"),
            ("LOG_GROUP_ID", "-1001234567890"),
            ("PORT", "8080"),
            ("BOT_TOKEN", "42:token"),
            ("BOT_USERNAME", "@nexus_assistant_bot"),
        ])
        .unwrap();

        assert!(!config.pm_permit);
        assert!(!config.load_plugins);
        assert!(config.anti_spam);
        assert_eq!(config.max_message_length, 4096);
        assert_eq!(config.log_group_id, Some(-1_001_234_567_890));
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.bot_username.as_deref(), Some("nexus_assistant_bot"));
        assert!(config.is_configured());
    }

    #[test]
    fn test_zero_log_group_is_unset() {
        let config = load(&[("LOG_GROUP_ID", "0")]).unwrap();
        assert!(config.log_group_id.is_none());
    }

    #[test]
    fn test_summary_hides_secrets() {
        let config = load(&[("BOT_TOKEN", "42:secret-token")]).unwrap();
        let summary = serde_json::to_value(config.summary()).unwrap();

        assert_eq!(summary["session_string"], "***");
        assert_eq!(summary["bot_token"], "42:s***");
        assert!(!summary.to_string().contains(&config.session_string));
        assert!(!config.to_string().contains(&config.session_string));
        assert!(!format!("{config:?}").contains(&config.session_string));
    }

    #[test]
    fn test_update_env_var_persists() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().to_string_lossy().into_owned();
        let mut config = load(&[("NEXUS_HOME", home.as_str())]).unwrap();

        assert!(config.update_env_var("COMMAND_PREFIX", "!").unwrap());
        assert_eq!(config.command_prefix, "!");
        assert!(!config.update_env_var("CUSTOM_FLAG", "1").unwrap());

        let vars = EnvFile::new(&config.paths.env_file).read().unwrap();
        assert_eq!(
            vars,
            vec![
                ("COMMAND_PREFIX".to_owned(), "!".to_owned()),
                ("CUSTOM_FLAG".to_owned(), "1".to_owned()),
            ]
        );
    }

    #[test]
    fn test_ensure_directories() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path(), "media");
        paths.ensure_directories().unwrap();

        assert!(paths.assets_dir.is_dir());
        assert!(paths.sessions_dir.is_dir());
        assert!(paths.logs_dir.is_dir());
        assert!(dir.path().join("media").is_dir());
    }
}
