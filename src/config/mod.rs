//! Configuration module for the userbot.
//!
//! Handles loading and validation of the environment configuration,
//! derived working paths, and persistence of the `.env` file.

mod env_file;
mod settings;

pub use env_file::{ENV_FILE_HEADER, EnvFile, EnvFileError};
pub use settings::{BOT_VERSION, Config, ConfigError, ConfigSummary, Paths};
