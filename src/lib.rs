//! Nexus Userbot Library
//!
//! A Telegram userbot paired with an optional assistant bot.
//!
//! This crate provides the core functionality for:
//! - Loading and validating the environment configuration
//! - Connecting to Telegram via `MTProto` as a user and as a bot
//! - Dispatching prefixed chat commands to plugin handlers
//! - Validating and analyzing session strings offline

pub mod app;
pub mod client;
pub mod commands;
pub mod config;
pub mod health;
pub mod logging;
pub mod plugins;
pub mod session;
pub mod telegram;

#[cfg(test)]
mod testing;
