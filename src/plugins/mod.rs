//! Plugin system for command handlers.
//!
//! A plugin is one file in this directory implementing [`Plugin`]. Its
//! `setup` registers commands through the [`PluginHost`] it is given.
//!
//! Add new plugins by:
//! 1. Creating a new file in this directory
//! 2. Adding `mod your_plugin;` below
//! 3. Registering it in [`PluginCatalog::builtin`]
//!
//! Catalog names starting with `_` are skipped by
//! [`PluginLoader::load_all`] but can still be loaded by name.

mod alive;
mod help;
mod loader;
mod manager;
mod ping;
mod session;
mod setvar;
mod start;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::{BotClient, Identity};
use crate::commands::CommandHandler;
use crate::config::Config;

pub use loader::{LoadedPlugin, PluginLoader};

/// Marker for catalog entries that `load_all` skips.
pub const RESERVED_PREFIX: char = '_';

/// A loadable unit of commands.
///
/// Both hooks default to doing nothing.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Called on load. Register commands here.
    async fn setup(&self, _host: &PluginHost) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called on unload, before the plugin's commands are removed.
    async fn cleanup(&self, _host: &PluginHost) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Builds a fresh plugin instance.
pub type PluginFactory = Arc<dyn Fn() -> anyhow::Result<Arc<dyn Plugin>> + Send + Sync>;

/// Plugins that can be loaded, by name.
#[derive(Clone, Default)]
pub struct PluginCatalog {
    factories: BTreeMap<String, PluginFactory>,
}

impl PluginCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every plugin shipped with the bot.
    #[must_use]
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog
            .register_default::<alive::Alive>("alive")
            .register_default::<help::Help>("help")
            .register_default::<manager::Manager>("plugins")
            .register_default::<ping::Ping>("ping")
            .register_default::<session::Session>("session")
            .register_default::<setvar::SetVar>("setvar")
            .register_default::<start::Start>("start");
        catalog
    }

    /// Registers a factory, replacing any with that name.
    pub fn register<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn() -> anyhow::Result<Arc<dyn Plugin>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_owned(), Arc::new(factory));
        self
    }

    /// Registers a plugin built with [`Default`].
    pub fn register_default<P>(&mut self, name: &str) -> &mut Self
    where
        P: Plugin + Default + 'static,
    {
        self.register(name, || Ok(Arc::new(P::default()) as Arc<dyn Plugin>))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<PluginFactory> {
        self.factories.get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// All names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Names `load_all` picks up, sorted.
    #[must_use]
    pub fn eligible(&self) -> Vec<String> {
        self.factories
            .keys()
            .filter(|name| !name.starts_with(RESERVED_PREFIX))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("plugins", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// What a plugin sees of the client during `setup` and `cleanup`.
pub struct PluginHost {
    client: Arc<BotClient>,
    plugin: String,
    registered: Mutex<Vec<String>>,
}

impl PluginHost {
    pub(crate) fn new(client: Arc<BotClient>, plugin: &str) -> Self {
        Self {
            client,
            plugin: plugin.to_owned(),
            registered: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn client(&self) -> &Arc<BotClient> {
        &self.client
    }

    #[must_use]
    pub fn identity(&self) -> Identity {
        self.client.identity()
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        self.client.config()
    }

    /// Name of the plugin being set up.
    #[must_use]
    pub fn plugin_name(&self) -> &str {
        &self.plugin
    }

    /// Registers a command owned by this plugin.
    pub fn add_command<H>(&self, name: &str, handler: H, description: &str)
    where
        H: CommandHandler + 'static,
    {
        let name = name.to_lowercase();
        self.client
            .add_command_entry(&name, Arc::new(handler), description, Some(&self.plugin));
        self.registered.lock().push(name);
    }

    /// Commands registered through this host so far.
    pub(crate) fn registered(&self) -> Vec<String> {
        self.registered.lock().clone()
    }
}

impl fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHost")
            .field("identity", &self.identity())
            .field("plugin", &self.plugin)
            .finish_non_exhaustive()
    }
}
