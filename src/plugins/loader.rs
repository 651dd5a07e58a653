//! Plugin lifecycle: load, unload, reload.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};

use super::{Plugin, PluginCatalog, PluginHost};
use crate::client::BotClient;

/// A plugin that is currently active.
pub struct LoadedPlugin {
    pub plugin: Arc<dyn Plugin>,
    /// Commands the plugin registered during setup.
    pub commands: Vec<String>,
}

impl fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("commands", &self.commands)
            .finish_non_exhaustive()
    }
}

/// Tracks which catalog plugins are loaded on one client.
///
/// Every operation logs its own failures and reports a plain outcome; none
/// of them return an error.
#[derive(Debug)]
pub struct PluginLoader {
    catalog: Arc<PluginCatalog>,
    loaded: BTreeMap<String, LoadedPlugin>,
}

impl PluginLoader {
    #[must_use]
    pub fn new(catalog: Arc<PluginCatalog>) -> Self {
        Self {
            catalog,
            loaded: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    /// Loads every eligible catalog plugin in name order.
    ///
    /// A failing plugin is skipped. Does nothing when `LOAD_PLUGINS` is off.
    /// Returns the number of plugins loaded by this call.
    pub async fn load_all(&mut self, client: &Arc<BotClient>) -> usize {
        if !client.config().load_plugins {
            info!("Plugin loading disabled (LOAD_PLUGINS=false)");
            return 0;
        }

        let names = self.catalog.eligible();
        info!("Loading {} plugins for {}...", names.len(), client.identity());

        let mut count = 0;
        for name in names {
            if self.load(client, &name).await {
                count += 1;
            }
        }

        info!("Loaded {} plugins successfully", count);
        count
    }

    /// Loads a plugin by name, unloading a previous instance first.
    ///
    /// Returns whether the plugin is now loaded. On a failed setup the
    /// commands it managed to register are removed again.
    pub async fn load(&mut self, client: &Arc<BotClient>, name: &str) -> bool {
        let Some(factory) = self.catalog.get(name) else {
            warn!("Plugin not found: {}", name);
            return false;
        };

        if self.loaded.contains_key(name) {
            self.unload(client, name).await;
        }

        let plugin = match factory() {
            Ok(plugin) => plugin,
            Err(e) => {
                error!("Failed to load plugin {}: {:#}", name, e);
                return false;
            }
        };

        let host = PluginHost::new(Arc::clone(client), name);
        if let Err(e) = plugin.setup(&host).await {
            let removed = client.commands().remove_owned(name, &host.registered());
            error!(
                "Failed to load plugin {}: {:#} (rolled back {} commands)",
                name, e, removed
            );
            return false;
        }

        let commands = host.registered();
        info!("Loaded plugin: {} ({} commands)", name, commands.len());
        self.loaded
            .insert(name.to_owned(), LoadedPlugin { plugin, commands });
        true
    }

    /// Unloads a plugin, running its cleanup and removing its commands.
    ///
    /// Returns `false` if no plugin of that name was loaded.
    pub async fn unload(&mut self, client: &Arc<BotClient>, name: &str) -> bool {
        let Some(loaded) = self.loaded.remove(name) else {
            return false;
        };

        let host = PluginHost::new(Arc::clone(client), name);
        if let Err(e) = loaded.plugin.cleanup(&host).await {
            error!("Cleanup of plugin {} failed: {:#}", name, e);
        }

        client.commands().remove_owned(name, &loaded.commands);
        info!("Unloaded plugin: {}", name);
        true
    }

    /// Unloads (if loaded) and loads again. Returns whether it loaded.
    pub async fn reload(&mut self, client: &Arc<BotClient>, name: &str) -> bool {
        self.unload(client, name).await;
        self.load(client, name).await
    }

    /// Names of loaded plugins, sorted.
    #[must_use]
    pub fn loaded_names(&self) -> Vec<String> {
        self.loaded.keys().cloned().collect()
    }

    #[must_use]
    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains_key(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&LoadedPlugin> {
        self.loaded.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::client::Identity;
    use crate::commands::CommandContext;
    use crate::telegram::TelegramBackend;
    use crate::testing::{self, MockBackend};

    async fn noop(_ctx: CommandContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Registers `<name>_cmd` and counts setup and cleanup calls.
    struct Counting {
        command: String,
        setups: Arc<AtomicUsize>,
        cleanups: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Plugin for Counting {
        async fn setup(&self, host: &PluginHost) -> anyhow::Result<()> {
            self.setups.fetch_add(1, Ordering::SeqCst);
            host.add_command(&self.command, noop, "counted");
            Ok(())
        }

        async fn cleanup(&self, _host: &PluginHost) -> anyhow::Result<()> {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Registers a command, then fails.
    struct BrokenSetup;

    #[async_trait]
    impl Plugin for BrokenSetup {
        async fn setup(&self, host: &PluginHost) -> anyhow::Result<()> {
            host.add_command("half", noop, "never survives");
            anyhow::bail!("database unavailable")
        }
    }

    /// Relies on the default hooks.
    struct Silent;

    impl Plugin for Silent {}

    struct Counters {
        setups: Arc<AtomicUsize>,
        cleanups: Arc<AtomicUsize>,
    }

    fn catalog() -> (PluginCatalog, Counters) {
        let setups = Arc::new(AtomicUsize::new(0));
        let cleanups = Arc::new(AtomicUsize::new(0));
        let mut catalog = PluginCatalog::new();

        for name in ["alpha", "beta", "_hidden"] {
            let (setups, cleanups) = (Arc::clone(&setups), Arc::clone(&cleanups));
            catalog.register(name, move || {
                Ok(Arc::new(Counting {
                    command: format!("{name}_cmd"),
                    setups: Arc::clone(&setups),
                    cleanups: Arc::clone(&cleanups),
                }) as Arc<dyn Plugin>)
            });
        }
        catalog
            .register("broken_setup", || Ok(Arc::new(BrokenSetup) as Arc<dyn Plugin>))
            .register("broken_import", || anyhow::bail!("syntax error in plugin"))
            .register("silent", || Ok(Arc::new(Silent) as Arc<dyn Plugin>));

        (catalog, Counters { setups, cleanups })
    }

    fn client(extra: &[(&str, &str)]) -> (tempfile::TempDir, Arc<BotClient>) {
        let (dir, config) = testing::config(extra);
        let backend: Arc<dyn TelegramBackend> = MockBackend::user(7);
        let client = BotClient::new(
            Identity::Userbot,
            Arc::new(config),
            backend,
            Arc::new(PluginCatalog::new()),
        )
        .unwrap();
        (dir, client)
    }

    #[tokio::test]
    async fn test_load_all_skips_failures_and_reserved() {
        let (_dir, client) = client(&[]);
        let (catalog, counters) = catalog();
        let mut loader = PluginLoader::new(Arc::new(catalog));

        let count = loader.load_all(&client).await;

        assert_eq!(count, 3);
        assert_eq!(loader.loaded_names(), vec!["alpha", "beta", "silent"]);
        assert_eq!(counters.setups.load(Ordering::SeqCst), 2);
        assert!(client.commands().contains("alpha_cmd"));
        assert!(!client.commands().contains("_hidden_cmd"));
        // Rolled back
        assert!(!client.commands().contains("half"));
    }

    #[tokio::test]
    async fn test_load_all_respects_load_plugins() {
        let (_dir, client) = client(&[("LOAD_PLUGINS", "false")]);
        let (catalog, _counters) = catalog();
        let mut loader = PluginLoader::new(Arc::new(catalog));

        assert_eq!(loader.load_all(&client).await, 0);
        assert!(loader.is_empty());
    }

    #[tokio::test]
    async fn test_failed_load_leaves_set_unchanged() {
        let (_dir, client) = client(&[]);
        let (catalog, _counters) = catalog();
        let mut loader = PluginLoader::new(Arc::new(catalog));
        assert!(loader.load(&client, "alpha").await);

        assert!(!loader.load(&client, "broken_import").await);
        assert!(!loader.load(&client, "broken_setup").await);
        assert!(!loader.load(&client, "missing").await);

        assert_eq!(loader.loaded_names(), vec!["alpha"]);
    }

    #[tokio::test]
    async fn test_reserved_plugin_loads_by_name() {
        let (_dir, client) = client(&[]);
        let (catalog, _counters) = catalog();
        let mut loader = PluginLoader::new(Arc::new(catalog));

        assert!(loader.load(&client, "_hidden").await);
        assert!(client.commands().contains("_hidden_cmd"));
    }

    #[tokio::test]
    async fn test_unload() {
        let (_dir, client) = client(&[]);
        let (catalog, counters) = catalog();
        let mut loader = PluginLoader::new(Arc::new(catalog));

        assert!(!loader.unload(&client, "alpha").await);

        loader.load(&client, "alpha").await;
        assert!(loader.unload(&client, "alpha").await);
        assert!(!loader.is_loaded("alpha"));
        assert!(!client.commands().contains("alpha_cmd"));
        assert_eq!(counters.cleanups.load(Ordering::SeqCst), 1);

        assert!(!loader.unload(&client, "alpha").await);
    }

    #[tokio::test]
    async fn test_reload_keeps_single_entry() {
        let (_dir, client) = client(&[]);
        let (catalog, counters) = catalog();
        let mut loader = PluginLoader::new(Arc::new(catalog));

        loader.load(&client, "alpha").await;
        assert!(loader.reload(&client, "alpha").await);
        // Loading an already loaded plugin replaces it
        assert!(loader.load(&client, "alpha").await);

        assert_eq!(loader.len(), 1);
        assert_eq!(counters.setups.load(Ordering::SeqCst), 3);
        assert_eq!(counters.cleanups.load(Ordering::SeqCst), 2);
        assert_eq!(loader.get("alpha").unwrap().commands, vec!["alpha_cmd"]);
        assert!(client.commands().contains("alpha_cmd"));
    }

    #[tokio::test]
    async fn test_reload_of_unloaded_plugin_loads_it() {
        let (_dir, client) = client(&[]);
        let (catalog, _counters) = catalog();
        let mut loader = PluginLoader::new(Arc::new(catalog));

        assert!(loader.reload(&client, "beta").await);
        assert!(loader.is_loaded("beta"));
    }
}
