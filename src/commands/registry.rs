//! Command registry keyed by name.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::CommandContext;
use crate::client::Identity;

/// Something that runs when a command is invoked.
///
/// Implemented for every `async fn(CommandContext) -> anyhow::Result<()>`.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, ctx: CommandContext) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> CommandHandler for F
where
    F: Fn(CommandContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, ctx: CommandContext) -> anyhow::Result<()> {
        (self)(ctx).await
    }
}

/// A registered command.
#[derive(Clone)]
pub struct CommandEntry {
    pub handler: Arc<dyn CommandHandler>,
    pub description: String,
    /// Identity the command was registered on.
    pub identity: Identity,
    /// Plugin that registered the command, if any.
    pub plugin: Option<String>,
}

impl fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEntry")
            .field("description", &self.description)
            .field("identity", &self.identity)
            .field("plugin", &self.plugin)
            .finish_non_exhaustive()
    }
}

/// Commands of one identity.
///
/// The lock is never held across an `.await`; lookups clone the entry out.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: RwLock<BTreeMap<String, CommandEntry>>,
}

impl CommandRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command, replacing any previous one with that name.
    ///
    /// Names are stored lowercased. Returns the replaced entry.
    pub fn insert(&self, name: &str, entry: CommandEntry) -> Option<CommandEntry> {
        let name = name.to_lowercase();
        debug!("Registering command '{}' ({})", name, entry.identity);
        self.commands.write().insert(name, entry)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<CommandEntry> {
        self.commands.read().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<CommandEntry> {
        self.commands.write().remove(name)
    }

    /// Removes the named commands, but only those still owned by `plugin`.
    ///
    /// A command re-registered by another plugin survives.
    pub fn remove_owned(&self, plugin: &str, names: &[String]) -> usize {
        let mut commands = self.commands.write();
        let mut removed = 0;
        for name in names {
            if commands
                .get(name)
                .is_some_and(|entry| entry.plugin.as_deref() == Some(plugin))
            {
                commands.remove(name);
                removed += 1;
            }
        }
        removed
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.commands.read().contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.read().is_empty()
    }

    /// Name and description of every command, sorted by name.
    #[must_use]
    pub fn descriptions(&self) -> Vec<(String, String)> {
        self.commands
            .read()
            .iter()
            .map(|(name, entry)| (name.clone(), entry.description.clone()))
            .collect()
    }
}
