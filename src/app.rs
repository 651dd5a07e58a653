//! Top-level orchestration: build clients, start them, wait, stop them.

use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::client::{BotClient, ClientError, Identity};
use crate::config::{BOT_VERSION, Config};
use crate::health;
use crate::plugins::PluginCatalog;
use crate::telegram::{GrammersBackend, TelegramBackend};

/// Running health server.
struct HealthServer {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

/// The userbot, the optional assistant and the optional health server.
pub struct NexusApp {
    config: Arc<Config>,
    userbot: Arc<BotClient>,
    assistant: Option<Arc<BotClient>>,
    health: Option<HealthServer>,
}

impl NexusApp {
    /// Builds the clients with grammers backends and the builtin plugins.
    ///
    /// The assistant is only created when `BOT_TOKEN` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if a client cannot be constructed.
    pub fn new(config: Config) -> Result<Self, ClientError> {
        let config = Arc::new(config);
        let backend = |identity: Identity| -> Arc<dyn TelegramBackend> {
            let session_path = config
                .paths
                .sessions_dir
                .join(format!("{}.session", identity.session_name()));
            Arc::new(GrammersBackend::new(
                config.api_id,
                config.api_hash.clone(),
                session_path,
            ))
        };

        let userbot_backend = backend(Identity::Userbot);
        let assistant_backend = config.bot_token.is_some().then(|| backend(Identity::Assistant));

        Self::with_backends(
            Arc::clone(&config),
            Arc::new(PluginCatalog::builtin()),
            userbot_backend,
            assistant_backend,
        )
    }

    /// Builds the clients on the given backends.
    ///
    /// # Errors
    ///
    /// Returns an error if a client cannot be constructed.
    pub fn with_backends(
        config: Arc<Config>,
        catalog: Arc<PluginCatalog>,
        userbot_backend: Arc<dyn TelegramBackend>,
        assistant_backend: Option<Arc<dyn TelegramBackend>>,
    ) -> Result<Self, ClientError> {
        info!("Initializing Nexus v{}...", BOT_VERSION);

        let userbot = BotClient::new(
            Identity::Userbot,
            Arc::clone(&config),
            userbot_backend,
            Arc::clone(&catalog),
        )?;

        let assistant = match assistant_backend {
            Some(backend) => Some(BotClient::new(
                Identity::Assistant,
                Arc::clone(&config),
                backend,
                catalog,
            )?),
            None => {
                info!("BOT_TOKEN not set, running without the assistant bot");
                None
            }
        };

        Ok(Self {
            config,
            userbot,
            assistant,
            health: None,
        })
    }

    #[must_use]
    pub fn userbot(&self) -> &Arc<BotClient> {
        &self.userbot
    }

    #[must_use]
    pub fn assistant(&self) -> Option<&Arc<BotClient>> {
        self.assistant.as_ref()
    }

    /// Starts the health server (when `PORT` is set), then the userbot,
    /// then the assistant.
    ///
    /// # Errors
    ///
    /// Returns an error if the health port cannot be bound or either
    /// client fails to start.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        if let Some(port) = self.config.port {
            self.start_health(port).await?;
        }

        info!("Starting userbot...");
        self.userbot.start().await.context("Failed to start userbot")?;
        info!("Userbot started successfully");

        if let Some(assistant) = &self.assistant {
            info!("Starting assistant bot...");
            assistant
                .start()
                .await
                .context("Failed to start assistant bot")?;
            info!("Assistant bot started successfully");
        }

        info!("Nexus v{} is now running!", BOT_VERSION);
        Ok(())
    }

    async fn start_health(&mut self, port: u16) -> anyhow::Result<()> {
        let listener = health::bind(port)
            .await
            .with_context(|| format!("Failed to bind health server on port {port}"))?;
        let (shutdown, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(health::serve(listener, async move {
            let _ = rx.await;
        }));
        self.health = Some(HealthServer { shutdown, task });
        Ok(())
    }

    /// Stops the userbot, then the assistant, then the health server.
    ///
    /// Failures are logged; every component gets its stop attempt.
    pub async fn stop(&mut self) {
        info!("Stopping Nexus...");

        if let Err(e) = self.userbot.stop().await {
            error!("Error stopping userbot: {}", e);
        }
        if let Some(assistant) = &self.assistant
            && let Err(e) = assistant.stop().await
        {
            error!("Error stopping assistant bot: {}", e);
        }

        if let Some(health) = self.health.take() {
            let _ = health.shutdown.send(());
            match health.task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Health server error: {}", e),
                Err(e) => warn!("Health server task failed: {}", e),
            }
        }

        info!("Nexus v{} stopped gracefully", BOT_VERSION);
    }

    /// Starts everything, waits for Ctrl+C, then stops everything.
    ///
    /// # Errors
    ///
    /// Returns the startup error after stopping whatever did start.
    pub async fn run(mut self) -> anyhow::Result<()> {
        if let Err(e) = self.start().await {
            self.stop().await;
            return Err(e);
        }

        info!("Press Ctrl+C to stop");
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down..."),
            Err(e) => warn!("Could not listen for Ctrl+C, shutting down: {}", e),
        }

        self.stop().await;
        Ok(())
    }
}

impl fmt::Debug for NexusApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NexusApp")
            .field("userbot", &self.userbot)
            .field("assistant", &self.assistant)
            .field("health", &self.health.is_some())
            .finish_non_exhaustive()
    }
}
