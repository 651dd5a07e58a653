//! The client wrapper around one Telegram identity.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{ClientError, ClientState, Identity, RESTART_DELAY, format_uptime};
use crate::commands::{CommandContext, CommandEntry, CommandHandler, CommandRegistry, ParsedCommand};
use crate::config::{BOT_VERSION, Config};
use crate::plugins::{PluginCatalog, PluginLoader};
use crate::telegram::{
    AuthMethod, InboundMessage, MessageStream, RateLimiter, SelfInfo, TelegramBackend, TelegramError,
};

/// When the current run started.
#[derive(Debug, Clone, Copy)]
struct StartTime {
    instant: Instant,
    wall_clock: DateTime<Utc>,
}

/// Running dispatch loop.
struct Dispatcher {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// One Telegram identity with its commands and plugins.
pub struct BotClient {
    identity: Identity,
    config: Arc<Config>,
    auth: AuthMethod,
    backend: Arc<dyn TelegramBackend>,

    registry: CommandRegistry,
    loader: tokio::sync::Mutex<PluginLoader>,

    state: Mutex<ClientState>,
    me: RwLock<Option<SelfInfo>>,
    started: Mutex<Option<StartTime>>,
    dispatcher: Mutex<Option<Dispatcher>>,

    /// Spacing for log and error notifications.
    limiter: RateLimiter,
}

impl BotClient {
    /// Creates a client for `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MissingAuth`] if the identity's credential is
    /// not configured.
    pub fn new(
        identity: Identity,
        config: Arc<Config>,
        backend: Arc<dyn TelegramBackend>,
        catalog: Arc<PluginCatalog>,
    ) -> Result<Arc<Self>, ClientError> {
        let auth = identity.auth_method(&config)?;
        info!("Initialized {} client with {}", identity, auth.label());

        Ok(Arc::new(Self {
            identity,
            config,
            auth,
            backend,
            registry: CommandRegistry::new(),
            loader: tokio::sync::Mutex::new(PluginLoader::new(catalog)),
            state: Mutex::new(ClientState::default()),
            me: RwLock::new(None),
            started: Mutex::new(None),
            dispatcher: Mutex::new(None),
            limiter: RateLimiter::default(),
        }))
    }

    #[must_use]
    pub const fn identity(&self) -> Identity {
        self.identity
    }

    #[must_use]
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<dyn TelegramBackend> {
        &self.backend
    }

    #[must_use]
    pub fn state(&self) -> ClientState {
        *self.state.lock()
    }

    /// The logged-in account, once started.
    #[must_use]
    pub fn me(&self) -> Option<SelfInfo> {
        self.me.read().clone()
    }

    /// Command prefix of this identity.
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.identity.prefix(&self.config)
    }

    #[must_use]
    pub const fn commands(&self) -> &CommandRegistry {
        &self.registry
    }

    fn transition(&self, next: ClientState) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        *state = state.transition(next)?;
        debug!("{} is now {}", self.identity, next);
        Ok(())
    }

    /// Connects, loads plugins and starts dispatching messages.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidSession`] when Telegram rejects the
    /// session, or the underlying error for any other failure. The client is
    /// left `Stopped` on failure.
    pub async fn start(self: &Arc<Self>) -> Result<(), ClientError> {
        self.transition(ClientState::Starting)?;

        match self.start_inner().await {
            Ok(()) => {
                self.transition(ClientState::Running)?;
                Ok(())
            }
            Err(e) => {
                *self.state.lock() = ClientState::Stopped;
                if matches!(e, ClientError::InvalidSession(_)) {
                    error!(
                        "{}: session string is invalid or expired! Please regenerate it using generate_session",
                        self.identity
                    );
                } else {
                    error!("Failed to start {}: {}", self.identity, e);
                }
                Err(e)
            }
        }
    }

    async fn start_inner(self: &Arc<Self>) -> Result<(), ClientError> {
        let connection = self.backend.connect(&self.auth).await.map_err(|e| match e {
            TelegramError::InvalidSession(reason) => ClientError::InvalidSession(reason),
            other => ClientError::Telegram(other),
        })?;

        let me = connection.me;
        info!("{} started: {} ({})", self.identity, me.mention(), me.id);
        *self.me.write() = Some(me);

        self.load_plugins().await;

        *self.started.lock() = Some(StartTime {
            instant: Instant::now(),
            wall_clock: Utc::now(),
        });

        self.spawn_dispatcher(connection.messages);

        if let Some(chat_id) = self.config.log_group_id {
            let message = self.startup_message().await;
            if let Err(e) = self.send_to(chat_id, &message).await {
                warn!("Could not send startup message: {}", e);
            }
        }

        Ok(())
    }

    /// Stops dispatching and disconnects. Does nothing when not connected.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidState`] if the client is connected but
    /// not running.
    pub async fn stop(&self) -> Result<(), ClientError> {
        if !self.backend.is_connected() {
            debug!("{} is not connected, nothing to stop", self.identity);
            return Ok(());
        }

        self.transition(ClientState::Stopping)?;
        info!("Stopping {}...", self.identity);

        if let Some(dispatcher) = self.dispatcher.lock().take() {
            // The loop may be the caller (a command restarting its own
            // client), so signal it instead of awaiting the task.
            let _ = dispatcher.shutdown.send(());
            drop(dispatcher.task);
        }

        self.backend.disconnect().await;
        *self.started.lock() = None;
        self.transition(ClientState::Stopped)?;
        info!("{} stopped", self.identity);
        Ok(())
    }

    /// Stops, waits [`RESTART_DELAY`], then starts again.
    ///
    /// # Errors
    ///
    /// Returns the error of the failing step.
    pub async fn restart(self: &Arc<Self>) -> Result<(), ClientError> {
        info!("Restarting {}...", self.identity);
        self.stop().await?;
        tokio::time::sleep(RESTART_DELAY).await;
        self.start().await
    }

    /// Time since the current run started.
    #[must_use]
    pub fn uptime(&self) -> Option<Duration> {
        self.started.lock().map(|start| start.instant.elapsed())
    }

    /// Uptime as `Xd Xh Xm Xs`, or `Unknown` before start.
    #[must_use]
    pub fn uptime_string(&self) -> String {
        self.uptime().map_or_else(|| "Unknown".to_owned(), format_uptime)
    }

    /// Wall-clock time the current run started.
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started.lock().map(|start| start.wall_clock)
    }

    /// Registers a command on this identity, replacing any with that name.
    pub fn add_command<H>(&self, name: &str, handler: H, description: &str)
    where
        H: CommandHandler + 'static,
    {
        self.add_command_entry(name, Arc::new(handler), description, None);
    }

    pub(crate) fn add_command_entry(
        &self,
        name: &str,
        handler: Arc<dyn CommandHandler>,
        description: &str,
        plugin: Option<&str>,
    ) {
        let entry = CommandEntry {
            handler,
            description: description.to_owned(),
            identity: self.identity,
            plugin: plugin.map(str::to_owned),
        };
        if let Some(old) = self.registry.insert(name, entry) {
            debug!(
                "Command '{}' replaced (was from {:?})",
                name,
                old.plugin.as_deref().unwrap_or("core")
            );
        }
    }

    /// Whether `user_id` is in `SUDO_USERS` or is the logged-in account.
    #[must_use]
    pub fn is_sudo(&self, user_id: i64) -> bool {
        self.config.is_sudo_user(user_id) || self.me.read().as_ref().is_some_and(|me| me.id == user_id)
    }

    /// Loads every plugin from the catalog. Returns the number loaded.
    pub async fn load_plugins(self: &Arc<Self>) -> usize {
        self.loader.lock().await.load_all(self).await
    }

    /// Loads (or freshly reloads) one plugin. Returns whether it loaded.
    pub async fn load_plugin(self: &Arc<Self>, name: &str) -> bool {
        self.loader.lock().await.load(self, name).await
    }

    /// Unloads one plugin. Returns whether it was loaded.
    pub async fn unload_plugin(self: &Arc<Self>, name: &str) -> bool {
        self.loader.lock().await.unload(self, name).await
    }

    /// Unloads then loads one plugin. Returns whether it loaded.
    pub async fn reload_plugin(self: &Arc<Self>, name: &str) -> bool {
        self.loader.lock().await.reload(self, name).await
    }

    /// Names of loaded plugins, sorted.
    pub async fn loaded_plugins(&self) -> Vec<String> {
        self.loader.lock().await.loaded_names()
    }

    /// Names of every plugin that could be loaded, sorted.
    pub async fn available_plugins(&self) -> Vec<String> {
        self.loader.lock().await.catalog().names()
    }

    /// Sends `text` to `chat_id`, or to `LOG_GROUP_ID` when `None`.
    ///
    /// Delivery failures are logged, never returned.
    pub async fn send_log(&self, text: &str, chat_id: Option<i64>) {
        let Some(chat_id) = chat_id.or(self.config.log_group_id) else {
            return;
        };
        if let Err(e) = self.send_to(chat_id, text).await {
            warn!("Failed to send log message: {}", e);
        }
    }

    /// Logs an error and forwards a summary to the log group when
    /// `LOG_ERRORS` is on.
    pub async fn handle_error(&self, error: &(dyn fmt::Display + Sync), context: &str) {
        error!("Error in {}: {}", context, error);

        if self.config.log_errors {
            self.send_log(&format!("❌ Error in {context}\n\n{error}"), None)
                .await;
        }
    }

    async fn send_to(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        self.limiter.acquire(chat_id).await;
        match self.backend.send_text(chat_id, text).await {
            Err(TelegramError::FloodWait(seconds)) => {
                self.limiter.handle_flood_wait(seconds).await;
                Err(TelegramError::FloodWait(seconds))
            }
            other => other,
        }
    }

    async fn startup_message(&self) -> String {
        let plugins = self.loader.lock().await.len();
        let (user, id) = self
            .me()
            .map_or_else(|| ("N/A".to_owned(), 0), |me| (me.mention(), me.id));

        format!(
            "🌟 Nexus v{BOT_VERSION} Started\n\n\
             {} is now online!\n\
             User: {user} ({id})\n\
             Auth: {}\n\
             Plugins: {plugins} loaded\n\
             Commands: {} available\n\
             Prefix: {}",
            self.identity,
            self.auth.label(),
            self.registry.len(),
            self.prefix(),
        )
    }

    fn spawn_dispatcher(self: &Arc<Self>, messages: MessageStream) {
        let (shutdown, shutdown_rx) = oneshot::channel();
        let client = Arc::clone(self);
        let task = tokio::spawn(async move { client.run_dispatcher(messages, shutdown_rx).await });

        if let Some(old) = self.dispatcher.lock().replace(Dispatcher { shutdown, task }) {
            let _ = old.shutdown.send(());
        }
    }

    async fn run_dispatcher(
        self: Arc<Self>,
        mut messages: mpsc::Receiver<Box<dyn InboundMessage>>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        info!("{} is listening for commands with prefix '{}'", self.identity, self.prefix());

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!("{} dispatcher shutting down", self.identity);
                    break;
                }
                message = messages.recv() => {
                    let Some(message) = message else {
                        warn!("{} update stream closed", self.identity);
                        break;
                    };
                    self.dispatch(message).await;
                }
            }
        }
    }

    /// Runs the command in `message`, if it is one this identity accepts.
    ///
    /// Returns whether a handler was invoked.
    pub async fn dispatch(self: &Arc<Self>, message: Box<dyn InboundMessage>) -> bool {
        let Some(command) = ParsedCommand::parse(message.text(), self.prefix()) else {
            return false;
        };

        let from_sudo = message.sender_id().is_some_and(|id| self.is_sudo(id));
        let is_sudo = message.outgoing() || from_sudo;

        // The userbot only obeys its owner and sudo users
        if self.identity == Identity::Userbot && !is_sudo {
            debug!("Ignoring '{}' from non-sudo user {:?}", command.name, message.sender_id());
            return false;
        }

        let Some(entry) = self.registry.get(&command.name) else {
            debug!("Unknown command: {}", command.name);
            return false;
        };

        debug!("Handling command: {}", command);
        let name = command.name.clone();
        let ctx = CommandContext {
            client: Arc::clone(self),
            message: Arc::from(message),
            command,
            is_sudo,
        };

        if let Err(e) = entry.handler.handle(ctx).await {
            self.handle_error(&format!("{e:#}"), &format!("command {name}"))
                .await;
        }
        true
    }
}

impl fmt::Debug for BotClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotClient")
            .field("identity", &self.identity)
            .field("state", &self.state())
            .field("commands", &self.registry.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::testing::{self, MockBackend, MockMessage};

    fn client(identity: Identity, backend: &Arc<MockBackend>) -> (tempfile::TempDir, Arc<BotClient>) {
        let (dir, config) = testing::config(&[("SUDO_USERS", "42"), ("LOG_GROUP_ID", "-1001")]);
        let backend: Arc<dyn TelegramBackend> = Arc::clone(backend) as Arc<dyn TelegramBackend>;
        let client = BotClient::new(identity, Arc::new(config), backend, Arc::new(PluginCatalog::new()))
            .unwrap();
        (dir, client)
    }

    fn counting_command(client: &BotClient, name: &str) -> Arc<AtomicUsize> {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        client.add_command(
            name,
            move |_ctx: CommandContext| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    anyhow::Ok(())
                }
            },
            "counts calls",
        );
        calls
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let backend = MockBackend::user(7);
        let (_dir, client) = client(Identity::Userbot, &backend);
        assert_eq!(client.uptime_string(), "Unknown");

        client.start().await.unwrap();
        assert_eq!(client.state(), ClientState::Running);
        assert_eq!(client.me().unwrap().id, 7);
        assert!(client.uptime().is_some());
        assert!(client.started_at().is_some());

        // Startup message goes to the log group
        let sent = backend.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, -1001);
        assert!(sent[0].1.contains("Userbot is now online!"));

        client.stop().await.unwrap();
        assert_eq!(client.state(), ClientState::Stopped);
        assert_eq!(client.uptime_string(), "Unknown");
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let backend = MockBackend::user(7);
        let (_dir, client) = client(Identity::Userbot, &backend);

        client.start().await.unwrap();
        let err = client.start().await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_invalid_session_is_distinct() {
        let backend = MockBackend::user(7);
        backend.fail_next_connect(TelegramError::InvalidSession("AUTH_KEY_UNREGISTERED".to_owned()));
        let (_dir, client) = client(Identity::Userbot, &backend);

        let err = client.start().await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidSession(_)));
        assert_eq!(client.state(), ClientState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_when_not_connected_is_noop() {
        let backend = MockBackend::user(7);
        let (_dir, client) = client(Identity::Userbot, &backend);

        client.stop().await.unwrap();
        assert_eq!(client.state(), ClientState::Uninitialized);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart() {
        let backend = MockBackend::user(7);
        let (_dir, client) = client(Identity::Userbot, &backend);

        client.start().await.unwrap();
        client.restart().await.unwrap();
        assert_eq!(client.state(), ClientState::Running);
        assert_eq!(backend.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_userbot_dispatch_rules() {
        let backend = MockBackend::user(7);
        let (_dir, client) = client(Identity::Userbot, &backend);
        client.start().await.unwrap();
        let calls = counting_command(&client, "count");

        // Own message
        assert!(client.dispatch(MockMessage::outgoing(".count")).await);
        // Sudo user
        assert!(client.dispatch(MockMessage::incoming(42, ".count")).await);
        // Stranger
        assert!(!client.dispatch(MockMessage::incoming(99, ".count")).await);
        // Not a command, unknown command, other prefix
        assert!(!client.dispatch(MockMessage::outgoing("count")).await);
        assert!(!client.dispatch(MockMessage::outgoing(".nothing")).await);
        assert!(!client.dispatch(MockMessage::outgoing("/count")).await);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_assistant_dispatches_everyone() {
        let backend = MockBackend::bot(8);
        let (_dir, client) = client(Identity::Assistant, &backend);
        client.start().await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        client.add_command(
            "whoami",
            move |ctx: CommandContext| {
                let record = Arc::clone(&record);
                async move {
                    record.lock().push(ctx.is_sudo);
                    anyhow::Ok(())
                }
            },
            "records sudo flag",
        );

        assert!(client.dispatch(MockMessage::incoming(99, "/whoami")).await);
        assert!(client.dispatch(MockMessage::incoming(42, "/whoami")).await);
        assert_eq!(*seen.lock(), vec![false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_error_is_forwarded() {
        let backend = MockBackend::user(7);
        let (_dir, client) = client(Identity::Userbot, &backend);
        client.start().await.unwrap();
        client.add_command(
            "boom",
            |_ctx: CommandContext| async { Err::<(), _>(anyhow::anyhow!("kaboom")) },
            "always fails",
        );

        assert!(client.dispatch(MockMessage::outgoing(".boom")).await);
        let sent = backend.sent();
        let last = &sent.last().unwrap().1;
        assert!(last.contains("Error in command boom"));
        assert!(last.contains("kaboom"));
    }

    #[tokio::test]
    async fn test_is_sudo_includes_self() {
        let backend = MockBackend::user(7);
        let (_dir, client) = client(Identity::Userbot, &backend);
        assert!(client.is_sudo(42));
        assert!(!client.is_sudo(7));

        client.start().await.unwrap();
        assert!(client.is_sudo(7));
        assert!(!client.is_sudo(8));
    }

    #[tokio::test]
    async fn test_long_reply_is_split() {
        let backend = MockBackend::user(7);
        let (_dir, config) = testing::config(&[("MAX_MESSAGE_LENGTH", "10")]);
        let client = BotClient::new(
            Identity::Userbot,
            Arc::new(config),
            Arc::clone(&backend) as Arc<dyn TelegramBackend>,
            Arc::new(PluginCatalog::new()),
        )
        .unwrap();
        client.start().await.unwrap();
        client.add_command(
            "long",
            |ctx: CommandContext| async move {
                ctx.reply(&"x".repeat(25)).await?;
                anyhow::Ok(())
            },
            "long reply",
        );

        let message = MockMessage::outgoing(".long");
        let replies = message.replies();
        client.dispatch(message).await;
        assert_eq!(replies.lock().len(), 3);
    }
}
