//! grammers-backed Telegram client.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddrV4, SocketAddrV6};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use grammers_client::client::{LoginToken, PasswordToken, UpdatesConfiguration};
use grammers_client::update::Message;
use grammers_client::update::Update;
use grammers_client::{Client, InvocationError, SenderPool, SignInError, sender};
use grammers_session::Session;
use grammers_session::storages::SqliteSession;
use grammers_session::types::DcOption;
use grammers_tl_types as tl;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::{AuthMethod, Connection, InboundMessage, MessageStream, SelfInfo, TelegramBackend};
use super::peer::PeerKind;
use crate::session::ExportedSession;

/// Capacity of the per-identity message channel.
const MESSAGE_BUFFER: usize = 256;

/// RPC errors meaning the stored authorization is gone for good.
const REVOKED_SESSION_ERRORS: [&str; 5] = [
    "AUTH_KEY_UNREGISTERED",
    "AUTH_KEY_INVALID",
    "SESSION_REVOKED",
    "SESSION_EXPIRED",
    "USER_DEACTIVATED",
];

/// Errors that can occur during Telegram operations.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Not authorized. Please sign in first.")]
    NotAuthorized,

    #[error("Session is invalid or expired: {0}")]
    InvalidSession(String),

    #[error("Sign in failed: {0}")]
    SignInFailed(String),

    #[error("Password required for 2FA")]
    PasswordRequired(PasswordToken),

    #[error("Invalid password")]
    InvalidPassword(PasswordToken),

    #[error("Flood wait required: {0} seconds")]
    FloodWait(u32),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Session error: {0}")]
    Session(String),

    #[error("Cannot resolve {0}")]
    PeerNotFound(PeerKind),

    #[error("API invocation error: {0}")]
    Invocation(String),
}

impl From<InvocationError> for TelegramError {
    fn from(err: InvocationError) -> Self {
        classify(&err.to_string())
    }
}

/// Maps an RPC error message to the most specific error variant.
fn classify(err_str: &str) -> TelegramError {
    if REVOKED_SESSION_ERRORS.iter().any(|code| err_str.contains(code)) {
        return TelegramError::InvalidSession(err_str.to_owned());
    }

    if (err_str.contains("FLOOD_WAIT") || err_str.contains("flood"))
        && let Some(seconds) = extract_flood_wait_seconds(err_str)
    {
        return TelegramError::FloodWait(seconds);
    }

    TelegramError::Invocation(err_str.to_owned())
}

/// Extracts flood wait seconds from an error message.
fn extract_flood_wait_seconds(err_msg: &str) -> Option<u32> {
    let patterns = ["flood_wait_", "flood wait "];
    // ASCII lowercasing keeps byte offsets aligned with the original
    let lower = err_msg.to_ascii_lowercase();

    for pattern in patterns {
        if let Some(idx) = lower.find(pattern) {
            let start = idx + pattern.len();
            let num_str: String = lower[start..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if let Ok(seconds) = num_str.parse() {
                return Some(seconds);
            }
        }
    }
    None
}

/// Result of QR code authentication attempt.
#[derive(Debug, Clone)]
pub enum QrAuthResult {
    /// Got a token to display as QR code.
    Token {
        /// Raw token bytes (encode as base64 for URL).
        token: Vec<u8>,
        /// Unix timestamp when the token expires.
        expires: i32,
    },
    /// Need to migrate to another DC.
    MigrateTo {
        /// Target datacenter ID.
        dc_id: i32,
    },
    /// Authentication successful.
    Success {
        /// User ID of the authenticated user.
        user_id: i64,
        /// Username if available.
        username: Option<String>,
    },
    /// 2FA password is required.
    PasswordRequired,
}

/// Starts forwarding updates into a message channel. Built at connect time
/// so the raw updates receiver can move into the task later.
type UpdatesStarter = Box<dyn FnOnce(mpsc::Sender<Box<dyn InboundMessage>>) -> JoinHandle<()> + Send>;

/// A connected grammers client plus its background tasks.
pub struct GrammersClient {
    /// The underlying grammers client.
    client: Client,

    /// Handle to the sender pool for disconnection.
    handle: sender::SenderPoolHandle,

    /// Session storage shared with the sender pool.
    session: Arc<SqliteSession>,

    /// Deferred update streaming, consumed by [`Self::start_updates`].
    updates: parking_lot::Mutex<Option<UpdatesStarter>>,

    /// Known access hashes keyed by Bot API style id.
    access_hashes: parking_lot::Mutex<HashMap<i64, i64>>,

    /// Background task running the sender pool.
    _pool_task: JoinHandle<()>,

    /// Background task forwarding updates.
    updates_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl GrammersClient {
    /// Connects to Telegram using the session file at `session_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be opened or the connection fails.
    pub async fn connect(api_id: i32, session_path: &Path) -> Result<Self, TelegramError> {
        let session = open_session(session_path).await?;
        Self::with_session(api_id, session).await
    }

    /// Replaces the session file at `session_path` with `exported` and
    /// connects with it.
    ///
    /// # Errors
    ///
    /// Returns an error if the session file cannot be rewritten or the
    /// connection fails.
    pub async fn connect_exported(
        api_id: i32,
        session_path: &Path,
        exported: &ExportedSession,
    ) -> Result<Self, TelegramError> {
        match tokio::fs::remove_file(session_path).await {
            Ok(()) => debug!("Removed stale session file {}", session_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(TelegramError::Session(e.to_string())),
        }

        let session = open_session(session_path).await?;
        import_session(&session, exported).await;
        Self::with_session(api_id, session).await
    }

    async fn with_session(api_id: i32, session: Arc<SqliteSession>) -> Result<Self, TelegramError> {
        info!("Connecting to Telegram...");

        let SenderPool {
            runner,
            updates,
            handle,
        } = SenderPool::new(Arc::clone(&session), api_id);

        let client = Client::new(handle.clone());

        // Spawn the sender pool runner
        let pool_task = tokio::spawn(async move {
            runner.run().await;
        });

        let stream_client = client.clone();
        let starter: UpdatesStarter = Box::new(move |tx| {
            tokio::spawn(async move {
                let configuration = UpdatesConfiguration {
                    catch_up: false,
                    ..Default::default()
                };
                let mut stream = stream_client.stream_updates(updates, configuration).await;
                loop {
                    match stream.next().await {
                        Ok(Update::NewMessage(message)) => {
                            let message: Box<dyn InboundMessage> = Box::new(GrammersMessage(message));
                            if tx.send(message).await.is_err() {
                                debug!("Message receiver dropped, stopping update stream");
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("Update stream ended: {}", e);
                            break;
                        }
                    }
                }
            })
        });

        let is_authorized = client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))?;

        info!("Connected to Telegram. Authorized: {}", is_authorized);

        Ok(Self {
            client,
            handle: handle.thin,
            session,
            updates: parking_lot::Mutex::new(Some(starter)),
            access_hashes: parking_lot::Mutex::new(HashMap::new()),
            _pool_task: pool_task,
            updates_task: parking_lot::Mutex::new(None),
        })
    }

    /// Checks if the client is authorized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check fails.
    pub async fn is_authorized(&self) -> Result<bool, TelegramError> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))
    }

    /// Requests a login code to be sent to the phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn request_login_code(
        &self,
        phone: &str,
        api_hash: &str,
    ) -> Result<LoginToken, TelegramError> {
        info!("Requesting login code for phone: {}...", mask_phone(phone));

        self.client
            .request_login_code(phone, api_hash)
            .await
            .map_err(|e| TelegramError::SignInFailed(e.to_string()))
    }

    /// Signs in with the login code.
    ///
    /// # Errors
    ///
    /// Returns an error if sign in fails.
    pub async fn sign_in(&self, token: &LoginToken, code: &str) -> Result<(), TelegramError> {
        info!("Signing in with login code...");

        match self.client.sign_in(token, code).await {
            Ok(_user) => {
                info!("Successfully signed in!");
                Ok(())
            }
            Err(SignInError::PasswordRequired(password_token)) => {
                debug!("2FA password required, hint: {:?}", password_token.hint());
                Err(TelegramError::PasswordRequired(password_token))
            }
            Err(SignInError::InvalidCode) => {
                Err(TelegramError::SignInFailed("Invalid code".to_owned()))
            }
            Err(e) => Err(TelegramError::SignInFailed(e.to_string())),
        }
    }

    /// Checks the 2FA password.
    ///
    /// # Errors
    ///
    /// Returns an error if the password is invalid.
    pub async fn check_password(
        &self,
        password_token: PasswordToken,
        password: &str,
    ) -> Result<(), TelegramError> {
        info!("Checking 2FA password...");

        match self.client.check_password(password_token, password).await {
            Ok(_user) => {
                info!("Successfully authenticated with 2FA!");
                Ok(())
            }
            Err(SignInError::InvalidPassword(token)) => Err(TelegramError::InvalidPassword(token)),
            Err(e) => Err(TelegramError::SignInFailed(e.to_string())),
        }
    }

    /// Signs in as a bot.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is rejected.
    pub async fn bot_sign_in(&self, token: &str, api_hash: &str) -> Result<(), TelegramError> {
        info!("Signing in with bot token...");

        self.client
            .bot_sign_in(token, api_hash)
            .await
            .map(|_| ())
            .map_err(|e| TelegramError::SignInFailed(e.to_string()))
    }

    /// Performs QR code authentication.
    ///
    /// Returns the login token bytes that should be displayed as a QR code.
    /// The QR code URL format is: `tg://login?token=BASE64_TOKEN`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn export_login_token(
        &self,
        api_id: i32,
        api_hash: &str,
    ) -> Result<QrAuthResult, TelegramError> {
        debug!("Requesting QR login token...");

        let request = tl::functions::auth::ExportLoginToken {
            api_id,
            api_hash: api_hash.to_owned(),
            except_ids: vec![],
        };

        match self.client.invoke(&request).await {
            Ok(tl::enums::auth::LoginToken::Token(token)) => {
                debug!("Got login token, expires: {}", token.expires);
                Ok(QrAuthResult::Token {
                    token: token.token,
                    expires: token.expires,
                })
            }
            Ok(tl::enums::auth::LoginToken::MigrateTo(migrate)) => {
                debug!("Need to migrate to DC {}", migrate.dc_id);
                Ok(QrAuthResult::MigrateTo { dc_id: migrate.dc_id })
            }
            Ok(tl::enums::auth::LoginToken::Success(success)) => {
                debug!("QR login successful!");
                if let tl::enums::auth::Authorization::Authorization(auth) = success.authorization
                    && let tl::enums::User::User(user) = auth.user
                {
                    return Ok(QrAuthResult::Success {
                        user_id: user.id,
                        username: user.username,
                    });
                }
                Ok(QrAuthResult::Success {
                    user_id: 0,
                    username: None,
                })
            }
            Err(e) => {
                let err_str = e.to_string();
                if err_str.contains("SESSION_PASSWORD_NEEDED") {
                    return Ok(QrAuthResult::PasswordRequired);
                }
                Err(TelegramError::SignInFailed(err_str))
            }
        }
    }

    /// Fetches the logged-in account.
    ///
    /// # Errors
    ///
    /// Returns an error if not authorized or the API call fails.
    pub async fn get_me(&self) -> Result<SelfInfo, TelegramError> {
        let request = tl::functions::users::GetUsers {
            id: vec![tl::enums::InputUser::UserSelf],
        };

        let users = self.client.invoke(&request).await?;
        match users.into_iter().next() {
            Some(tl::enums::User::User(user)) => Ok(SelfInfo {
                id: user.id,
                username: user.username,
                first_name: user.first_name.unwrap_or_default(),
                is_bot: user.bot,
                is_premium: user.premium,
            }),
            _ => Err(TelegramError::NotAuthorized),
        }
    }

    /// Exports the home DC, its authorization key and the DC endpoints of
    /// an authorized session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session holds no key for its home DC.
    pub fn export_session(
        &self,
        api_id: i32,
        api_hash: &str,
        me: &SelfInfo,
    ) -> Result<ExportedSession, TelegramError> {
        let home = self.session.home_dc_id();
        let dc_id = u16::try_from(home)
            .map_err(|_| TelegramError::Session(format!("Invalid home DC {home}")))?;
        let home_option = self.dc_option(home)?;
        let auth_key = home_option.auth_key.ok_or(TelegramError::NotAuthorized)?;

        let mut dc_ipv4 = [SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0); 5];
        for (addr, id) in dc_ipv4.iter_mut().zip(1..) {
            *addr = self.dc_option(id)?.ipv4;
        }

        Ok(ExportedSession {
            dc_id,
            is_bot: me.is_bot,
            api_id,
            api_hash: api_hash.to_owned(),
            user_id: me.id,
            created_at: chrono::Utc::now().timestamp(),
            auth_key,
            home_ipv6: home_option.ipv6,
            dc_ipv4,
        })
    }

    fn dc_option(&self, dc_id: i32) -> Result<DcOption, TelegramError> {
        self.session
            .dc_option(dc_id)
            .ok_or_else(|| TelegramError::Session(format!("No address stored for DC {dc_id}")))
    }

    /// Sends a text message to a chat given its Bot API style id.
    ///
    /// # Errors
    ///
    /// Returns an error if the chat cannot be resolved or sending fails.
    pub async fn send_text(&self, chat_id: i64, text: &str, is_bot: bool) -> Result<(), TelegramError> {
        let peer = self.resolve_peer(chat_id, is_bot).await?;

        let request = tl::functions::messages::SendMessage {
            no_webpage: true,
            silent: false,
            background: false,
            clear_draft: false,
            noforwards: false,
            update_stickersets_order: false,
            invert_media: false,
            allow_paid_floodskip: false,
            peer,
            reply_to: None,
            message: text.to_owned(),
            random_id: rand::random(),
            reply_markup: None,
            entities: None,
            schedule_date: None,
            schedule_repeat_period: None,
            send_as: None,
            quick_reply_shortcut: None,
            effect: None,
            allow_paid_stars: None,
            suggested_post: None,
        };

        self.client.invoke(&request).await?;
        Ok(())
    }

    /// Builds an input peer for a Bot API style id.
    ///
    /// Bots may address users and channels without an access hash; user
    /// accounts need one, which is looked up in the dialog list on a miss.
    async fn resolve_peer(&self, chat_id: i64, is_bot: bool) -> Result<tl::enums::InputPeer, TelegramError> {
        let kind = PeerKind::from_bot_api(chat_id);
        if let PeerKind::Chat(chat_id) = kind {
            return Ok(tl::types::InputPeerChat { chat_id }.into());
        }

        let known = self.access_hashes.lock().get(&chat_id).copied();
        let access_hash = match known {
            Some(hash) => hash,
            None if is_bot => 0,
            None => {
                self.refresh_access_hashes().await?;
                self.access_hashes
                    .lock()
                    .get(&chat_id)
                    .copied()
                    .ok_or(TelegramError::PeerNotFound(kind))?
            }
        };

        Ok(match kind {
            PeerKind::User(user_id) => tl::types::InputPeerUser {
                user_id,
                access_hash,
            }
            .into(),
            PeerKind::Channel(channel_id) => tl::types::InputPeerChannel {
                channel_id,
                access_hash,
            }
            .into(),
            PeerKind::Chat(chat_id) => tl::types::InputPeerChat { chat_id }.into(),
        })
    }

    /// Caches access hashes from the most recent dialogs.
    async fn refresh_access_hashes(&self) -> Result<(), TelegramError> {
        debug!("Refreshing access hashes from dialogs");

        let request = tl::functions::messages::GetDialogs {
            exclude_pinned: false,
            folder_id: None,
            offset_date: 0,
            offset_id: 0,
            offset_peer: tl::enums::InputPeer::Empty,
            limit: 100,
            hash: 0,
        };

        let (users, chats) = match self.client.invoke(&request).await? {
            tl::enums::messages::Dialogs::Dialogs(d) => (d.users, d.chats),
            tl::enums::messages::Dialogs::Slice(d) => (d.users, d.chats),
            tl::enums::messages::Dialogs::NotModified(_) => return Ok(()),
        };

        let mut hashes = self.access_hashes.lock();
        for user in users {
            if let tl::enums::User::User(user) = user
                && let Some(hash) = user.access_hash
            {
                hashes.insert(PeerKind::User(user.id).to_bot_api(), hash);
            }
        }
        for chat in chats {
            match chat {
                tl::enums::Chat::Channel(channel) => {
                    if let Some(hash) = channel.access_hash {
                        hashes.insert(PeerKind::Channel(channel.id).to_bot_api(), hash);
                    }
                }
                tl::enums::Chat::ChannelForbidden(channel) => {
                    hashes.insert(PeerKind::Channel(channel.id).to_bot_api(), channel.access_hash);
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Starts forwarding incoming messages. Returns `None` if already started.
    pub fn start_updates(&self) -> Option<MessageStream> {
        let starter = self.updates.lock().take()?;
        let (tx, rx) = mpsc::channel(MESSAGE_BUFFER);
        *self.updates_task.lock() = Some(starter(tx));
        Some(rx)
    }

    /// Disconnects from Telegram.
    pub fn disconnect(&self) {
        info!("Disconnecting from Telegram...");
        if let Some(task) = self.updates_task.lock().take() {
            task.abort();
        }
        self.handle.quit();
    }
}

impl std::fmt::Debug for GrammersClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrammersClient")
            .field("known_peers", &self.access_hashes.lock().len())
            .finish_non_exhaustive()
    }
}

async fn open_session(session_path: &Path) -> Result<Arc<SqliteSession>, TelegramError> {
    SqliteSession::open(session_path)
        .await
        .map(Arc::new)
        .map_err(|e| TelegramError::Session(e.to_string()))
}

/// Writes the DC table and home DC of `exported` into a fresh session.
/// Only the home DC gets an authorization key.
async fn import_session(session: &SqliteSession, exported: &ExportedSession) {
    let home = i32::from(exported.dc_id);
    for (id, ipv4) in (1..).zip(exported.dc_ipv4) {
        let ipv6 = if id == home {
            exported.home_ipv6
        } else {
            session
                .dc_option(id)
                .map_or(SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, 0, 0, 0), |option| option.ipv6)
        };
        let option = DcOption {
            id,
            ipv4,
            ipv6,
            auth_key: (id == home).then_some(exported.auth_key),
        };
        session.set_dc_option(&option).await;
    }
    session.set_home_dc_id(home).await;
}

/// Incoming grammers message.
struct GrammersMessage(Message);

#[async_trait]
impl InboundMessage for GrammersMessage {
    fn id(&self) -> i32 {
        self.0.id()
    }

    fn chat_id(&self) -> i64 {
        self.0.peer_id().bot_api_dialog_id()
    }

    fn sender_id(&self) -> Option<i64> {
        self.0.sender_id().map(|peer| peer.bot_api_dialog_id())
    }

    fn text(&self) -> &str {
        self.0.text()
    }

    fn outgoing(&self) -> bool {
        self.0.outgoing()
    }

    async fn reply(&self, text: &str) -> Result<(), TelegramError> {
        self.0.reply(text).await?;
        Ok(())
    }
}

/// [`TelegramBackend`] over grammers with an `SQLite` session file per identity.
pub struct GrammersBackend {
    api_id: i32,
    api_hash: String,
    session_path: PathBuf,
    live: parking_lot::Mutex<Option<Arc<GrammersClient>>>,
    is_bot: std::sync::atomic::AtomicBool,
}

impl GrammersBackend {
    /// Creates a backend storing its session at `session_path`.
    #[must_use]
    pub fn new(api_id: i32, api_hash: impl Into<String>, session_path: impl Into<PathBuf>) -> Self {
        Self {
            api_id,
            api_hash: api_hash.into(),
            session_path: session_path.into(),
            live: parking_lot::Mutex::new(None),
            is_bot: std::sync::atomic::AtomicBool::new(false),
        }
    }

    fn client(&self) -> Result<Arc<GrammersClient>, TelegramError> {
        self.live.lock().clone().ok_or(TelegramError::NotConnected)
    }

    /// Decodes a user session string and warns when it was created with
    /// other API credentials.
    fn check_exported(&self, session_string: &str) -> Result<ExportedSession, TelegramError> {
        let exported = ExportedSession::decode(session_string)
            .map_err(|e| TelegramError::InvalidSession(e.to_string()))?;
        if exported.is_bot {
            return Err(TelegramError::InvalidSession(
                "session string belongs to a bot account".to_owned(),
            ));
        }
        if exported.api_id != self.api_id || exported.api_hash != self.api_hash {
            warn!(
                "Session string was created with other API credentials (API_ID {}, configured {})",
                exported.api_id, self.api_id
            );
        }
        Ok(exported)
    }

    async fn authorize(&self, client: &GrammersClient, auth: &AuthMethod) -> Result<SelfInfo, TelegramError> {
        match auth {
            AuthMethod::SessionString(_) => {
                if !client.is_authorized().await? {
                    return Err(TelegramError::InvalidSession(
                        "session is not authorized".to_owned(),
                    ));
                }
            }
            AuthMethod::BotToken(token) => {
                if !client.is_authorized().await? {
                    client.bot_sign_in(token, &self.api_hash).await?;
                }
            }
        }

        client.get_me().await
    }
}

#[async_trait]
impl TelegramBackend for GrammersBackend {
    async fn connect(&self, auth: &AuthMethod) -> Result<Connection, TelegramError> {
        let client = match auth {
            AuthMethod::SessionString(session_string) => {
                let exported = self.check_exported(session_string)?;
                GrammersClient::connect_exported(self.api_id, &self.session_path, &exported).await?
            }
            AuthMethod::BotToken(_) => GrammersClient::connect(self.api_id, &self.session_path).await?,
        };
        let me = match self.authorize(&client, auth).await {
            Ok(me) => me,
            Err(e) => {
                client.disconnect();
                return Err(e);
            }
        };

        self.is_bot
            .store(me.is_bot, std::sync::atomic::Ordering::Relaxed);
        let messages = client.start_updates().ok_or(TelegramError::Connection(
            "update stream already started".to_owned(),
        ))?;
        *self.live.lock() = Some(Arc::new(client));

        Ok(Connection { me, messages })
    }

    async fn get_me(&self) -> Result<SelfInfo, TelegramError> {
        self.client()?.get_me().await
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let is_bot = self.is_bot.load(std::sync::atomic::Ordering::Relaxed);
        self.client()?.send_text(chat_id, text, is_bot).await
    }

    fn is_connected(&self) -> bool {
        self.live.lock().is_some()
    }

    async fn disconnect(&self) {
        let client = self.live.lock().take();
        if let Some(client) = client {
            client.disconnect();
        }
    }
}

impl std::fmt::Debug for GrammersBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrammersBackend")
            .field("api_id", &self.api_id)
            .field("session_path", &self.session_path)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// Masks a phone number for logging (shows last 4 digits).
fn mask_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() > 4 {
        format!("***{}", &digits[digits.len() - 4..])
    } else {
        "****".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("+1234567890"), "***7890");
        assert_eq!(mask_phone("123"), "****");
        assert_eq!(mask_phone("+7 (999) 123-45-67"), "***4567");
    }

    #[test]
    fn test_extract_flood_wait() {
        assert_eq!(extract_flood_wait_seconds("FLOOD_WAIT_120"), Some(120));
        assert_eq!(extract_flood_wait_seconds("flood wait 60 seconds"), Some(60));
        assert_eq!(extract_flood_wait_seconds("some other error"), None);
    }

    #[test]
    fn test_extract_flood_wait_after_non_ascii() {
        // 'İ' grows when lowercased with full Unicode rules
        assert_eq!(extract_flood_wait_seconds("İİİ FLOOD_WAIT_42"), Some(42));
        assert_eq!(extract_flood_wait_seconds("ошибка: flood wait 7"), Some(7));
    }

    #[test]
    fn test_classify() {
        assert!(matches!(
            classify("rpc error 401: AUTH_KEY_UNREGISTERED"),
            TelegramError::InvalidSession(_)
        ));
        assert!(matches!(
            classify("rpc error 420: FLOOD_WAIT_30"),
            TelegramError::FloodWait(30)
        ));
        assert!(matches!(
            classify("rpc error 400: PEER_ID_INVALID"),
            TelegramError::Invocation(_)
        ));
    }

    fn backend() -> GrammersBackend {
        GrammersBackend::new(2_040_713, "0123456789abcdef0123456789abcdef", "unused.session")
    }

    #[test]
    fn test_check_exported_accepts_generated_string() {
        let session_string = crate::testing::exported_session(3).encode().unwrap();
        let exported = backend().check_exported(&session_string).unwrap();
        assert_eq!(exported.dc_id, 3);
        assert_eq!(exported.user_id, 6_524_871_309);
    }

    #[test]
    fn test_check_exported_rejects_other_formats() {
        let legacy = crate::session::codec::encode(&[0x5a_u8; 400]);
        assert!(matches!(
            backend().check_exported(&legacy),
            Err(TelegramError::InvalidSession(_))
        ));

        let mut bot = crate::testing::exported_session(2);
        bot.is_bot = true;
        let err = backend().check_exported(&bot.encode().unwrap()).unwrap_err();
        assert!(err.to_string().contains("bot account"));
    }
}
