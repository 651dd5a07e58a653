//! In-memory Telegram doubles for unit tests.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddrV4, SocketAddrV6};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;
use tokio::sync::mpsc;

use crate::client::{BotClient, Identity};
use crate::config::Config;
use crate::plugins::PluginCatalog;
use crate::session::ExportedSession;
use crate::telegram::{AuthMethod, Connection, InboundMessage, SelfInfo, TelegramBackend, TelegramError};

/// A deterministic exported session homed on `dc_id`.
pub fn exported_session(dc_id: u16) -> ExportedSession {
    let mut rng = StdRng::seed_from_u64(u64::from(dc_id));
    let mut auth_key = [0_u8; 256];
    rng.fill(&mut auth_key[..]);

    ExportedSession {
        dc_id,
        is_bot: false,
        api_id: 2_040_713,
        api_hash: "0123456789abcdef0123456789abcdef".to_owned(),
        user_id: 6_524_871_309,
        created_at: 1_760_000_000,
        auth_key,
        home_ipv6: SocketAddrV6::new(Ipv6Addr::new(0x2001, 0x67c, 0x4e8, 0xf002, 0, 0, 0, 0xa), 443, 0, 0),
        dc_ipv4: [
            SocketAddrV4::new(Ipv4Addr::new(149, 154, 175, 53), 443),
            SocketAddrV4::new(Ipv4Addr::new(149, 154, 167, 51), 443),
            SocketAddrV4::new(Ipv4Addr::new(149, 154, 175, 100), 443),
            SocketAddrV4::new(Ipv4Addr::new(149, 154, 167, 91), 443),
            SocketAddrV4::new(Ipv4Addr::new(91, 108, 56, 130), 443),
        ],
    }
}

/// Builds a valid configuration rooted in a fresh temporary directory.
pub fn config(extra: &[(&str, &str)]) -> (TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    let session = exported_session(2).encode().unwrap();

    let mut vars: HashMap<String, String> = HashMap::from([
        ("API_ID".to_owned(), "12345".to_owned()),
        ("API_HASH".to_owned(), "0123456789abcdef".to_owned()),
        ("SESSION_STRING".to_owned(), session),
        ("BOT_TOKEN".to_owned(), "123456:assistant-token".to_owned()),
        ("NEXUS_HOME".to_owned(), dir.path().display().to_string()),
    ]);
    for (key, value) in extra {
        vars.insert((*key).to_owned(), (*value).to_owned());
    }

    let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();
    config.paths.ensure_directories().unwrap();
    (dir, config)
}

/// Starts a client with the builtin plugins on a mock backend.
///
/// The userbot is account 7, the assistant is bot 8.
pub async fn started_client(
    identity: Identity,
    extra: &[(&str, &str)],
) -> (TempDir, Arc<MockBackend>, Arc<BotClient>) {
    let (dir, config) = config(extra);
    let backend = match identity {
        Identity::Userbot => MockBackend::user(7),
        Identity::Assistant => MockBackend::bot(8),
    };
    let client = BotClient::new(
        identity,
        Arc::new(config),
        Arc::clone(&backend) as Arc<dyn TelegramBackend>,
        Arc::new(PluginCatalog::builtin()),
    )
    .unwrap();
    client.start().await.unwrap();
    (dir, backend, client)
}

/// Dispatches `message` and returns the replies it got.
pub async fn replies_to(client: &Arc<BotClient>, message: Box<MockMessage>) -> Vec<String> {
    let replies = message.replies();
    client.dispatch(message).await;
    let replies = replies.lock().clone();
    replies
}

/// Backend that records sends and never touches the network.
pub struct MockBackend {
    me: SelfInfo,
    sent: Mutex<Vec<(i64, String)>>,
    inbox: Mutex<Option<mpsc::Sender<Box<dyn InboundMessage>>>>,
    connected: AtomicBool,
    connects: AtomicUsize,
    next_connect_error: Mutex<Option<TelegramError>>,
}

impl MockBackend {
    fn new(id: i64, is_bot: bool) -> Arc<Self> {
        Arc::new(Self {
            me: SelfInfo {
                id,
                username: Some(format!("account{id}")),
                first_name: "Test".to_owned(),
                is_bot,
                is_premium: false,
            },
            sent: Mutex::new(Vec::new()),
            inbox: Mutex::new(None),
            connected: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
            next_connect_error: Mutex::new(None),
        })
    }

    pub fn user(id: i64) -> Arc<Self> {
        Self::new(id, false)
    }

    pub fn bot(id: i64) -> Arc<Self> {
        Self::new(id, true)
    }

    /// Makes the next `connect` fail with `error`.
    pub fn fail_next_connect(&self, error: TelegramError) {
        *self.next_connect_error.lock() = Some(error);
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelegramBackend for MockBackend {
    async fn connect(&self, _auth: &AuthMethod) -> Result<Connection, TelegramError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.next_connect_error.lock().take() {
            return Err(error);
        }

        let (tx, messages) = mpsc::channel(16);
        *self.inbox.lock() = Some(tx);
        self.connected.store(true, Ordering::SeqCst);
        Ok(Connection {
            me: self.me.clone(),
            messages,
        })
    }

    async fn get_me(&self) -> Result<SelfInfo, TelegramError> {
        if self.is_connected() {
            Ok(self.me.clone())
        } else {
            Err(TelegramError::NotConnected)
        }
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        if !self.is_connected() {
            return Err(TelegramError::NotConnected);
        }
        self.sent.lock().push((chat_id, text.to_owned()));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) {
        self.inbox.lock().take();
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// Message that records the replies sent to it.
#[derive(Debug)]
pub struct MockMessage {
    chat_id: i64,
    sender_id: i64,
    text: String,
    outgoing: bool,
    replies: Arc<Mutex<Vec<String>>>,
}

impl MockMessage {
    /// A message the logged-in account sent itself.
    pub fn outgoing(text: &str) -> Box<Self> {
        Box::new(Self {
            chat_id: 1,
            sender_id: 0,
            text: text.to_owned(),
            outgoing: true,
            replies: Arc::default(),
        })
    }

    /// A message from someone else.
    pub fn incoming(sender_id: i64, text: &str) -> Box<Self> {
        Box::new(Self {
            chat_id: sender_id,
            sender_id,
            text: text.to_owned(),
            outgoing: false,
            replies: Arc::default(),
        })
    }

    pub fn replies(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.replies)
    }
}

#[async_trait]
impl InboundMessage for MockMessage {
    fn id(&self) -> i32 {
        1
    }

    fn chat_id(&self) -> i64 {
        self.chat_id
    }

    fn sender_id(&self) -> Option<i64> {
        Some(self.sender_id)
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn outgoing(&self) -> bool {
        self.outgoing
    }

    async fn reply(&self, text: &str) -> Result<(), TelegramError> {
        self.replies.lock().push(text.to_owned());
        Ok(())
    }
}
