//! The top-level handle a consumer holds: owns the connection's single
//! serializer (`processing_mutex`), the event buffer, the stanza router,
//! and the per-connection caches that must not leak across reconnects.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, broadcast};
use warp_core_binary::BinaryNode;

use warp_core_appstate::{Collection, HashState};
use warp_core_libsignal::SignalRepository;

use crate::config::Config;
use crate::connection::ConnectionController;
use crate::creds::{Creds, KeyStore};
use crate::devices::DeviceCache;
use crate::error::ClientError;
use crate::events::{Event, EventBuffer};
use crate::noise::NoiseState;
use crate::router::StanzaRouter;
use crate::transport::WsTransport;

/// The live Noise-wrapped socket: transport and cipher state are always
/// advanced together, so they live behind the same guard. Holding this
/// mutex for the duration of a send or a frame read is what gives the
/// connection its single-writer serializer at the wire level.
struct ConnectionIo {
    transport: WsTransport,
    noise: NoiseState,
}

/// Post-handshake stanza frames carry no associated data; only the
/// handshake messages themselves are bound to the running transcript hash.
const TRANSPORT_AD: &[u8] = &[];

/// Components shared across the lifetime of one logical connection.
/// Rebuilt on reconnect rather than mutated in place, so a stale cache
/// from a previous socket can never leak into a new one.
pub struct Client<S: KeyStore, R: SignalRepository> {
    pub config: Config,
    pub store: Arc<S>,
    pub repository: Arc<R>,
    pub router: Arc<StanzaRouter>,
    pub connection: Arc<ConnectionController>,
    pub events: Arc<EventBuffer>,
    pub device_cache: Arc<DeviceCache>,
    pub app_state: Mutex<HashMap<Collection, HashState>>,
    /// Serializes message/receipt/appPatch processing so wire order is
    /// preserved end to end; an `appPatch` call and an inbound message
    /// handler never interleave their KeyStore/store effects.
    processing_mutex: Mutex<()>,
    event_tx: broadcast::Sender<Event>,
    io: Mutex<Option<ConnectionIo>>,
    next_tag: AtomicU64,
}

impl<S: KeyStore, R: SignalRepository> Client<S, R> {
    pub fn new(config: Config, store: Arc<S>, repository: Arc<R>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let device_cache = Arc::new(DeviceCache::new(config.user_devices_cache_ttl));
        Self {
            config,
            store,
            repository,
            router: Arc::new(StanzaRouter::new()),
            connection: Arc::new(ConnectionController::new()),
            events: Arc::new(EventBuffer::new()),
            device_cache,
            app_state: Mutex::new(HashMap::new()),
            processing_mutex: Mutex::new(()),
            event_tx,
            io: Mutex::new(None),
            next_tag: AtomicU64::new(1),
        }
    }

    /// Installs the transport and post-handshake cipher state produced by
    /// [`crate::handshake::do_handshake`], replacing whatever was there
    /// before (a reconnect always starts from a fresh socket and a fresh
    /// Noise state, never resuming counters across sockets).
    pub async fn attach_transport(&self, transport: WsTransport, noise: NoiseState) {
        *self.io.lock().await = Some(ConnectionIo { transport, noise });
    }

    fn generate_tag(&self) -> String {
        format!("wc-{}", self.next_tag.fetch_add(1, Ordering::Relaxed))
    }

    /// Encodes and sends one stanza over the live connection, encrypting it
    /// under the current Noise transport keys. Fails with
    /// [`ClientError::ConnectionClosed`] if no transport is attached.
    pub async fn send_node(&self, node: &BinaryNode) -> crate::error::Result<()> {
        let mut guard = self.io.lock().await;
        let io = guard.as_mut().ok_or(ClientError::ConnectionClosed)?;
        let plaintext = warp_core_binary::encode(node)?;
        let ciphertext = io.noise.encrypt_with_ad(&plaintext, TRANSPORT_AD)?;
        io.transport.send_frame(&ciphertext).await?;
        Ok(())
    }

    /// Sends `node` (assigning it an `id` if it doesn't already carry one)
    /// and awaits the correlated reply, the `query()` primitive every
    /// outbound IQ in this crate is built on. The resolver is registered
    /// before the node is sent, so a reply that beats the write lock back
    /// is never dropped on the floor.
    pub async fn query(&self, mut node: BinaryNode, query_timeout: Duration) -> crate::error::Result<BinaryNode> {
        let id = match node.attrs.get("id") {
            Some(id) => id.clone(),
            None => {
                let id = self.generate_tag();
                node.attrs.insert("id".to_string(), id.clone());
                id
            }
        };
        let rx = self.router.register_query(id.clone()).await;
        if let Err(err) = self.send_node(&node).await {
            self.router.forget_query(&id).await;
            return Err(err);
        }
        self.router.wait_for(id, rx, query_timeout).await
    }

    /// Reads and routes frames from the live connection until it closes or
    /// a read fails; the caller typically spawns this as the connection's
    /// background read task right after [`Self::attach_transport`].
    pub async fn run_read_loop(&self) -> crate::error::Result<()> {
        loop {
            let frame = {
                let mut guard = self.io.lock().await;
                let io = guard.as_mut().ok_or(ClientError::ConnectionClosed)?;
                let ciphertext = io.transport.next_frame().await?;
                io.noise.decrypt_with_ad(&ciphertext, TRANSPORT_AD)?
            };
            let node = warp_core_binary::decode(&frame)?;
            self.router.route(node).await;
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: Event) {
        let _ = self.event_tx.send(event);
    }

    /// Runs `body` under the connection's processing serializer, so a
    /// message/receipt handler and an `appPatch` call never interleave.
    /// This lock is not reentrant: a nested resync triggered from within
    /// `body` must be expressed as a plain function call that already
    /// assumes the lock is held, not as another call to this method.
    pub async fn with_processing_lock<F, Fut, T>(&self, body: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let _guard = self.processing_mutex.lock().await;
        body().await
    }

    /// Ends the connection exactly once, cancelling pending queries and
    /// emitting the terminal `connection.update{close}` event.
    pub async fn end(&self, reason: Option<String>) {
        self.router.cancel_all().await;
        let sender = self.event_tx.clone();
        self.connection
            .end(reason, move |event| {
                let _ = sender.send(event);
            })
            .await;
    }

    pub async fn persist_creds(&self, creds: Creds) {
        self.emit(Event::CredsUpdate(Box::new(creds)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creds::InMemoryKeyStore;
    use warp_core_libsignal::{DefaultSignalRepository, InMemorySignalStore};

    fn test_client() -> Client<InMemoryKeyStore, DefaultSignalRepository<InMemorySignalStore>> {
        let store = Arc::new(InMemoryKeyStore::new());
        let signal_store = InMemorySignalStore::new(1);
        let repository = Arc::new(DefaultSignalRepository::new(signal_store));
        Client::new(Config::default(), store, repository)
    }

    #[tokio::test]
    async fn end_is_idempotent_across_concurrent_callers() {
        let client = test_client();
        let mut rx = client.subscribe();
        client.end(None).await;
        client.end(None).await;
        let mut closes = 0;
        while let Ok(event) = rx.try_recv() {
            if let Event::ConnectionUpdate(update) = event {
                if update.connection.as_deref() == Some("close") {
                    closes += 1;
                }
            }
        }
        assert_eq!(closes, 1);
    }

    #[tokio::test]
    async fn processing_lock_serializes_sequential_calls() {
        let client = test_client();
        let first = client.with_processing_lock(|| async { 1 }).await;
        let second = client.with_processing_lock(|| async { 2 }).await;
        assert_eq!((first, second), (1, 2));
    }

    #[tokio::test]
    async fn query_without_a_transport_fails_closed() {
        let client = test_client();
        let node = BinaryNode::new("iq").with_attr("type", "get");
        let result = client.query(node, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(ClientError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn query_assigns_a_fresh_id_when_the_node_has_none() {
        let client = test_client();
        let node = BinaryNode::new("iq").with_attr("type", "get");
        assert!(!node.attrs.contains_key("id"));
        // Without a transport this still exercises id generation before the
        // send fails, confirming two queries never collide on the same tag.
        let first_tag = client.generate_tag();
        let second_tag = client.generate_tag();
        assert_ne!(first_tag, second_tag);
    }
}
