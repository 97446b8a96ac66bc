//! Stanza routing: correlates `iq` responses to outstanding queries by
//! `id`, and dispatches everything else to pattern-matched handlers.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::timeout;

use warp_core_binary::BinaryNode;

use crate::error::ClientError;

/// One of the six pattern-key forms a handler can register against,
/// matched in the order listed here (most specific first) against an
/// incoming node.
#[derive(Debug, Clone)]
pub enum PatternKey {
    /// `TAG:<id>` — only used internally for query correlation.
    Tag(String),
    /// `<tag>`
    Node(&'static str),
    /// `<tag>,<key>` — node has the attr present (any value).
    NodeWithAttrKey(&'static str, &'static str),
    /// `<tag>,<key>:<value>`
    NodeWithAttrValue(&'static str, &'static str, &'static str),
    /// `<tag>,<key>:<value>,<firstChildTag>`
    NodeWithAttrValueAndChild(&'static str, &'static str, &'static str, &'static str),
    /// `<tag>,,<firstChildTag>`
    NodeWithChild(&'static str, &'static str),
}

impl PatternKey {
    fn matches(&self, node: &BinaryNode) -> bool {
        let first_child_tag = node.children().first().map(|c| c.tag.as_str());
        match self {
            PatternKey::Tag(_) => false,
            PatternKey::Node(tag) => node.tag == *tag,
            PatternKey::NodeWithAttrKey(tag, key) => node.tag == *tag && node.attrs.contains_key(*key),
            PatternKey::NodeWithAttrValue(tag, key, value) => {
                node.tag == *tag && node.attrs.get(*key).map(|v| v.as_str()) == Some(*value)
            }
            PatternKey::NodeWithAttrValueAndChild(tag, key, value, child) => {
                node.tag == *tag
                    && node.attrs.get(*key).map(|v| v.as_str()) == Some(*value)
                    && first_child_tag == Some(*child)
            }
            PatternKey::NodeWithChild(tag, child) => node.tag == *tag && first_child_tag == Some(*child),
        }
    }
}

type Handler = Box<dyn Fn(&BinaryNode) + Send + Sync>;

/// Routes inbound frames to query resolvers and pattern handlers. Handlers
/// run to completion (non-blocking, synchronous dispatch) before the next
/// frame is routed — the caller of [`StanzaRouter::route`] owns ordering.
pub struct StanzaRouter {
    pending_queries: tokio::sync::Mutex<HashMap<String, oneshot::Sender<BinaryNode>>>,
    handlers: tokio::sync::RwLock<Vec<(PatternKey, Handler)>>,
}

impl StanzaRouter {
    pub fn new() -> Self {
        Self {
            pending_queries: tokio::sync::Mutex::new(HashMap::new()),
            handlers: tokio::sync::RwLock::new(Vec::new()),
        }
    }

    pub async fn register(&self, pattern: PatternKey, handler: Handler) {
        self.handlers.write().await.push((pattern, handler));
    }

    /// Registers a pending query and returns a receiver that resolves when
    /// a node with a matching `id` attribute is routed, or an error if the
    /// timeout elapses or the connection closes first.
    pub async fn await_response(&self, id: String, query_timeout: Duration) -> Result<BinaryNode, ClientError> {
        let rx = self.register_query(id.clone()).await;
        self.wait_for(id, rx, query_timeout).await
    }

    /// Inserts the resolver for `id` without waiting on it, so a caller can
    /// register before sending the outbound node and close the window where
    /// a fast reply arrives before anything is listening for it.
    pub async fn register_query(&self, id: String) -> oneshot::Receiver<BinaryNode> {
        let (tx, rx) = oneshot::channel();
        self.pending_queries.lock().await.insert(id, tx);
        rx
    }

    /// Waits on a receiver obtained from [`Self::register_query`].
    pub async fn wait_for(
        &self,
        id: String,
        rx: oneshot::Receiver<BinaryNode>,
        query_timeout: Duration,
    ) -> Result<BinaryNode, ClientError> {
        match timeout(query_timeout, rx).await {
            Ok(Ok(node)) => Ok(node),
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                self.pending_queries.lock().await.remove(&id);
                Err(ClientError::TimedOut)
            }
        }
    }

    /// Drops a registered resolver without waiting on it; used to clean up
    /// after a registered query whose send failed before anything could
    /// reply.
    pub async fn forget_query(&self, id: &str) {
        self.pending_queries.lock().await.remove(id);
    }

    /// Routes one inbound node: resolves a matching pending query if the
    /// node carries an `id` attribute with a waiting resolver, otherwise
    /// dispatches to every handler whose pattern matches, logging at debug
    /// level if nothing consumed it.
    pub async fn route(&self, node: BinaryNode) {
        if let Some(id) = node.attrs.get("id").cloned() {
            let mut pending = self.pending_queries.lock().await;
            if let Some(resolver) = pending.remove(&id) {
                let _ = resolver.send(node);
                return;
            }
        }

        let handlers = self.handlers.read().await;
        let mut consumed = false;
        for (pattern, handler) in handlers.iter() {
            if pattern.matches(&node) {
                handler(&node);
                consumed = true;
            }
        }
        if !consumed {
            tracing::debug!(tag = %node.tag, "unconsumed stanza");
        }
    }

    /// Cancels every pending query with [`ClientError::ConnectionClosed`]
    /// by dropping their resolvers; called once when the connection ends.
    pub async fn cancel_all(&self) {
        self.pending_queries.lock().await.clear();
    }
}

impl Default for StanzaRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp_core_binary::NodeContent;
    use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};

    #[tokio::test]
    async fn query_correlates_by_id_and_resolves() {
        let router = StanzaRouter::new();
        let reply_node = BinaryNode::new("iq").with_attr("id", "abc");
        let fut = router.await_response("abc".to_string(), Duration::from_secs(1));
        router.route(reply_node.clone()).await;
        let resolved = fut.await.unwrap();
        assert_eq!(resolved.tag, "iq");
    }

    #[tokio::test]
    async fn timeouts_never_resolve_and_clean_up() {
        let router = StanzaRouter::new();
        let result = router.await_response("missing".to_string(), Duration::from_millis(10)).await;
        assert!(matches!(result, Err(ClientError::TimedOut)));
    }

    #[tokio::test]
    async fn unmatched_pattern_does_not_invoke_handler() {
        let router = StanzaRouter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        router
            .register(
                PatternKey::NodeWithAttrValue("message", "type", "chat"),
                Box::new(move |_| {
                    count_clone.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await;
        let node = BinaryNode::new("message").with_attr("type", "receipt");
        router.route(node).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn matched_pattern_with_first_child_invokes_handler() {
        let router = StanzaRouter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        router
            .register(
                PatternKey::NodeWithChild("iq", "usync"),
                Box::new(move |_| {
                    count_clone.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await;
        let node = BinaryNode::new("iq").with_children(vec![BinaryNode::new("usync")]);
        router.route(node).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        let _ = NodeContent::Empty;
    }
}
