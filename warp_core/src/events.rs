//! Outbound event surface plus the buffering layer (C3) that coalesces
//! bursts of related events during connection bring-up instead of
//! forwarding each one individually.

use std::collections::VecDeque;

use tokio::sync::Mutex;

use crate::creds::Creds;
use crate::jid::Jid;

#[derive(Debug, Clone)]
pub enum Event {
    ConnectionUpdate(ConnectionUpdate),
    CredsUpdate(Box<Creds>),
    MessagesUpsert { messages: Vec<Vec<u8>>, kind: UpsertType },
    MessagesUpdate(Vec<u8>),
    MessagesMediaUpdate(Vec<u8>),
    MessagesReaction(Vec<u8>),
    MessageReceiptUpdate(Vec<u8>),
    ChatsUpsert(Vec<Jid>),
    ChatsUpdate(Vec<Jid>),
    ChatsDelete(Vec<Jid>),
    ContactsUpsert(Vec<Jid>),
    ContactsUpdate(Vec<Jid>),
    GroupsUpsert(Vec<Jid>),
    GroupsUpdate(Vec<Jid>),
    PresenceUpdate { jid: Jid, presence: String },
    BlocklistSet(Vec<Jid>),
    BlocklistUpdate(Vec<Jid>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertType {
    Notify,
    Append,
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionUpdate {
    pub connection: Option<String>,
    pub qr: Option<String>,
    pub is_new_login: Option<bool>,
    pub is_online: Option<bool>,
    pub received_pending_notifications: Option<bool>,
    pub last_disconnect_error: Option<String>,
}

/// Buffers events during a scoped window (e.g. the burst of notifications
/// replayed right after login) and coalesces adjacent entries of the same
/// kind instead of emitting every one individually. Buffering never drops
/// an event; `flush` always emits everything accumulated, in arrival order
/// per coalescing group.
pub struct EventBuffer {
    buffering: Mutex<Option<VecDeque<Event>>>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self { buffering: Mutex::new(None) }
    }

    /// Starts buffering; events passed to [`Self::emit`] while active are
    /// queued instead of handed to `sink` immediately.
    pub async fn start(&self) {
        let mut guard = self.buffering.lock().await;
        if guard.is_none() {
            *guard = Some(VecDeque::new());
        }
    }

    /// Runs `body`, buffering every event emitted during its execution,
    /// then flushes once `body` completes — the coalescing window is the
    /// scope of the closure rather than an externally toggled flag.
    pub async fn with_scope<F, Fut, T>(&self, sink: &impl Fn(Event), body: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        self.start().await;
        let result = body().await;
        self.flush(sink).await;
        result
    }

    pub async fn emit(&self, sink: &impl Fn(Event), event: Event) {
        let mut guard = self.buffering.lock().await;
        match guard.as_mut() {
            Some(queue) => coalesce_push(queue, event),
            None => sink(event),
        }
    }

    /// Emits every buffered event, in order, then stops buffering.
    pub async fn flush(&self, sink: &impl Fn(Event)) {
        let mut guard = self.buffering.lock().await;
        if let Some(queue) = guard.take() {
            for event in queue {
                sink(event);
            }
        }
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the enumerated coalescing rules: `creds.update` shallow-merges
/// into the most recent pending `creds.update`; `messages.upsert` of the
/// same kind concatenates; `contacts.update` merges by touching the same
/// trailing event rather than appending a new one. Anything else is
/// pushed as its own entry — coalescing is opt-in per rule, not a generic
/// same-variant merge.
fn coalesce_push(queue: &mut VecDeque<Event>, event: Event) {
    match &event {
        Event::CredsUpdate(_) => {
            if let Some(Event::CredsUpdate(existing)) = queue.back_mut() {
                if let Event::CredsUpdate(incoming) = event {
                    *existing = incoming;
                    return;
                }
            }
        }
        Event::MessagesUpsert { kind, .. } => {
            if let Some(Event::MessagesUpsert { messages: existing, kind: existing_kind }) =
                queue.back_mut()
            {
                if *existing_kind == *kind {
                    if let Event::MessagesUpsert { messages, .. } = event {
                        existing.extend(messages);
                        return;
                    }
                }
            }
        }
        Event::ContactsUpdate(_) => {
            if let Some(Event::ContactsUpdate(existing)) = queue.back_mut() {
                if let Event::ContactsUpdate(incoming) = event {
                    existing.extend(incoming);
                    return;
                }
            }
        }
        _ => {}
    }
    queue.push_back(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    #[tokio::test]
    async fn buffered_messages_upsert_concatenates_same_kind() {
        let buffer = EventBuffer::new();
        let sink_events: Arc<StdMutex<Vec<Event>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = {
            let sink_events = sink_events.clone();
            move |event: Event| sink_events.lock().unwrap().push(event)
        };

        buffer.start().await;
        buffer
            .emit(&sink, Event::MessagesUpsert { messages: vec![vec![1]], kind: UpsertType::Notify })
            .await;
        buffer
            .emit(&sink, Event::MessagesUpsert { messages: vec![vec![2]], kind: UpsertType::Notify })
            .await;
        buffer.flush(&sink).await;

        let events = sink_events.lock().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::MessagesUpsert { messages, .. } => assert_eq!(messages.len(), 2),
            _ => panic!("expected a single coalesced upsert"),
        }
    }

    #[tokio::test]
    async fn non_buffered_emit_goes_straight_through() {
        let buffer = EventBuffer::new();
        let sink_events: Arc<StdMutex<Vec<Event>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = {
            let sink_events = sink_events.clone();
            move |event: Event| sink_events.lock().unwrap().push(event)
        };

        buffer.emit(&sink, Event::MessagesUpdate(vec![9])).await;
        assert_eq!(sink_events.lock().unwrap().len(), 1);
    }
}
