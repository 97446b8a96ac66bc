//! Connection lifecycle state machine and the keep-alive loop that guards
//! it. States flow `Connecting -> Handshaking -> (Pairing | LoggingIn) ->
//! Authenticated -> Open -> Closing -> Closed`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::events::{ConnectionUpdate, Event};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Handshaking,
    Pairing,
    LoggingIn,
    Authenticated,
    Open,
    Closing,
    Closed,
}

/// Shared, lock-guarded connection state plus the bookkeeping
/// `end(err)` needs to stay idempotent under concurrent callers (a fatal
/// read error and a caller-initiated close can race).
pub struct ConnectionController {
    state: RwLock<ConnectionState>,
    closed_once: std::sync::atomic::AtomicBool,
    last_keep_alive_ack: RwLock<Instant>,
}

impl ConnectionController {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ConnectionState::Connecting),
            closed_once: std::sync::atomic::AtomicBool::new(false),
            last_keep_alive_ack: RwLock::new(Instant::now()),
        }
    }

    pub async fn set_state(&self, state: ConnectionState) {
        *self.state.write().await = state;
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub async fn note_keep_alive_ack(&self) {
        *self.last_keep_alive_ack.write().await = Instant::now();
    }

    /// Idempotent terminal transition: only the first caller actually
    /// performs teardown (clears timers, cancels pending queries, flips
    /// state to `Closed`) and emits `connection.update{close}`; later
    /// calls are no-ops, satisfying close-idempotency.
    pub async fn end<F>(&self, reason: Option<String>, emit: F)
    where
        F: FnOnce(Event),
    {
        if self.closed_once.swap(true, std::sync::atomic::Ordering::SeqCst) {
            return;
        }
        self.set_state(ConnectionState::Closed).await;
        emit(Event::ConnectionUpdate(ConnectionUpdate {
            connection: Some("close".to_string()),
            last_disconnect_error: reason,
            ..Default::default()
        }));
    }

    pub async fn is_closed(&self) -> bool {
        matches!(self.state().await, ConnectionState::Closed | ConnectionState::Closing)
    }
}

impl Default for ConnectionController {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the keep-alive loop: sends a ping every `interval`, and treats a
/// missing ack within `interval + 5s` as connection loss (not an
/// immediate close — the caller decides how to react to the returned
/// signal, e.g. by calling [`ConnectionController::end`]).
pub async fn run_keep_alive<S>(
    controller: Arc<ConnectionController>,
    interval: Duration,
    mut send_ping: S,
) -> KeepAliveOutcome
where
    S: FnMut() -> bool,
{
    let threshold = interval + Duration::from_secs(5);
    loop {
        tokio::time::sleep(interval).await;
        if controller.is_closed().await {
            return KeepAliveOutcome::ConnectionClosed;
        }
        if !send_ping() {
            return KeepAliveOutcome::ConnectionClosed;
        }
        let last_ack = *controller.last_keep_alive_ack.read().await;
        if last_ack.elapsed() > threshold {
            return KeepAliveOutcome::ConnectionLost;
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum KeepAliveOutcome {
    ConnectionLost,
    ConnectionClosed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn end_emits_exactly_one_close_event_under_repeated_calls() {
        let controller = Arc::new(ConnectionController::new());
        let emitted = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let emitted = emitted.clone();
            controller
                .end(None, move |_| {
                    emitted.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        }
        assert_eq!(emitted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn state_transitions_are_observable() {
        let controller = ConnectionController::new();
        assert_eq!(controller.state().await, ConnectionState::Connecting);
        controller.set_state(ConnectionState::Open).await;
        assert_eq!(controller.state().await, ConnectionState::Open);
    }
}
