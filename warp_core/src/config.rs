//! Connection-wide options. Plain struct, no file format of its own —
//! callers build one however they like and hand it to [`crate::client::Client::new`].

use std::time::Duration;

pub struct Config {
    pub wa_websocket_url: String,
    pub connect_timeout: Duration,
    pub default_query_timeout: Duration,
    pub keep_alive_interval: Duration,
    pub qr_timeout_first: Duration,
    pub qr_timeout_subsequent: Duration,
    pub version: [u32; 3],
    pub browser: (String, String, String),
    pub print_qr_in_terminal: bool,
    pub sync_full_history: bool,
    pub mark_online_on_connect: bool,
    pub fire_init_queries: bool,
    pub emit_own_events: bool,
    pub app_state_mac_verification: MacVerification,
    pub user_devices_cache_ttl: Duration,
    pub transaction_opts: TransactionOpts,
    pub min_prekey_count: u32,
    pub max_sync_attempts: u32,
    pub should_sync_history_message: Box<dyn Fn(&waproto::wa::HistorySyncNotification) -> bool + Send + Sync>,
    pub should_ignore_jid: Box<dyn Fn(&crate::jid::Jid) -> bool + Send + Sync>,
}

pub struct MacVerification {
    pub patch: bool,
    pub snapshot: bool,
}

pub struct TransactionOpts {
    pub max_commit_retries: u32,
    pub delay_between_tries: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wa_websocket_url: "wss://web.whatsapp.com/ws/chat".to_string(),
            connect_timeout: Duration::from_secs(20),
            default_query_timeout: Duration::from_secs(60),
            keep_alive_interval: Duration::from_secs(30),
            qr_timeout_first: Duration::from_secs(60),
            qr_timeout_subsequent: Duration::from_secs(20),
            version: [2, 3000, 0],
            browser: ("warp_core".to_string(), "Chrome".to_string(), "10.0".to_string()),
            print_qr_in_terminal: false,
            sync_full_history: false,
            mark_online_on_connect: true,
            fire_init_queries: true,
            emit_own_events: true,
            app_state_mac_verification: MacVerification { patch: true, snapshot: true },
            user_devices_cache_ttl: Duration::from_secs(300),
            transaction_opts: TransactionOpts {
                max_commit_retries: 5,
                delay_between_tries: Duration::from_millis(200),
            },
            min_prekey_count: 5,
            max_sync_attempts: 2,
            should_sync_history_message: Box::new(|_| true),
            should_ignore_jid: Box::new(|_| false),
        }
    }
}

impl Config {
    /// Threshold past which a missed keep-alive response means the
    /// connection is considered lost rather than merely slow.
    pub fn keep_alive_loss_threshold(&self) -> Duration {
        self.keep_alive_interval + Duration::from_secs(5)
    }
}
