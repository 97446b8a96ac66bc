//! Core multi-device WhatsApp protocol plumbing: Noise transport, the
//! binary-node stanza router, Signal session and multi-device fanout, and
//! the app-state sync engine. UI, media transfer, group-management RPC
//! wrappers, and persistence-backend choices all live above this crate.

pub mod appstate_bridge;
pub mod client;
pub mod config;
pub mod connection;
pub mod creds;
pub mod devices;
pub mod error;
pub mod events;
pub mod fanout;
pub mod handshake;
pub mod history;
pub mod jid;
pub mod noise;
pub mod pairing;
pub mod router;
pub mod sessions;
pub mod transport;

pub use client::Client;
pub use config::Config;
pub use creds::{Creds, InMemoryKeyStore, KeyStore};
pub use error::ClientError;
pub use events::Event;
pub use jid::{Jid, JidWithDevice};
