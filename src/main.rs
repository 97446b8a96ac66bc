//! Minimal usage example for `warp_core`: connect, run the Noise handshake,
//! hand the socket to a `Client`, and print whatever the connection emits.
//!
//! This is a demo, not a full WhatsApp client — it has no message-sending
//! UI and no persistence backend beyond a flat `creds.json` file. It exists
//! to show how the pieces in `warp_core` compose into a running connection.

use std::path::PathBuf;
use std::sync::Arc;

use prost::Message as _;
use rand_core::OsRng;
use tracing::{error, info, warn};
use x25519_dalek::{PublicKey, StaticSecret};

use warp_core::client::Client;
use warp_core::config::Config;
use warp_core::creds::{Creds, InMemoryKeyStore, KeyPairBytes, SignedPreKeyBytes};
use warp_core::events::Event;
use warp_core::handshake::do_handshake;
use warp_core::pairing::generate_qr_string;
use warp_core::transport::WsTransport;
use warp_core_libsignal::{DefaultSignalRepository, InMemorySignalStore, KeyPair};
use waproto::wa::{ClientPayload, client_payload};

const CREDS_PATH: &str = "creds.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let config = Config { print_qr_in_terminal: true, ..Config::default() };
    let creds = load_or_generate_creds().await?;

    info!(url = %config.wa_websocket_url, "connecting");
    let mut transport = WsTransport::connect(&config.wa_websocket_url).await?;

    let noise_identity = KeyPair {
        private: StaticSecret::from(creds.noise_key.private),
        public: PublicKey::from(creds.noise_key.public),
    };
    let payload = build_client_payload(&config, &creds);
    let mut buf = Vec::new();
    payload.encode(&mut buf)?;

    info!("running noise handshake");
    let outcome = do_handshake(&mut transport, &noise_identity, buf).await?;

    let store = Arc::new(InMemoryKeyStore::new());
    let signal_store = InMemorySignalStore::new(creds.registration_id);
    let repository = Arc::new(DefaultSignalRepository::new(signal_store));
    let client = Arc::new(Client::new(config, store, repository));
    client.attach_transport(transport, outcome.noise).await;

    let reader = {
        let client = client.clone();
        tokio::spawn(async move {
            if let Err(err) = client.run_read_loop().await {
                warn!(%err, "read loop ended");
            }
        })
    };

    let mut events = client.subscribe();
    let noise_pub = creds.noise_key.public;
    let identity_pub = creds.signed_identity_key.public;
    let adv_secret = creds.adv_secret_key;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
        _ = async {
            while let Ok(event) = events.recv().await {
                handle_event(event, &noise_pub, &identity_pub, &adv_secret).await;
            }
        } => {}
    }

    client.end(Some("client shutdown".to_string())).await;
    reader.abort();
    Ok(())
}

async fn handle_event(event: Event, noise_pub: &[u8; 32], identity_pub: &[u8; 32], adv_secret: &[u8; 32]) {
    match event {
        Event::ConnectionUpdate(update) => {
            if let Some(reference) = update.qr {
                print_qr(&generate_qr_string(&reference, noise_pub, identity_pub, adv_secret));
            }
            if let Some(connection) = update.connection {
                info!(%connection, "connection.update");
            }
        }
        Event::CredsUpdate(creds) => {
            if let Err(err) = persist_creds(&creds).await {
                error!(%err, "failed to persist creds");
            }
        }
        other => info!(?other, "event"),
    }
}

fn print_qr(payload: &str) {
    match qrcode::QrCode::new(payload) {
        Ok(code) => {
            let rendered = code
                .render::<char>()
                .quiet_zone(false)
                .module_dimensions(2, 1)
                .build();
            println!("{rendered}");
        }
        Err(err) => warn!(%err, "failed to render qr code"),
    }
}

async fn load_or_generate_creds() -> anyhow::Result<Creds> {
    let path = PathBuf::from(CREDS_PATH);
    if let Ok(bytes) = tokio::fs::read(&path).await {
        return Ok(serde_json::from_slice(&bytes)?);
    }
    Ok(fresh_creds())
}

async fn persist_creds(creds: &Creds) -> anyhow::Result<()> {
    let bytes = serde_json::to_vec_pretty(creds)?;
    tokio::fs::write(CREDS_PATH, bytes).await?;
    Ok(())
}

fn fresh_creds() -> Creds {
    let mut rng = OsRng;
    let noise_key = KeyPair::generate(&mut rng);
    let signed_identity_key = KeyPair::generate(&mut rng);
    let signed_pre_key_pair = KeyPair::generate(&mut rng);
    let mut adv_secret_key = [0u8; 32];
    rand_core::RngCore::fill_bytes(&mut rng, &mut adv_secret_key);

    Creds {
        noise_key: KeyPairBytes::from(&noise_key),
        signed_identity_key: KeyPairBytes::from(&signed_identity_key),
        signed_pre_key: SignedPreKeyBytes {
            key_id: 1,
            pair: KeyPairBytes::from(&signed_pre_key_pair),
            signature: [0u8; 64],
        },
        registration_id: rand_core::RngCore::next_u32(&mut rng) & 0x3FFF,
        adv_secret_key,
        me: None,
        platform: None,
        account: None,
        my_app_state_key_id: None,
        next_pre_key_id: 1,
        first_unuploaded_pre_key_id: 1,
        account_sync_counter: 0,
        last_account_sync_timestamp: None,
    }
}

fn build_client_payload(config: &Config, creds: &Creds) -> ClientPayload {
    let (browser_name, browser_kind, browser_version) = &config.browser;
    ClientPayload {
        username: creds.me.as_ref().and_then(|jid| jid.user.parse::<u64>().ok()),
        passive: Some(false),
        user_agent: Some(client_payload::UserAgent {
            platform: Some(client_payload::user_agent::Platform::Web as i32),
            app_version: Some(client_payload::user_agent::AppVersion {
                primary: Some(config.version[0]),
                secondary: Some(config.version[1]),
                tertiary: Some(config.version[2]),
            }),
            mcc: None,
            mnc: None,
            os_version: Some(browser_version.clone()),
            manufacturer: None,
            device: Some(browser_name.clone()),
            os_build_number: None,
            locale_language_iso6391: Some("en".to_string()),
            locale_country_iso31661_alpha2: Some("US".to_string()),
        }),
        web_info: Some(client_payload::WebInfo {
            ref_token: None,
            web_sub_platform: Some(client_payload::web_info::WebSubPlatform::WebBrowser as i32),
        }),
        push_name: Some(browser_kind.clone()),
        session_id: None,
        short_connect: Some(false),
        connect_type: Some(client_payload::ConnectType::WifiUnknown as i32),
        connect_reason: Some(client_payload::ConnectReason::UserActivated as i32),
        connect_attempt_count: Some(0),
        device: None,
        device_pairing_data: None,
        pull: Some(false),
    }
}
