//! QR pairing and the login/registration split of `ClientPayload`.
//!
//! QR rotation: 60s for the first code, 20s for every code after that;
//! exhausting the server's batch of refs closes the connection as
//! `timedOut` rather than looping forever.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::time::Duration;

use crate::config::Config;
use crate::creds::Creds;
use crate::events::{ConnectionUpdate, Event};

pub fn generate_qr_string(reference: &str, noise_pub: &[u8], identity_pub: &[u8], adv_secret_key: &[u8; 32]) -> String {
    format!(
        "{reference},{},{},{}",
        STANDARD.encode(noise_pub),
        STANDARD.encode(identity_pub),
        STANDARD.encode(adv_secret_key),
    )
}

/// Drives QR rotation against a stream of refs pushed by the server
/// (`iq type=set ... pair-device` carries a batch of one-time refs up
/// front); each ref is shown for progressively shorter windows.
pub async fn rotate_qr_codes<R, E>(
    config: &Config,
    mut refs: R,
    noise_pub: [u8; 32],
    identity_pub: [u8; 32],
    adv_secret_key: [u8; 32],
    mut emit: E,
) -> QrOutcome
where
    R: FnMut() -> Option<String>,
    E: FnMut(Event),
{
    let mut first = true;
    loop {
        let Some(reference) = refs() else {
            return QrOutcome::RefsExhausted;
        };
        let payload = generate_qr_string(&reference, &noise_pub, &identity_pub, &adv_secret_key);
        emit(Event::ConnectionUpdate(ConnectionUpdate {
            qr: Some(payload),
            ..Default::default()
        }));

        let window = if first { config.qr_timeout_first } else { config.qr_timeout_subsequent };
        first = false;
        tokio::time::sleep(window).await;
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum QrOutcome {
    RefsExhausted,
}

/// What a successful `pair-success` IQ hands back: the paired account's
/// JID and the device-identity blob to persist, after which the caller is
/// expected to restart the connection (the protocol does not allow
/// continuing on the same socket after pairing).
pub struct PairSuccess {
    pub jid: crate::jid::Jid,
    pub business_name: Option<String>,
    pub platform: Option<String>,
}

/// Derives `me` (and platform) from the `pair-success` stanza into
/// `creds`, then emits both the `connection.update{pair-success}` notice
/// and the `creds.update` carrying the populated identity — a caller
/// persists `creds` on the latter before the mandated restart.
pub fn apply_pair_success<E>(success: PairSuccess, creds: &mut Creds, mut emit: E)
where
    E: FnMut(Event),
{
    if let Some(business_name) = &success.business_name {
        tracing::debug!(%business_name, "paired business account");
    }
    creds.me = Some(success.jid);
    creds.platform = success.platform;

    emit(Event::ConnectionUpdate(ConnectionUpdate {
        connection: Some("pair-success".to_string()),
        is_new_login: Some(true),
        ..Default::default()
    }));
    emit(Event::CredsUpdate(Box::new(creds.clone())));
}

/// Minimum pending pre-key count before the client re-uploads a fresh
/// batch on successful login.
pub fn should_upload_prekeys(available: u32, config: &Config) -> bool {
    available <= config.min_prekey_count
}

/// Idle budget between pair-success and the mandated restart; not part of
/// the protocol per se, just a sane upper bound so a caller's "wait for
/// restart" loop does not hang forever if the server never reconnects it.
pub const PAIR_SUCCESS_RESTART_BUDGET: Duration = Duration::from_secs(10);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creds::{KeyPairBytes, SignedPreKeyBytes};
    use crate::jid::Jid;
    use warp_core_libsignal::KeyPair;

    fn fresh_creds() -> Creds {
        let noise_key = KeyPair::generate(&mut rand_core::OsRng);
        let identity_key = KeyPair::generate(&mut rand_core::OsRng);
        let signed = KeyPair::generate(&mut rand_core::OsRng);
        Creds {
            noise_key: KeyPairBytes::from(&noise_key),
            signed_identity_key: KeyPairBytes::from(&identity_key),
            signed_pre_key: SignedPreKeyBytes {
                key_id: 1,
                pair: KeyPairBytes::from(&signed),
                signature: [0u8; 64],
            },
            registration_id: 1,
            adv_secret_key: [0u8; 32],
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

    #[test]
    fn pair_success_populates_me_and_emits_creds_update() {
        let mut creds = fresh_creds();
        let jid = Jid::parse("12345@s.whatsapp.net").expect("valid jid");
        let success = PairSuccess {
            jid: jid.clone(),
            business_name: Some("Acme".to_string()),
            platform: Some("android".to_string()),
        };

        let mut events = Vec::new();
        apply_pair_success(success, &mut creds, |event| events.push(event));

        assert_eq!(creds.me, Some(jid));
        assert_eq!(creds.platform.as_deref(), Some("android"));
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::ConnectionUpdate(_)));
        match &events[1] {
            Event::CredsUpdate(updated) => assert_eq!(updated.me, creds.me),
            _ => panic!("expected a creds.update event"),
        }
    }
}
