//! The three-message Noise XX handshake: clientHello -> serverHello ->
//! clientFinish, carrying the static identity exchange and the encrypted
//! `ClientPayload` that distinguishes registration from login.

use prost::Message as _;
use rand_core::OsRng;
use waproto::wa::{HandshakeMessage, handshake_message};
use warp_core_libsignal::KeyPair;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::{ClientError, HandshakeError};
use crate::noise::NoiseState;
use crate::transport::WsTransport;

pub struct HandshakeOutcome {
    pub noise: NoiseState,
    pub ephemeral: KeyPair,
}

/// Runs the client side of the XX handshake: generate an ephemeral key,
/// send `clientHello`, mix the server's ephemeral+static+payload into the
/// handshake hash, then send `clientFinish` carrying our own static key
/// and the encrypted `ClientPayload` bytes the caller supplies.
pub async fn do_handshake(
    transport: &mut WsTransport,
    static_identity: &KeyPair,
    client_payload: Vec<u8>,
) -> Result<HandshakeOutcome, ClientError> {
    let mut noise = NoiseState::new_wa();

    let ephemeral_secret = StaticSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral_secret);

    let client_hello = HandshakeMessage {
        client_hello: Some(handshake_message::ClientHello {
            ephemeral: ephemeral_public.as_bytes().to_vec(),
        }),
        server_hello: None,
        client_finish: None,
    };
    noise.mix_hash(ephemeral_public.as_bytes());
    let mut buf = Vec::new();
    client_hello
        .encode(&mut buf)
        .map_err(|e| map_handshake_err(HandshakeError::Encode(e)))?;
    transport.send_frame(&buf).await.map_err(|e| ClientError::Transport(e.into()))?;

    let frame = transport.next_frame().await.map_err(|e| ClientError::Transport(e.into()))?;
    let server_msg = HandshakeMessage::decode(frame.as_ref())
        .map_err(|e| map_handshake_err(HandshakeError::Decode(e)))?;
    let server_hello = server_msg
        .server_hello
        .ok_or_else(|| map_handshake_err(HandshakeError::MissingField("serverHello")))?;

    let server_ephemeral: [u8; 32] = server_hello
        .ephemeral
        .as_slice()
        .try_into()
        .map_err(|_| map_handshake_err(HandshakeError::MissingField("serverHello.ephemeral")))?;
    noise.mix_hash(&server_ephemeral);
    let dh1 = ephemeral_secret.diffie_hellman(&PublicKey::from(server_ephemeral));
    noise.mix_into_key(dh1.as_bytes());

    // serverHello.static is AEAD-wrapped under the current session key.
    let ad = noise.handshake_hash().to_vec();
    let server_static_plain = noise
        .decrypt_with_ad(&server_hello.r#static, &ad)
        .map_err(|_| map_handshake_err(HandshakeError::InvalidCertificate))?;
    noise.mix_hash(&server_hello.r#static);
    let server_static: [u8; 32] = server_static_plain
        .as_slice()
        .try_into()
        .map_err(|_| map_handshake_err(HandshakeError::MissingField("serverHello.static")))?;
    let dh2 = ephemeral_secret.diffie_hellman(&PublicKey::from(server_static));
    noise.mix_into_key(dh2.as_bytes());

    let ad = noise.handshake_hash().to_vec();
    let _server_cert_payload = noise
        .decrypt_with_ad(&server_hello.payload, &ad)
        .map_err(|_| map_handshake_err(HandshakeError::InvalidCertificate))?;
    noise.mix_hash(&server_hello.payload);

    let static_public = static_identity.public_bytes();
    let ad = noise.handshake_hash().to_vec();
    let encrypted_static = noise.encrypt_with_ad(&static_public, &ad)?;
    noise.mix_hash(&encrypted_static);

    let dh3 = static_identity.private.diffie_hellman(&PublicKey::from(server_static));
    noise.mix_into_key(dh3.as_bytes());

    let ad = noise.handshake_hash().to_vec();
    let encrypted_payload = noise.encrypt_with_ad(&client_payload, &ad)?;
    noise.mix_hash(&encrypted_payload);

    let client_finish = HandshakeMessage {
        client_hello: None,
        server_hello: None,
        client_finish: Some(handshake_message::ClientFinish {
            r#static: encrypted_static,
            payload: encrypted_payload,
        }),
    };
    let mut buf = Vec::new();
    client_finish
        .encode(&mut buf)
        .map_err(|e| map_handshake_err(HandshakeError::Encode(e)))?;
    transport.send_frame(&buf).await.map_err(|e| ClientError::Transport(e.into()))?;

    Ok(HandshakeOutcome {
        noise,
        ephemeral: KeyPair::from_private(ephemeral_secret),
    })
}

fn map_handshake_err(e: HandshakeError) -> ClientError {
    ClientError::StreamError(e.to_string())
}
