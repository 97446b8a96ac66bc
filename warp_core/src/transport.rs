//! WebSocket carrier for the binary-framed stream: a 3-byte big-endian
//! length prefix ahead of every payload, matching the wire format the
//! handshake and post-handshake codecs both assume.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use http::Request;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use crate::error::TransportError;

pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTransport {
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let request = Request::builder()
            .uri(url)
            .header("Origin", "https://web.whatsapp.com")
            .body(())?;
        let (stream, _) = connect_async(request).await.map_err(TransportError::Connect)?;
        Ok(Self { stream })
    }

    pub async fn send_frame(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if payload.len() > 0xFF_FFFF {
            return Err(TransportError::FrameTooLarge);
        }
        let len = payload.len();
        let mut frame = Vec::with_capacity(3 + len);
        frame.push(((len >> 16) & 0xFF) as u8);
        frame.push(((len >> 8) & 0xFF) as u8);
        frame.push((len & 0xFF) as u8);
        frame.extend_from_slice(payload);
        self.stream.send(Message::Binary(frame.into())).await?;
        Ok(())
    }

    pub async fn next_frame(&mut self) -> Result<Bytes, TransportError> {
        loop {
            let message = self.stream.next().await.ok_or(TransportError::Closed)??;
            match message {
                Message::Ping(payload) => {
                    self.stream.send(Message::Pong(payload)).await?;
                }
                Message::Binary(data) => {
                    if data.len() < 3 {
                        return Err(TransportError::InvalidFrame("missing 3-byte prefix"));
                    }
                    let expected_len =
                        ((data[0] as usize) << 16) | ((data[1] as usize) << 8) | data[2] as usize;
                    let payload = &data[3..];
                    if payload.len() != expected_len {
                        return Err(TransportError::InvalidFrame("length prefix mismatch"));
                    }
                    return Ok(Bytes::copy_from_slice(payload));
                }
                Message::Close(_) => return Err(TransportError::Closed),
                Message::Pong(_) | Message::Text(_) | Message::Frame(_) => continue,
            }
        }
    }

    pub async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
