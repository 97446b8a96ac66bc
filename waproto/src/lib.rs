//! Hand-maintained protobuf message shapes for the WhatsApp multi-device wire
//! protocol. Everything lives under [`wa`] to mirror the package name
//! `prost-build` would emit from the upstream `.proto` sources.

pub mod wa {
    include!("handshake.rs");
    include!("client_payload.rs");
    include!("device_identity.rs");
    include!("message.rs");
    include!("sync.rs");
}
