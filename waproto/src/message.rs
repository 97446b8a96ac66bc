/// Protocol-level message envelope: just enough of the real `Message` tree
/// for C9/C10 plumbing (history sync notifications, app-state key
/// distribution, self-fanout wrapping). Content payloads themselves
/// (text/media/etc) are produced by the caller-supplied `MessageBuilder` and
/// carried here as opaque bytes.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Message {
    #[prost(string, optional, tag = "1")]
    pub conversation: Option<::prost::alloc::string::String>,
    #[prost(message, optional, tag = "2")]
    pub sender_key_distribution_message: Option<SenderKeyDistributionMessage>,
    #[prost(message, optional, tag = "3")]
    pub protocol_message: Option<ProtocolMessage>,
    #[prost(message, optional, tag = "4")]
    pub device_sent_message: Option<DeviceSentMessage>,
    #[prost(bytes = "vec", optional, tag = "5")]
    pub opaque_payload: Option<::prost::alloc::vec::Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SenderKeyDistributionMessage {
    #[prost(string, optional, tag = "1")]
    pub group_id: Option<::prost::alloc::string::String>,
    #[prost(bytes = "vec", tag = "2")]
    pub axolotl_sender_key_distribution_message: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeviceSentMessage {
    #[prost(string, optional, tag = "1")]
    pub destination_jid: Option<::prost::alloc::string::String>,
    /// Pre-serialized inner `Message` so this type need not be recursive.
    #[prost(bytes = "vec", tag = "2")]
    pub message: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MessageKey {
    #[prost(string, optional, tag = "1")]
    pub remote_jid: Option<::prost::alloc::string::String>,
    #[prost(bool, optional, tag = "2")]
    pub from_me: Option<bool>,
    #[prost(string, optional, tag = "3")]
    pub id: Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "4")]
    pub participant: Option<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtocolMessage {
    #[prost(message, optional, tag = "1")]
    pub key: Option<MessageKey>,
    #[prost(enumeration = "protocol_message::Type", optional, tag = "2")]
    pub r#type: Option<i32>,
    #[prost(message, optional, tag = "3")]
    pub history_sync_notification: Option<HistorySyncNotification>,
    #[prost(message, optional, tag = "4")]
    pub app_state_sync_key_share: Option<AppStateSyncKeyShare>,
    #[prost(message, optional, tag = "5")]
    pub app_state_sync_key_request: Option<AppStateSyncKeyRequest>,
}

pub mod protocol_message {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Type {
        Revoke = 0,
        HistorySyncNotification = 7,
        AppStateSyncKeyShare = 8,
        AppStateSyncKeyRequest = 9,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HistorySyncNotification {
    #[prost(bytes = "vec", tag = "1")]
    pub file_sha256: ::prost::alloc::vec::Vec<u8>,
    #[prost(uint64, optional, tag = "2")]
    pub file_length: Option<u64>,
    #[prost(bytes = "vec", tag = "3")]
    pub mac: ::prost::alloc::vec::Vec<u8>,
    #[prost(string, optional, tag = "4")]
    pub direct_path: Option<::prost::alloc::string::String>,
    #[prost(
        enumeration = "history_sync_notification::HistorySyncType",
        optional,
        tag = "5"
    )]
    pub sync_type: Option<i32>,
    #[prost(uint32, optional, tag = "6")]
    pub chunk_order: Option<u32>,
    #[prost(bytes = "vec", tag = "7")]
    pub file_enc_sha256: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "8")]
    pub media_key: ::prost::alloc::vec::Vec<u8>,
}

pub mod history_sync_notification {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum HistorySyncType {
        Initial = 0,
        InitialBootstrap = 1,
        Recent = 2,
        Pushname = 3,
        NonBlocking = 4,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppStateSyncKeyId {
    #[prost(bytes = "vec", tag = "1")]
    pub key_id: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppStateSyncKeyFingerprint {
    #[prost(uint32, optional, tag = "1")]
    pub raw_id: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub current_index: Option<u32>,
    #[prost(uint32, repeated, tag = "3")]
    pub device_indexes: ::prost::alloc::vec::Vec<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppStateSyncKeyData {
    #[prost(bytes = "vec", tag = "1")]
    pub key_data: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, optional, tag = "2")]
    pub fingerprint: Option<AppStateSyncKeyFingerprint>,
    #[prost(int64, optional, tag = "3")]
    pub timestamp: Option<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppStateSyncKey {
    #[prost(message, optional, tag = "1")]
    pub key_id: Option<AppStateSyncKeyId>,
    #[prost(message, optional, tag = "2")]
    pub key_data: Option<AppStateSyncKeyData>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppStateSyncKeyShare {
    #[prost(message, repeated, tag = "1")]
    pub keys: ::prost::alloc::vec::Vec<AppStateSyncKey>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppStateSyncKeyRequest {
    #[prost(message, repeated, tag = "1")]
    pub key_ids: ::prost::alloc::vec::Vec<AppStateSyncKeyId>,
}
