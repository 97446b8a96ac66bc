/// `ADVSignedDeviceIdentity` — the signed device-identity blob exchanged as
/// the `device-identity` stanza child whenever a `pkmsg` ciphertext is sent.

#[derive(Clone, PartialEq, ::prost::Message, ::serde::Serialize, ::serde::Deserialize)]
pub struct AdvSignedDeviceIdentity {
    #[prost(bytes = "vec", tag = "1")]
    pub details: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub account_signature_key: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub account_signature: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub device_signature: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AdvDeviceIdentity {
    #[prost(uint32, tag = "1")]
    pub raw_id: u32,
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
    #[prost(uint32, optional, tag = "3")]
    pub key_index: Option<u32>,
}
