/// App-state sync wire types (`WASyncAction`/`WASyncAction` family): snapshots
/// and patches exchanged over the `w:sync:app:state` IQ.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KeyId {
    #[prost(bytes = "vec", tag = "1")]
    pub id: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SyncdVersion {
    #[prost(uint64, optional, tag = "1")]
    pub version: Option<u64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SyncdIndex {
    #[prost(bytes = "vec", tag = "1")]
    pub blob: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SyncdValue {
    #[prost(bytes = "vec", tag = "1")]
    pub blob: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SyncdRecord {
    #[prost(message, optional, tag = "1")]
    pub index: Option<SyncdIndex>,
    #[prost(message, optional, tag = "2")]
    pub value: Option<SyncdValue>,
    #[prost(message, optional, tag = "3")]
    pub key_id: Option<KeyId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ::prost::Enumeration)]
#[repr(i32)]
pub enum SyncdMutationSyncdOperation {
    Set = 0,
    Remove = 1,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SyncdMutation {
    #[prost(enumeration = "SyncdMutationSyncdOperation", optional, tag = "1")]
    pub operation: Option<i32>,
    #[prost(message, optional, tag = "2")]
    pub record: Option<SyncdRecord>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExternalBlobReference {
    #[prost(bytes = "vec", tag = "1")]
    pub media_key: ::prost::alloc::vec::Vec<u8>,
    #[prost(string, optional, tag = "2")]
    pub direct_path: Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "3")]
    pub handle: Option<::prost::alloc::string::String>,
    #[prost(uint64, optional, tag = "4")]
    pub file_size_bytes: Option<u64>,
    #[prost(bytes = "vec", tag = "5")]
    pub file_sha256: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "6")]
    pub file_enc_sha256: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SyncdPatch {
    #[prost(message, optional, tag = "1")]
    pub version: Option<SyncdVersion>,
    #[prost(message, repeated, tag = "2")]
    pub mutations: ::prost::alloc::vec::Vec<SyncdMutation>,
    #[prost(message, optional, tag = "3")]
    pub external_mutations: Option<ExternalBlobReference>,
    #[prost(bytes = "vec", tag = "4")]
    pub snapshot_mac: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, optional, tag = "5")]
    pub key_id: Option<KeyId>,
    #[prost(bytes = "vec", tag = "6")]
    pub patch_mac: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SyncdSnapshot {
    #[prost(message, optional, tag = "1")]
    pub version: Option<SyncdVersion>,
    #[prost(message, repeated, tag = "2")]
    pub records: ::prost::alloc::vec::Vec<SyncdRecord>,
    #[prost(bytes = "vec", tag = "3")]
    pub mac: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, optional, tag = "4")]
    pub key_id: Option<KeyId>,
}
