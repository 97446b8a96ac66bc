/// `HandshakeMessage` and its noise-certificate companions (`WAWebProtobufsE2E.proto`).

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HandshakeMessage {
    #[prost(message, optional, tag = "1")]
    pub client_hello: Option<handshake_message::ClientHello>,
    #[prost(message, optional, tag = "2")]
    pub server_hello: Option<handshake_message::ServerHello>,
    #[prost(message, optional, tag = "3")]
    pub client_finish: Option<handshake_message::ClientFinish>,
}

pub mod handshake_message {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ClientHello {
        #[prost(bytes = "vec", tag = "1")]
        pub ephemeral: ::prost::alloc::vec::Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ServerHello {
        #[prost(bytes = "vec", tag = "1")]
        pub ephemeral: ::prost::alloc::vec::Vec<u8>,
        #[prost(bytes = "vec", tag = "2")]
        pub r#static: ::prost::alloc::vec::Vec<u8>,
        #[prost(bytes = "vec", tag = "3")]
        pub payload: ::prost::alloc::vec::Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ClientFinish {
        #[prost(bytes = "vec", tag = "1")]
        pub r#static: ::prost::alloc::vec::Vec<u8>,
        #[prost(bytes = "vec", tag = "2")]
        pub payload: ::prost::alloc::vec::Vec<u8>,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CertChain {
    #[prost(message, optional, tag = "1")]
    pub intermediate: Option<cert_chain::NoiseCertificate>,
    #[prost(message, optional, tag = "2")]
    pub leaf: Option<cert_chain::NoiseCertificate>,
}

pub mod cert_chain {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct NoiseCertificate {
        #[prost(bytes = "vec", tag = "1")]
        pub details: ::prost::alloc::vec::Vec<u8>,
        #[prost(bytes = "vec", tag = "2")]
        pub signature: ::prost::alloc::vec::Vec<u8>,
    }

    pub mod noise_certificate {
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Details {
            #[prost(uint32, tag = "1")]
            pub serial: u32,
            #[prost(uint32, tag = "2")]
            pub issuer_serial: u32,
            #[prost(bytes = "vec", tag = "3")]
            pub key: ::prost::alloc::vec::Vec<u8>,
            #[prost(uint64, tag = "4")]
            pub not_before: u64,
            #[prost(uint64, tag = "5")]
            pub not_after: u64,
        }
    }
}
