/// `ClientPayload` and the registration/login sub-messages carried inside the
/// Noise `clientFinish` payload.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientPayload {
    #[prost(uint64, optional, tag = "1")]
    pub username: Option<u64>,
    #[prost(bool, optional, tag = "2")]
    pub passive: Option<bool>,
    #[prost(message, optional, tag = "3")]
    pub user_agent: Option<client_payload::UserAgent>,
    #[prost(message, optional, tag = "4")]
    pub web_info: Option<client_payload::WebInfo>,
    #[prost(string, optional, tag = "5")]
    pub push_name: Option<::prost::alloc::string::String>,
    #[prost(uint32, optional, tag = "6")]
    pub session_id: Option<u32>,
    #[prost(bool, optional, tag = "7")]
    pub short_connect: Option<bool>,
    #[prost(enumeration = "client_payload::ConnectType", optional, tag = "8")]
    pub connect_type: Option<i32>,
    #[prost(enumeration = "client_payload::ConnectReason", optional, tag = "9")]
    pub connect_reason: Option<i32>,
    #[prost(uint32, optional, tag = "10")]
    pub connect_attempt_count: Option<u32>,
    #[prost(uint32, optional, tag = "11")]
    pub device: Option<u32>,
    #[prost(message, optional, tag = "12")]
    pub device_pairing_data: Option<client_payload::DevicePairingRegistrationData>,
    #[prost(bool, optional, tag = "13")]
    pub pull: Option<bool>,
}

pub mod client_payload {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct UserAgent {
        #[prost(enumeration = "user_agent::Platform", optional, tag = "1")]
        pub platform: Option<i32>,
        #[prost(message, optional, tag = "2")]
        pub app_version: Option<user_agent::AppVersion>,
        #[prost(string, optional, tag = "3")]
        pub mcc: Option<::prost::alloc::string::String>,
        #[prost(string, optional, tag = "4")]
        pub mnc: Option<::prost::alloc::string::String>,
        #[prost(string, optional, tag = "5")]
        pub os_version: Option<::prost::alloc::string::String>,
        #[prost(string, optional, tag = "6")]
        pub manufacturer: Option<::prost::alloc::string::String>,
        #[prost(string, optional, tag = "7")]
        pub device: Option<::prost::alloc::string::String>,
        #[prost(string, optional, tag = "8")]
        pub os_build_number: Option<::prost::alloc::string::String>,
        #[prost(string, optional, tag = "9")]
        pub locale_language_iso6391: Option<::prost::alloc::string::String>,
        #[prost(string, optional, tag = "10")]
        pub locale_country_iso31661_alpha2: Option<::prost::alloc::string::String>,
    }

    pub mod user_agent {
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct AppVersion {
            #[prost(uint32, optional, tag = "1")]
            pub primary: Option<u32>,
            #[prost(uint32, optional, tag = "2")]
            pub secondary: Option<u32>,
            #[prost(uint32, optional, tag = "3")]
            pub tertiary: Option<u32>,
        }

        #[derive(Clone, Copy, Debug, PartialEq, Eq, ::prost::Enumeration)]
        #[repr(i32)]
        pub enum Platform {
            Web = 0,
            Android = 8,
            Ios = 9,
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct WebInfo {
        #[prost(string, optional, tag = "1")]
        pub ref_token: Option<::prost::alloc::string::String>,
        #[prost(enumeration = "web_info::WebSubPlatform", optional, tag = "2")]
        pub web_sub_platform: Option<i32>,
    }

    pub mod web_info {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, ::prost::Enumeration)]
        #[repr(i32)]
        pub enum WebSubPlatform {
            WebBrowser = 0,
            AppStore = 1,
            WinStore = 2,
            DarwinStore = 3,
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum ConnectType {
        WifiUnknown = 0,
        CellularUnknown = 1,
        WifiOn = 2,
        CellularEdge = 3,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum ConnectReason {
        PushReconnect = 0,
        UserActivated = 1,
        Scheduled = 2,
        ErrorReconnect = 3,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct DevicePairingRegistrationData {
        #[prost(bytes = "vec", tag = "1")]
        pub e_reg_id: ::prost::alloc::vec::Vec<u8>,
        #[prost(bytes = "vec", tag = "2")]
        pub e_key_type: ::prost::alloc::vec::Vec<u8>,
        #[prost(bytes = "vec", tag = "3")]
        pub e_ident: ::prost::alloc::vec::Vec<u8>,
        #[prost(bytes = "vec", tag = "4")]
        pub e_skey_id: ::prost::alloc::vec::Vec<u8>,
        #[prost(bytes = "vec", tag = "5")]
        pub e_skey_val: ::prost::alloc::vec::Vec<u8>,
        #[prost(bytes = "vec", tag = "6")]
        pub e_skey_sig: ::prost::alloc::vec::Vec<u8>,
        #[prost(bytes = "vec", tag = "7")]
        pub build_hash: ::prost::alloc::vec::Vec<u8>,
        #[prost(bytes = "vec", tag = "8")]
        pub device_props: ::prost::alloc::vec::Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct DeviceProps {
        #[prost(string, optional, tag = "1")]
        pub os: Option<::prost::alloc::string::String>,
        #[prost(message, optional, tag = "2")]
        pub version: Option<user_agent::AppVersion>,
        #[prost(enumeration = "device_props::PlatformType", optional, tag = "3")]
        pub platform_type: Option<i32>,
        #[prost(bool, optional, tag = "4")]
        pub require_full_sync: Option<bool>,
        #[prost(message, optional, tag = "5")]
        pub history_sync_config: Option<device_props::HistorySyncConfig>,
    }

    pub mod device_props {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, ::prost::Enumeration)]
        #[repr(i32)]
        pub enum PlatformType {
            Unknown = 0,
            Chrome = 1,
            Firefox = 2,
            Ie = 3,
            Desktop = 7,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct HistorySyncConfig {
            #[prost(uint32, optional, tag = "1")]
            pub full_sync_days_limit: Option<u32>,
            #[prost(uint32, optional, tag = "2")]
            pub full_sync_size_mb_limit: Option<u32>,
            #[prost(uint32, optional, tag = "3")]
            pub storage_quota_mb: Option<u32>,
            #[prost(bool, optional, tag = "4")]
            pub inline_initial_payload_in_e2ee_msg: Option<bool>,
            #[prost(bool, optional, tag = "5")]
            pub support_callog_history: Option<bool>,
            #[prost(bool, optional, tag = "6")]
            pub support_bot_user_agent_chat_history: Option<bool>,
        }
    }
}
