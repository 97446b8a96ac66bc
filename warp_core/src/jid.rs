//! WhatsApp's addressing scheme: `user[:device]@server[/agent]`.

use std::fmt;

pub const DEFAULT_USER_SERVER: &str = "s.whatsapp.net";
pub const GROUP_SERVER: &str = "g.us";
pub const BROADCAST_SERVER: &str = "broadcast";
pub const HIDDEN_USER_SERVER: &str = "lid";
/// Legacy single-device server name; callers still see it on old links and
/// invites, so it is normalized to [`DEFAULT_USER_SERVER`] on construction.
const LEGACY_USER_SERVER: &str = "c.us";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Jid {
    pub user: String,
    pub server: String,
    pub device: Option<u16>,
    pub agent: Option<u8>,
}

impl Jid {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        let server = server.into();
        let server = if server == LEGACY_USER_SERVER {
            DEFAULT_USER_SERVER.to_string()
        } else {
            server
        };
        Self { user: user.into(), server, device: None, agent: None }
    }

    pub fn with_device(mut self, device: u16) -> Self {
        self.device = Some(device);
        self
    }

    pub fn is_group(&self) -> bool {
        self.server == GROUP_SERVER
    }

    pub fn is_broadcast(&self) -> bool {
        self.server == BROADCAST_SERVER
    }

    /// The user+server pair with any device suffix stripped, used as the
    /// key for grouping a user's devices together.
    pub fn to_non_ad(&self) -> Jid {
        Jid { user: self.user.clone(), server: self.server.clone(), device: None, agent: None }
    }

    pub fn parse(raw: &str) -> Option<Jid> {
        let (left, server) = raw.split_once('@')?;
        let (left, agent) = match left.split_once('.') {
            Some((l, a)) => (l, a.parse::<u8>().ok()),
            None => (left, None),
        };
        let (user, device) = match left.split_once(':') {
            Some((u, d)) => (u, d.parse::<u16>().ok()),
            None => (left, None),
        };
        Some(Jid { user: user.to_string(), server: server.to_string(), device, agent })
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user)?;
        if let Some(device) = self.device {
            write!(f, ":{device}")?;
        }
        if let Some(agent) = self.agent {
            write!(f, ".{agent}")?;
        }
        write!(f, "@{}", self.server)
    }
}

/// A user-plus-device pair without the server, the shape USync discovery
/// and sender-key-memory bookkeeping key off of.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JidWithDevice {
    pub user: String,
    pub device: u16,
}

impl JidWithDevice {
    pub fn to_jid(&self, server: &str) -> Jid {
        Jid::new(self.user.clone(), server.to_string()).with_device(self.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_server_normalizes_to_whatsapp_net() {
        let jid = Jid::new("15551234567", LEGACY_USER_SERVER);
        assert_eq!(jid.server, DEFAULT_USER_SERVER);
    }

    #[test]
    fn parse_round_trips_device_and_agent() {
        let raw = "15551234567:2.1@s.whatsapp.net";
        let jid = Jid::parse(raw).unwrap();
        assert_eq!(jid.user, "15551234567");
        assert_eq!(jid.device, Some(2));
        assert_eq!(jid.agent, Some(1));
    }

    #[test]
    fn to_non_ad_strips_device() {
        let jid = Jid::new("1", DEFAULT_USER_SERVER).with_device(3);
        assert_eq!(jid.to_non_ad().device, None);
    }
}
