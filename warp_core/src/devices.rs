//! USync device discovery and the per-user device-list cache that backs
//! multi-device fanout. The cache exists purely to avoid round-tripping a
//! `usync` query on every send; it is invalidated outright rather than
//! patched when a device-list notification arrives.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use warp_core_binary::BinaryNode;

use crate::jid::{Jid, JidWithDevice};

struct CacheEntry {
    devices: Vec<JidWithDevice>,
    inserted_at: Instant,
}

/// Keyed by bare user id (no server/device), TTL default 5 minutes per
/// the ambient config default, invalidated early on device-list push
/// notifications rather than waiting out the TTL.
pub struct DeviceCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl DeviceCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: RwLock::new(HashMap::new()) }
    }

    pub async fn get(&self, user: &str) -> Option<Vec<JidWithDevice>> {
        let entries = self.entries.read().await;
        let entry = entries.get(user)?;
        if entry.inserted_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.devices.clone())
    }

    pub async fn put(&self, user: &str, devices: Vec<JidWithDevice>) {
        self.entries
            .write()
            .await
            .insert(user.to_string(), CacheEntry { devices, inserted_at: Instant::now() });
    }

    pub async fn invalidate(&self, user: &str) {
        self.entries.write().await.remove(user);
    }
}

/// One entry from a `usync` response's device-list node: a non-zero
/// key-index is required of every *non-zero* device for it to count as
/// real and addressable; the primary device (id 0) commonly carries no
/// key-index at all and is never excluded on that basis.
pub struct UsyncDeviceEntry {
    pub device_id: u16,
    pub key_index: u32,
}

/// Filters and maps raw USync device-list entries into addressable
/// per-device JIDs, optionally excluding device 0 (the primary phone's
/// own "no device suffix" entry, which some call sites address
/// separately from its fanned-out device list).
pub fn devices_from_usync_entries(
    user: &str,
    entries: &[UsyncDeviceEntry],
    exclude_device_zero: bool,
) -> Vec<JidWithDevice> {
    entries
        .iter()
        .filter(|e| e.device_id == 0 || e.key_index != 0)
        .filter(|e| !(exclude_device_zero && e.device_id == 0))
        .map(|e| JidWithDevice { user: user.to_string(), device: e.device_id })
        .collect()
}

/// Builds a `usync` IQ requesting the device list for `targets`, for a
/// cache miss. The `devices` context asks only for the `device` query,
/// matching the one case this crate's fanout path needs.
pub fn build_usync_devices_query(id: &str, targets: &[Jid]) -> BinaryNode {
    let users = targets
        .iter()
        .map(|jid| BinaryNode::new("user").with_attr("jid", jid.to_non_ad().to_string()))
        .collect();

    BinaryNode::new("iq")
        .with_attr("id", id)
        .with_attr("type", "get")
        .with_attr("xmlns", "usync")
        .with_children(vec![
            BinaryNode::new("usync")
                .with_attr("sid", id)
                .with_attr("mode", "query")
                .with_attr("last", "true")
                .with_attr("index", "0")
                .with_attr("context", "message")
                .with_children(vec![
                    BinaryNode::new("query")
                        .with_children(vec![BinaryNode::new("devices").with_attr("version", "2")]),
                    BinaryNode::new("list").with_children(users),
                ]),
        ])
}

/// Parses a `usync` IQ response into per-user device lists, keyed by
/// bare user id, ready to hand to [`devices_from_usync_entries`].
pub fn parse_usync_devices_response(response: &BinaryNode) -> HashMap<String, Vec<UsyncDeviceEntry>> {
    let mut by_user = HashMap::new();
    let Some(usync) = response.get_child("usync") else { return by_user };
    let Some(list) = usync.get_child("list") else { return by_user };

    for user_node in list.children() {
        let Some(jid_attr) = user_node.attrs.get("jid") else { continue };
        let Some(jid) = Jid::parse(jid_attr) else { continue };
        let Some(devices_node) = user_node
            .get_child("devices")
            .and_then(|d| d.get_child("device-list"))
        else {
            continue;
        };

        let entries = devices_node
            .children()
            .iter()
            .filter_map(|device_node| {
                let device_id: u16 = device_node.attrs.get("id")?.parse().ok()?;
                let key_index: u32 = device_node
                    .attrs
                    .get("key-index")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
                Some(UsyncDeviceEntry { device_id, key_index })
            })
            .collect();
        by_user.insert(jid.user, entries);
    }
    by_user
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cache_expires_after_ttl() {
        let cache = DeviceCache::new(Duration::from_millis(10));
        cache.put("u1", vec![JidWithDevice { user: "u1".into(), device: 1 }]).await;
        assert!(cache.get("u1").await.is_some());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get("u1").await.is_none());
    }

    #[tokio::test]
    async fn invalidate_drops_entry_immediately() {
        let cache = DeviceCache::new(Duration::from_secs(300));
        cache.put("u1", vec![JidWithDevice { user: "u1".into(), device: 1 }]).await;
        cache.invalidate("u1").await;
        assert!(cache.get("u1").await.is_none());
    }

    #[test]
    fn usync_response_parses_device_list_per_user() {
        let response = BinaryNode::new("iq").with_attr("type", "result").with_children(vec![
            BinaryNode::new("usync").with_children(vec![
                BinaryNode::new("list").with_children(vec![
                    BinaryNode::new("user")
                        .with_attr("jid", "1@s.whatsapp.net")
                        .with_children(vec![
                            BinaryNode::new("devices").with_children(vec![
                                BinaryNode::new("device-list").with_children(vec![
                                    BinaryNode::new("device")
                                        .with_attr("id", "0")
                                        .with_attr("key-index", "1"),
                                    BinaryNode::new("device")
                                        .with_attr("id", "5")
                                        .with_attr("key-index", "2"),
                                ]),
                            ]),
                        ]),
                ]),
            ]),
        ]);

        let by_user = parse_usync_devices_response(&response);
        let entries = by_user.get("1").expect("user entry present");
        assert_eq!(entries.len(), 2);
        let devices = devices_from_usync_entries("1", entries, false);
        assert_eq!(devices.len(), 2);
    }

    #[test]
    fn zero_key_index_devices_are_excluded_except_the_primary() {
        let entries = vec![
            UsyncDeviceEntry { device_id: 0, key_index: 0 },
            UsyncDeviceEntry { device_id: 1, key_index: 0 },
            UsyncDeviceEntry { device_id: 2, key_index: 3 },
        ];
        let devices = devices_from_usync_entries("u1", &entries, false);
        assert_eq!(devices.len(), 2);
        assert!(devices.iter().any(|d| d.device == 0));
        assert!(devices.iter().any(|d| d.device == 2));
        assert!(!devices.iter().any(|d| d.device == 1));
    }
}
