//! Message relay: computes the device fanout set for an outgoing message
//! and assembles the per-device `enc` children, handling the group
//! (sender-key) and 1-1 (pairwise session) paths separately as their
//! envelope shapes differ.

use std::collections::HashSet;

use warp_core_binary::BinaryNode;
use warp_core_libsignal::{CiphertextKind, SignalRepository};

use crate::error::ClientError;
use crate::jid::{Jid, JidWithDevice};

/// A single per-device ciphertext ready to be wrapped as an `enc` child
/// addressed `to={participant jid}`.
pub struct DeviceCiphertext {
    pub device: JidWithDevice,
    pub kind: CiphertextKind,
    pub ciphertext: Vec<u8>,
}

/// Computes the fanout completeness set for a 1-1 send: every device of
/// `me` and every device of `peer`, minus the sending device itself.
pub fn one_to_one_fanout(
    me: &JidWithDevice,
    me_devices: &[JidWithDevice],
    peer: &str,
    peer_devices: &[JidWithDevice],
) -> Vec<JidWithDevice> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for device in me_devices.iter().chain(peer_devices.iter()) {
        if device == me {
            continue;
        }
        let key = (device.user.clone(), device.device);
        if seen.insert(key) {
            out.push(device.clone());
        }
    }
    let _ = peer;
    out
}

/// Sender-key economy: given the already-distributed device set `have`
/// and the target set `want`, returns only the devices that still need
/// the distribution message — resending to a subset of `have` yields an
/// empty result.
pub fn undistributed_devices(want: &[JidWithDevice], have: &HashSet<(String, u16)>) -> Vec<JidWithDevice> {
    want.iter().filter(|d| !have.contains(&(d.user.clone(), d.device))).cloned().collect()
}

/// Assembles the outbound `message` stanza: one `enc` child per device
/// ciphertext, wrapped in a `participants` node, plus a `device-identity`
/// child iff at least one ciphertext is a `pkmsg`.
pub fn assemble_message_stanza(
    message_id: &str,
    to: &Jid,
    server_jid_suffix: &str,
    ciphertexts: &[DeviceCiphertext],
    device_identity: Option<Vec<u8>>,
) -> BinaryNode {
    let mut participants = Vec::with_capacity(ciphertexts.len());
    let mut any_pkmsg = false;
    for ct in ciphertexts {
        if ct.kind == CiphertextKind::PreKey {
            any_pkmsg = true;
        }
        let enc = BinaryNode::new("enc")
            .with_attr("type", ct.kind.as_tag())
            .with_attr("v", "2")
            .with_bytes(ct.ciphertext.clone());
        let participant_jid = ct.device.to_jid(server_jid_suffix);
        participants.push(
            BinaryNode::new("to")
                .with_attr("jid", participant_jid.to_string())
                .with_children(vec![enc]),
        );
    }

    let mut children = vec![BinaryNode::new("participants").with_children(participants)];
    if any_pkmsg {
        if let Some(identity) = device_identity {
            children.push(BinaryNode::new("device-identity").with_bytes(identity));
        }
    }

    BinaryNode::new("message")
        .with_attr("id", message_id)
        .with_attr("to", to.to_string())
        .with_attr("type", "text")
        .with_children(children)
}

/// `relayMessage` for the group path: encrypts `plaintext` once under the
/// group's sender key. Unlike the 1-1 path there is exactly one ciphertext
/// for the whole send — every member device decrypts the same `skmsg`
/// payload, so it is carried as a single top-level `enc` node rather than
/// one per device.
///
/// Whichever devices in `members` are not already in `sender_key_memory`
/// additionally need the sender-key distribution message first (sender-key
/// economy: a device that already holds the current epoch never gets the
/// distribution resent to it) — those devices are returned separately so
/// the caller can wrap the distribution bytes as a pairwise-session
/// priming message per recipient before sending the batch.
///
/// Assumes `sender_key_memory` only ever contains devices added after a
/// prior successful distribution, so a non-empty memory implies the
/// local sender-key state already exists; a brand-new group (empty
/// memory) always has at least one member needing distribution, which
/// creates that state here.
pub async fn relay_group_message<R: SignalRepository>(
    repository: &R,
    group_id: &str,
    sender_id: &str,
    plaintext: &[u8],
    members: &[JidWithDevice],
    sender_key_memory: &HashSet<(String, u16)>,
) -> Result<GroupRelayPlan, ClientError> {
    let needs_distribution = undistributed_devices(members, sender_key_memory);

    let distribution = if needs_distribution.is_empty() {
        None
    } else {
        Some(
            repository
                .create_sender_key_distribution(group_id, sender_id)
                .await
                .map_err(ClientError::BadSession)?,
        )
    };

    let encrypted = repository
        .encrypt_group_message(group_id, sender_id, plaintext)
        .await
        .map_err(ClientError::BadSession)?;

    Ok(GroupRelayPlan {
        kind: encrypted.kind,
        ciphertext: encrypted.ciphertext,
        distribution,
        devices_needing_distribution: needs_distribution,
    })
}

/// What the caller must send to deliver one group message: the single
/// shared `skmsg` ciphertext, plus (if non-empty) the distribution message
/// to prime the devices that did not have the current sender-key epoch
/// yet.
pub struct GroupRelayPlan {
    pub kind: CiphertextKind,
    pub ciphertext: Vec<u8>,
    pub distribution: Option<Vec<u8>>,
    pub devices_needing_distribution: Vec<JidWithDevice>,
}

/// Assembles the outbound group `message` stanza: one top-level `enc`
/// child carrying the shared `skmsg` payload, plus a `participants` node
/// wrapping only the per-device sender-key distribution ciphertexts for
/// `distribution_ciphertexts` (already pairwise-encrypted by the caller
/// for each device in [`GroupRelayPlan::devices_needing_distribution`]).
/// Devices with the current epoch already in memory get no `participants`
/// entry at all.
pub fn assemble_group_message_stanza(
    message_id: &str,
    to: &Jid,
    server_jid_suffix: &str,
    skmsg_kind: CiphertextKind,
    skmsg_ciphertext: &[u8],
    distribution_ciphertexts: &[DeviceCiphertext],
    device_identity: Option<Vec<u8>>,
) -> BinaryNode {
    let skmsg = BinaryNode::new("enc")
        .with_attr("type", skmsg_kind.as_tag())
        .with_attr("v", "2")
        .with_bytes(skmsg_ciphertext.to_vec());

    let mut children = vec![skmsg];

    if !distribution_ciphertexts.is_empty() {
        let mut any_pkmsg = false;
        let participants = distribution_ciphertexts
            .iter()
            .map(|ct| {
                if ct.kind == CiphertextKind::PreKey {
                    any_pkmsg = true;
                }
                let enc = BinaryNode::new("enc")
                    .with_attr("type", ct.kind.as_tag())
                    .with_attr("v", "2")
                    .with_bytes(ct.ciphertext.clone());
                let participant_jid = ct.device.to_jid(server_jid_suffix);
                BinaryNode::new("to")
                    .with_attr("jid", participant_jid.to_string())
                    .with_children(vec![enc])
            })
            .collect();
        children.push(BinaryNode::new("participants").with_children(participants));
        if any_pkmsg {
            if let Some(identity) = device_identity {
                children.push(BinaryNode::new("device-identity").with_bytes(identity));
            }
        }
    }

    BinaryNode::new("message")
        .with_attr("id", message_id)
        .with_attr("to", to.to_string())
        .with_attr("type", "text")
        .with_children(children)
}

/// Retry-receipt isolation: when the inbound receipt carries a
/// `participant` attribute (not a group), the retry targets only that
/// device, with `device_fanout` left false.
pub fn retry_target(participant: Option<&JidWithDevice>) -> RetryScope {
    match participant {
        Some(device) => RetryScope::SingleDevice(device.clone()),
        None => RetryScope::FullFanout,
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RetryScope {
    SingleDevice(JidWithDevice),
    FullFanout,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwd(user: &str, device: u16) -> JidWithDevice {
        JidWithDevice { user: user.to_string(), device }
    }

    #[test]
    fn fanout_excludes_sending_device_only() {
        let me = jwd("me", 0);
        let me_devices = vec![jwd("me", 0), jwd("me", 1)];
        let peer_devices = vec![jwd("peer", 0), jwd("peer", 2)];
        let fanout = one_to_one_fanout(&me, &me_devices, "peer", &peer_devices);
        assert_eq!(fanout.len(), 3);
        assert!(!fanout.contains(&me));
    }

    #[test]
    fn resending_to_a_subset_of_known_devices_distributes_nothing() {
        let mut have = HashSet::new();
        have.insert(("g1".to_string(), 0));
        have.insert(("g1".to_string(), 1));
        let want = vec![jwd("g1", 0)];
        assert!(undistributed_devices(&want, &have).is_empty());
    }

    #[test]
    fn new_devices_outside_the_known_set_are_returned() {
        let mut have = HashSet::new();
        have.insert(("g1".to_string(), 0));
        let want = vec![jwd("g1", 0), jwd("g1", 5)];
        let missing = undistributed_devices(&want, &have);
        assert_eq!(missing, vec![jwd("g1", 5)]);
    }

    #[test]
    fn retry_with_participant_targets_single_device() {
        let device = jwd("peer", 3);
        assert_eq!(retry_target(Some(&device)), RetryScope::SingleDevice(device));
    }

    #[tokio::test]
    async fn group_relay_produces_one_shared_ciphertext_and_flags_new_devices() {
        use warp_core_libsignal::{DefaultSignalRepository, InMemorySignalStore};

        let store = InMemorySignalStore::new(1);
        let repository = DefaultSignalRepository::new(store);
        let members = vec![jwd("g1", 0), jwd("g1", 1)];
        let mut memory = HashSet::new();
        memory.insert(("g1".to_string(), 0));

        let plan = relay_group_message(&repository, "group@g.us", "me", b"hi", &members, &memory)
            .await
            .expect("group relay succeeds");

        assert!(!plan.ciphertext.is_empty());
        assert_eq!(plan.devices_needing_distribution, vec![jwd("g1", 1)]);
        assert!(plan.distribution.is_some());
    }

    #[test]
    fn group_stanza_carries_a_single_skmsg_node_not_one_per_member() {
        let to = Jid::parse("group@g.us").expect("valid jid");
        let distribution_target = jwd("g1", 1);
        let distribution_ct = DeviceCiphertext {
            device: distribution_target.clone(),
            kind: CiphertextKind::PreKey,
            ciphertext: b"distribution-envelope".to_vec(),
        };

        let stanza = assemble_group_message_stanza(
            "msg1",
            &to,
            "s.whatsapp.net",
            CiphertextKind::SenderKey,
            b"shared-skmsg",
            std::slice::from_ref(&distribution_ct),
            Some(b"identity".to_vec()),
        );

        let enc_children: Vec<_> = stanza.children().iter().filter(|c| c.tag == "enc").collect();
        assert_eq!(enc_children.len(), 1);
        assert_eq!(enc_children[0].attrs.get("type").map(String::as_str), Some("skmsg"));

        let participants = stanza.get_child("participants").expect("participants node present");
        assert_eq!(participants.children().len(), 1);
        assert!(stanza.get_child("device-identity").is_some());
    }
}
