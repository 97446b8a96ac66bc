//! Tokenized binary tree codec for WhatsApp's XMPP-like wire stanzas.

pub mod error;
pub mod node;
pub mod token;

pub use error::{BinaryNodeError, Result};
pub use node::{BinaryNode, NodeContent, decode, encode};

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use indexmap::IndexMap;

    fn roundtrip(node: &BinaryNode) {
        let encoded = encode(node).expect("encode");
        let decoded = decode(&encoded).expect("decode");
        assert_eq!(&decoded, node);
    }

    #[test]
    fn roundtrips_empty_leaf() {
        roundtrip(&BinaryNode::new("ack"));
    }

    #[test]
    fn roundtrips_attrs_and_dictionary_tokens() {
        let node = BinaryNode::new("iq")
            .with_attr("type", "get")
            .with_attr("xmlns", "w:sync:app:state")
            .with_attr("id", "abc123");
        roundtrip(&node);
    }

    #[test]
    fn roundtrips_jid_attrs() {
        let node = BinaryNode::new("message")
            .with_attr("to", "15551234567@s.whatsapp.net")
            .with_attr("participant", "15551234567:2@s.whatsapp.net");
        roundtrip(&node);
    }

    #[test]
    fn roundtrips_nested_children() {
        let inner = BinaryNode::new("enc")
            .with_attr("type", "pkmsg")
            .with_bytes(Bytes::from_static(b"ciphertext"));
        let outer = BinaryNode::new("message")
            .with_attr("id", "xyz")
            .with_children(vec![inner]);
        roundtrip(&outer);
    }

    #[test]
    fn roundtrips_large_binary_content() {
        let payload = vec![0xABu8; 70_000];
        let node = BinaryNode::new("item").with_bytes(Bytes::from(payload));
        roundtrip(&node);
    }

    #[test]
    fn dynamic_table_compresses_repeated_literals() {
        let literal = "a-very-specific-non-dictionary-literal-value";
        let node = BinaryNode::new("list").with_children(vec![
            BinaryNode::new("item").with_attr("value", literal),
            BinaryNode::new("item").with_attr("value", literal),
        ]);
        let encoded = encode(&node).expect("encode");
        // First occurrence costs the literal's length; the second is a
        // 3-byte dynamic reference, so total size should be well under two
        // full copies of the literal.
        assert!(encoded.len() < literal.len() * 2);
        roundtrip(&node);
    }

    #[test]
    fn decode_tolerates_reserved_markers() {
        // byte 255 is reserved in both the string and content marker spaces.
        let mut buf = vec![255u8]; // tag
        buf.push(0); // attr count
        buf.push(255); // content marker
        let decoded = decode(&buf).expect("reserved markers must not panic");
        assert_eq!(decoded.tag, "");
        assert_eq!(decoded.content, NodeContent::Empty);
    }

    #[test]
    fn attrs_preserve_insertion_order() {
        let mut attrs = IndexMap::new();
        attrs.insert("z".to_string(), "1".to_string());
        attrs.insert("a".to_string(), "2".to_string());
        let node = BinaryNode {
            tag: "x".to_string(),
            attrs,
            content: NodeContent::Empty,
        };
        let encoded = encode(&node).expect("encode");
        let decoded = decode(&encoded).expect("decode");
        let keys: Vec<_> = decoded.attrs.keys().collect();
        assert_eq!(keys, vec!["z", "a"]);
    }
}
