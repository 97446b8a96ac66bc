use bytes::Bytes;
use indexmap::IndexMap;

use crate::error::{BinaryNodeError, Result};
use crate::token::{DOUBLE_BYTE_TOKENS, SINGLE_BYTE_TOKENS, double_byte_index, single_byte_index};

const DICT_PAGE_0: u8 = 236;
const DICT_PAGE_3: u8 = 239;
const DYNAMIC_REF: u8 = 240;
const NIBBLE_8: u8 = 241;
const HEX_8: u8 = 242;
const JID_PAIR: u8 = 243;
const AD_JID: u8 = 244;
const BINARY_8: u8 = 245;
const BINARY_20: u8 = 246;
const BINARY_32: u8 = 247;
const LIST_EMPTY: u8 = 248;
const LIST_8: u8 = 249;
const LIST_16: u8 = 250;
const LITERAL_STRING: u8 = 251;
const CONTENT_ABSENT: u8 = 252;

const NIBBLE_CHARS: &[u8] = b"0123456789-.";

/// A tagged tree node: WhatsApp's XMPP-like wire stanza shape.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BinaryNode {
    pub tag: String,
    pub attrs: IndexMap<String, String>,
    pub content: NodeContent,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeContent {
    Empty,
    Bytes(Bytes),
    Nodes(Vec<BinaryNode>),
}

impl BinaryNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: IndexMap::new(),
            content: NodeContent::Empty,
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn with_children(mut self, children: Vec<BinaryNode>) -> Self {
        self.content = NodeContent::Nodes(children);
        self
    }

    pub fn with_bytes(mut self, bytes: impl Into<Bytes>) -> Self {
        self.content = NodeContent::Bytes(bytes.into());
        self
    }

    pub fn children(&self) -> &[BinaryNode] {
        match &self.content {
            NodeContent::Nodes(nodes) => nodes,
            _ => &[],
        }
    }

    /// First child whose tag matches, if the content is a node list.
    pub fn get_child(&self, tag: &str) -> Option<&BinaryNode> {
        self.children().iter().find(|child| child.tag == tag)
    }

    pub fn content_bytes(&self) -> Option<&Bytes> {
        match &self.content {
            NodeContent::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Encodes a node tree into its wire representation.
pub fn encode(node: &BinaryNode) -> Result<Vec<u8>> {
    let mut encoder = Encoder::default();
    encoder.write_node(node)?;
    Ok(encoder.buf)
}

/// Decodes a node tree from its wire representation.
pub fn decode(buf: &[u8]) -> Result<BinaryNode> {
    let mut decoder = Decoder {
        buf,
        pos: 0,
        dynamic: Vec::new(),
    };
    decoder.read_node()
}

#[derive(Default)]
struct Encoder {
    buf: Vec<u8>,
    dynamic: Vec<String>,
    dynamic_rev: std::collections::HashMap<String, u16>,
}

impl Encoder {
    fn write_node(&mut self, node: &BinaryNode) -> Result<()> {
        self.write_string(&node.tag)?;
        if node.attrs.len() > u8::MAX as usize {
            return Err(BinaryNodeError::ListTooLarge(node.attrs.len()));
        }
        self.buf.push(node.attrs.len() as u8);
        for (key, value) in &node.attrs {
            self.write_string(key)?;
            self.write_string(value)?;
        }
        self.write_content(&node.content)
    }

    fn write_content(&mut self, content: &NodeContent) -> Result<()> {
        match content {
            NodeContent::Empty => {
                self.buf.push(CONTENT_ABSENT);
                Ok(())
            }
            NodeContent::Bytes(bytes) => self.write_binary(bytes),
            NodeContent::Nodes(nodes) => self.write_list(nodes),
        }
    }

    fn write_binary(&mut self, bytes: &[u8]) -> Result<()> {
        let len = bytes.len();
        if len <= u8::MAX as usize {
            self.buf.push(BINARY_8);
            self.buf.push(len as u8);
        } else if len <= 0xF_FFFF {
            self.buf.push(BINARY_20);
            self.buf.push(((len >> 16) & 0xFF) as u8);
            self.buf.push(((len >> 8) & 0xFF) as u8);
            self.buf.push((len & 0xFF) as u8);
        } else if len <= u32::MAX as usize {
            self.buf.push(BINARY_32);
            self.buf.extend_from_slice(&(len as u32).to_be_bytes());
        } else {
            return Err(BinaryNodeError::BinaryTooLarge(len));
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn write_list(&mut self, nodes: &[BinaryNode]) -> Result<()> {
        if nodes.is_empty() {
            self.buf.push(LIST_EMPTY);
        } else if nodes.len() <= u8::MAX as usize {
            self.buf.push(LIST_8);
            self.buf.push(nodes.len() as u8);
        } else if nodes.len() <= u16::MAX as usize {
            self.buf.push(LIST_16);
            self.buf.extend_from_slice(&(nodes.len() as u16).to_be_bytes());
        } else {
            return Err(BinaryNodeError::ListTooLarge(nodes.len()));
        }
        for child in nodes {
            self.write_node(child)?;
        }
        Ok(())
    }

    fn write_string(&mut self, s: &str) -> Result<()> {
        if let Some(index) = single_byte_index(s) {
            self.buf.push(index);
            return Ok(());
        }
        if let Some((page, index)) = double_byte_index(s) {
            self.buf.push(DICT_PAGE_0 + page);
            self.buf.push(index);
            return Ok(());
        }
        if is_nibble_encodable(s) {
            return self.write_packed(NIBBLE_8, s, nibble_value);
        }
        if is_hex_encodable(s) {
            return self.write_packed(HEX_8, s, hex_value);
        }
        if let Some((device, user, server)) = split_ad_jid(s) {
            self.buf.push(AD_JID);
            self.buf.extend_from_slice(&device.to_be_bytes());
            self.write_string(user)?;
            self.write_string(server)?;
            return Ok(());
        }
        if let Some((user, server)) = split_jid_pair(s) {
            self.buf.push(JID_PAIR);
            self.write_string(user)?;
            self.write_string(server)?;
            return Ok(());
        }
        if let Some(&index) = self.dynamic_rev.get(s) {
            self.buf.push(DYNAMIC_REF);
            self.buf.extend_from_slice(&index.to_be_bytes());
            return Ok(());
        }
        self.write_literal(s)
    }

    fn write_packed(&mut self, tag: u8, s: &str, value_of: fn(u8) -> Option<u8>) -> Result<()> {
        self.buf.push(tag);
        self.buf.push(s.len() as u8);
        let mut iter = s.bytes();
        loop {
            let Some(hi_char) = iter.next() else { break };
            let hi = value_of(hi_char).unwrap_or(0);
            let lo = match iter.next() {
                Some(lo_char) => value_of(lo_char).unwrap_or(0),
                None => 0x0F,
            };
            self.buf.push((hi << 4) | lo);
        }
        Ok(())
    }

    fn write_literal(&mut self, s: &str) -> Result<()> {
        if s.len() > u16::MAX as usize {
            return Err(BinaryNodeError::BinaryTooLarge(s.len()));
        }
        self.buf.push(LITERAL_STRING);
        self.buf.extend_from_slice(&(s.len() as u16).to_be_bytes());
        self.buf.extend_from_slice(s.as_bytes());
        if self.dynamic.len() < u16::MAX as usize {
            let index = self.dynamic.len() as u16;
            self.dynamic.push(s.to_owned());
            self.dynamic_rev.insert(s.to_owned(), index);
        }
        Ok(())
    }
}

struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
    dynamic: Vec<String>,
}

impl<'a> Decoder<'a> {
    fn read_u8(&mut self) -> Result<u8> {
        let byte = *self
            .buf
            .get(self.pos)
            .ok_or(BinaryNodeError::UnexpectedEof { offset: self.pos })?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or(BinaryNodeError::UnexpectedEof { offset: self.pos })?;
        let slice = self
            .buf
            .get(self.pos..end)
            .ok_or(BinaryNodeError::UnexpectedEof { offset: self.pos })?;
        self.pos = end;
        Ok(slice)
    }

    fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_u24(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(3)?;
        Ok(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_node(&mut self) -> Result<BinaryNode> {
        let tag = self.read_string()?;
        let attr_count = self.read_u8()? as usize;
        let mut attrs = IndexMap::with_capacity(attr_count);
        for _ in 0..attr_count {
            let key = self.read_string()?;
            let value = self.read_string()?;
            attrs.insert(key, value);
        }
        let content = self.read_content()?;
        Ok(BinaryNode { tag, attrs, content })
    }

    fn read_content(&mut self) -> Result<NodeContent> {
        let marker = self.read_u8()?;
        match marker {
            CONTENT_ABSENT => Ok(NodeContent::Empty),
            LIST_EMPTY => Ok(NodeContent::Nodes(Vec::new())),
            LIST_8 => {
                let count = self.read_u8()? as usize;
                self.read_node_list(count)
            }
            LIST_16 => {
                let count = self.read_u16()? as usize;
                self.read_node_list(count)
            }
            BINARY_8 => {
                let len = self.read_u8()? as usize;
                let bytes = self.read_bytes(len)?;
                Ok(NodeContent::Bytes(Bytes::copy_from_slice(bytes)))
            }
            BINARY_20 => {
                let len = self.read_u24()? as usize;
                let bytes = self.read_bytes(len)?;
                Ok(NodeContent::Bytes(Bytes::copy_from_slice(bytes)))
            }
            BINARY_32 => {
                let len = self.read_u32()? as usize;
                let bytes = self.read_bytes(len)?;
                Ok(NodeContent::Bytes(Bytes::copy_from_slice(bytes)))
            }
            // Reserved or otherwise unrecognized marker in the content slot:
            // tolerate as an absent body rather than failing the whole frame.
            _ => Ok(NodeContent::Empty),
        }
    }

    fn read_node_list(&mut self, count: usize) -> Result<NodeContent> {
        let mut nodes = Vec::with_capacity(count);
        for _ in 0..count {
            nodes.push(self.read_node()?);
        }
        Ok(NodeContent::Nodes(nodes))
    }

    fn read_string(&mut self) -> Result<String> {
        let marker = self.read_u8()?;
        match marker {
            0..=235 => Ok(SINGLE_BYTE_TOKENS.get(marker as usize).copied().unwrap_or("").to_owned()),
            DICT_PAGE_0..=DICT_PAGE_3 => {
                let page = (marker - DICT_PAGE_0) as usize;
                let index = self.read_u8()? as usize;
                Ok(DOUBLE_BYTE_TOKENS[page].get(index).copied().unwrap_or("").to_owned())
            }
            DYNAMIC_REF => {
                let index = self.read_u16()? as usize;
                Ok(self.dynamic.get(index).cloned().unwrap_or_default())
            }
            NIBBLE_8 => self.read_packed(nibble_char),
            HEX_8 => self.read_packed(hex_char),
            JID_PAIR => {
                let user = self.read_string()?;
                let server = self.read_string()?;
                Ok(format!("{user}@{server}"))
            }
            AD_JID => {
                let device = self.read_u16()?;
                let user = self.read_string()?;
                let server = self.read_string()?;
                Ok(format!("{user}:{device}@{server}"))
            }
            LITERAL_STRING => {
                let len = self.read_u16()? as usize;
                let bytes = self.read_bytes(len)?;
                let s = std::str::from_utf8(bytes)
                    .map_err(|_| BinaryNodeError::InvalidUtf8)?
                    .to_owned();
                self.dynamic.push(s.clone());
                Ok(s)
            }
            // Reserved markers (and the content-only CONTENT_ABSENT code if it
            // ever appears where a string is expected): tolerate as empty.
            _ => Ok(String::new()),
        }
    }

    fn read_packed(&mut self, char_of: fn(u8) -> char) -> Result<String> {
        let count = self.read_u8()? as usize;
        let byte_len = count.div_ceil(2);
        let bytes = self.read_bytes(byte_len)?;
        let mut out = String::with_capacity(count);
        for (i, byte) in bytes.iter().enumerate() {
            let hi = byte >> 4;
            out.push(char_of(hi));
            if out.len() == count {
                break;
            }
            let lo = byte & 0x0F;
            if i * 2 + 1 < count {
                out.push(char_of(lo));
            }
        }
        Ok(out)
    }
}

fn is_nibble_encodable(s: &str) -> bool {
    !s.is_empty() && s.len() <= u8::MAX as usize && s.bytes().all(|b| NIBBLE_CHARS.contains(&b))
}

fn is_hex_encodable(s: &str) -> bool {
    !s.is_empty() && s.len() <= u8::MAX as usize && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn nibble_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'-' => Some(10),
        b'.' => Some(11),
        _ => None,
    }
}

fn nibble_char(nibble: u8) -> char {
    match nibble {
        0..=9 => (b'0' + nibble) as char,
        10 => '-',
        11 => '.',
        _ => '\0',
    }
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

fn hex_char(nibble: u8) -> char {
    char::from_digit(nibble as u32, 16).unwrap_or('0')
}

/// Splits `user@server` into its two halves, rejecting jid-with-device and
/// multi-`@` strings (those take the more specific `AD_JID`/literal paths).
fn split_jid_pair(s: &str) -> Option<(&str, &str)> {
    let mut parts = s.splitn(2, '@');
    let user = parts.next()?;
    let server = parts.next()?;
    if user.is_empty() || server.is_empty() || server.contains('@') || user.contains(':') {
        return None;
    }
    Some((user, server))
}

/// Splits `user:device@server` into `(device, user, server)`.
fn split_ad_jid(s: &str) -> Option<(u16, &str, &str)> {
    let at = s.find('@')?;
    let (left, server) = (&s[..at], &s[at + 1..]);
    let colon = left.find(':')?;
    let (user, device_str) = (&left[..colon], &left[colon + 1..]);
    if user.is_empty() || server.is_empty() {
        return None;
    }
    let device: u16 = device_str.parse().ok()?;
    Some((device, user, server))
}
