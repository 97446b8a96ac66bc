//! The decoded, plaintext result of an app-state mutation: which logical
//! index it touches, whether it's setting or removing a value, and the
//! opaque payload bytes the host application interprets (contact mute,
//! chat archive, pin, and so on — the concrete action shapes are not
//! specified here, matching the rest of the app-state surface being
//! treated as opaque content, mirroring what the core does for the
//! Signal-encrypted message payloads it routes).

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOperation {
    Set,
    Remove,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMutation {
    pub operation: SyncOperation,
    pub index: Vec<String>,
    pub value: Vec<u8>,
}

impl ChatMutation {
    pub fn index_path(&self) -> String {
        self.index.join(",")
    }
}
