//! The fixed set of app-state collections the server tracks independently,
//! each with its own version counter and LT-hash accumulator.

/// Sync priority/ordering classes for app-state collections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    CriticalBlock,
    CriticalUnblockLow,
    RegularLow,
    RegularHigh,
    Regular,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::CriticalBlock,
        Collection::CriticalUnblockLow,
        Collection::RegularLow,
        Collection::RegularHigh,
        Collection::Regular,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::CriticalBlock => "critical_block",
            Collection::CriticalUnblockLow => "critical_unblock_low",
            Collection::RegularLow => "regular_low",
            Collection::RegularHigh => "regular_high",
            Collection::Regular => "regular",
        }
    }

    pub fn from_str(name: &str) -> Option<Self> {
        Collection::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
