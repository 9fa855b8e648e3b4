use serde::{Deserialize, Serialize};
use std::fmt;

/// Oldest epoch the generators can process. Earlier snapshots use an
/// account layout the metas generator does not understand.
pub const MIN_SUPPORTED_EPOCH: Epoch = Epoch(516);

/// Network epoch number. Keys every workspace directory and artifact name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(pub u64);

impl Epoch {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn is_supported(self) -> bool {
        self >= MIN_SUPPORTED_EPOCH
    }

    /// The epoch before this one, `None` at genesis.
    pub fn previous(self) -> Option<Epoch> {
        self.0.checked_sub(1).map(Epoch)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Epoch {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Ledger slot number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slot(pub u64);

impl Slot {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Slot {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimum_epoch_is_supported() {
        assert!(MIN_SUPPORTED_EPOCH.is_supported());
        assert!(Epoch(517).is_supported());
        assert!(!Epoch(515).is_supported());
        assert!(!Epoch(0).is_supported());
    }

    #[test]
    fn previous_saturates_at_genesis() {
        assert_eq!(Epoch(520).previous(), Some(Epoch(519)));
        assert_eq!(Epoch(0).previous(), None);
    }

    #[test]
    fn serializes_as_bare_integer() {
        assert_eq!(serde_json::to_string(&Epoch(516)).unwrap(), "516");
        assert_eq!(serde_json::from_str::<Slot>("42").unwrap(), Slot(42));
    }
}
