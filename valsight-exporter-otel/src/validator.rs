//! Identity and role of the local node.

use std::sync::atomic::{AtomicBool, Ordering};

/// Prefix of generated monikers.
pub const UNKNOWN_MONIKER_PREFIX: &str = "UNKNOWN-";

/// Identity of the local node plus its current validator role.
///
/// The role flag is written by the block-processing path and read by the
/// scrape loop, so it lives in an atomic.
#[derive(Debug, Default)]
pub struct ValidatorInfo {
    /// Human-readable node label attached to every data point.
    pub moniker: String,
    /// Consensus address.
    pub address: Vec<u8>,
    /// Chain identifier; empty when unknown.
    pub chain_id: String,
    is_validator: AtomicBool,
}

impl ValidatorInfo {
    pub fn new(moniker: impl Into<String>, address: impl Into<Vec<u8>>) -> Self {
        Self {
            moniker: moniker.into(),
            address: address.into(),
            chain_id: String::new(),
            is_validator: AtomicBool::new(false),
        }
    }

    pub fn with_chain_id(mut self, chain_id: impl Into<String>) -> Self {
        self.chain_id = chain_id.into();
        self
    }

    /// Set the initial validator role.
    pub fn with_validator(self, is_validator: bool) -> Self {
        self.set_validator(is_validator);
        self
    }

    pub fn is_validator(&self) -> bool {
        self.is_validator.load(Ordering::Acquire)
    }

    pub fn set_validator(&self, is_validator: bool) {
        self.is_validator.store(is_validator, Ordering::Release);
    }

    /// Replace an empty moniker with a generated unique one.
    pub(crate) fn ensure_moniker(&mut self) {
        if self.moniker.is_empty() {
            self.moniker = format!("{}{}", UNKNOWN_MONIKER_PREFIX, uuid::Uuid::new_v4());
        }
    }
}

impl Clone for ValidatorInfo {
    fn clone(&self) -> Self {
        Self {
            moniker: self.moniker.clone(),
            address: self.address.clone(),
            chain_id: self.chain_id.clone(),
            is_validator: AtomicBool::new(self.is_validator()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validator_flag() {
        let info = ValidatorInfo::new("node", b"addr".to_vec());
        assert!(!info.is_validator());

        info.set_validator(true);
        assert!(info.is_validator());
        info.set_validator(false);
        assert!(!info.is_validator());
    }

    #[test]
    fn test_ensure_moniker() {
        let mut info = ValidatorInfo::default();
        info.ensure_moniker();
        assert!(info.moniker.starts_with(UNKNOWN_MONIKER_PREFIX));
        assert!(info.moniker.len() > "UNKNOWN-1".len());

        let mut named = ValidatorInfo::new("my-node", Vec::new());
        named.ensure_moniker();
        assert_eq!(named.moniker, "my-node");
    }

    #[test]
    fn test_generated_monikers_differ() {
        let mut a = ValidatorInfo::default();
        let mut b = ValidatorInfo::default();
        a.ensure_moniker();
        b.ensure_moniker();
        assert_ne!(a.moniker, b.moniker);
    }

    #[test]
    fn test_clone_keeps_role() {
        let info = ValidatorInfo::new("node", Vec::new())
            .with_chain_id("cosmoshub-4")
            .with_validator(true);
        let copy = info.clone();

        assert!(copy.is_validator());
        assert_eq!(copy.chain_id, "cosmoshub-4");
    }
}
