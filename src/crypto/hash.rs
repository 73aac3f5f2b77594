//! Hashing utilities for program interfaces
//!
//! Anchor programs identify instructions and accounts by the first eight
//! bytes of a SHA-256 hash over a namespaced name.

use sha2::{Digest, Sha256};

/// Length of an Anchor discriminator
pub const DISCRIMINATOR_LEN: usize = 8;

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Discriminator for `namespace:name`
pub fn discriminator(namespace: &str, name: &str) -> [u8; DISCRIMINATOR_LEN] {
    let hash = sha256(format!("{}:{}", namespace, name).as_bytes());
    let mut out = [0u8; DISCRIMINATOR_LEN];
    out.copy_from_slice(&hash[..DISCRIMINATOR_LEN]);
    out
}

/// Instruction discriminator, e.g. `instruction_discriminator("proposal_approve")`
pub fn instruction_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    discriminator("global", name)
}

/// Account discriminator, e.g. `account_discriminator("Multisig")`
pub fn account_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    discriminator("account", name)
}
