//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256 hashing and Anchor discriminators
//! - Signing key loading (the external key provider binding)

pub mod hash;
pub mod keys;

pub use hash::{account_discriminator, instruction_discriminator, sha256, DISCRIMINATOR_LEN};
pub use keys::{
    keypair_from_bytes, keypair_to_base58, read_keypair_file, short_id, InlineKeyProvider,
    KeyError, KeyProvider, LocalKeyProvider,
};
