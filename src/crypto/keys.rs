//! Signing key material
//!
//! The orchestrator never stores private keys. A [`KeyProvider`] turns
//! caller-supplied material into a [`Keypair`] that the caller owns and
//! lends to a single operation.

use solana_sdk::signature::Keypair;
use solana_sdk::signer::keypair::keypair_from_seed;
use solana_sdk::signer::Signer;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading key material
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Key material is empty")]
    Empty,
    #[error("Invalid base58 key material")]
    InvalidEncoding,
    #[error("Invalid key length: {0} bytes (expected 32 or 64)")]
    InvalidLength(usize),
    #[error("Invalid keypair bytes")]
    InvalidKeypair,
    #[error("Failed to read keypair file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed keypair file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Capability to produce signing keys from opaque material
pub trait KeyProvider: Send + Sync {
    /// Load a keypair from caller-supplied material
    fn load(&self, material: &str) -> Result<Keypair, KeyError>;
}

/// Accepts only material carried inline, never touching the filesystem:
/// - base58 of the 64-byte keypair (secret || public)
/// - base58 of a 32-byte secret seed
/// - a JSON byte array (`[12, 34, ...]`)
///
/// This is the provider for remote callers.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineKeyProvider;

impl KeyProvider for InlineKeyProvider {
    fn load(&self, material: &str) -> Result<Keypair, KeyError> {
        let material = compact(material)?;
        parse_inline(&material)
    }
}

/// Inline material, or a path to a JSON keypair file on this machine.
///
/// For the local CLI only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalKeyProvider;

impl KeyProvider for LocalKeyProvider {
    fn load(&self, material: &str) -> Result<Keypair, KeyError> {
        let material = compact(material)?;
        if !material.starts_with('[') {
            let path = Path::new(&material);
            if path.is_file() {
                return read_keypair_file(path);
            }
        }
        parse_inline(&material)
    }
}

fn compact(material: &str) -> Result<String, KeyError> {
    // Pasted keys often carry line breaks
    let material: String = material.split_whitespace().collect();
    if material.is_empty() {
        return Err(KeyError::Empty);
    }
    Ok(material)
}

fn parse_inline(material: &str) -> Result<Keypair, KeyError> {
    if material.starts_with('[') {
        let bytes: Vec<u8> = serde_json::from_str(material)?;
        return keypair_from_bytes(&bytes);
    }

    let bytes = bs58::decode(material)
        .into_vec()
        .map_err(|_| KeyError::InvalidEncoding)?;
    keypair_from_bytes(&bytes)
}

/// Build a keypair from 64 keypair bytes or a 32-byte seed
pub fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair, KeyError> {
    match bytes.len() {
        64 => Keypair::from_bytes(bytes).map_err(|_| KeyError::InvalidKeypair),
        32 => keypair_from_seed(bytes).map_err(|_| KeyError::InvalidKeypair),
        n => Err(KeyError::InvalidLength(n)),
    }
}

/// Read a JSON keypair file as written by the Solana CLI
pub fn read_keypair_file(path: &Path) -> Result<Keypair, KeyError> {
    let data = fs::read_to_string(path)?;
    let bytes: Vec<u8> = serde_json::from_str(&data)?;
    keypair_from_bytes(&bytes)
}

/// Base58 encoding of the full 64-byte keypair
///
/// WARNING: this is secret material.
pub fn keypair_to_base58(keypair: &Keypair) -> String {
    bs58::encode(keypair.to_bytes()).into_string()
}

/// Short printable identity for logs
pub fn short_id(keypair: &Keypair) -> String {
    let key = keypair.pubkey().to_string();
    format!("{}..{}", &key[..4], &key[key.len() - 4..])
}
