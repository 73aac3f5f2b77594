//! Ledger access
//!
//! Everything the orchestrator knows about the cluster goes through a
//! [`LedgerClient`]: point-in-time account reads and submission of
//! signed transactions. [`RpcLedgerClient`] talks to a real node;
//! [`InMemoryLedger`] simulates one for tests.

#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod rpc;

use async_trait::async_trait;
use solana_sdk::account::Account;
use solana_sdk::instruction::{Instruction, InstructionError};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::transaction::TransactionError;
use thiserror::Error;

#[cfg(any(test, feature = "testing"))]
pub use memory::InMemoryLedger;
pub use rpc::RpcLedgerClient;

/// Why a ledger call did not produce a result
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientFailure {
    /// Endpoint unreachable, timed out or answered with a non-success status
    #[error("Transport failure: {0}")]
    Transport(String),
    /// The ledger processed the transaction and refused it
    #[error("Transaction rejected: {0}")]
    Rejected(TransactionError),
    /// The response did not have the expected shape
    #[error("Malformed response: {0}")]
    Malformed(String),
    /// The transaction could not be signed with the keys given
    #[error("Signing failed: {0}")]
    Signing(String),
}

impl ClientFailure {
    /// Custom program error code, if the rejection carried one
    pub fn custom_code(&self) -> Option<u32> {
        match self {
            Self::Rejected(TransactionError::InstructionError(_, InstructionError::Custom(code))) => {
                Some(*code)
            }
            _ => None,
        }
    }

    pub fn transaction_error(&self) -> Option<&TransactionError> {
        match self {
            Self::Rejected(err) => Some(err),
            _ => None,
        }
    }
}

/// Narrow view of a ledger node
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Node software version; doubles as the connectivity probe
    async fn version(&self) -> Result<String, ClientFailure>;

    /// Current state of an account, `None` if it does not exist
    async fn account(&self, address: &Pubkey) -> Result<Option<Account>, ClientFailure>;

    /// Lamport balance, zero for missing accounts
    async fn balance(&self, address: &Pubkey) -> Result<u64, ClientFailure>;

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize)
        -> Result<u64, ClientFailure>;

    /// Sign `instructions` with `payer` (fee payer) and `signers`, submit
    /// them as one transaction and wait for confirmation
    async fn submit(
        &self,
        instructions: &[Instruction],
        payer: &Keypair,
        signers: &[&Keypair],
    ) -> Result<Signature, ClientFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_code() {
        let failure = ClientFailure::Rejected(TransactionError::InstructionError(
            1,
            InstructionError::Custom(6010),
        ));
        assert_eq!(failure.custom_code(), Some(6010));
        assert!(failure.transaction_error().is_some());

        let failure = ClientFailure::Rejected(TransactionError::InsufficientFundsForFee);
        assert_eq!(failure.custom_code(), None);
        assert_eq!(ClientFailure::Transport("down".into()).custom_code(), None);
    }
}
