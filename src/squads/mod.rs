//! Squads v4 program interface
//!
//! Address derivation, account layouts, instruction encoding and error
//! codes of the on-chain multisig program. Nothing here talks to the
//! network.

pub mod accounts;
pub mod errors;
pub mod instructions;
pub mod message;

use solana_sdk::pubkey::Pubkey;

pub use accounts::{
    Member, MultisigState, Permissions, ProgramConfigState, ProposalState, ProposalStatusState,
    VaultTransactionState,
};
pub use errors::ProgramErrorCode;
pub use message::{VaultTransactionMessage, MAX_MESSAGE_KEYS};

pub const ID: Pubkey = solana_sdk::pubkey!("SQDS4ep65T869zMMBKyuUq6aD6EgTu8psMjkvj52pCf");

pub const SEED_PREFIX: &[u8] = b"multisig";
pub const SEED_PROGRAM_CONFIG: &[u8] = b"program_config";
pub const SEED_MULTISIG: &[u8] = b"multisig";
pub const SEED_VAULT: &[u8] = b"vault";
pub const SEED_TRANSACTION: &[u8] = b"transaction";
pub const SEED_PROPOSAL: &[u8] = b"proposal";

/// Global program config holding the creation fee and treasury
pub fn program_config_pda(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[SEED_PREFIX, SEED_PROGRAM_CONFIG], program_id)
}

/// Multisig account seeded by its one-time create key
pub fn multisig_pda(create_key: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[SEED_PREFIX, SEED_MULTISIG, create_key.as_ref()],
        program_id,
    )
}

/// Vault sub-account `index` of a multisig; holds the custodied funds
pub fn vault_pda(multisig: &Pubkey, index: u8, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[SEED_PREFIX, multisig.as_ref(), SEED_VAULT, &[index]],
        program_id,
    )
}

/// Vault transaction stored at `transaction_index`
pub fn transaction_pda(multisig: &Pubkey, transaction_index: u64, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[
            SEED_PREFIX,
            multisig.as_ref(),
            SEED_TRANSACTION,
            &transaction_index.to_le_bytes(),
        ],
        program_id,
    )
}

/// Proposal tracking the votes for `transaction_index`
pub fn proposal_pda(multisig: &Pubkey, transaction_index: u64, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[
            SEED_PREFIX,
            multisig.as_ref(),
            SEED_TRANSACTION,
            &transaction_index.to_le_bytes(),
            SEED_PROPOSAL,
        ],
        program_id,
    )
}
