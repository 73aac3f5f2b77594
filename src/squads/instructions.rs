//! Instruction builders for the multisig program

use crate::crypto::{instruction_discriminator, DISCRIMINATOR_LEN};
use crate::squads::accounts::Member;
use crate::squads::message::VaultTransactionMessage;
use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;

pub const MULTISIG_CREATE_V2: &str = "multisig_create_v2";
pub const VAULT_TRANSACTION_CREATE: &str = "vault_transaction_create";
pub const PROPOSAL_CREATE: &str = "proposal_create";
pub const PROPOSAL_ACTIVATE: &str = "proposal_activate";
pub const PROPOSAL_APPROVE: &str = "proposal_approve";
pub const PROPOSAL_REJECT: &str = "proposal_reject";
pub const VAULT_TRANSACTION_EXECUTE: &str = "vault_transaction_execute";

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct MultisigCreateArgsV2 {
    pub config_authority: Option<Pubkey>,
    pub threshold: u16,
    pub members: Vec<Member>,
    pub time_lock: u32,
    pub rent_collector: Option<Pubkey>,
    pub memo: Option<String>,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct VaultTransactionCreateArgs {
    pub vault_index: u8,
    pub ephemeral_signers: u8,
    /// Compact-encoded [`VaultTransactionMessage`]
    pub transaction_message: Vec<u8>,
    pub memo: Option<String>,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProposalCreateArgs {
    pub transaction_index: u64,
    pub draft: bool,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct ProposalVoteArgs {
    pub memo: Option<String>,
}

/// Instruction data: discriminator followed by borsh args
pub fn instruction_data<A: BorshSerialize>(name: &str, args: &A) -> Result<Vec<u8>, std::io::Error> {
    let mut data = instruction_discriminator(name).to_vec();
    data.extend(args.try_to_vec()?);
    Ok(data)
}

/// Split instruction data into its discriminator and argument bytes
pub fn split_data(data: &[u8]) -> Option<([u8; DISCRIMINATOR_LEN], &[u8])> {
    if data.len() < DISCRIMINATOR_LEN {
        return None;
    }
    let mut disc = [0u8; DISCRIMINATOR_LEN];
    disc.copy_from_slice(&data[..DISCRIMINATOR_LEN]);
    Some((disc, &data[DISCRIMINATOR_LEN..]))
}

pub struct MultisigCreateAccounts {
    pub program_config: Pubkey,
    pub treasury: Pubkey,
    pub multisig: Pubkey,
    pub create_key: Pubkey,
    pub creator: Pubkey,
}

pub fn multisig_create_v2(
    program_id: &Pubkey,
    accounts: &MultisigCreateAccounts,
    args: &MultisigCreateArgsV2,
) -> Result<Instruction, std::io::Error> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(accounts.program_config, false),
            AccountMeta::new(accounts.treasury, false),
            AccountMeta::new(accounts.multisig, false),
            AccountMeta::new_readonly(accounts.create_key, true),
            AccountMeta::new(accounts.creator, true),
            AccountMeta::new_readonly(system_program::ID, false),
        ],
        data: instruction_data(MULTISIG_CREATE_V2, args)?,
    })
}

pub fn vault_transaction_create(
    program_id: &Pubkey,
    multisig: &Pubkey,
    transaction: &Pubkey,
    creator: &Pubkey,
    vault_index: u8,
    message: &VaultTransactionMessage,
    memo: Option<String>,
) -> Result<Instruction, std::io::Error> {
    let transaction_message = message
        .to_compact_bytes()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    let args = VaultTransactionCreateArgs {
        vault_index,
        ephemeral_signers: 0,
        transaction_message,
        memo,
    };
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*multisig, false),
            AccountMeta::new(*transaction, false),
            AccountMeta::new_readonly(*creator, true),
            // rent payer
            AccountMeta::new(*creator, true),
            AccountMeta::new_readonly(system_program::ID, false),
        ],
        data: instruction_data(VAULT_TRANSACTION_CREATE, &args)?,
    })
}

pub fn proposal_create(
    program_id: &Pubkey,
    multisig: &Pubkey,
    proposal: &Pubkey,
    creator: &Pubkey,
    transaction_index: u64,
    draft: bool,
) -> Result<Instruction, std::io::Error> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*multisig, false),
            AccountMeta::new(*proposal, false),
            AccountMeta::new_readonly(*creator, true),
            AccountMeta::new(*creator, true),
            AccountMeta::new_readonly(system_program::ID, false),
        ],
        data: instruction_data(
            PROPOSAL_CREATE,
            &ProposalCreateArgs {
                transaction_index,
                draft,
            },
        )?,
    })
}

fn proposal_member_accounts(multisig: &Pubkey, member: &Pubkey, proposal: &Pubkey) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new_readonly(*multisig, false),
        AccountMeta::new(*member, true),
        AccountMeta::new(*proposal, false),
    ]
}

pub fn proposal_activate(
    program_id: &Pubkey,
    multisig: &Pubkey,
    member: &Pubkey,
    proposal: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: proposal_member_accounts(multisig, member, proposal),
        data: instruction_discriminator(PROPOSAL_ACTIVATE).to_vec(),
    }
}

pub fn proposal_approve(
    program_id: &Pubkey,
    multisig: &Pubkey,
    member: &Pubkey,
    proposal: &Pubkey,
    args: &ProposalVoteArgs,
) -> Result<Instruction, std::io::Error> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: proposal_member_accounts(multisig, member, proposal),
        data: instruction_data(PROPOSAL_APPROVE, args)?,
    })
}

pub fn proposal_reject(
    program_id: &Pubkey,
    multisig: &Pubkey,
    member: &Pubkey,
    proposal: &Pubkey,
    args: &ProposalVoteArgs,
) -> Result<Instruction, std::io::Error> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: proposal_member_accounts(multisig, member, proposal),
        data: instruction_data(PROPOSAL_REJECT, args)?,
    })
}

/// `remaining` comes from [`VaultTransactionMessage::execution_accounts`]
pub fn vault_transaction_execute(
    program_id: &Pubkey,
    multisig: &Pubkey,
    proposal: &Pubkey,
    transaction: &Pubkey,
    member: &Pubkey,
    remaining: Vec<AccountMeta>,
) -> Instruction {
    let mut accounts = vec![
        AccountMeta::new_readonly(*multisig, false),
        AccountMeta::new(*proposal, false),
        AccountMeta::new_readonly(*transaction, false),
        AccountMeta::new_readonly(*member, true),
    ];
    accounts.extend(remaining);
    Instruction {
        program_id: *program_id,
        accounts,
        data: instruction_discriminator(VAULT_TRANSACTION_EXECUTE).to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::squads::ID;

    #[test]
    fn test_proposal_create_data() {
        let ms = Pubkey::new_unique();
        let ix = proposal_create(&ID, &ms, &Pubkey::new_unique(), &Pubkey::new_unique(), 7, true)
            .unwrap();

        let (disc, args) = split_data(&ix.data).unwrap();
        assert_eq!(disc, instruction_discriminator(PROPOSAL_CREATE));
        let args = ProposalCreateArgs::try_from_slice(args).unwrap();
        assert_eq!(args.transaction_index, 7);
        assert!(args.draft);
    }

    #[test]
    fn test_activate_has_no_args() {
        let ix = proposal_activate(
            &ID,
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
        );
        assert_eq!(ix.data.len(), DISCRIMINATOR_LEN);
        assert!(ix.accounts[1].is_signer);
    }

    #[test]
    fn test_execute_appends_remaining() {
        let extra = vec![AccountMeta::new(Pubkey::new_unique(), false)];
        let ix = vault_transaction_execute(
            &ID,
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            extra,
        );
        assert_eq!(ix.accounts.len(), 5);
        assert!(ix.accounts[3].is_signer);
    }

    #[test]
    fn test_split_short_data() {
        assert!(split_data(&[1, 2, 3]).is_none());
    }
}
