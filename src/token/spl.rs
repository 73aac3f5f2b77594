//! SPL token program helpers
//!
//! Vault transfers always go through the classic token program and the
//! vault's associated token accounts. Account layouts and instruction
//! encodings come from `spl-token` and `spl-associated-token-account`.

use solana_sdk::instruction::Instruction;
use solana_sdk::program_error::ProgramError;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use spl_token::instruction::TokenInstruction;
use spl_token::state::{Account, Mint};

pub use spl_associated_token_account::get_associated_token_address as associated_token_address;

/// Size of a token account, the space an idempotent create pays rent for
pub const TOKEN_ACCOUNT_LEN: usize = Account::LEN;

/// `TransferChecked` signed by `owner` alone
pub fn transfer_checked(
    source: &Pubkey,
    mint: &Pubkey,
    destination: &Pubkey,
    owner: &Pubkey,
    amount: u64,
    decimals: u8,
) -> Result<Instruction, ProgramError> {
    spl_token::instruction::transfer_checked(
        &spl_token::ID,
        source,
        mint,
        destination,
        owner,
        &[],
        amount,
        decimals,
    )
}

/// Decode `TransferChecked` data into `(amount, decimals)`
pub fn parse_transfer_checked(data: &[u8]) -> Option<(u64, u8)> {
    match TokenInstruction::unpack(data).ok()? {
        TokenInstruction::TransferChecked { amount, decimals } => Some((amount, decimals)),
        _ => None,
    }
}

/// Create `owner`'s associated account for `mint` unless it already exists
pub fn create_associated_token_account_idempotent(
    payer: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
) -> Instruction {
    spl_associated_token_account::instruction::create_associated_token_account_idempotent(
        payer,
        owner,
        mint,
        &spl_token::ID,
    )
}

pub fn unpack_mint(data: &[u8]) -> Result<Mint, ProgramError> {
    Mint::unpack(data)
}

pub fn unpack_token_account(data: &[u8]) -> Result<Account, ProgramError> {
    Account::unpack(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::program_option::COption;
    use spl_token::state::AccountState;

    #[test]
    fn test_token_account_unpack() {
        let account = Account {
            mint: Pubkey::new_unique(),
            owner: Pubkey::new_unique(),
            amount: 1_500_000,
            state: AccountState::Initialized,
            ..Account::default()
        };
        let mut data = vec![0u8; TOKEN_ACCOUNT_LEN];
        Account::pack(account, &mut data).unwrap();

        let unpacked = unpack_token_account(&data).unwrap();
        assert_eq!(unpacked.amount, 1_500_000);
        assert_eq!(unpacked.owner, account.owner);
    }

    #[test]
    fn test_uninitialized_rejected() {
        assert!(unpack_mint(&[0u8; Mint::LEN]).is_err());
        assert!(unpack_token_account(&[0u8; 10]).is_err());

        let mint = Mint {
            mint_authority: COption::Some(Pubkey::new_unique()),
            supply: 10,
            decimals: 6,
            is_initialized: true,
            freeze_authority: COption::None,
        };
        let mut data = vec![0u8; Mint::LEN];
        Mint::pack(mint, &mut data).unwrap();
        assert_eq!(unpack_mint(&data).unwrap().decimals, 6);
    }

    #[test]
    fn test_transfer_checked_data() {
        let ix = transfer_checked(
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            25,
            6,
        )
        .unwrap();
        assert_eq!(ix.program_id, spl_token::ID);
        assert_eq!(parse_transfer_checked(&ix.data), Some((25, 6)));
        assert!(ix.accounts[3].is_signer);
    }

    #[test]
    fn test_other_token_instructions_ignored() {
        let ix = spl_token::instruction::transfer(
            &spl_token::ID,
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &[],
            25,
        )
        .unwrap();
        assert_eq!(parse_transfer_checked(&ix.data), None);
        assert_eq!(parse_transfer_checked(&[]), None);
    }

    #[test]
    fn test_create_targets_associated_account() {
        let payer = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let ix = create_associated_token_account_idempotent(&payer, &owner, &mint);
        assert_eq!(ix.program_id, spl_associated_token_account::ID);
        assert_eq!(ix.accounts[0].pubkey, payer);
        assert_eq!(ix.accounts[1].pubkey, associated_token_address(&owner, &mint));
    }
}
