//! Asset transfers out of a vault
//!
//! Native lamport transfers, the SPL token pieces a vault needs to move
//! fungible tokens (associated accounts and checked transfers) and exact
//! UI amount conversion.

pub mod amount;
pub mod native;
pub mod spl;

pub use amount::{format_ui_amount, parse_ui_amount, AmountError, NATIVE_DECIMALS};
pub use spl::{
    associated_token_address, create_associated_token_account_idempotent, transfer_checked,
    unpack_mint, unpack_token_account, TOKEN_ACCOUNT_LEN,
};
