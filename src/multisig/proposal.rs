//! Proposal construction
//!
//! A proposal is created as one ledger transaction holding both the vault
//! transaction and its proposal, so neither can exist without the other.

use crate::config::LedgerContext;
use crate::crypto::short_id;
use crate::multisig::error::{
    classify, LedgerError, Operation, OrchestratorError, ValidationError,
};
use crate::multisig::types::{ProposedTransfer, TransferIntent};
use crate::squads::{self, instructions, MultisigState, VaultTransactionMessage};
use crate::token::native;
use crate::token::spl::{
    associated_token_address, create_associated_token_account_idempotent, transfer_checked,
    unpack_mint, unpack_token_account, TOKEN_ACCOUNT_LEN,
};
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};

/// Vault used when the caller does not pick one
pub const DEFAULT_VAULT_INDEX: u8 = 0;

pub(crate) fn require_funds(account: &Pubkey, required: u64, available: u64) -> Result<(), ValidationError> {
    if available < required {
        return Err(ValidationError::InsufficientVaultFunds {
            account: *account,
            required,
            available,
        });
    }
    Ok(())
}

/// Decimals to transfer with, given the mint's and the caller's
pub fn resolve_decimals(mint_decimals: u8, requested: Option<u8>) -> Result<u8, ValidationError> {
    match requested {
        Some(given) if given != mint_decimals => Err(ValidationError::DecimalsMismatch {
            expected: mint_decimals,
            given,
        }),
        _ => Ok(mint_decimals),
    }
}

/// Builds vault transactions and their proposals
pub struct ProposalBuilder<'a> {
    ctx: &'a LedgerContext,
}

impl<'a> ProposalBuilder<'a> {
    pub fn new(ctx: &'a LedgerContext) -> Self {
        Self { ctx }
    }

    /// Propose `intent` as a draft.
    ///
    /// Without `transaction_index` the next index is read from the ledger.
    /// An explicit index is passed through as is; if the ledger has already
    /// used it (or it skips ahead) the call fails with
    /// [`LedgerError::IndexConflict`] and nothing is retried.
    pub async fn propose(
        &self,
        member: &Keypair,
        multisig: &Pubkey,
        intent: &TransferIntent,
        vault_index: Option<u8>,
        transaction_index: Option<u64>,
    ) -> Result<ProposedTransfer, OrchestratorError> {
        intent.validate()?;

        let program_id = self.ctx.program_id();
        let vault_index = vault_index.unwrap_or(DEFAULT_VAULT_INDEX);
        let (vault, _) = squads::vault_pda(multisig, vault_index, &program_id);

        let state: MultisigState = self.ctx.fetch(multisig).await?;
        let transaction_index = match transaction_index {
            Some(index) => index,
            None => state.next_transaction_index().ok_or_else(|| LedgerError::Rejected {
                code: None,
                reason: "transaction index space exhausted".into(),
            })?,
        };

        let transfer = self.transfer_instructions(&vault, intent).await?;
        let message =
            VaultTransactionMessage::compile(&vault, &transfer).map_err(OrchestratorError::encoding)?;

        let (transaction, _) = squads::transaction_pda(multisig, transaction_index, &program_id);
        let (proposal, _) = squads::proposal_pda(multisig, transaction_index, &program_id);
        log::debug!(
            "Proposal {} uses vault transaction {} and vault {}",
            transaction_index,
            transaction,
            vault
        );

        let creator = member.pubkey();
        let ixs = [
            instructions::vault_transaction_create(
                &program_id,
                multisig,
                &transaction,
                &creator,
                vault_index,
                &message,
                None,
            )
            .map_err(OrchestratorError::encoding)?,
            instructions::proposal_create(
                &program_id,
                multisig,
                &proposal,
                &creator,
                transaction_index,
                true,
            )
            .map_err(OrchestratorError::encoding)?,
        ];

        let signature = self
            .ctx
            .client()
            .submit(&ixs, member, &[])
            .await
            .map_err(|e| classify(Operation::Propose { transaction_index }, e))?;

        log::info!(
            "Proposed transaction {} on {} by {}: {}",
            transaction_index,
            multisig,
            short_id(member),
            signature
        );

        Ok(ProposedTransfer {
            transaction_index,
            vault_transaction_address: transaction,
            proposal_address: proposal,
            signature,
        })
    }

    /// Instructions the vault will run, after checking it can pay for them
    async fn transfer_instructions(
        &self,
        vault: &Pubkey,
        intent: &TransferIntent,
    ) -> Result<Vec<Instruction>, OrchestratorError> {
        match intent {
            TransferIntent::Native { to, lamports } => {
                let (balance, reserve) = futures::try_join!(
                    self.ctx.balance(vault),
                    self.ctx.rent_exempt_minimum(0)
                )?;
                require_funds(vault, lamports.saturating_add(reserve), balance)?;
                Ok(vec![native::transfer(vault, to, *lamports)])
            }
            TransferIntent::Token {
                mint,
                to,
                amount,
                decimals,
                create_destination_if_missing,
            } => {
                let source = associated_token_address(vault, mint);
                let destination = associated_token_address(to, mint);
                let (mint_account, source_account, destination_account) = futures::try_join!(
                    self.ctx.read_account(mint),
                    self.ctx.read_account(&source),
                    self.ctx.read_account(&destination)
                )?;

                let mint_account = mint_account
                    .ok_or_else(|| LedgerError::NotFound(format!("mint {}", mint)))?;
                let mint_info = unpack_mint(&mint_account.data)
                    .map_err(|e| OrchestratorError::Parse(e.to_string()))?;
                let decimals = resolve_decimals(mint_info.decimals, *decimals)?;

                let available = match source_account {
                    Some(account) => {
                        unpack_token_account(&account.data)
                            .map_err(|e| OrchestratorError::Parse(e.to_string()))?
                            .amount
                    }
                    None => 0,
                };
                require_funds(&source, *amount, available)?;

                let mut ixs = Vec::with_capacity(2);
                if destination_account.is_none() {
                    if !create_destination_if_missing {
                        return Err(ValidationError::DestinationAccountMissing(destination).into());
                    }
                    let (balance, account_rent, reserve) = futures::try_join!(
                        self.ctx.balance(vault),
                        self.ctx.rent_exempt_minimum(TOKEN_ACCOUNT_LEN),
                        self.ctx.rent_exempt_minimum(0)
                    )?;
                    require_funds(vault, account_rent.saturating_add(reserve), balance)?;
                    ixs.push(create_associated_token_account_idempotent(vault, to, mint));
                }
                ixs.push(
                    transfer_checked(&source, mint, &destination, vault, *amount, decimals)
                        .map_err(|e| OrchestratorError::Parse(e.to_string()))?,
                );
                Ok(ixs)
            }
        }
    }
}
