//! Execution of approved proposals
//!
//! The ledger decides whether a proposal may execute. This gate only adds
//! a funding check before submitting and, when anything goes wrong,
//! re-reads the proposal so that a repeated execution is reported as
//! [`LedgerError::AlreadyExecuted`] rather than a generic failure.

use crate::config::LedgerContext;
use crate::crypto::short_id;
use crate::multisig::error::{classify, LedgerError, Operation, OrchestratorError, ValidationError};
use crate::squads::{self, instructions, ProposalState, ProposalStatusState, VaultTransactionState};
use crate::token::native;
use crate::token::spl::{self, TOKEN_ACCOUNT_LEN};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::system_program;
use std::collections::BTreeMap;

/// What a vault transaction takes out of the vault
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Outflows {
    /// Lamports leaving the vault, rent of created accounts included
    pub lamports: u64,
    /// Token amounts leaving each vault-owned token account
    pub tokens: BTreeMap<Pubkey, u64>,
    /// Accounts the transaction creates with the vault as payer
    pub created_accounts: Vec<Pubkey>,
}

/// Sum the transfers `transaction` makes out of `vault`
pub fn outflows(transaction: &VaultTransactionState, vault: &Pubkey) -> Result<Outflows, OrchestratorError> {
    let message = &transaction.message;
    let mut out = Outflows::default();

    for ix in &message.instructions {
        let (program_id, accounts) = message
            .resolve(ix)
            .map_err(|e| OrchestratorError::Parse(e.to_string()))?;

        if program_id == system_program::ID {
            if let Some(lamports) = native::parse_transfer(&ix.data) {
                if accounts.first() == Some(vault) {
                    out.lamports = out.lamports.saturating_add(lamports);
                }
            }
        } else if program_id == spl_token::ID {
            if let Some((amount, _)) = spl::parse_transfer_checked(&ix.data) {
                if accounts.get(3) == Some(vault) {
                    if let Some(source) = accounts.first() {
                        let total = out.tokens.entry(*source).or_insert(0);
                        *total = total.saturating_add(amount);
                    }
                }
            }
        } else if program_id == spl_associated_token_account::ID
            && accounts.first() == Some(vault)
        {
            if let Some(created) = accounts.get(1) {
                out.created_accounts.push(*created);
            }
        }
    }
    Ok(out)
}

/// Submits execution requests for approved proposals
pub struct ExecutionGate<'a> {
    ctx: &'a LedgerContext,
}

impl<'a> ExecutionGate<'a> {
    pub fn new(ctx: &'a LedgerContext) -> Self {
        Self { ctx }
    }

    /// Execute the vault transaction at `transaction_index`.
    ///
    /// Quorum is not checked here; the ledger accepts the request only for
    /// an approved proposal. Executing twice fails with
    /// [`LedgerError::AlreadyExecuted`] and moves no funds.
    pub async fn execute(
        &self,
        member: &Keypair,
        multisig: &Pubkey,
        transaction_index: u64,
        vault_index: Option<u8>,
    ) -> Result<Signature, OrchestratorError> {
        let program_id = self.ctx.program_id();
        let (proposal, _) = squads::proposal_pda(multisig, transaction_index, &program_id);
        let (transaction_address, _) = squads::transaction_pda(multisig, transaction_index, &program_id);

        let transaction: VaultTransactionState = self.ctx.fetch(&transaction_address).await?;
        if let Some(given) = vault_index {
            if given != transaction.vault_index {
                return Err(ValidationError::VaultIndexMismatch {
                    stored: transaction.vault_index,
                    given,
                }
                .into());
            }
        }
        let (vault, _) = squads::vault_pda(multisig, transaction.vault_index, &program_id);

        let result = match self.check_funding(&transaction, &vault).await {
            Ok(()) => self
                .submit(member, multisig, &proposal, &transaction_address, &transaction)
                .await,
            Err(err) => Err(err),
        };

        match result {
            Ok(signature) => {
                log::info!(
                    "Executed transaction {} on {} by {}: {}",
                    transaction_index,
                    multisig,
                    short_id(member),
                    signature
                );
                Ok(signature)
            }
            Err(err @ OrchestratorError::Ledger(_)) => Err(self.reconcile(&proposal, err).await),
            Err(err) => Err(err),
        }
    }

    async fn submit(
        &self,
        member: &Keypair,
        multisig: &Pubkey,
        proposal: &Pubkey,
        transaction_address: &Pubkey,
        transaction: &VaultTransactionState,
    ) -> Result<Signature, OrchestratorError> {
        let ix = instructions::vault_transaction_execute(
            &self.ctx.program_id(),
            multisig,
            proposal,
            transaction_address,
            &member.pubkey(),
            transaction.message.execution_accounts(),
        );
        self.ctx
            .client()
            .submit(&[ix], member, &[])
            .await
            .map_err(|e| classify(Operation::Execute, e))
    }

    /// The vault must cover every outflow and keep its rent reserve
    async fn check_funding(
        &self,
        transaction: &VaultTransactionState,
        vault: &Pubkey,
    ) -> Result<(), OrchestratorError> {
        let mut out = outflows(transaction, vault)?;

        for created in &out.created_accounts {
            if self.ctx.read_account(created).await?.is_none() {
                let rent = self.ctx.rent_exempt_minimum(TOKEN_ACCOUNT_LEN).await?;
                out.lamports = out.lamports.saturating_add(rent);
            }
        }

        if out.lamports > 0 {
            let (balance, reserve) = futures::try_join!(
                self.ctx.balance(vault),
                self.ctx.rent_exempt_minimum(0)
            )?;
            let required = out.lamports.saturating_add(reserve);
            if balance < required {
                return Err(LedgerError::InsufficientFunds(format!(
                    "vault {} holds {} lamports, execution needs {}",
                    vault, balance, required
                ))
                .into());
            }
        }

        for (source, amount) in &out.tokens {
            let available = match self.ctx.read_account(source).await? {
                Some(account) => {
                    spl::unpack_token_account(&account.data)
                        .map_err(|e| OrchestratorError::Parse(e.to_string()))?
                        .amount
                }
                None => 0,
            };
            if available < *amount {
                return Err(LedgerError::InsufficientFunds(format!(
                    "token account {} holds {}, execution needs {}",
                    source, available, amount
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Replace `err` with what the proposal's current status explains
    async fn reconcile(&self, proposal: &Pubkey, err: OrchestratorError) -> OrchestratorError {
        let state: ProposalState = match self.ctx.fetch(proposal).await {
            Ok(state) => state,
            Err(read_err) => {
                log::debug!("Could not re-read proposal {}: {}", proposal, read_err);
                return err;
            }
        };
        match state.status {
            ProposalStatusState::Executed { .. } => LedgerError::AlreadyExecuted.into(),
            ProposalStatusState::Approved { .. } | ProposalStatusState::Executing => err,
            _ => LedgerError::NotApproved.into(),
        }
    }
}
