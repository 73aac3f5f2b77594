//! Read-only proposal status

use crate::config::LedgerContext;
use crate::multisig::error::OrchestratorError;
use crate::multisig::types::{timestamp_to_utc, ProposalReport, ProposalStatus};
use crate::squads::{self, MultisigState, ProposalState};
use solana_sdk::pubkey::Pubkey;

/// Reads proposal status without submitting anything
pub struct StatusQuery<'a> {
    ctx: &'a LedgerContext,
}

impl<'a> StatusQuery<'a> {
    pub fn new(ctx: &'a LedgerContext) -> Self {
        Self { ctx }
    }

    /// Status and vote tally of the proposal at `transaction_index`.
    /// A proposal that was never created is [`LedgerError::NotFound`].
    ///
    /// [`LedgerError::NotFound`]: crate::multisig::LedgerError::NotFound
    pub async fn status(
        &self,
        multisig: &Pubkey,
        transaction_index: u64,
    ) -> Result<ProposalReport, OrchestratorError> {
        let (proposal_address, _) =
            squads::proposal_pda(multisig, transaction_index, &self.ctx.program_id());

        let (state, proposal): (MultisigState, ProposalState) = futures::try_join!(
            self.ctx.fetch(multisig),
            self.ctx.fetch(&proposal_address)
        )?;

        let status = ProposalStatus::from_ledger(
            &proposal.status,
            transaction_index,
            state.stale_transaction_index,
        );
        log::debug!(
            "Proposal {} of {} is {} ({} approved, {} rejected)",
            transaction_index,
            multisig,
            status,
            proposal.approved.len(),
            proposal.rejected.len()
        );

        Ok(ProposalReport {
            multisig_address: *multisig,
            proposal_address,
            transaction_index,
            status,
            approved_count: proposal.approved.len(),
            rejected_count: proposal.rejected.len(),
            threshold: state.threshold,
            status_changed_at: proposal.status.timestamp().and_then(timestamp_to_utc),
            approved: proposal.approved,
            rejected: proposal.rejected,
        })
    }
}
