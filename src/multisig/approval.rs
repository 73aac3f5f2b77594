//! Proposal activation and voting

use crate::config::LedgerContext;
use crate::crypto::short_id;
use crate::multisig::error::{classify, LedgerError, Operation, OrchestratorError};
use crate::multisig::types::VoteDecision;
use crate::squads::instructions::{self, ProposalVoteArgs};
use crate::squads::{self, ProposalState};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};

/// Moves proposals from draft to active and records votes
///
/// Status transitions (approved once enough approvals, rejected once
/// approval is out of reach) happen on the ledger; nothing here assumes
/// them. Read them back with the status query.
pub struct ApprovalTracker<'a> {
    ctx: &'a LedgerContext,
}

impl<'a> ApprovalTracker<'a> {
    pub fn new(ctx: &'a LedgerContext) -> Self {
        Self { ctx }
    }

    /// Open a draft proposal for voting.
    ///
    /// A second activation fails with [`LedgerError::AlreadyActive`], which
    /// callers can treat as informational.
    pub async fn activate(
        &self,
        member: &Keypair,
        multisig: &Pubkey,
        transaction_index: u64,
    ) -> Result<Signature, OrchestratorError> {
        let program_id = self.ctx.program_id();
        let (proposal, _) = squads::proposal_pda(multisig, transaction_index, &program_id);
        let ix = instructions::proposal_activate(&program_id, multisig, &member.pubkey(), &proposal);

        let signature = self
            .ctx
            .client()
            .submit(&[ix], member, &[])
            .await
            .map_err(|e| classify(Operation::Activate, e))?;

        log::info!(
            "Activated proposal {} on {} by {}: {}",
            transaction_index,
            multisig,
            short_id(member),
            signature
        );
        Ok(signature)
    }

    pub async fn approve(
        &self,
        member: &Keypair,
        multisig: &Pubkey,
        transaction_index: u64,
    ) -> Result<Signature, OrchestratorError> {
        self.vote(member, multisig, transaction_index, VoteDecision::Approve)
            .await
    }

    pub async fn reject(
        &self,
        member: &Keypair,
        multisig: &Pubkey,
        transaction_index: u64,
    ) -> Result<Signature, OrchestratorError> {
        self.vote(member, multisig, transaction_index, VoteDecision::Reject)
            .await
    }

    /// Cast a vote. Each member votes once per proposal: a second vote,
    /// with either decision, fails with [`LedgerError::DuplicateVote`]
    /// without being submitted.
    ///
    /// The check reads the proposal before submitting, so it only holds
    /// for sequential calls. When the same member votes concurrently, a
    /// repeated decision is still refused by the ledger and reported as
    /// [`LedgerError::DuplicateVote`], but opposite decisions can both
    /// land and the later one replaces the earlier.
    pub async fn vote(
        &self,
        member: &Keypair,
        multisig: &Pubkey,
        transaction_index: u64,
        decision: VoteDecision,
    ) -> Result<Signature, OrchestratorError> {
        let program_id = self.ctx.program_id();
        let (proposal_address, _) = squads::proposal_pda(multisig, transaction_index, &program_id);

        let proposal: ProposalState = self.ctx.fetch(&proposal_address).await?;
        if proposal.has_voted(&member.pubkey()) {
            log::warn!(
                "{} already voted on proposal {} of {}",
                short_id(member),
                transaction_index,
                multisig
            );
            return Err(LedgerError::DuplicateVote.into());
        }

        let args = ProposalVoteArgs::default();
        let member_key = member.pubkey();
        let ix = match decision {
            VoteDecision::Approve => {
                instructions::proposal_approve(&program_id, multisig, &member_key, &proposal_address, &args)
            }
            VoteDecision::Reject => {
                instructions::proposal_reject(&program_id, multisig, &member_key, &proposal_address, &args)
            }
        }
        .map_err(OrchestratorError::encoding)?;

        let signature = self
            .ctx
            .client()
            .submit(&[ix], member, &[])
            .await
            .map_err(|e| classify(Operation::Vote, e))?;

        log::info!(
            "{} voted {} on proposal {} of {}: {}",
            short_id(member),
            decision,
            transaction_index,
            multisig,
            signature
        );
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multisig::testkit::{Fixture, SOL};
    use crate::multisig::ProposalStatus;

    async fn active_proposal(fx: &Fixture) -> u64 {
        fx.fund_vault(SOL).await;
        let index = fx
            .propose_native(&Pubkey::new_unique(), SOL / 10)
            .await
            .transaction_index;
        fx.ctx
            .approvals()
            .activate(fx.member(0), &fx.multisig, index)
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_activate_twice() {
        let fx = Fixture::new(3, 2).await;
        let index = active_proposal(&fx).await;

        let err = fx
            .ctx
            .approvals()
            .activate(fx.member(1), &fx.multisig, index)
            .await
            .unwrap_err();
        assert_eq!(err, OrchestratorError::Ledger(LedgerError::AlreadyActive));
    }

    #[tokio::test]
    async fn test_vote_on_draft_is_not_active() {
        let fx = Fixture::new(3, 2).await;
        fx.fund_vault(SOL).await;
        let index = fx
            .propose_native(&Pubkey::new_unique(), SOL / 10)
            .await
            .transaction_index;

        let err = fx
            .ctx
            .approvals()
            .approve(fx.member(1), &fx.multisig, index)
            .await
            .unwrap_err();
        assert_eq!(err, OrchestratorError::Ledger(LedgerError::NotActive));
    }

    #[tokio::test]
    async fn test_duplicate_vote_same_and_opposite() {
        let fx = Fixture::new(3, 3).await;
        let index = active_proposal(&fx).await;
        fx.approve(0, index).await;
        let submitted = fx.ledger.submissions().await;

        let tracker = fx.ctx.approvals();
        for decision in [VoteDecision::Approve, VoteDecision::Reject] {
            let err = tracker
                .vote(fx.member(0), &fx.multisig, index, decision)
                .await
                .unwrap_err();
            assert_eq!(err, OrchestratorError::Ledger(LedgerError::DuplicateVote));
        }
        assert_eq!(fx.ledger.submissions().await, submitted);

        let report = fx.ctx.status().status(&fx.multisig, index).await.unwrap();
        assert_eq!(report.approved_count, 1);
        assert_eq!(report.rejected_count, 0);
    }

    #[tokio::test]
    async fn test_concurrent_opposite_votes_last_wins() {
        use crate::ledger::LedgerClient;

        let fx = Fixture::new(3, 2).await;
        let index = active_proposal(&fx).await;
        let program_id = fx.ctx.program_id();
        let (proposal, _) = squads::proposal_pda(&fx.multisig, index, &program_id);
        let member = fx.member(1);
        let args = ProposalVoteArgs::default();

        // Both calls passed the read before either was submitted
        let key = member.pubkey();
        let approve =
            instructions::proposal_approve(&program_id, &fx.multisig, &key, &proposal, &args).unwrap();
        let reject =
            instructions::proposal_reject(&program_id, &fx.multisig, &key, &proposal, &args).unwrap();
        fx.ledger.submit(&[approve.clone()], member, &[]).await.unwrap();
        fx.ledger.submit(&[reject], member, &[]).await.unwrap();

        let report = fx.ctx.status().status(&fx.multisig, index).await.unwrap();
        assert_eq!(report.approved_count, 0);
        assert_eq!(report.rejected_count, 1);

        // A repeated decision is refused by the ledger itself
        fx.ledger.submit(&[approve.clone()], member, &[]).await.unwrap();
        let failure = fx.ledger.submit(&[approve], member, &[]).await.unwrap_err();
        assert_eq!(
            classify(Operation::Vote, failure),
            OrchestratorError::Ledger(LedgerError::DuplicateVote)
        );
    }

    #[tokio::test]
    async fn test_threshold_reached() {
        let fx = Fixture::new(3, 2).await;
        let index = active_proposal(&fx).await;

        fx.approve(0, index).await;
        let report = fx.ctx.status().status(&fx.multisig, index).await.unwrap();
        assert_eq!(report.status, ProposalStatus::Active);

        fx.approve(2, index).await;
        let report = fx.ctx.status().status(&fx.multisig, index).await.unwrap();
        assert_eq!(report.status, ProposalStatus::Approved);

        // late votes land on a closed proposal
        let err = fx
            .ctx
            .approvals()
            .reject(fx.member(1), &fx.multisig, index)
            .await
            .unwrap_err();
        assert_eq!(err, OrchestratorError::Ledger(LedgerError::NotActive));
    }

    #[tokio::test]
    async fn test_rejection_cutoff() {
        // 5 members, threshold 3: approval is impossible after 3 rejections
        let fx = Fixture::new(5, 3).await;
        let index = active_proposal(&fx).await;

        fx.reject(0, index).await;
        fx.reject(1, index).await;
        let report = fx.ctx.status().status(&fx.multisig, index).await.unwrap();
        assert_eq!(report.status, ProposalStatus::Active);

        fx.reject(2, index).await;
        let report = fx.ctx.status().status(&fx.multisig, index).await.unwrap();
        assert_eq!(report.status, ProposalStatus::Rejected);
        assert_eq!(report.rejected_count, 3);
    }

    #[tokio::test]
    async fn test_vote_on_missing_proposal() {
        let fx = Fixture::new(2, 2).await;
        let err = fx
            .ctx
            .approvals()
            .approve(fx.member(0), &fx.multisig, 9)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Ledger(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_outsider_cannot_vote() {
        let fx = Fixture::new(2, 2).await;
        let index = active_proposal(&fx).await;
        let outsider = Keypair::new();
        fx.ledger.airdrop(&outsider.pubkey(), SOL).await;

        let err = fx
            .ctx
            .approvals()
            .approve(&outsider, &fx.multisig, index)
            .await
            .unwrap_err();
        assert_eq!(err, OrchestratorError::Ledger(LedgerError::NotAMember));
    }
}
