//! Requests and results of the orchestrator operations

use crate::multisig::error::ValidationError;
use crate::squads::ProposalStatusState;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::fmt;

/// What a proposal asks the vault to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferIntent {
    /// Move lamports out of the vault
    Native { to: Pubkey, lamports: u64 },
    /// Move tokens from the vault's associated token account to the
    /// recipient's associated token account
    Token {
        mint: Pubkey,
        to: Pubkey,
        amount: u64,
        /// Read from the mint when omitted
        decimals: Option<u8>,
        create_destination_if_missing: bool,
    },
}

impl TransferIntent {
    pub fn native(to: Pubkey, lamports: u64) -> Self {
        Self::Native { to, lamports }
    }

    pub fn token(mint: Pubkey, to: Pubkey, amount: u64) -> Self {
        Self::Token {
            mint,
            to,
            amount,
            decimals: None,
            create_destination_if_missing: false,
        }
    }

    /// Raw amount in base units
    pub fn amount(&self) -> u64 {
        match self {
            Self::Native { lamports, .. } => *lamports,
            Self::Token { amount, .. } => *amount,
        }
    }

    pub fn recipient(&self) -> &Pubkey {
        match self {
            Self::Native { to, .. } | Self::Token { to, .. } => to,
        }
    }

    /// Checks that need no ledger state
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.amount() == 0 {
            return Err(ValidationError::NonPositiveAmount);
        }
        Ok(())
    }
}

/// Decision of a single vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDecision {
    Approve,
    Reject,
}

impl fmt::Display for VoteDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => f.write_str("approve"),
            Self::Reject => f.write_str("reject"),
        }
    }
}

/// Lifecycle status of a proposal as reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProposalStatus {
    Draft,
    Active,
    Approved,
    Rejected,
    Executed,
    Cancelled,
    /// Superseded by a configuration change before it was approved
    Stale,
}

impl ProposalStatus {
    /// Map the stored status, taking the multisig's stale boundary into account
    pub fn from_ledger(
        status: &ProposalStatusState,
        transaction_index: u64,
        stale_transaction_index: u64,
    ) -> Self {
        let stale = transaction_index <= stale_transaction_index;
        match status {
            ProposalStatusState::Draft { .. } if stale => Self::Stale,
            ProposalStatusState::Active { .. } if stale => Self::Stale,
            ProposalStatusState::Draft { .. } => Self::Draft,
            ProposalStatusState::Active { .. } => Self::Active,
            ProposalStatusState::Approved { .. } | ProposalStatusState::Executing => {
                Self::Approved
            }
            ProposalStatusState::Rejected { .. } => Self::Rejected,
            ProposalStatusState::Executed { .. } => Self::Executed,
            ProposalStatusState::Cancelled { .. } => Self::Cancelled,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Rejected | Self::Executed | Self::Cancelled | Self::Stale
        )
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of creating a multisig
#[derive(Clone)]
pub struct CreatedMultisig {
    pub multisig_address: Pubkey,
    pub vault_address: Pubkey,
    pub create_key: Pubkey,
    /// Base58 of the one-time create keypair. Shown once; the caller must
    /// store it.
    pub create_key_private: String,
    pub signature: Signature,
}

impl fmt::Debug for CreatedMultisig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatedMultisig")
            .field("multisig_address", &self.multisig_address)
            .field("vault_address", &self.vault_address)
            .field("create_key", &self.create_key)
            .field("create_key_private", &"<redacted>")
            .field("signature", &self.signature)
            .finish()
    }
}

/// Result of proposing a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedTransfer {
    pub transaction_index: u64,
    pub vault_transaction_address: Pubkey,
    pub proposal_address: Pubkey,
    pub signature: Signature,
}

/// Consolidated view of one proposal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalReport {
    pub multisig_address: Pubkey,
    pub proposal_address: Pubkey,
    pub transaction_index: u64,
    pub status: ProposalStatus,
    pub approved_count: usize,
    pub rejected_count: usize,
    pub threshold: u16,
    pub approved: Vec<Pubkey>,
    pub rejected: Vec<Pubkey>,
    /// When the stored status last changed
    pub status_changed_at: Option<DateTime<Utc>>,
}

impl ProposalReport {
    /// Approvals still needed before execution is possible
    pub fn approvals_missing(&self) -> usize {
        usize::from(self.threshold).saturating_sub(self.approved_count)
    }
}

pub(crate) fn timestamp_to_utc(timestamp: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(timestamp, 0).single()
}
