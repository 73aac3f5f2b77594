//! Error taxonomy of the orchestrator
//!
//! Every ledger failure is classified here, once, per operation: the same
//! program error code means different things to different calls (an
//! `InvalidProposalStatus` is "already active" to activation but "not
//! approved" to execution).

use crate::ledger::ClientFailure;
use crate::squads::ProgramErrorCode;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::TransactionError;
use std::fmt;
use thiserror::Error;

/// Coarse error class reported to bridge callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Validation,
    Transport,
    Ledger,
    Parse,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::Transport => "transport",
            Self::Ledger => "ledger",
            Self::Parse => "parse",
        };
        f.write_str(name)
    }
}

/// Problems detected locally, before any transaction is submitted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("A multisig needs at least 2 members, got {0}")]
    TooFewMembers(usize),
    #[error("Threshold {threshold} must be between 1 and {members}")]
    InvalidThreshold { threshold: u16, members: usize },
    #[error("Duplicate member: {0}")]
    DuplicateMember(Pubkey),
    #[error("Transfer amount must be greater than zero")]
    NonPositiveAmount,
    #[error("Insufficient funds in {account}: need {required}, have {available}")]
    InsufficientVaultFunds {
        account: Pubkey,
        required: u64,
        available: u64,
    },
    #[error("Destination token account {0} does not exist")]
    DestinationAccountMissing(Pubkey),
    #[error("Decimals mismatch: mint uses {expected}, got {given}")]
    DecimalsMismatch { expected: u8, given: u8 },
    #[error("Vault index mismatch: transaction uses vault {stored}, got {given}")]
    VaultIndexMismatch { stored: u8, given: u8 },
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// Program-level rejections and ledger state conflicts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Transaction index {0} conflicts with the ledger; re-read the index and retry")]
    IndexConflict(u64),
    #[error("Proposal is already active")]
    AlreadyActive,
    #[error("Member has already voted on this proposal")]
    DuplicateVote,
    #[error("Proposal is not active")]
    NotActive,
    #[error("Proposal is not approved")]
    NotApproved,
    #[error("Proposal has already been executed")]
    AlreadyExecuted,
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Signer is not a member of the multisig")]
    NotAMember,
    #[error("Member lacks the permission for this action")]
    Unauthorized,
    #[error("Proposal is stale")]
    StaleProposal,
    #[error("Time lock has not been released")]
    TimeLockActive,
    #[error("Rejected by the ledger: {reason}")]
    Rejected { code: Option<u32>, reason: String },
}

/// Any failure of an orchestrator operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Parse error: {0}")]
    Parse(String),
}

impl OrchestratorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Transport(_) => ErrorCategory::Transport,
            Self::Ledger(_) => ErrorCategory::Ledger,
            Self::Parse(_) => ErrorCategory::Parse,
        }
    }

    /// Whether re-reading ledger state and calling again can succeed
    /// without changing the request's intent
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Ledger(LedgerError::IndexConflict(_)))
    }

    pub fn ledger(&self) -> Option<&LedgerError> {
        match self {
            Self::Ledger(err) => Some(err),
            _ => None,
        }
    }

    pub(crate) fn encoding(err: impl fmt::Display) -> Self {
        Self::Parse(format!("failed to encode instruction: {}", err))
    }
}

/// Operation a ledger failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    CreateMultisig,
    Propose { transaction_index: u64 },
    Activate,
    Vote,
    Execute,
}

/// Map a client failure into the orchestrator taxonomy
pub fn classify(operation: Operation, failure: ClientFailure) -> OrchestratorError {
    let err = match failure {
        ClientFailure::Transport(message) => OrchestratorError::Transport(message),
        ClientFailure::Malformed(message) => OrchestratorError::Parse(message),
        ClientFailure::Signing(message) => ValidationError::InvalidKey(message).into(),
        ClientFailure::Rejected(err) => classify_rejection(operation, &err).into(),
    };
    if operation != Operation::Read {
        log::warn!("{:?} failed: {}", operation, err);
    }
    err
}

fn classify_rejection(operation: Operation, err: &TransactionError) -> LedgerError {
    use solana_sdk::instruction::InstructionError;

    match err {
        TransactionError::InsufficientFundsForFee => {
            LedgerError::InsufficientFunds("fee payer cannot cover the transaction fee".into())
        }
        TransactionError::InsufficientFundsForRent { account_index } => {
            LedgerError::InsufficientFunds(format!(
                "account #{} would fall below the rent-exempt minimum",
                account_index
            ))
        }
        TransactionError::AccountNotFound => {
            LedgerError::InsufficientFunds("fee payer account does not exist".into())
        }
        TransactionError::InstructionError(_, InstructionError::Custom(code)) => {
            classify_code(operation, *code)
        }
        other => LedgerError::Rejected {
            code: None,
            reason: other.to_string(),
        },
    }
}

fn classify_code(operation: Operation, code: u32) -> LedgerError {
    use ProgramErrorCode as C;

    match (operation, ProgramErrorCode::from_code(code)) {
        // The address derived from a used or skipped index does not match
        (
            Operation::Propose { transaction_index },
            Some(C::ConstraintSeeds | C::AccountAlreadyInUse | C::InvalidTransactionIndex),
        ) => LedgerError::IndexConflict(transaction_index),
        (Operation::Activate, Some(C::InvalidProposalStatus)) => LedgerError::AlreadyActive,
        (Operation::Vote, Some(C::InvalidProposalStatus)) => LedgerError::NotActive,
        (Operation::Vote, Some(C::AlreadyApproved | C::AlreadyRejected)) => {
            LedgerError::DuplicateVote
        }
        (Operation::Execute, Some(C::InvalidProposalStatus)) => LedgerError::NotApproved,
        // system and token programs both use 1 for a short balance
        (_, Some(C::ResultWithNegativeLamports)) => {
            LedgerError::InsufficientFunds("payer balance too low".into())
        }
        (_, Some(C::AccountNotInitialized)) => {
            LedgerError::NotFound("account is not initialized".into())
        }
        (_, Some(C::NotAMember)) => LedgerError::NotAMember,
        (_, Some(C::Unauthorized)) => LedgerError::Unauthorized,
        (_, Some(C::StaleProposal)) => LedgerError::StaleProposal,
        (_, Some(C::TimeLockNotReleased)) => LedgerError::TimeLockActive,
        (_, Some(other)) => LedgerError::Rejected {
            code: Some(code),
            reason: format!("{:?}", other),
        },
        (_, None) => LedgerError::Rejected {
            code: Some(code),
            reason: format!("custom program error {:#x}", code),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::instruction::InstructionError;

    fn custom(code: u32) -> ClientFailure {
        ClientFailure::Rejected(TransactionError::InstructionError(
            0,
            InstructionError::Custom(code),
        ))
    }

    #[test]
    fn test_same_code_depends_on_operation() {
        let status = ProgramErrorCode::InvalidProposalStatus.code();
        assert_eq!(
            classify(Operation::Activate, custom(status)),
            OrchestratorError::Ledger(LedgerError::AlreadyActive)
        );
        assert_eq!(
            classify(Operation::Vote, custom(status)),
            OrchestratorError::Ledger(LedgerError::NotActive)
        );
        assert_eq!(
            classify(Operation::Execute, custom(status)),
            OrchestratorError::Ledger(LedgerError::NotApproved)
        );
    }

    #[test]
    fn test_index_conflict_is_retryable() {
        let op = Operation::Propose {
            transaction_index: 4,
        };
        let err = classify(op, custom(ProgramErrorCode::ConstraintSeeds.code()));
        assert_eq!(err, OrchestratorError::Ledger(LedgerError::IndexConflict(4)));
        assert!(err.is_retryable());
        assert_eq!(err.category(), ErrorCategory::Ledger);

        let err = classify(op, custom(0));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_duplicate_vote_codes() {
        for code in [ProgramErrorCode::AlreadyApproved, ProgramErrorCode::AlreadyRejected] {
            assert_eq!(
                classify(Operation::Vote, custom(code.code())),
                OrchestratorError::Ledger(LedgerError::DuplicateVote)
            );
        }
    }

    #[test]
    fn test_transaction_level_funds() {
        let err = classify(
            Operation::CreateMultisig,
            ClientFailure::Rejected(TransactionError::InsufficientFundsForFee),
        );
        assert!(matches!(
            err,
            OrchestratorError::Ledger(LedgerError::InsufficientFunds(_))
        ));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_unknown_code_is_kept() {
        let err = classify(Operation::Execute, custom(77));
        assert_eq!(
            err.ledger(),
            Some(&LedgerError::Rejected {
                code: Some(77),
                reason: "custom program error 0x4d".into()
            })
        );
    }

    #[test]
    fn test_transport_and_parse() {
        let err = classify(Operation::Read, ClientFailure::Transport("timeout".into()));
        assert_eq!(err.category(), ErrorCategory::Transport);
        assert!(!err.is_retryable());

        let err = classify(Operation::Read, ClientFailure::Malformed("bad json".into()));
        assert_eq!(err.category(), ErrorCategory::Parse);

        let err = classify(Operation::Vote, ClientFailure::Signing("missing".into()));
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_category_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ErrorCategory::Validation).unwrap(),
            "\"validation\""
        );
        assert_eq!(ErrorCategory::Ledger.to_string(), "ledger");
    }
}
