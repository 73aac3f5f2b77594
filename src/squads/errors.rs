//! Custom error codes raised by the multisig program and the Anchor framework

/// Anchor custom program error codes relevant to this client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramErrorCode {
    // System program
    AccountAlreadyInUse,
    ResultWithNegativeLamports,
    // Anchor framework
    ConstraintSeeds,
    AccountNotSigner,
    AccountNotInitialized,
    AccountDidNotDeserialize,
    // Squads v4
    DuplicateMember,
    EmptyMembers,
    TooManyMembers,
    InvalidThreshold,
    Unauthorized,
    NotAMember,
    InvalidTransactionMessage,
    StaleProposal,
    InvalidProposalStatus,
    InvalidTransactionIndex,
    AlreadyApproved,
    AlreadyRejected,
    AlreadyCancelled,
    InvalidNumberOfAccounts,
    InvalidAccount,
    RemoveLastMember,
    NoVoters,
    NoProposers,
    NoExecutors,
    InvalidStaleTransactionIndex,
    NotSupportedForControlled,
    TimeLockNotReleased,
    NoActions,
    MissingAccount,
    InvalidMint,
    InvalidDestination,
    SpendingLimitExceeded,
    DecimalsMismatch,
    UnknownPermission,
    ProtectedAccount,
    TimeLockExceedsMaxAllowed,
    IllegalAccountOwner,
    RentReclamationDisabled,
    InvalidRentCollector,
    ProposalForAnotherMultisig,
    TransactionForAnotherMultisig,
    TransactionNotMatchingProposal,
    TransactionNotLastInBatch,
    BatchNotEmpty,
    SpendingLimitInvalidAmount,
}

const SQUADS_ERRORS: [ProgramErrorCode; 40] = [
    ProgramErrorCode::DuplicateMember,
    ProgramErrorCode::EmptyMembers,
    ProgramErrorCode::TooManyMembers,
    ProgramErrorCode::InvalidThreshold,
    ProgramErrorCode::Unauthorized,
    ProgramErrorCode::NotAMember,
    ProgramErrorCode::InvalidTransactionMessage,
    ProgramErrorCode::StaleProposal,
    ProgramErrorCode::InvalidProposalStatus,
    ProgramErrorCode::InvalidTransactionIndex,
    ProgramErrorCode::AlreadyApproved,
    ProgramErrorCode::AlreadyRejected,
    ProgramErrorCode::AlreadyCancelled,
    ProgramErrorCode::InvalidNumberOfAccounts,
    ProgramErrorCode::InvalidAccount,
    ProgramErrorCode::RemoveLastMember,
    ProgramErrorCode::NoVoters,
    ProgramErrorCode::NoProposers,
    ProgramErrorCode::NoExecutors,
    ProgramErrorCode::InvalidStaleTransactionIndex,
    ProgramErrorCode::NotSupportedForControlled,
    ProgramErrorCode::TimeLockNotReleased,
    ProgramErrorCode::NoActions,
    ProgramErrorCode::MissingAccount,
    ProgramErrorCode::InvalidMint,
    ProgramErrorCode::InvalidDestination,
    ProgramErrorCode::SpendingLimitExceeded,
    ProgramErrorCode::DecimalsMismatch,
    ProgramErrorCode::UnknownPermission,
    ProgramErrorCode::ProtectedAccount,
    ProgramErrorCode::TimeLockExceedsMaxAllowed,
    ProgramErrorCode::IllegalAccountOwner,
    ProgramErrorCode::RentReclamationDisabled,
    ProgramErrorCode::InvalidRentCollector,
    ProgramErrorCode::ProposalForAnotherMultisig,
    ProgramErrorCode::TransactionForAnotherMultisig,
    ProgramErrorCode::TransactionNotMatchingProposal,
    ProgramErrorCode::TransactionNotLastInBatch,
    ProgramErrorCode::BatchNotEmpty,
    ProgramErrorCode::SpendingLimitInvalidAmount,
];

/// First custom error code of Anchor programs
pub const ERROR_CODE_OFFSET: u32 = 6000;

impl ProgramErrorCode {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::AccountAlreadyInUse),
            1 => Some(Self::ResultWithNegativeLamports),
            2006 => Some(Self::ConstraintSeeds),
            3003 => Some(Self::AccountDidNotDeserialize),
            3010 => Some(Self::AccountNotSigner),
            3012 => Some(Self::AccountNotInitialized),
            c if c >= ERROR_CODE_OFFSET => SQUADS_ERRORS
                .get((c - ERROR_CODE_OFFSET) as usize)
                .copied(),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::AccountAlreadyInUse => 0,
            Self::ResultWithNegativeLamports => 1,
            Self::ConstraintSeeds => 2006,
            Self::AccountDidNotDeserialize => 3003,
            Self::AccountNotSigner => 3010,
            Self::AccountNotInitialized => 3012,
            other => {
                let pos = SQUADS_ERRORS.iter().position(|e| *e == other).unwrap_or(0);
                ERROR_CODE_OFFSET + pos as u32
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(
            ProgramErrorCode::from_code(6008),
            Some(ProgramErrorCode::InvalidProposalStatus)
        );
        assert_eq!(
            ProgramErrorCode::from_code(6010),
            Some(ProgramErrorCode::AlreadyApproved)
        );
        assert_eq!(ProgramErrorCode::from_code(2006), Some(ProgramErrorCode::ConstraintSeeds));
        assert_eq!(ProgramErrorCode::from_code(9999), None);
        assert_eq!(ProgramErrorCode::from_code(42), None);
    }

    #[test]
    fn test_code_is_inverse() {
        for code in [0, 1, 2006, 3003, 3010, 3012, 6000, 6021, 6039] {
            assert_eq!(ProgramErrorCode::from_code(code).unwrap().code(), code);
        }
    }
}
