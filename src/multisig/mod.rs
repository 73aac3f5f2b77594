//! Multisig proposal lifecycle
//!
//! A transfer out of a multisig vault goes through four steps, each
//! handled by its own component over a shared [`LedgerContext`]:
//!
//! 1. [`MultisigRegistry`] creates the multisig and its default vault.
//! 2. [`ProposalBuilder`] records the transfer and a draft proposal at
//!    the next transaction index.
//! 3. [`ApprovalTracker`] activates the proposal and records votes until
//!    the ledger marks it approved or rejected.
//! 4. [`ExecutionGate`] executes an approved proposal, exactly once.
//!
//! [`StatusQuery`] reads where a proposal stands at any point.
//!
//! # Example
//!
//! ```ignore
//! use squads_orchestrator::multisig::TransferIntent;
//!
//! let created = ctx.registry().create(&alice, &[alice_key, bob_key, carol_key], 2, None).await?;
//! let proposed = ctx
//!     .proposals()
//!     .propose(&alice, &created.multisig_address, &TransferIntent::native(dest, 100_000_000), None, None)
//!     .await?;
//! let index = proposed.transaction_index;
//!
//! ctx.approvals().activate(&alice, &created.multisig_address, index).await?;
//! ctx.approvals().approve(&alice, &created.multisig_address, index).await?;
//! ctx.approvals().approve(&bob, &created.multisig_address, index).await?;
//! ctx.execution().execute(&carol, &created.multisig_address, index, None).await?;
//! ```
//!
//! [`LedgerContext`]: crate::config::LedgerContext

pub mod approval;
pub mod error;
pub mod execution;
pub mod proposal;
pub mod registry;
pub mod status;
#[cfg(any(test, feature = "testing"))]
pub mod testkit;
pub mod types;

pub use approval::ApprovalTracker;
pub use error::{ErrorCategory, LedgerError, Operation, OrchestratorError, ValidationError};
pub use execution::ExecutionGate;
pub use proposal::{ProposalBuilder, DEFAULT_VAULT_INDEX};
pub use registry::{validate_members, MultisigRegistry, MIN_MEMBERS};
pub use status::StatusQuery;
pub use types::{
    CreatedMultisig, ProposalReport, ProposalStatus, ProposedTransfer, TransferIntent,
    VoteDecision,
};
