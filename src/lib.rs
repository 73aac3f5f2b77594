//! Squads Orchestrator: the proposal lifecycle of Squads v4 multisig vaults
//!
//! This crate drives a multisig vault on a Solana cluster from the client
//! side:
//! - Multisig creation with validated members and threshold
//! - Proposals for SOL and SPL token transfers with monotonic indices
//! - Activation and single-vote-per-member approval tracking
//! - Exactly-once execution with a vault funding check
//! - Status queries that reflect the ledger's view
//! - A typed error taxonomy (validation, transport, ledger, parse)
//!
//! # Example
//!
//! ```ignore
//! use squads_orchestrator::config::{LedgerContext, RpcConfig};
//! use squads_orchestrator::multisig::TransferIntent;
//!
//! let ctx = LedgerContext::from_config(&RpcConfig::default()).await?;
//!
//! let created = ctx.registry().create(&alice, &[alice_key, bob_key], 2, Some("ops")).await?;
//! let proposed = ctx
//!     .proposals()
//!     .propose(&alice, &created.multisig_address, &TransferIntent::native(dest, 1_000_000), None, None)
//!     .await?;
//!
//! let report = ctx.status().status(&created.multisig_address, proposed.transaction_index).await?;
//! println!("Proposal {} is {}", report.transaction_index, report.status);
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod ledger;
pub mod multisig;
pub mod squads;
pub mod token;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use config::{ConfigStore, LedgerContext, RpcConfig, RpcPreset};
pub use crypto::{InlineKeyProvider, KeyProvider, LocalKeyProvider};
pub use ledger::{ClientFailure, LedgerClient, RpcLedgerClient};
pub use multisig::{
    ApprovalTracker, ErrorCategory, ExecutionGate, LedgerError, MultisigRegistry,
    OrchestratorError, ProposalBuilder, ProposalReport, ProposalStatus, StatusQuery,
    TransferIntent, ValidationError, VoteDecision,
};
