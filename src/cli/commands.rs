//! CLI commands for the multisig orchestrator
//!
//! Implements all command handlers for the CLI interface.

use crate::config::{ConfigStore, LedgerContext, RpcConfig, RpcPreset};
use crate::crypto::{LocalKeyProvider, KeyProvider};
use crate::multisig::{ProposalStatus, ProposedTransfer, TransferIntent, VoteDecision};
use crate::token::{format_ui_amount, parse_ui_amount, unpack_mint, NATIVE_DECIMALS};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use std::path::PathBuf;
use std::str::FromStr;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Application state
pub struct AppState {
    pub store: ConfigStore,
    pub data_dir: PathBuf,
}

impl AppState {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            store: ConfigStore::new(&data_dir),
            data_dir,
        }
    }

    /// Connect to the configured endpoint
    pub async fn connect(&self) -> CliResult<LedgerContext> {
        let config = self.store.load()?;
        let endpoint = config.resolve_endpoint()?;
        println!("🔌 Connecting to {}...", endpoint);
        Ok(LedgerContext::from_config(&config).await?)
    }
}

fn load_key(material: &str) -> CliResult<Keypair> {
    Ok(LocalKeyProvider.load(material)?)
}

fn parse_pubkey(what: &str, value: &str) -> CliResult<Pubkey> {
    Pubkey::from_str(value.trim()).map_err(|e| format!("Invalid {} '{}': {}", what, value, e).into())
}

// ============================================================================
// Configuration
// ============================================================================

/// Show the persisted endpoint selection
pub fn cmd_config_show(state: &AppState) -> CliResult<()> {
    let config = state.store.load()?;

    println!("⚙️  RPC configuration");
    println!("   📁 File: {:?}", state.store.path());
    println!("   🌐 Preset: {:?}", config.preset);
    match config.resolve_endpoint() {
        Ok(endpoint) => println!("   🔗 Endpoint: {}", endpoint),
        Err(e) => println!("   ⚠️  {}", e),
    }
    Ok(())
}

/// Select an endpoint and persist it
pub fn cmd_config_set(state: &AppState, preset: RpcPreset, url: Option<&str>) -> CliResult<()> {
    let config = match (preset, url) {
        (RpcPreset::Custom, Some(url)) => RpcConfig::custom(url)?,
        (RpcPreset::Custom, None) => return Err("A custom preset needs --url".into()),
        (preset, _) => RpcConfig::preset(preset),
    };
    state.store.save(&config)?;

    println!("✅ RPC configuration saved!");
    println!("   🔗 Endpoint: {}", config.resolve_endpoint()?);
    Ok(())
}

/// Probe the configured endpoint
pub async fn cmd_config_check(state: &AppState) -> CliResult<()> {
    let ctx = state.connect().await?;

    println!("✅ Endpoint reachable!");
    println!("   🔗 Endpoint: {}", ctx.endpoint());
    println!("   🧩 Node version: {}", ctx.node_version());
    Ok(())
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Create a multisig
pub async fn cmd_create(
    ctx: &LedgerContext,
    creator: &str,
    members: &[String],
    threshold: u16,
    label: Option<&str>,
) -> CliResult<()> {
    let creator = load_key(creator)?;
    let members = members
        .iter()
        .map(|m| parse_pubkey("member", m))
        .collect::<CliResult<Vec<_>>>()?;

    let created = ctx
        .registry()
        .create(&creator, &members, threshold, label)
        .await?;

    println!("🔐 Multisig created!");
    println!("   📍 Address: {}", created.multisig_address);
    println!("   🏦 Vault: {}", created.vault_address);
    println!("   👥 Threshold: {}-of-{}", threshold, members.len());
    if let Some(l) = label {
        println!("   🏷️  Label: {}", l);
    }
    println!("   🔑 Create key: {}", created.create_key);
    println!("   🧾 Signature: {}", created.signature);
    println!();
    println!("⚠️  Create key secret (shown once, store it safely):");
    println!("   {}", created.create_key_private);
    Ok(())
}

fn print_proposed(proposed: &ProposedTransfer) {
    println!("📝 Proposal created!");
    println!("   🔢 Transaction index: {}", proposed.transaction_index);
    println!("   📄 Vault transaction: {}", proposed.vault_transaction_address);
    println!("   🗳️  Proposal: {}", proposed.proposal_address);
    println!("   🧾 Signature: {}", proposed.signature);
    println!("   Next: activate it, then collect approvals");
}

/// Propose a SOL transfer; `amount` is in SOL
#[allow(clippy::too_many_arguments)]
pub async fn cmd_propose_sol(
    ctx: &LedgerContext,
    member: &str,
    multisig: &str,
    to: &str,
    amount: &str,
    vault_index: Option<u8>,
    transaction_index: Option<u64>,
) -> CliResult<ProposedTransfer> {
    let member = load_key(member)?;
    let multisig = parse_pubkey("multisig", multisig)?;
    let to = parse_pubkey("recipient", to)?;
    let lamports = parse_ui_amount(amount, NATIVE_DECIMALS)?;

    println!("💸 Proposing {} SOL to {}", format_ui_amount(lamports, NATIVE_DECIMALS), to);
    let proposed = ctx
        .proposals()
        .propose(
            &member,
            &multisig,
            &TransferIntent::native(to, lamports),
            vault_index,
            transaction_index,
        )
        .await?;
    print_proposed(&proposed);
    Ok(proposed)
}

/// Propose a token transfer; `amount` is in token units
#[allow(clippy::too_many_arguments)]
pub async fn cmd_propose_token(
    ctx: &LedgerContext,
    member: &str,
    multisig: &str,
    mint: &str,
    to: &str,
    amount: &str,
    decimals: Option<u8>,
    create_destination: bool,
    vault_index: Option<u8>,
    transaction_index: Option<u64>,
) -> CliResult<ProposedTransfer> {
    let member = load_key(member)?;
    let multisig = parse_pubkey("multisig", multisig)?;
    let mint = parse_pubkey("mint", mint)?;
    let to = parse_pubkey("recipient", to)?;

    // UI units need the mint's decimals to become base units
    let decimals = match decimals {
        Some(d) => d,
        None => {
            let account = ctx
                .read_account(&mint)
                .await?
                .ok_or_else(|| format!("Mint {} not found", mint))?;
            unpack_mint(&account.data)?.decimals
        }
    };
    let amount = parse_ui_amount(amount, decimals)?;

    println!(
        "🪙 Proposing {} of {} to {}",
        format_ui_amount(amount, decimals),
        mint,
        to
    );
    let intent = TransferIntent::Token {
        mint,
        to,
        amount,
        decimals: Some(decimals),
        create_destination_if_missing: create_destination,
    };
    let proposed = ctx
        .proposals()
        .propose(&member, &multisig, &intent, vault_index, transaction_index)
        .await?;
    print_proposed(&proposed);
    Ok(proposed)
}

/// Open a draft proposal for voting
pub async fn cmd_activate(ctx: &LedgerContext, member: &str, multisig: &str, index: u64) -> CliResult<()> {
    let member = load_key(member)?;
    let multisig = parse_pubkey("multisig", multisig)?;

    let signature = ctx.approvals().activate(&member, &multisig, index).await?;
    println!("🟢 Proposal {} activated", index);
    println!("   🧾 Signature: {}", signature);
    Ok(())
}

/// Approve or reject a proposal
pub async fn cmd_vote(
    ctx: &LedgerContext,
    member: &str,
    multisig: &str,
    index: u64,
    decision: VoteDecision,
) -> CliResult<()> {
    let member = load_key(member)?;
    let multisig = parse_pubkey("multisig", multisig)?;

    let signature = ctx
        .approvals()
        .vote(&member, &multisig, index, decision)
        .await?;
    let icon = match decision {
        VoteDecision::Approve => "👍",
        VoteDecision::Reject => "👎",
    };
    println!("{} Voted {} on proposal {}", icon, decision, index);
    println!("   🧾 Signature: {}", signature);

    // the ledger decides the resulting status
    cmd_status(ctx, &multisig.to_string(), index).await
}

/// Execute an approved proposal
pub async fn cmd_execute(
    ctx: &LedgerContext,
    member: &str,
    multisig: &str,
    index: u64,
    vault_index: Option<u8>,
) -> CliResult<()> {
    let member = load_key(member)?;
    let multisig = parse_pubkey("multisig", multisig)?;

    let signature = ctx
        .execution()
        .execute(&member, &multisig, index, vault_index)
        .await?;
    println!("🚀 Proposal {} executed!", index);
    println!("   🧾 Signature: {}", signature);
    Ok(())
}

/// Show the status of a proposal
pub async fn cmd_status(ctx: &LedgerContext, multisig: &str, index: u64) -> CliResult<()> {
    let multisig = parse_pubkey("multisig", multisig)?;
    let report = ctx.status().status(&multisig, index).await?;

    let icon = match report.status {
        ProposalStatus::Draft => "📝",
        ProposalStatus::Active => "🗳️ ",
        ProposalStatus::Approved => "✅",
        ProposalStatus::Rejected => "❌",
        ProposalStatus::Executed => "🚀",
        ProposalStatus::Cancelled | ProposalStatus::Stale => "⏹️ ",
    };
    println!("{} Proposal {}: {}", icon, report.transaction_index, report.status);
    println!("   🗳️  Address: {}", report.proposal_address);
    println!(
        "   👍 Approved: {}/{}",
        report.approved_count, report.threshold
    );
    println!("   👎 Rejected: {}", report.rejected_count);
    if let Some(at) = report.status_changed_at {
        println!("   🕒 Since: {}", at.to_rfc3339());
    }
    match report.status {
        ProposalStatus::Draft => println!("   Next: activate the proposal"),
        ProposalStatus::Active => println!(
            "   Next: {} more approval(s) needed",
            report.approvals_missing()
        ),
        ProposalStatus::Approved => println!("   Next: execute the proposal"),
        _ => {}
    }
    Ok(())
}
