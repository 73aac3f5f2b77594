//! Squads multisig CLI application
//!
//! A command-line interface for the multisig proposal lifecycle.

use clap::{Parser, Subcommand};
use squads_orchestrator::api::{create_router, ApiState};
use squads_orchestrator::cli::{self, AppState};
use squads_orchestrator::config::RpcPreset;
use squads_orchestrator::crypto::InlineKeyProvider;
use squads_orchestrator::multisig::VoteDecision;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "multisig")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Propose, approve and execute Squads multisig vault transfers", long_about = None)]
struct Cli {
    /// Data directory for the RPC configuration
    #[arg(short, long, default_value = ".multisig_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// RPC endpoint configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Create a multisig
    Create {
        /// Creator's key (base58 keypair, JSON byte array or keypair file)
        #[arg(short, long)]
        creator: String,

        /// Member public keys (comma-separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        members: Vec<String>,

        /// Approvals required to execute
        #[arg(short, long)]
        threshold: u16,

        /// Optional label
        #[arg(short, long)]
        label: Option<String>,
    },

    /// Propose a transfer out of the vault
    Propose {
        #[command(subcommand)]
        action: ProposeCommands,
    },

    /// Open a draft proposal for voting
    Activate {
        #[command(flatten)]
        target: ProposalTarget,
    },

    /// Approve a proposal
    Approve {
        #[command(flatten)]
        target: ProposalTarget,
    },

    /// Reject a proposal
    Reject {
        #[command(flatten)]
        target: ProposalTarget,
    },

    /// Execute an approved proposal
    Execute {
        #[command(flatten)]
        target: ProposalTarget,

        /// Vault the transaction was proposed against
        #[arg(long)]
        vault_index: Option<u8>,
    },

    /// Show the status of a proposal
    Status {
        /// Multisig address
        #[arg(short, long)]
        multisig: String,

        /// Transaction index
        #[arg(short, long)]
        index: u64,
    },

    /// REST API server
    Api {
        #[command(subcommand)]
        action: ApiCommands,
    },
}

#[derive(clap::Args)]
struct ProposalTarget {
    /// Member's key (base58 keypair, JSON byte array or keypair file)
    #[arg(short = 'k', long)]
    member: String,

    /// Multisig address
    #[arg(short, long)]
    multisig: String,

    /// Transaction index
    #[arg(short, long)]
    index: u64,
}

#[derive(clap::Args)]
struct ProposeArgs {
    /// Member's key (base58 keypair, JSON byte array or keypair file)
    #[arg(short = 'k', long)]
    member: String,

    /// Multisig address
    #[arg(short, long)]
    multisig: String,

    /// Recipient address
    #[arg(short, long)]
    to: String,

    /// Vault to spend from
    #[arg(long)]
    vault_index: Option<u8>,

    /// Explicit transaction index (defaults to the next one)
    #[arg(long)]
    transaction_index: Option<u64>,
}

#[derive(Subcommand)]
enum ProposeCommands {
    /// Transfer SOL
    Sol {
        #[command(flatten)]
        args: ProposeArgs,

        /// Amount in SOL
        #[arg(short, long)]
        amount: String,
    },

    /// Transfer SPL tokens
    Token {
        #[command(flatten)]
        args: ProposeArgs,

        /// Token mint
        #[arg(long)]
        mint: String,

        /// Amount in token units
        #[arg(short, long)]
        amount: String,

        /// Mint decimals (read from the mint when omitted)
        #[arg(long)]
        decimals: Option<u8>,

        /// Create the recipient's token account if it does not exist
        #[arg(long)]
        create_destination: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the configured endpoint
    Show,

    /// Select an endpoint
    Set {
        /// Endpoint preset
        #[arg(value_enum)]
        preset: RpcPreset,

        /// URL for the custom preset
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Check that the configured endpoint answers
    Check,
}

#[derive(Subcommand)]
enum ApiCommands {
    /// Start the REST API server
    Start {
        /// Port to listen on for REST API
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let state = AppState::new(cli.data_dir.clone());

    // Configuration commands that never touch the network
    match &cli.command {
        Commands::Config {
            action: ConfigCommands::Show,
        } => return cli::cmd_config_show(&state),
        Commands::Config {
            action: ConfigCommands::Set { preset, url },
        } => return cli::cmd_config_set(&state, *preset, url.as_deref()),
        _ => {}
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cli.command, &state))
}

async fn run(command: Commands, state: &AppState) -> Result<(), Box<dyn std::error::Error>> {
    if let Commands::Config { .. } = command {
        return cli::cmd_config_check(state).await;
    }

    let ctx = state.connect().await?;

    match command {
        Commands::Config { .. } => unreachable!(),

        Commands::Create {
            creator,
            members,
            threshold,
            label,
        } => {
            cli::cmd_create(&ctx, &creator, &members, threshold, label.as_deref()).await?;
        }

        Commands::Propose { action } => match action {
            ProposeCommands::Sol { args, amount } => {
                cli::cmd_propose_sol(
                    &ctx,
                    &args.member,
                    &args.multisig,
                    &args.to,
                    &amount,
                    args.vault_index,
                    args.transaction_index,
                )
                .await?;
            }
            ProposeCommands::Token {
                args,
                mint,
                amount,
                decimals,
                create_destination,
            } => {
                cli::cmd_propose_token(
                    &ctx,
                    &args.member,
                    &args.multisig,
                    &mint,
                    &args.to,
                    &amount,
                    decimals,
                    create_destination,
                    args.vault_index,
                    args.transaction_index,
                )
                .await?;
            }
        },

        Commands::Activate { target } => {
            cli::cmd_activate(&ctx, &target.member, &target.multisig, target.index).await?;
        }

        Commands::Approve { target } => {
            cli::cmd_vote(
                &ctx,
                &target.member,
                &target.multisig,
                target.index,
                VoteDecision::Approve,
            )
            .await?;
        }

        Commands::Reject { target } => {
            cli::cmd_vote(
                &ctx,
                &target.member,
                &target.multisig,
                target.index,
                VoteDecision::Reject,
            )
            .await?;
        }

        Commands::Execute {
            target,
            vault_index,
        } => {
            cli::cmd_execute(&ctx, &target.member, &target.multisig, target.index, vault_index)
                .await?;
        }

        Commands::Status { multisig, index } => {
            cli::cmd_status(&ctx, &multisig, index).await?;
        }

        Commands::Api { action } => match action {
            ApiCommands::Start { port } => {
                let app = create_router(ApiState {
                    ctx,
                    keys: Arc::new(InlineKeyProvider),
                });

                let addr = format!("0.0.0.0:{}", port);
                println!("🚀 Starting REST API server on http://{}", addr);
                println!("   📡 Endpoints:");
                println!("      GET  /health");
                println!("      POST /api/multisig");
                println!("      POST /api/multisig/{{address}}/proposals/native");
                println!("      POST /api/multisig/{{address}}/proposals/token");
                println!("      GET  /api/multisig/{{address}}/proposals/{{index}}");
                println!("      POST /api/multisig/{{address}}/proposals/{{index}}/activate");
                println!("      POST /api/multisig/{{address}}/proposals/{{index}}/vote");
                println!("      POST /api/multisig/{{address}}/proposals/{{index}}/execute");

                let listener = tokio::net::TcpListener::bind(&addr).await?;
                axum::serve(listener, app).await?;
            }
        },
    }

    Ok(())
}
