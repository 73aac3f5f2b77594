//! REST API handlers for the proposal lifecycle

use crate::config::LedgerContext;
use crate::crypto::KeyProvider;
use crate::multisig::{
    CreatedMultisig, ErrorCategory, LedgerError, OrchestratorError, ProposalReport,
    ProposedTransfer, TransferIntent, ValidationError, VoteDecision,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use std::str::FromStr;
use std::sync::Arc;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub ctx: LedgerContext,
    /// Must only accept inline material (see [`crate::crypto::InlineKeyProvider`])
    pub keys: Arc<dyn KeyProvider>,
}

// ============================================================================
// Response Types
// ============================================================================

/// Tagged result returned by every endpoint
#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ApiResponse<T> {
    Success(T),
    Error {
        category: ErrorCategory,
        message: String,
    },
}

pub type ApiResult<T> = (StatusCode, Json<ApiResponse<T>>);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub endpoint: String,
    pub node_version: String,
    pub program_id: String,
}

#[derive(Debug, Serialize)]
pub struct MultisigCreated {
    pub multisig_address: String,
    pub vault_address: String,
    pub create_key: String,
    pub create_key_private: String,
    pub signature: String,
}

impl From<CreatedMultisig> for MultisigCreated {
    fn from(created: CreatedMultisig) -> Self {
        Self {
            multisig_address: created.multisig_address.to_string(),
            vault_address: created.vault_address.to_string(),
            create_key: created.create_key.to_string(),
            create_key_private: created.create_key_private,
            signature: created.signature.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProposalCreated {
    pub transaction_index: u64,
    pub vault_transaction_address: String,
    pub proposal_address: String,
    pub signature: String,
}

impl From<ProposedTransfer> for ProposalCreated {
    fn from(proposed: ProposedTransfer) -> Self {
        Self {
            transaction_index: proposed.transaction_index,
            vault_transaction_address: proposed.vault_transaction_address.to_string(),
            proposal_address: proposed.proposal_address.to_string(),
            signature: proposed.signature.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SignatureResponse {
    pub signature: String,
}

impl From<Signature> for SignatureResponse {
    fn from(signature: Signature) -> Self {
        Self {
            signature: signature.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub multisig_address: String,
    pub proposal_address: String,
    pub transaction_index: u64,
    pub status: String,
    pub approved_count: usize,
    pub rejected_count: usize,
    pub threshold: u16,
    pub approved: Vec<String>,
    pub rejected: Vec<String>,
    pub status_changed_at: Option<String>,
}

impl From<ProposalReport> for StatusResponse {
    fn from(report: ProposalReport) -> Self {
        Self {
            multisig_address: report.multisig_address.to_string(),
            proposal_address: report.proposal_address.to_string(),
            transaction_index: report.transaction_index,
            status: report.status.to_string(),
            approved_count: report.approved_count,
            rejected_count: report.rejected_count,
            threshold: report.threshold,
            approved: report.approved.iter().map(|k| k.to_string()).collect(),
            rejected: report.rejected.iter().map(|k| k.to_string()).collect(),
            status_changed_at: report.status_changed_at.map(|t| t.to_rfc3339()),
        }
    }
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct CreateMultisigRequest {
    pub creator_key: String,
    pub members: Vec<String>,
    pub threshold: u16,
    pub label: Option<String>,
}

#[derive(Deserialize)]
pub struct ProposeNativeRequest {
    pub member_key: String,
    pub to: String,
    pub lamports: u64,
    pub vault_index: Option<u8>,
    pub transaction_index: Option<u64>,
}

#[derive(Deserialize)]
pub struct ProposeTokenRequest {
    pub member_key: String,
    pub mint: String,
    pub to: String,
    /// Base units
    pub amount: u64,
    pub decimals: Option<u8>,
    #[serde(default)]
    pub create_destination_if_missing: bool,
    pub vault_index: Option<u8>,
    pub transaction_index: Option<u64>,
}

#[derive(Deserialize)]
pub struct MemberRequest {
    pub member_key: String,
}

#[derive(Deserialize)]
pub struct VoteRequest {
    pub member_key: String,
    pub decision: VoteDecision,
}

#[derive(Deserialize)]
pub struct ExecuteRequest {
    pub member_key: String,
    pub vault_index: Option<u8>,
}

// ============================================================================
// Helpers
// ============================================================================

fn status_code(err: &OrchestratorError) -> StatusCode {
    match err {
        OrchestratorError::Validation(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::Ledger(LedgerError::NotFound(_)) => StatusCode::NOT_FOUND,
        OrchestratorError::Ledger(_) => StatusCode::CONFLICT,
        OrchestratorError::Transport(_) | OrchestratorError::Parse(_) => StatusCode::BAD_GATEWAY,
    }
}

fn respond<T, U: From<T>>(result: Result<T, OrchestratorError>) -> ApiResult<U> {
    match result {
        Ok(value) => (StatusCode::OK, Json(ApiResponse::Success(U::from(value)))),
        Err(err) => (
            status_code(&err),
            Json(ApiResponse::Error {
                category: err.category(),
                message: err.to_string(),
            }),
        ),
    }
}

fn parse_pubkey(what: &str, value: &str) -> Result<Pubkey, OrchestratorError> {
    Pubkey::from_str(value.trim()).map_err(|e| {
        ValidationError::InvalidKey(format!("{} '{}': {}", what, value, e)).into()
    })
}

fn load_key(state: &ApiState, material: &str) -> Result<Keypair, OrchestratorError> {
    state
        .keys
        .load(material)
        .map_err(|e| ValidationError::InvalidKey(e.to_string()).into())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health - Endpoint the context is connected to
pub async fn health_check(State(state): State<ApiState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::Success(HealthResponse {
        endpoint: state.ctx.endpoint().to_string(),
        node_version: state.ctx.node_version().to_string(),
        program_id: state.ctx.program_id().to_string(),
    }))
}

/// POST /api/multisig - Create a multisig
pub async fn create_multisig(
    State(state): State<ApiState>,
    Json(req): Json<CreateMultisigRequest>,
) -> ApiResult<MultisigCreated> {
    let result = async {
        let creator = load_key(&state, &req.creator_key)?;
        let members = req
            .members
            .iter()
            .map(|m| parse_pubkey("member", m))
            .collect::<Result<Vec<_>, _>>()?;
        state
            .ctx
            .registry()
            .create(&creator, &members, req.threshold, req.label.as_deref())
            .await
    }
    .await;
    respond(result)
}

/// POST /api/multisig/{address}/proposals/native - Propose a SOL transfer
pub async fn propose_native(
    State(state): State<ApiState>,
    Path(address): Path<String>,
    Json(req): Json<ProposeNativeRequest>,
) -> ApiResult<ProposalCreated> {
    let result = async {
        let multisig = parse_pubkey("multisig", &address)?;
        let member = load_key(&state, &req.member_key)?;
        let intent = TransferIntent::native(parse_pubkey("recipient", &req.to)?, req.lamports);
        state
            .ctx
            .proposals()
            .propose(&member, &multisig, &intent, req.vault_index, req.transaction_index)
            .await
    }
    .await;
    respond(result)
}

/// POST /api/multisig/{address}/proposals/token - Propose a token transfer
pub async fn propose_token(
    State(state): State<ApiState>,
    Path(address): Path<String>,
    Json(req): Json<ProposeTokenRequest>,
) -> ApiResult<ProposalCreated> {
    let result = async {
        let multisig = parse_pubkey("multisig", &address)?;
        let member = load_key(&state, &req.member_key)?;
        let intent = TransferIntent::Token {
            mint: parse_pubkey("mint", &req.mint)?,
            to: parse_pubkey("recipient", &req.to)?,
            amount: req.amount,
            decimals: req.decimals,
            create_destination_if_missing: req.create_destination_if_missing,
        };
        state
            .ctx
            .proposals()
            .propose(&member, &multisig, &intent, req.vault_index, req.transaction_index)
            .await
    }
    .await;
    respond(result)
}

/// POST /api/multisig/{address}/proposals/{index}/activate
pub async fn activate_proposal(
    State(state): State<ApiState>,
    Path((address, index)): Path<(String, u64)>,
    Json(req): Json<MemberRequest>,
) -> ApiResult<SignatureResponse> {
    let result = async {
        let multisig = parse_pubkey("multisig", &address)?;
        let member = load_key(&state, &req.member_key)?;
        state.ctx.approvals().activate(&member, &multisig, index).await
    }
    .await;
    respond(result)
}

/// POST /api/multisig/{address}/proposals/{index}/vote
pub async fn vote_proposal(
    State(state): State<ApiState>,
    Path((address, index)): Path<(String, u64)>,
    Json(req): Json<VoteRequest>,
) -> ApiResult<SignatureResponse> {
    let result = async {
        let multisig = parse_pubkey("multisig", &address)?;
        let member = load_key(&state, &req.member_key)?;
        state
            .ctx
            .approvals()
            .vote(&member, &multisig, index, req.decision)
            .await
    }
    .await;
    respond(result)
}

/// POST /api/multisig/{address}/proposals/{index}/execute
pub async fn execute_proposal(
    State(state): State<ApiState>,
    Path((address, index)): Path<(String, u64)>,
    Json(req): Json<ExecuteRequest>,
) -> ApiResult<SignatureResponse> {
    let result = async {
        let multisig = parse_pubkey("multisig", &address)?;
        let member = load_key(&state, &req.member_key)?;
        state
            .ctx
            .execution()
            .execute(&member, &multisig, index, req.vault_index)
            .await
    }
    .await;
    respond(result)
}

/// GET /api/multisig/{address}/proposals/{index} - Proposal status
pub async fn get_proposal_status(
    State(state): State<ApiState>,
    Path((address, index)): Path<(String, u64)>,
) -> ApiResult<StatusResponse> {
    let result = async {
        let multisig = parse_pubkey("multisig", &address)?;
        state.ctx.status().status(&multisig, index).await
    }
    .await;
    respond(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{keypair_to_base58, InlineKeyProvider};
    use crate::ledger::{InMemoryLedger, LedgerClient};
    use crate::multisig::testkit::{Fixture, SOL};
    use serde_json::{json, Value};
    use solana_sdk::signature::Signer;

    fn api_state(fx: &Fixture) -> ApiState {
        ApiState {
            ctx: fx.ctx.clone(),
            keys: Arc::new(InlineKeyProvider),
        }
    }

    fn body<T: Serialize>(result: &ApiResult<T>) -> Value {
        serde_json::to_value(&result.1 .0).unwrap()
    }

    fn member_key(fx: &Fixture, i: usize) -> String {
        keypair_to_base58(fx.member(i))
    }

    #[tokio::test]
    async fn test_create_multisig() {
        let ledger = Arc::new(InMemoryLedger::new());
        let creator = Keypair::new();
        ledger.airdrop(&creator.pubkey(), SOL).await;
        let ctx = LedgerContext::connect("memory://", ledger).await.unwrap();
        let state = ApiState {
            ctx,
            keys: Arc::new(InlineKeyProvider),
        };

        let req = CreateMultisigRequest {
            creator_key: keypair_to_base58(&creator),
            members: vec![
                Pubkey::new_unique().to_string(),
                Pubkey::new_unique().to_string(),
            ],
            threshold: 2,
            label: Some("ops".into()),
        };
        let result = create_multisig(State(state), Json(req)).await;
        assert_eq!(result.0, StatusCode::OK);

        let value = body(&result);
        assert_eq!(value["state"], "success");
        assert!(value["multisig_address"].is_string());
        assert!(value["create_key_private"].is_string());
    }

    #[tokio::test]
    async fn test_validation_error_shape() {
        let fx = Fixture::new(2, 2).await;
        let req = CreateMultisigRequest {
            creator_key: member_key(&fx, 0),
            members: vec![Pubkey::new_unique().to_string()],
            threshold: 1,
            label: None,
        };
        let result = create_multisig(State(api_state(&fx)), Json(req)).await;
        assert_eq!(result.0, StatusCode::BAD_REQUEST);
        let value = body(&result);
        assert_eq!(value["state"], "error");
        assert_eq!(value["category"], "validation");
    }

    #[tokio::test]
    async fn test_bad_key_material() {
        let fx = Fixture::new(2, 2).await;
        let req = MemberRequest {
            member_key: "not-a-key".into(),
        };
        let result = activate_proposal(
            State(api_state(&fx)),
            Path((fx.multisig.to_string(), 1)),
            Json(req),
        )
        .await;
        assert_eq!(result.0, StatusCode::BAD_REQUEST);
        assert_eq!(body(&result)["category"], "validation");
    }

    #[tokio::test]
    async fn test_key_file_path_rejected() {
        use std::io::Write;

        let ledger = Arc::new(InMemoryLedger::new());
        let operator = Keypair::new();
        ledger.airdrop(&operator.pubkey(), SOL).await;
        let ctx = LedgerContext::connect("memory://", ledger.clone()).await.unwrap();
        let state = ApiState {
            ctx,
            keys: Arc::new(InlineKeyProvider),
        };

        // A keypair file that exists on the server
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            serde_json::to_string(&operator.to_bytes().to_vec()).unwrap()
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let req = CreateMultisigRequest {
            creator_key: path.clone(),
            members: vec![
                Pubkey::new_unique().to_string(),
                Pubkey::new_unique().to_string(),
            ],
            threshold: 2,
            label: None,
        };
        let result = create_multisig(State(state.clone()), Json(req)).await;
        assert_eq!(result.0, StatusCode::BAD_REQUEST);
        let value = body(&result);
        assert_eq!(value["state"], "error");
        assert_eq!(value["category"], "validation");

        let fx = Fixture::new(2, 2).await;
        let voted = vote_proposal(
            State(api_state(&fx)),
            Path((fx.multisig.to_string(), 1)),
            Json(VoteRequest {
                member_key: path,
                decision: VoteDecision::Approve,
            }),
        )
        .await;
        assert_eq!(voted.0, StatusCode::BAD_REQUEST);
        assert_eq!(body(&voted)["category"], "validation");

        assert_eq!(ledger.submissions().await, 0);
        assert_eq!(ledger.balance(&operator.pubkey()).await.unwrap(), SOL);
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let fx = Fixture::new(3, 2).await;
        fx.fund_vault(SOL).await;
        let state = api_state(&fx);
        let address = fx.multisig.to_string();
        let to = Pubkey::new_unique();

        let proposed = propose_native(
            State(state.clone()),
            Path(address.clone()),
            Json(ProposeNativeRequest {
                member_key: member_key(&fx, 0),
                to: to.to_string(),
                lamports: SOL / 10,
                vault_index: None,
                transaction_index: None,
            }),
        )
        .await;
        assert_eq!(body(&proposed)["transaction_index"], 1);

        let activated = activate_proposal(
            State(state.clone()),
            Path((address.clone(), 1)),
            Json(MemberRequest {
                member_key: member_key(&fx, 0),
            }),
        )
        .await;
        assert_eq!(activated.0, StatusCode::OK);

        for i in [0, 1] {
            let voted = vote_proposal(
                State(state.clone()),
                Path((address.clone(), 1)),
                Json(VoteRequest {
                    member_key: member_key(&fx, i),
                    decision: VoteDecision::Approve,
                }),
            )
            .await;
            assert_eq!(voted.0, StatusCode::OK);
        }

        let status = get_proposal_status(State(state.clone()), Path((address.clone(), 1))).await;
        let value = body(&status);
        assert_eq!(
            value,
            json!({
                "state": "success",
                "multisig_address": address,
                "proposal_address": value["proposal_address"],
                "transaction_index": 1,
                "status": "Approved",
                "approved_count": 2,
                "rejected_count": 0,
                "threshold": 2,
                "approved": value["approved"],
                "rejected": [],
                "status_changed_at": value["status_changed_at"],
            })
        );

        let execute = |i: usize| {
            execute_proposal(
                State(state.clone()),
                Path((address.clone(), 1)),
                Json(ExecuteRequest {
                    member_key: member_key(&fx, i),
                    vault_index: None,
                }),
            )
        };
        assert_eq!(execute(2).await.0, StatusCode::OK);

        let again = execute(1).await;
        assert_eq!(again.0, StatusCode::CONFLICT);
        let value = body(&again);
        assert_eq!(value["category"], "ledger");
        assert_eq!(
            value["message"],
            OrchestratorError::from(LedgerError::AlreadyExecuted).to_string()
        );
    }

    #[tokio::test]
    async fn test_status_not_found() {
        let fx = Fixture::new(2, 2).await;
        let result =
            get_proposal_status(State(api_state(&fx)), Path((fx.multisig.to_string(), 7))).await;
        assert_eq!(result.0, StatusCode::NOT_FOUND);
        assert_eq!(body(&result)["category"], "ledger");
    }

    #[tokio::test]
    async fn test_health() {
        let fx = Fixture::new(2, 2).await;
        let Json(response) = health_check(State(api_state(&fx))).await;
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["state"], "success");
        assert_eq!(value["endpoint"], "memory://");
    }
}
