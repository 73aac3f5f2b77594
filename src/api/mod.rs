//! REST API module
//!
//! Exposes the proposal lifecycle over HTTP. Every response is tagged:
//! `{"state":"success", ...}` with the operation's fields, or
//! `{"state":"error","category":..,"message":..}`.
//!
//! # Endpoints
//!
//! - `GET /health` - Connected endpoint and node version
//! - `POST /api/multisig` - Create a multisig
//! - `POST /api/multisig/{address}/proposals/native` - Propose a SOL transfer
//! - `POST /api/multisig/{address}/proposals/token` - Propose a token transfer
//! - `GET /api/multisig/{address}/proposals/{index}` - Proposal status
//! - `POST /api/multisig/{address}/proposals/{index}/activate` - Open for voting
//! - `POST /api/multisig/{address}/proposals/{index}/vote` - Approve or reject
//! - `POST /api/multisig/{address}/proposals/{index}/execute` - Execute
//!
//! Key material travels in request bodies and is dropped once the request
//! completes.

pub mod handlers;
pub mod routes;

pub use handlers::{ApiResponse, ApiState};
pub use routes::create_router;
