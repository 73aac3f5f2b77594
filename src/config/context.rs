//! Connected ledger context

use crate::config::{ConfigError, RpcConfig};
use crate::ledger::{LedgerClient, RpcLedgerClient};
use crate::multisig::error::{classify, LedgerError, Operation, OrchestratorError};
use crate::multisig::{ApprovalTracker, ExecutionGate, MultisigRegistry, ProposalBuilder, StatusQuery};
use crate::squads::{self, accounts::AnchorAccount};
use solana_sdk::account::Account;
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::sync::Arc;

/// Everything an operation needs to reach the ledger
///
/// Only [`LedgerContext::connect`] creates one, after the endpoint has
/// answered a version probe, so holding a context means the endpoint
/// was reachable at setup time.
#[derive(Clone)]
pub struct LedgerContext {
    endpoint: String,
    program_id: Pubkey,
    node_version: String,
    client: Arc<dyn LedgerClient>,
}

impl fmt::Debug for LedgerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerContext")
            .field("endpoint", &self.endpoint)
            .field("program_id", &self.program_id)
            .field("node_version", &self.node_version)
            .finish()
    }
}

impl LedgerContext {
    /// Probe `client` and wrap it for use against the default program
    pub async fn connect(
        endpoint: &str,
        client: Arc<dyn LedgerClient>,
    ) -> Result<Self, OrchestratorError> {
        let node_version = client
            .version()
            .await
            .map_err(|e| classify(Operation::Read, e))?;
        log::info!("Connected to {} (version {})", endpoint, node_version);

        Ok(Self {
            endpoint: endpoint.to_string(),
            program_id: squads::ID,
            node_version,
            client,
        })
    }

    /// Resolve the configured endpoint and connect over JSON-RPC
    pub async fn from_config(config: &RpcConfig) -> Result<Self, ContextError> {
        let endpoint = config.resolve_endpoint()?;
        let client = Arc::new(RpcLedgerClient::new(&endpoint));
        Ok(Self::connect(&endpoint, client).await?)
    }

    /// Target a different deployment of the multisig program
    pub fn with_program_id(mut self, program_id: Pubkey) -> Self {
        self.program_id = program_id;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    pub fn node_version(&self) -> &str {
        &self.node_version
    }

    pub fn client(&self) -> &dyn LedgerClient {
        self.client.as_ref()
    }

    pub fn registry(&self) -> MultisigRegistry<'_> {
        MultisigRegistry::new(self)
    }

    pub fn proposals(&self) -> ProposalBuilder<'_> {
        ProposalBuilder::new(self)
    }

    pub fn approvals(&self) -> ApprovalTracker<'_> {
        ApprovalTracker::new(self)
    }

    pub fn execution(&self) -> ExecutionGate<'_> {
        ExecutionGate::new(self)
    }

    pub fn status(&self) -> StatusQuery<'_> {
        StatusQuery::new(self)
    }

    /// Read an account, `None` if it does not exist
    pub async fn read_account(&self, address: &Pubkey) -> Result<Option<Account>, OrchestratorError> {
        log::debug!("Reading account {}", address);
        self.client
            .account(address)
            .await
            .map_err(|e| classify(Operation::Read, e))
    }

    /// Read and decode a multisig program account
    pub async fn fetch<T: AnchorAccount>(&self, address: &Pubkey) -> Result<T, OrchestratorError> {
        let account = self.read_account(address).await?.ok_or_else(|| {
            LedgerError::NotFound(format!("{} account {}", T::NAME, address))
        })?;
        if account.owner != self.program_id {
            return Err(LedgerError::NotFound(format!(
                "{} is not a {} account of program {}",
                address,
                T::NAME,
                self.program_id
            ))
            .into());
        }
        T::decode(&account.data).map_err(|e| OrchestratorError::Parse(e.to_string()))
    }

    pub async fn balance(&self, address: &Pubkey) -> Result<u64, OrchestratorError> {
        self.client
            .balance(address)
            .await
            .map_err(|e| classify(Operation::Read, e))
    }

    pub async fn rent_exempt_minimum(&self, data_len: usize) -> Result<u64, OrchestratorError> {
        self.client
            .minimum_balance_for_rent_exemption(data_len)
            .await
            .map_err(|e| classify(Operation::Read, e))
    }
}

/// Failure to build a context from saved configuration
#[derive(thiserror::Error, Debug)]
pub enum ContextError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Connect(#[from] OrchestratorError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RpcPreset;
    use crate::ledger::InMemoryLedger;
    use crate::squads::MultisigState;

    #[tokio::test]
    async fn test_connect_probes() {
        let ledger = Arc::new(InMemoryLedger::new());
        let ctx = LedgerContext::connect("memory://", ledger.clone()).await.unwrap();
        assert_eq!(ctx.node_version(), "in-memory");
        assert_eq!(ctx.program_id(), squads::ID);
        assert_eq!(ctx.endpoint(), "memory://");

        ledger.set_offline(true).await;
        let err = LedgerContext::connect("memory://", ledger).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Transport(_)));
    }

    #[tokio::test]
    async fn test_from_config_rejects_missing_url() {
        let config = RpcConfig::preset(RpcPreset::Custom);
        let err = LedgerContext::from_config(&config).await.unwrap_err();
        assert!(matches!(err, ContextError::Config(ConfigError::MissingCustomUrl)));
    }

    #[tokio::test]
    async fn test_fetch_missing_account() {
        let ctx = LedgerContext::connect("memory://", Arc::new(InMemoryLedger::new()))
            .await
            .unwrap();
        let err = ctx.fetch::<MultisigState>(&Pubkey::new_unique()).await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Ledger(LedgerError::NotFound(_))
        ));
    }
}
