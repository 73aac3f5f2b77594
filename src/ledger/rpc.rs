//! JSON-RPC ledger client

use crate::ledger::{ClientFailure, LedgerClient};
use async_trait::async_trait;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;
use std::time::Duration;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// [`LedgerClient`] backed by a Solana JSON-RPC node
pub struct RpcLedgerClient {
    rpc: RpcClient,
    endpoint: String,
}

impl RpcLedgerClient {
    pub fn new(endpoint: &str) -> Self {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    /// Reads and confirmations use `confirmed` commitment
    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Self {
        let rpc = RpcClient::new_with_timeout_and_commitment(
            endpoint.to_string(),
            timeout,
            CommitmentConfig::confirmed(),
        );
        Self {
            rpc,
            endpoint: endpoint.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn classify(err: ClientError) -> ClientFailure {
    if let Some(tx_err) = err.get_transaction_error() {
        return ClientFailure::Rejected(tx_err);
    }
    match err.kind() {
        ClientErrorKind::SerdeJson(e) => ClientFailure::Malformed(e.to_string()),
        _ => {
            let message = err.to_string();
            if message.contains("403") {
                ClientFailure::Transport(format!(
                    "{} (access forbidden: public endpoints often block this request, \
                     use a dedicated RPC provider)",
                    message
                ))
            } else {
                ClientFailure::Transport(message)
            }
        }
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn version(&self) -> Result<String, ClientFailure> {
        let version = self.rpc.get_version().await.map_err(classify)?;
        Ok(version.solana_core)
    }

    async fn account(&self, address: &Pubkey) -> Result<Option<Account>, ClientFailure> {
        let response = self
            .rpc
            .get_account_with_commitment(address, self.rpc.commitment())
            .await
            .map_err(classify)?;
        Ok(response.value)
    }

    async fn balance(&self, address: &Pubkey) -> Result<u64, ClientFailure> {
        self.rpc.get_balance(address).await.map_err(classify)
    }

    async fn minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> Result<u64, ClientFailure> {
        self.rpc
            .get_minimum_balance_for_rent_exemption(data_len)
            .await
            .map_err(classify)
    }

    async fn submit(
        &self,
        instructions: &[Instruction],
        payer: &Keypair,
        signers: &[&Keypair],
    ) -> Result<Signature, ClientFailure> {
        let mut all_signers: Vec<&Keypair> = vec![payer];
        for signer in signers {
            if !all_signers.iter().any(|s| s.pubkey() == signer.pubkey()) {
                all_signers.push(signer);
            }
        }

        let blockhash = self.rpc.get_latest_blockhash().await.map_err(classify)?;
        let mut transaction = Transaction::new_with_payer(instructions, Some(&payer.pubkey()));
        transaction
            .try_sign(&all_signers, blockhash)
            .map_err(|e| ClientFailure::Signing(e.to_string()))?;

        log::debug!(
            "Sending transaction with {} instruction(s) to {}",
            instructions.len(),
            self.endpoint
        );
        self.rpc
            .send_and_confirm_transaction(&transaction)
            .await
            .map_err(classify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_is_kept() {
        let client = RpcLedgerClient::new("http://127.0.0.1:8899");
        assert_eq!(client.endpoint(), "http://127.0.0.1:8899");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_failure() {
        // Nothing listens on the discard port
        let client = RpcLedgerClient::with_timeout("http://127.0.0.1:9", Duration::from_secs(2));
        let err = client.version().await.unwrap_err();
        assert!(matches!(err, ClientFailure::Transport(_)));
    }
}
