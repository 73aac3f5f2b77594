//! Multisig creation

use crate::config::LedgerContext;
use crate::crypto::{keypair_to_base58, short_id};
use crate::multisig::error::{classify, Operation, OrchestratorError, ValidationError};
use crate::multisig::types::CreatedMultisig;
use crate::squads::instructions::{self, MultisigCreateAccounts, MultisigCreateArgsV2};
use crate::squads::{self, Member, ProgramConfigState};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};

/// Minimum number of members of a multisig
pub const MIN_MEMBERS: usize = 2;

/// Check membership and threshold, returning the members sorted by key
pub fn validate_members(members: &[Pubkey], threshold: u16) -> Result<Vec<Member>, ValidationError> {
    if members.len() < MIN_MEMBERS {
        return Err(ValidationError::TooFewMembers(members.len()));
    }
    if threshold == 0 || usize::from(threshold) > members.len() {
        return Err(ValidationError::InvalidThreshold {
            threshold,
            members: members.len(),
        });
    }

    let mut sorted = members.to_vec();
    sorted.sort();
    if let Some(pair) = sorted.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(ValidationError::DuplicateMember(pair[0]));
    }
    Ok(sorted.into_iter().map(Member::full).collect())
}

/// Creates multisig accounts
pub struct MultisigRegistry<'a> {
    ctx: &'a LedgerContext,
}

impl<'a> MultisigRegistry<'a> {
    pub fn new(ctx: &'a LedgerContext) -> Self {
        Self { ctx }
    }

    /// Create a multisig with `members`, every one of them able to propose,
    /// vote and execute. `creator` pays fees and rent and need not be a
    /// member. The returned create key secret is not kept anywhere else.
    pub async fn create(
        &self,
        creator: &Keypair,
        members: &[Pubkey],
        threshold: u16,
        label: Option<&str>,
    ) -> Result<CreatedMultisig, OrchestratorError> {
        let members = validate_members(members, threshold)?;
        let program_id = self.ctx.program_id();

        let (program_config, _) = squads::program_config_pda(&program_id);
        let config: ProgramConfigState = self.ctx.fetch(&program_config).await?;

        let create_key = Keypair::new();
        let (multisig, _) = squads::multisig_pda(&create_key.pubkey(), &program_id);
        let (vault, _) = squads::vault_pda(&multisig, 0, &program_id);
        log::debug!("Derived multisig {} with vault {}", multisig, vault);

        let accounts = MultisigCreateAccounts {
            program_config,
            treasury: config.treasury,
            multisig,
            create_key: create_key.pubkey(),
            creator: creator.pubkey(),
        };
        let member_count = members.len();
        let args = MultisigCreateArgsV2 {
            config_authority: None,
            threshold,
            members,
            time_lock: 0,
            rent_collector: None,
            memo: label.map(str::to_string),
        };
        let ix = instructions::multisig_create_v2(&program_id, &accounts, &args)
            .map_err(OrchestratorError::encoding)?;

        let signature = self
            .ctx
            .client()
            .submit(&[ix], creator, &[&create_key])
            .await
            .map_err(|e| classify(Operation::CreateMultisig, e))?;

        log::info!(
            "Created {}-of-{} multisig {} (vault {}) by {}: {}",
            threshold,
            member_count,
            multisig,
            vault,
            short_id(creator),
            signature
        );

        Ok(CreatedMultisig {
            multisig_address: multisig,
            vault_address: vault,
            create_key: create_key.pubkey(),
            create_key_private: keypair_to_base58(&create_key),
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyProvider;
    use crate::ledger::{InMemoryLedger, LedgerClient};
    use crate::multisig::error::LedgerError;
    use crate::squads::MultisigState;
    use std::sync::Arc;

    const SOL: u64 = 1_000_000_000;

    fn keys(n: usize) -> Vec<Pubkey> {
        (0..n).map(|_| Pubkey::new_unique()).collect()
    }

    #[test]
    fn test_validation_boundaries() {
        for n in 0..5usize {
            for threshold in 0..6u16 {
                let result = validate_members(&keys(n), threshold);
                let valid = n >= 2 && threshold >= 1 && usize::from(threshold) <= n;
                assert_eq!(result.is_ok(), valid, "n={} threshold={}", n, threshold);
            }
        }
    }

    #[test]
    fn test_duplicates_rejected() {
        let a = Pubkey::new_unique();
        assert_eq!(
            validate_members(&[a, Pubkey::new_unique(), a], 2).unwrap_err(),
            ValidationError::DuplicateMember(a)
        );
    }

    #[test]
    fn test_members_sorted() {
        let members = validate_members(&keys(4), 3).unwrap();
        assert!(members.windows(2).all(|pair| pair[0].key < pair[1].key));
    }

    #[tokio::test]
    async fn test_create_multisig() {
        let ledger = Arc::new(InMemoryLedger::new());
        let creator = Keypair::new();
        ledger.airdrop(&creator.pubkey(), SOL).await;
        let ctx = LedgerContext::connect("memory://", ledger.clone()).await.unwrap();

        let members = keys(3);
        let created = ctx
            .registry()
            .create(&creator, &members, 2, Some("treasury"))
            .await
            .unwrap();

        let state: MultisigState = ctx.fetch(&created.multisig_address).await.unwrap();
        assert_eq!(state.threshold, 2);
        assert_eq!(state.members.len(), 3);
        assert_eq!(state.transaction_index, 0);
        assert_eq!(state.create_key, created.create_key);

        // the one-time secret belongs to the create key
        let create_key = crate::crypto::InlineKeyProvider
            .load(&created.create_key_private)
            .unwrap();
        assert_eq!(create_key.pubkey(), created.create_key);
        assert_eq!(
            created.vault_address,
            squads::vault_pda(&created.multisig_address, 0, &squads::ID).0
        );
    }

    #[tokio::test]
    async fn test_validation_never_submits() {
        let ledger = Arc::new(InMemoryLedger::new());
        let ctx = LedgerContext::connect("memory://", ledger.clone()).await.unwrap();

        let err = ctx
            .registry()
            .create(&Keypair::new(), &keys(1), 1, None)
            .await
            .unwrap_err();
        assert_eq!(err, OrchestratorError::from(ValidationError::TooFewMembers(1)));
        assert_eq!(ledger.submissions().await, 0);
    }

    #[tokio::test]
    async fn test_unfunded_creator() {
        let ledger = Arc::new(InMemoryLedger::new());
        let creator = Keypair::new();
        // enough for the fee, not for rent
        ledger.airdrop(&creator.pubkey(), 20_000).await;
        let ctx = LedgerContext::connect("memory://", ledger.clone()).await.unwrap();

        let err = ctx
            .registry()
            .create(&creator, &keys(2), 1, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Ledger(LedgerError::InsufficientFunds(_))
        ));
        assert_eq!(ledger.balance(&creator.pubkey()).await.unwrap(), 10_000);
    }

    #[tokio::test]
    async fn test_creation_fee_goes_to_treasury() {
        let ledger = Arc::new(InMemoryLedger::with_creation_fee(SOL / 10));
        let creator = Keypair::new();
        ledger.airdrop(&creator.pubkey(), SOL).await;
        let ctx = LedgerContext::connect("memory://", ledger.clone()).await.unwrap();

        ctx.registry().create(&creator, &keys(2), 2, None).await.unwrap();
        assert_eq!(ledger.balance(&ledger.treasury()).await.unwrap(), SOL / 10);
    }
}
