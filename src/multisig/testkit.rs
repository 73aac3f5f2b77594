//! provides a funded multisig on an in-memory ledger for exercising the
//! proposal lifecycle

use crate::config::LedgerContext;
use crate::ledger::InMemoryLedger;
use crate::multisig::types::{ProposedTransfer, TransferIntent};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use std::sync::Arc;

pub const SOL: u64 = 1_000_000_000;

pub struct Fixture {
    pub ledger: Arc<InMemoryLedger>,
    pub ctx: LedgerContext,
    pub members: Vec<Keypair>,
    pub multisig: Pubkey,
    pub vault: Pubkey,
}

impl Fixture {
    /// Multisig of `members` funded members with the given threshold
    pub async fn new(members: usize, threshold: u16) -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let ctx = LedgerContext::connect("memory://", ledger.clone())
            .await
            .unwrap();

        let members: Vec<Keypair> = (0..members).map(|_| Keypair::new()).collect();
        for member in &members {
            ledger.airdrop(&member.pubkey(), SOL).await;
        }
        let keys: Vec<Pubkey> = members.iter().map(|m| m.pubkey()).collect();

        let created = ctx
            .registry()
            .create(&members[0], &keys, threshold, Some("fixture"))
            .await
            .unwrap();

        Self {
            ledger,
            ctx,
            members,
            multisig: created.multisig_address,
            vault: created.vault_address,
        }
    }

    pub fn member(&self, i: usize) -> &Keypair {
        &self.members[i]
    }

    pub async fn fund_vault(&self, lamports: u64) {
        self.ledger.airdrop(&self.vault, lamports).await;
    }

    pub async fn propose_native(&self, to: &Pubkey, lamports: u64) -> ProposedTransfer {
        self.ctx
            .proposals()
            .propose(
                self.member(0),
                &self.multisig,
                &TransferIntent::native(*to, lamports),
                None,
                None,
            )
            .await
            .unwrap()
    }

    /// Propose, activate and collect approvals from members `0..approvals`
    pub async fn approved_native(&self, to: &Pubkey, lamports: u64, approvals: usize) -> u64 {
        let proposed = self.propose_native(to, lamports).await;
        let index = proposed.transaction_index;
        self.ctx
            .approvals()
            .activate(self.member(0), &self.multisig, index)
            .await
            .unwrap();
        for i in 0..approvals {
            self.approve(i, index).await;
        }
        index
    }

    pub async fn approve(&self, member: usize, index: u64) -> Signature {
        self.ctx
            .approvals()
            .approve(self.member(member), &self.multisig, index)
            .await
            .unwrap()
    }

    pub async fn reject(&self, member: usize, index: u64) -> Signature {
        self.ctx
            .approvals()
            .reject(self.member(member), &self.multisig, index)
            .await
            .unwrap()
    }
}
