//! On-chain account layouts of the multisig program
//!
//! Every account starts with an 8-byte Anchor discriminator followed by
//! the borsh-encoded fields.

use crate::crypto::{account_discriminator, DISCRIMINATOR_LEN};
use crate::squads::message::VaultTransactionMessage;
use bitflags::bitflags;
use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Errors decoding raw account data
#[derive(Error, Debug)]
pub enum AccountDecodeError {
    #[error("{account} account data too short: {len} bytes")]
    TooShort { account: &'static str, len: usize },
    #[error("Account is not a {0}")]
    DiscriminatorMismatch(&'static str),
    #[error("Failed to decode {account}: {source}")]
    Borsh {
        account: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// An Anchor account type with a known name
pub trait AnchorAccount: BorshSerialize + BorshDeserialize {
    const NAME: &'static str;

    fn discriminator() -> [u8; DISCRIMINATOR_LEN] {
        account_discriminator(Self::NAME)
    }

    /// Decode account data, tolerating trailing padding
    fn decode(data: &[u8]) -> Result<Self, AccountDecodeError> {
        if data.len() < DISCRIMINATOR_LEN {
            return Err(AccountDecodeError::TooShort {
                account: Self::NAME,
                len: data.len(),
            });
        }
        if data[..DISCRIMINATOR_LEN] != Self::discriminator() {
            return Err(AccountDecodeError::DiscriminatorMismatch(Self::NAME));
        }
        Self::deserialize(&mut &data[DISCRIMINATOR_LEN..]).map_err(|source| {
            AccountDecodeError::Borsh {
                account: Self::NAME,
                source,
            }
        })
    }

    /// Encode as account data, discriminator included
    fn encode(&self) -> Result<Vec<u8>, std::io::Error> {
        let mut data = Self::discriminator().to_vec();
        data.extend(self.try_to_vec()?);
        Ok(data)
    }
}

bitflags! {
    /// What a member is allowed to do
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permission: u8 {
        const INITIATE = 1 << 0;
        const VOTE = 1 << 1;
        const EXECUTE = 1 << 2;
    }
}

/// Bitmask of [`Permission`] as stored on chain
#[derive(BorshSerialize, BorshDeserialize, Eq, PartialEq, Clone, Copy, Default, Debug)]
pub struct Permissions {
    pub mask: u8,
}

impl Permissions {
    pub fn all() -> Self {
        Permission::all().into()
    }

    pub fn has(&self, permission: Permission) -> bool {
        Permission::from_bits_truncate(self.mask).contains(permission)
    }
}

impl From<Permission> for Permissions {
    fn from(permission: Permission) -> Self {
        Self {
            mask: permission.bits(),
        }
    }
}

#[derive(BorshSerialize, BorshDeserialize, Eq, PartialEq, Clone, Debug)]
pub struct Member {
    pub key: Pubkey,
    pub permissions: Permissions,
}

impl Member {
    /// A member who may propose, vote and execute
    pub fn full(key: Pubkey) -> Self {
        Self {
            key,
            permissions: Permissions::all(),
        }
    }
}

/// The multisig account
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug)]
pub struct MultisigState {
    /// Key that is used to seed the multisig PDA.
    pub create_key: Pubkey,
    /// `Pubkey::default()` for an autonomous multisig.
    pub config_authority: Pubkey,
    pub threshold: u16,
    /// Seconds between approval and allowed execution.
    pub time_lock: u32,
    /// Last transaction index. 0 means no transactions have been created.
    pub transaction_index: u64,
    /// All transactions up to this index are stale.
    pub stale_transaction_index: u64,
    pub rent_collector: Option<Pubkey>,
    pub bump: u8,
    /// Sorted by key.
    pub members: Vec<Member>,
}

impl AnchorAccount for MultisigState {
    const NAME: &'static str = "Multisig";
}

impl MultisigState {
    /// Index into `members` if `key` is a member
    pub fn member_index(&self, key: &Pubkey) -> Option<usize> {
        self.members.binary_search_by_key(key, |m| m.key).ok()
    }

    pub fn is_member(&self, key: &Pubkey) -> bool {
        self.member_index(key).is_some()
    }

    pub fn member_has_permission(&self, key: &Pubkey, permission: Permission) -> bool {
        self.member_index(key)
            .map(|i| self.members[i].permissions.has(permission))
            .unwrap_or(false)
    }

    pub fn num_voters(&self) -> usize {
        self.members
            .iter()
            .filter(|m| m.permissions.has(Permission::VOTE))
            .count()
    }

    /// Rejections at which approval becomes impossible.
    /// For example: total voters = 7, threshold = 3, cutoff = 5.
    pub fn cutoff(&self) -> usize {
        self.num_voters()
            .saturating_sub(usize::from(self.threshold))
            .saturating_add(1)
    }

    /// Index the next vault transaction must use
    pub fn next_transaction_index(&self) -> Option<u64> {
        self.transaction_index.checked_add(1)
    }
}

/// Proposal status as stored on chain; timestamps are unix seconds
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProposalStatusState {
    Draft { timestamp: i64 },
    Active { timestamp: i64 },
    Rejected { timestamp: i64 },
    Approved { timestamp: i64 },
    /// Deprecated by the program; never written by current versions.
    Executing,
    Executed { timestamp: i64 },
    Cancelled { timestamp: i64 },
}

impl ProposalStatusState {
    pub fn timestamp(&self) -> Option<i64> {
        match *self {
            Self::Draft { timestamp }
            | Self::Active { timestamp }
            | Self::Rejected { timestamp }
            | Self::Approved { timestamp }
            | Self::Executed { timestamp }
            | Self::Cancelled { timestamp } => Some(timestamp),
            Self::Executing => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Rejected { .. } | Self::Executed { .. } | Self::Cancelled { .. }
        )
    }
}

/// The proposal account
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProposalState {
    pub multisig: Pubkey,
    pub transaction_index: u64,
    pub status: ProposalStatusState,
    pub bump: u8,
    /// Sorted.
    pub approved: Vec<Pubkey>,
    /// Sorted.
    pub rejected: Vec<Pubkey>,
    /// Sorted.
    pub cancelled: Vec<Pubkey>,
}

impl AnchorAccount for ProposalState {
    const NAME: &'static str = "Proposal";
}

impl ProposalState {
    pub fn has_voted(&self, member: &Pubkey) -> bool {
        self.approved.binary_search(member).is_ok() || self.rejected.binary_search(member).is_ok()
    }
}

/// The vault transaction account
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug)]
pub struct VaultTransactionState {
    pub multisig: Pubkey,
    pub creator: Pubkey,
    pub index: u64,
    pub bump: u8,
    pub vault_index: u8,
    pub vault_bump: u8,
    pub ephemeral_signer_bumps: Vec<u8>,
    pub message: VaultTransactionMessage,
}

impl AnchorAccount for VaultTransactionState {
    const NAME: &'static str = "VaultTransaction";
}

/// Global program configuration; trailing reserved bytes are not decoded
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug)]
pub struct ProgramConfigState {
    pub authority: Pubkey,
    pub multisig_creation_fee: u64,
    pub treasury: Pubkey,
}

impl AnchorAccount for ProgramConfigState {
    const NAME: &'static str = "ProgramConfig";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_multisig(voters: usize, threshold: u16) -> MultisigState {
        let mut members: Vec<Member> = (0..voters).map(|_| Member::full(Pubkey::new_unique())).collect();
        members.sort_by_key(|m| m.key);
        MultisigState {
            create_key: Pubkey::new_unique(),
            config_authority: Pubkey::default(),
            threshold,
            time_lock: 0,
            transaction_index: 0,
            stale_transaction_index: 0,
            rent_collector: None,
            bump: 255,
            members,
        }
    }

    #[test]
    fn test_cutoff() {
        assert_eq!(sample_multisig(7, 3).cutoff(), 5);
        assert_eq!(sample_multisig(3, 2).cutoff(), 2);
        assert_eq!(sample_multisig(2, 2).cutoff(), 1);
    }

    #[test]
    fn test_encode_decode_multisig() {
        let ms = sample_multisig(3, 2);
        let data = ms.encode().unwrap();
        assert_eq!(&data[..8], &MultisigState::discriminator());

        let decoded = MultisigState::decode(&data).unwrap();
        assert_eq!(decoded.threshold, 2);
        assert_eq!(decoded.members, ms.members);
        assert!(decoded.is_member(&ms.members[1].key));
        assert!(!decoded.is_member(&Pubkey::new_unique()));
    }

    #[test]
    fn test_decode_tolerates_padding() {
        let ms = sample_multisig(2, 1);
        let mut data = ms.encode().unwrap();
        data.extend([0u8; 64]);
        assert!(MultisigState::decode(&data).is_ok());
    }

    #[test]
    fn test_proposal_decode_with_voter_space() {
        // Proposal accounts are allocated with room for every voter
        let proposal = ProposalState {
            multisig: Pubkey::new_unique(),
            transaction_index: 3,
            status: ProposalStatusState::Active { timestamp: 1_700_000_000 },
            bump: 254,
            approved: vec![Pubkey::new_unique()],
            rejected: Vec::new(),
            cancelled: Vec::new(),
        };
        let mut data = proposal.encode().unwrap();
        data.extend([0u8; 2 * 32]);

        let decoded = ProposalState::decode(&data).unwrap();
        assert_eq!(decoded, proposal);
        assert_eq!(decoded.approved.len(), 1);
    }

    #[test]
    fn test_decode_wrong_account() {
        let ms = sample_multisig(2, 1);
        let data = ms.encode().unwrap();
        assert!(matches!(
            ProposalState::decode(&data),
            Err(AccountDecodeError::DiscriminatorMismatch("Proposal"))
        ));
        assert!(matches!(
            ProposalState::decode(&[1, 2, 3]),
            Err(AccountDecodeError::TooShort { .. })
        ));
    }

    #[test]
    fn test_permissions() {
        let all = Permissions::all();
        assert_eq!(all.mask, 7);
        assert!(all.has(Permission::VOTE));

        let vote_only: Permissions = Permission::VOTE.into();
        assert!(vote_only.has(Permission::VOTE));
        assert!(!vote_only.has(Permission::EXECUTE));
    }

    #[test]
    fn test_status_terminal() {
        assert!(ProposalStatusState::Executed { timestamp: 1 }.is_terminal());
        assert!(!ProposalStatusState::Approved { timestamp: 1 }.is_terminal());
        assert_eq!(ProposalStatusState::Executing.timestamp(), None);
    }
}
