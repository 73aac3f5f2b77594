//! In-memory ledger
//!
//! A deterministic stand-in for a cluster running the multisig program.
//! It keeps accounts in a map and executes the subset of the multisig,
//! system, token and associated-token programs this crate emits, with
//! signature fees and rent exemption enforced. Each transaction is
//! applied atomically: either every instruction succeeds or only the fee
//! is charged.

use crate::crypto::instruction_discriminator;
use crate::ledger::{ClientFailure, LedgerClient};
use crate::squads::accounts::{AnchorAccount, Permission};
use crate::squads::errors::ProgramErrorCode;
use crate::squads::instructions::{
    split_data, MultisigCreateArgsV2, ProposalCreateArgs, VaultTransactionCreateArgs,
    MULTISIG_CREATE_V2, PROPOSAL_ACTIVATE, PROPOSAL_APPROVE, PROPOSAL_CREATE, PROPOSAL_REJECT,
    VAULT_TRANSACTION_CREATE, VAULT_TRANSACTION_EXECUTE,
};
use crate::squads::{
    self, MultisigState, ProgramConfigState, ProposalState, ProposalStatusState,
    VaultTransactionMessage, VaultTransactionState,
};
use crate::token::native;
use crate::token::spl::{self, associated_token_address};
use async_trait::async_trait;
use borsh::BorshDeserialize;
use solana_sdk::account::Account;
use solana_sdk::instruction::{AccountMeta, Instruction, InstructionError};
use solana_sdk::message::Message;
use solana_sdk::program_option::COption;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::system_program;
use solana_sdk::transaction::TransactionError;
use spl_token::error::TokenError;
use spl_token::state::{Account as TokenAccount, AccountState, Mint};
use std::collections::HashMap;
use tokio::sync::Mutex;

pub const LAMPORTS_PER_SIGNATURE: u64 = 5_000;
pub const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;
pub const RENT_LAMPORTS_PER_BYTE: u64 = 6_960;

const GENESIS_TIMESTAMP: i64 = 1_700_000_000;

/// Lamports an account with `data_len` bytes must hold to stay alive
pub fn rent_exempt_minimum(data_len: usize) -> u64 {
    (ACCOUNT_STORAGE_OVERHEAD + data_len as u64) * RENT_LAMPORTS_PER_BYTE
}

fn packed<T: Pack>(value: &T) -> Vec<u8> {
    let mut data = vec![0u8; T::LEN];
    value.pack_into_slice(&mut data);
    data
}

fn token_account_data(mint: &Pubkey, owner: &Pubkey, amount: u64) -> Vec<u8> {
    packed(&TokenAccount {
        mint: *mint,
        owner: *owner,
        amount,
        state: AccountState::Initialized,
        ..TokenAccount::default()
    })
}

fn token_error(err: TokenError) -> InstructionError {
    InstructionError::Custom(err as u32)
}

struct LedgerState {
    accounts: HashMap<Pubkey, Account>,
    clock: i64,
    transaction_count: u64,
    submissions: u64,
    offline: bool,
}

/// Simulated ledger for tests
pub struct InMemoryLedger {
    program_id: Pubkey,
    treasury: Pubkey,
    state: Mutex<LedgerState>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::with_creation_fee(0)
    }

    /// Ledger whose program config charges `fee` lamports per multisig
    pub fn with_creation_fee(fee: u64) -> Self {
        let program_id = squads::ID;
        let treasury = Pubkey::new_unique();
        let config = ProgramConfigState {
            authority: Pubkey::new_unique(),
            multisig_creation_fee: fee,
            treasury,
        };

        let mut accounts = HashMap::new();
        let data = config.encode().unwrap_or_default();
        accounts.insert(
            squads::program_config_pda(&program_id).0,
            Account {
                lamports: rent_exempt_minimum(data.len()),
                data,
                owner: program_id,
                executable: false,
                rent_epoch: 0,
            },
        );

        Self {
            program_id,
            treasury,
            state: Mutex::new(LedgerState {
                accounts,
                clock: GENESIS_TIMESTAMP,
                transaction_count: 0,
                submissions: 0,
                offline: false,
            }),
        }
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    pub fn treasury(&self) -> Pubkey {
        self.treasury
    }

    pub async fn airdrop(&self, to: &Pubkey, lamports: u64) {
        let mut state = self.state.lock().await;
        state
            .accounts
            .entry(*to)
            .or_insert_with(|| Account::new(0, 0, &system_program::ID))
            .lamports += lamports;
    }

    /// Create a token mint with no authority checks
    pub async fn create_mint(&self, decimals: u8) -> Pubkey {
        let mint = Pubkey::new_unique();
        let data = packed(&Mint {
            mint_authority: COption::None,
            supply: 0,
            decimals,
            is_initialized: true,
            freeze_authority: COption::None,
        });
        let mut state = self.state.lock().await;
        state.accounts.insert(
            mint,
            Account {
                lamports: rent_exempt_minimum(data.len()),
                data,
                owner: spl_token::ID,
                executable: false,
                rent_epoch: 0,
            },
        );
        mint
    }

    /// Mint `amount` into the associated token account of `owner`,
    /// creating it if needed. Returns the token account address.
    pub async fn mint_to(&self, mint: &Pubkey, owner: &Pubkey, amount: u64) -> Pubkey {
        let ata = associated_token_address(owner, mint);
        let mut state = self.state.lock().await;

        if let Some(account) = state.accounts.get_mut(mint) {
            if let Ok(mut info) = Mint::unpack(&account.data) {
                info.supply = info.supply.saturating_add(amount);
                account.data = packed(&info);
            }
        }

        let current = state
            .accounts
            .get(&ata)
            .and_then(|a| TokenAccount::unpack(&a.data).ok())
            .map(|info| info.amount)
            .unwrap_or(0);
        let data = token_account_data(mint, owner, current.saturating_add(amount));
        state.accounts.insert(
            ata,
            Account {
                lamports: rent_exempt_minimum(data.len()),
                data,
                owner: spl_token::ID,
                executable: false,
                rent_epoch: 0,
            },
        );
        ata
    }

    pub async fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> u64 {
        let state = self.state.lock().await;
        state
            .accounts
            .get(&associated_token_address(owner, mint))
            .and_then(|a| TokenAccount::unpack(&a.data).ok())
            .map(|info| info.amount)
            .unwrap_or(0)
    }

    /// Every call fails with a transport error while offline
    pub async fn set_offline(&self, offline: bool) {
        self.state.lock().await.offline = offline;
    }

    pub async fn advance_clock(&self, seconds: i64) {
        self.state.lock().await.clock += seconds;
    }

    /// Mark every transaction up to `index` stale, as a config change would
    pub async fn mark_stale(&self, multisig: &Pubkey, index: u64) {
        let mut state = self.state.lock().await;
        if let Some(account) = state.accounts.get_mut(multisig) {
            if let Ok(mut ms) = MultisigState::decode(&account.data) {
                ms.stale_transaction_index = index;
                if let Ok(data) = ms.encode() {
                    account.data = data;
                }
            }
        }
    }

    /// Number of transactions handed to [`LedgerClient::submit`]
    pub async fn submissions(&self) -> u64 {
        self.state.lock().await.submissions
    }
}

fn offline() -> ClientFailure {
    ClientFailure::Transport("connection refused".to_string())
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn version(&self) -> Result<String, ClientFailure> {
        if self.state.lock().await.offline {
            return Err(offline());
        }
        Ok("in-memory".to_string())
    }

    async fn account(&self, address: &Pubkey) -> Result<Option<Account>, ClientFailure> {
        let state = self.state.lock().await;
        if state.offline {
            return Err(offline());
        }
        Ok(state
            .accounts
            .get(address)
            .filter(|a| a.lamports > 0)
            .cloned())
    }

    async fn balance(&self, address: &Pubkey) -> Result<u64, ClientFailure> {
        let state = self.state.lock().await;
        if state.offline {
            return Err(offline());
        }
        Ok(state.accounts.get(address).map(|a| a.lamports).unwrap_or(0))
    }

    async fn minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> Result<u64, ClientFailure> {
        if self.state.lock().await.offline {
            return Err(offline());
        }
        Ok(rent_exempt_minimum(data_len))
    }

    async fn submit(
        &self,
        instructions: &[Instruction],
        payer: &Keypair,
        signers: &[&Keypair],
    ) -> Result<Signature, ClientFailure> {
        let mut state = self.state.lock().await;
        if state.offline {
            return Err(offline());
        }
        state.submissions += 1;

        let payer_key = payer.pubkey();
        let mut signed: Vec<Pubkey> = vec![payer_key];
        signed.extend(signers.iter().map(|s| s.pubkey()));

        let message = Message::new(instructions, Some(&payer_key));
        let required =
            &message.account_keys[..usize::from(message.header.num_required_signatures)];
        if let Some(missing) = required.iter().find(|key| !signed.contains(key)) {
            return Err(ClientFailure::Signing(format!(
                "missing signature for {}",
                missing
            )));
        }

        let fee = LAMPORTS_PER_SIGNATURE * required.len() as u64;
        match state.accounts.get_mut(&payer_key) {
            None => return Err(ClientFailure::Rejected(TransactionError::AccountNotFound)),
            Some(account) if account.lamports < fee => {
                return Err(ClientFailure::Rejected(
                    TransactionError::InsufficientFundsForFee,
                ))
            }
            Some(account) => account.lamports -= fee,
        }

        state.clock += 1;
        let signature = payer.sign_message(&state.transaction_count.to_le_bytes());
        state.transaction_count += 1;

        let mut working = state.accounts.clone();
        let mut runtime = Runtime {
            accounts: &mut working,
            program_id: self.program_id,
            clock: state.clock,
        };
        runtime
            .run(instructions, required)
            .map_err(ClientFailure::Rejected)?;

        for (key, account) in working.iter() {
            let before = state.accounts.get(key).map(|a| a.lamports);
            if before != Some(account.lamports)
                && account.lamports > 0
                && account.lamports < rent_exempt_minimum(account.data.len())
            {
                let account_index = message
                    .account_keys
                    .iter()
                    .position(|k| k == key)
                    .unwrap_or(0) as u8;
                return Err(ClientFailure::Rejected(
                    TransactionError::InsufficientFundsForRent { account_index },
                ));
            }
        }

        state.accounts = working;
        Ok(signature)
    }
}

type IxResult<T = ()> = Result<T, InstructionError>;

fn program_error(code: ProgramErrorCode) -> InstructionError {
    InstructionError::Custom(code.code())
}

fn account_key(ix: &Instruction, index: usize) -> IxResult<Pubkey> {
    ix.accounts
        .get(index)
        .map(|meta| meta.pubkey)
        .ok_or(InstructionError::NotEnoughAccountKeys)
}

fn require_signer(key: &Pubkey, signers: &[Pubkey]) -> IxResult {
    if signers.contains(key) {
        Ok(())
    } else {
        Err(InstructionError::MissingRequiredSignature)
    }
}

fn require_member(multisig: &MultisigState, key: &Pubkey, permission: Permission) -> IxResult {
    if !multisig.is_member(key) {
        return Err(program_error(ProgramErrorCode::NotAMember));
    }
    if !multisig.member_has_permission(key, permission) {
        return Err(program_error(ProgramErrorCode::Unauthorized));
    }
    Ok(())
}

fn insert_sorted(keys: &mut Vec<Pubkey>, key: Pubkey) {
    if let Err(pos) = keys.binary_search(&key) {
        keys.insert(pos, key);
    }
}

fn remove_sorted(keys: &mut Vec<Pubkey>, key: &Pubkey) {
    if let Ok(pos) = keys.binary_search(key) {
        keys.remove(pos);
    }
}

/// Executes instructions against a working copy of the accounts
struct Runtime<'a> {
    accounts: &'a mut HashMap<Pubkey, Account>,
    program_id: Pubkey,
    clock: i64,
}

impl Runtime<'_> {
    fn run(&mut self, instructions: &[Instruction], signers: &[Pubkey]) -> Result<(), TransactionError> {
        for (i, ix) in instructions.iter().enumerate() {
            self.process(ix, signers)
                .map_err(|e| TransactionError::InstructionError(i as u8, e))?;
        }
        Ok(())
    }

    fn process(&mut self, ix: &Instruction, signers: &[Pubkey]) -> IxResult {
        if ix.program_id == self.program_id {
            self.process_multisig(ix, signers)
        } else if ix.program_id == system_program::ID {
            self.process_system(ix, signers)
        } else if ix.program_id == spl_token::ID {
            self.process_token(ix, signers)
        } else if ix.program_id == spl_associated_token_account::ID {
            self.process_associated_token(ix, signers)
        } else {
            Err(InstructionError::UnsupportedProgramId)
        }
    }

    // Lamports

    fn debit(&mut self, key: &Pubkey, lamports: u64) -> IxResult {
        let account = self
            .accounts
            .get_mut(key)
            .filter(|a| a.lamports >= lamports)
            .ok_or_else(|| program_error(ProgramErrorCode::ResultWithNegativeLamports))?;
        account.lamports -= lamports;
        Ok(())
    }

    fn credit(&mut self, key: &Pubkey, lamports: u64) -> IxResult {
        let account = self
            .accounts
            .entry(*key)
            .or_insert_with(|| Account::new(0, 0, &system_program::ID));
        account.lamports = account
            .lamports
            .checked_add(lamports)
            .ok_or(InstructionError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Allocate a rent-exempt account funded by `payer`
    fn create_account(&mut self, payer: &Pubkey, address: &Pubkey, owner: Pubkey, data: Vec<u8>) -> IxResult {
        let in_use = self
            .accounts
            .get(address)
            .map(|a| a.lamports > 0 || !a.data.is_empty())
            .unwrap_or(false);
        if in_use {
            return Err(program_error(ProgramErrorCode::AccountAlreadyInUse));
        }
        let lamports = rent_exempt_minimum(data.len());
        self.debit(payer, lamports)?;
        self.accounts.insert(
            *address,
            Account {
                lamports,
                data,
                owner,
                executable: false,
                rent_epoch: 0,
            },
        );
        Ok(())
    }

    // Program accounts

    fn load<T: AnchorAccount>(&self, key: &Pubkey) -> IxResult<T> {
        let account = self
            .accounts
            .get(key)
            .filter(|a| a.owner == self.program_id && a.lamports > 0)
            .ok_or_else(|| program_error(ProgramErrorCode::AccountNotInitialized))?;
        T::decode(&account.data).map_err(|_| program_error(ProgramErrorCode::AccountDidNotDeserialize))
    }

    fn store<T: AnchorAccount>(&mut self, key: &Pubkey, value: &T) -> IxResult {
        let data = value.encode().map_err(|_| InstructionError::InvalidAccountData)?;
        let account = self
            .accounts
            .get_mut(key)
            .ok_or(InstructionError::UninitializedAccount)?;
        account.data = data;
        Ok(())
    }

    fn create_program_account<T: AnchorAccount>(&mut self, payer: &Pubkey, address: &Pubkey, value: &T) -> IxResult {
        let data = value.encode().map_err(|_| InstructionError::InvalidAccountData)?;
        self.create_account(payer, address, self.program_id, data)
    }

    // Multisig program

    fn process_multisig(&mut self, ix: &Instruction, signers: &[Pubkey]) -> IxResult {
        let (disc, args) = split_data(&ix.data).ok_or(InstructionError::InvalidInstructionData)?;
        let is = |name: &str| disc == instruction_discriminator(name);

        if is(MULTISIG_CREATE_V2) {
            self.multisig_create(ix, args, signers)
        } else if is(VAULT_TRANSACTION_CREATE) {
            self.vault_transaction_create(ix, args, signers)
        } else if is(PROPOSAL_CREATE) {
            self.proposal_create(ix, args, signers)
        } else if is(PROPOSAL_ACTIVATE) {
            self.proposal_activate(ix, signers)
        } else if is(PROPOSAL_APPROVE) {
            self.proposal_vote(ix, signers, true)
        } else if is(PROPOSAL_REJECT) {
            self.proposal_vote(ix, signers, false)
        } else if is(VAULT_TRANSACTION_EXECUTE) {
            self.vault_transaction_execute(ix, signers)
        } else {
            Err(InstructionError::InvalidInstructionData)
        }
    }

    fn multisig_create(&mut self, ix: &Instruction, args: &[u8], signers: &[Pubkey]) -> IxResult {
        let program_config = account_key(ix, 0)?;
        let treasury = account_key(ix, 1)?;
        let multisig_key = account_key(ix, 2)?;
        let create_key = account_key(ix, 3)?;
        let creator = account_key(ix, 4)?;
        require_signer(&create_key, signers)?;
        require_signer(&creator, signers)?;

        let args = MultisigCreateArgsV2::try_from_slice(args)
            .map_err(|_| InstructionError::InvalidInstructionData)?;
        let config: ProgramConfigState = self.load(&program_config)?;
        if treasury != config.treasury {
            return Err(program_error(ProgramErrorCode::InvalidAccount));
        }
        let (expected, bump) = squads::multisig_pda(&create_key, &self.program_id);
        if multisig_key != expected {
            return Err(program_error(ProgramErrorCode::ConstraintSeeds));
        }

        let mut members = args.members;
        members.sort_by_key(|m| m.key);
        if members.is_empty() {
            return Err(program_error(ProgramErrorCode::EmptyMembers));
        }
        if members.windows(2).any(|pair| pair[0].key == pair[1].key) {
            return Err(program_error(ProgramErrorCode::DuplicateMember));
        }
        if members.iter().any(|m| m.permissions.mask > Permission::all().bits()) {
            return Err(program_error(ProgramErrorCode::UnknownPermission));
        }

        let state = MultisigState {
            create_key,
            config_authority: args.config_authority.unwrap_or_default(),
            threshold: args.threshold,
            time_lock: args.time_lock,
            transaction_index: 0,
            stale_transaction_index: 0,
            rent_collector: args.rent_collector,
            bump,
            members,
        };
        if state.num_voters() == 0 {
            return Err(program_error(ProgramErrorCode::NoVoters));
        }
        if state.threshold == 0 || usize::from(state.threshold) > state.num_voters() {
            return Err(program_error(ProgramErrorCode::InvalidThreshold));
        }

        self.create_program_account(&creator, &multisig_key, &state)?;
        if config.multisig_creation_fee > 0 {
            self.debit(&creator, config.multisig_creation_fee)?;
            self.credit(&treasury, config.multisig_creation_fee)?;
        }
        Ok(())
    }

    fn vault_transaction_create(&mut self, ix: &Instruction, args: &[u8], signers: &[Pubkey]) -> IxResult {
        let multisig_key = account_key(ix, 0)?;
        let transaction_key = account_key(ix, 1)?;
        let creator = account_key(ix, 2)?;
        let rent_payer = account_key(ix, 3)?;
        require_signer(&creator, signers)?;
        require_signer(&rent_payer, signers)?;

        let args = VaultTransactionCreateArgs::try_from_slice(args)
            .map_err(|_| InstructionError::InvalidInstructionData)?;
        let mut multisig: MultisigState = self.load(&multisig_key)?;
        require_member(&multisig, &creator, Permission::INITIATE)?;

        let index = multisig
            .next_transaction_index()
            .ok_or(InstructionError::ArithmeticOverflow)?;
        let (expected, bump) = squads::transaction_pda(&multisig_key, index, &self.program_id);
        if transaction_key != expected {
            return Err(program_error(ProgramErrorCode::ConstraintSeeds));
        }

        let message = VaultTransactionMessage::from_compact_bytes(&args.transaction_message)
            .map_err(|_| program_error(ProgramErrorCode::InvalidTransactionMessage))?;
        let (vault, vault_bump) = squads::vault_pda(&multisig_key, args.vault_index, &self.program_id);
        if message.num_signers == 0 || message.account_keys.first() != Some(&vault) {
            return Err(program_error(ProgramErrorCode::InvalidTransactionMessage));
        }

        let transaction = VaultTransactionState {
            multisig: multisig_key,
            creator,
            index,
            bump,
            vault_index: args.vault_index,
            vault_bump,
            ephemeral_signer_bumps: Vec::new(),
            message,
        };
        self.create_program_account(&rent_payer, &transaction_key, &transaction)?;

        multisig.transaction_index = index;
        self.store(&multisig_key, &multisig)
    }

    fn proposal_create(&mut self, ix: &Instruction, args: &[u8], signers: &[Pubkey]) -> IxResult {
        let multisig_key = account_key(ix, 0)?;
        let proposal_key = account_key(ix, 1)?;
        let creator = account_key(ix, 2)?;
        let rent_payer = account_key(ix, 3)?;
        require_signer(&creator, signers)?;
        require_signer(&rent_payer, signers)?;

        let args = ProposalCreateArgs::try_from_slice(args)
            .map_err(|_| InstructionError::InvalidInstructionData)?;
        let multisig: MultisigState = self.load(&multisig_key)?;
        if args.transaction_index > multisig.transaction_index {
            return Err(program_error(ProgramErrorCode::InvalidTransactionIndex));
        }
        if args.transaction_index <= multisig.stale_transaction_index {
            return Err(program_error(ProgramErrorCode::StaleProposal));
        }
        if !multisig.is_member(&creator) {
            return Err(program_error(ProgramErrorCode::NotAMember));
        }
        if !multisig.member_has_permission(&creator, Permission::INITIATE)
            && !multisig.member_has_permission(&creator, Permission::VOTE)
        {
            return Err(program_error(ProgramErrorCode::Unauthorized));
        }

        let (expected, bump) =
            squads::proposal_pda(&multisig_key, args.transaction_index, &self.program_id);
        if proposal_key != expected {
            return Err(program_error(ProgramErrorCode::ConstraintSeeds));
        }

        let status = if args.draft {
            ProposalStatusState::Draft {
                timestamp: self.clock,
            }
        } else {
            ProposalStatusState::Active {
                timestamp: self.clock,
            }
        };
        let proposal = ProposalState {
            multisig: multisig_key,
            transaction_index: args.transaction_index,
            status,
            bump,
            approved: Vec::new(),
            rejected: Vec::new(),
            cancelled: Vec::new(),
        };
        self.create_program_account(&rent_payer, &proposal_key, &proposal)
    }

    /// Multisig, member and proposal of an activate/vote instruction
    fn load_vote_accounts(
        &self,
        ix: &Instruction,
        signers: &[Pubkey],
    ) -> IxResult<(MultisigState, Pubkey, Pubkey, ProposalState)> {
        let multisig_key = account_key(ix, 0)?;
        let member = account_key(ix, 1)?;
        let proposal_key = account_key(ix, 2)?;
        require_signer(&member, signers)?;

        let multisig: MultisigState = self.load(&multisig_key)?;
        let proposal: ProposalState = self.load(&proposal_key)?;
        if proposal.multisig != multisig_key {
            return Err(program_error(ProgramErrorCode::ProposalForAnotherMultisig));
        }
        if proposal.transaction_index <= multisig.stale_transaction_index {
            return Err(program_error(ProgramErrorCode::StaleProposal));
        }
        Ok((multisig, member, proposal_key, proposal))
    }

    fn proposal_activate(&mut self, ix: &Instruction, signers: &[Pubkey]) -> IxResult {
        let (multisig, member, proposal_key, mut proposal) = self.load_vote_accounts(ix, signers)?;
        require_member(&multisig, &member, Permission::INITIATE)?;
        if !matches!(proposal.status, ProposalStatusState::Draft { .. }) {
            return Err(program_error(ProgramErrorCode::InvalidProposalStatus));
        }
        proposal.status = ProposalStatusState::Active {
            timestamp: self.clock,
        };
        self.store(&proposal_key, &proposal)
    }

    fn proposal_vote(&mut self, ix: &Instruction, signers: &[Pubkey], approve: bool) -> IxResult {
        let (multisig, member, proposal_key, mut proposal) = self.load_vote_accounts(ix, signers)?;
        require_member(&multisig, &member, Permission::VOTE)?;
        if !matches!(proposal.status, ProposalStatusState::Active { .. }) {
            return Err(program_error(ProgramErrorCode::InvalidProposalStatus));
        }

        if approve {
            if proposal.approved.binary_search(&member).is_ok() {
                return Err(program_error(ProgramErrorCode::AlreadyApproved));
            }
            remove_sorted(&mut proposal.rejected, &member);
            insert_sorted(&mut proposal.approved, member);
            if proposal.approved.len() >= usize::from(multisig.threshold) {
                proposal.status = ProposalStatusState::Approved {
                    timestamp: self.clock,
                };
            }
        } else {
            if proposal.rejected.binary_search(&member).is_ok() {
                return Err(program_error(ProgramErrorCode::AlreadyRejected));
            }
            remove_sorted(&mut proposal.approved, &member);
            insert_sorted(&mut proposal.rejected, member);
            if proposal.rejected.len() >= multisig.cutoff() {
                proposal.status = ProposalStatusState::Rejected {
                    timestamp: self.clock,
                };
            }
        }
        self.store(&proposal_key, &proposal)
    }

    fn vault_transaction_execute(&mut self, ix: &Instruction, signers: &[Pubkey]) -> IxResult {
        let multisig_key = account_key(ix, 0)?;
        let proposal_key = account_key(ix, 1)?;
        let transaction_key = account_key(ix, 2)?;
        let member = account_key(ix, 3)?;
        require_signer(&member, signers)?;

        let multisig: MultisigState = self.load(&multisig_key)?;
        require_member(&multisig, &member, Permission::EXECUTE)?;

        let mut proposal: ProposalState = self.load(&proposal_key)?;
        if proposal.multisig != multisig_key {
            return Err(program_error(ProgramErrorCode::ProposalForAnotherMultisig));
        }
        match proposal.status {
            ProposalStatusState::Approved { timestamp } => {
                if self.clock - timestamp < i64::from(multisig.time_lock) {
                    return Err(program_error(ProgramErrorCode::TimeLockNotReleased));
                }
            }
            _ => return Err(program_error(ProgramErrorCode::InvalidProposalStatus)),
        }

        let transaction: VaultTransactionState = self.load(&transaction_key)?;
        if transaction.multisig != multisig_key {
            return Err(program_error(ProgramErrorCode::TransactionForAnotherMultisig));
        }
        if transaction.index != proposal.transaction_index {
            return Err(program_error(ProgramErrorCode::TransactionNotMatchingProposal));
        }

        let message = &transaction.message;
        let expected: Vec<Pubkey> = message
            .execution_accounts()
            .into_iter()
            .map(|meta| meta.pubkey)
            .collect();
        let remaining: Vec<Pubkey> = ix.accounts.iter().skip(4).map(|meta| meta.pubkey).collect();
        if remaining.len() != expected.len() {
            return Err(program_error(ProgramErrorCode::InvalidNumberOfAccounts));
        }
        if remaining != expected {
            return Err(program_error(ProgramErrorCode::InvalidAccount));
        }

        let (vault, _) = squads::vault_pda(&multisig_key, transaction.vault_index, &self.program_id);
        for compiled in &message.instructions {
            let (program_id, keys) = message
                .resolve(compiled)
                .map_err(|_| program_error(ProgramErrorCode::InvalidTransactionMessage))?;
            let accounts = compiled
                .account_indexes
                .iter()
                .zip(keys)
                .map(|(index, pubkey)| AccountMeta {
                    pubkey,
                    is_signer: message.is_signer_index(usize::from(*index)),
                    is_writable: message.is_writable_index(usize::from(*index)),
                })
                .collect::<Vec<_>>();
            if accounts.iter().any(|meta| meta.is_signer && meta.pubkey != vault) {
                return Err(InstructionError::MissingRequiredSignature);
            }
            let inner = Instruction {
                program_id,
                accounts,
                data: compiled.data.clone(),
            };
            self.process(&inner, &[vault])?;
        }

        proposal.status = ProposalStatusState::Executed {
            timestamp: self.clock,
        };
        self.store(&proposal_key, &proposal)
    }

    // System program

    fn process_system(&mut self, ix: &Instruction, signers: &[Pubkey]) -> IxResult {
        let lamports =
            native::parse_transfer(&ix.data).ok_or(InstructionError::InvalidInstructionData)?;
        let from = account_key(ix, 0)?;
        let to = account_key(ix, 1)?;
        require_signer(&from, signers)?;

        if let Some(account) = self.accounts.get(&from) {
            if !account.data.is_empty() || account.owner != system_program::ID {
                return Err(InstructionError::InvalidArgument);
            }
        }
        self.debit(&from, lamports)?;
        self.credit(&to, lamports)
    }

    // Token programs

    fn token_account(&self, key: &Pubkey) -> IxResult<TokenAccount> {
        self.accounts
            .get(key)
            .filter(|a| a.owner == spl_token::ID)
            .and_then(|a| TokenAccount::unpack(&a.data).ok())
            .ok_or(InstructionError::UninitializedAccount)
    }

    fn mint(&self, key: &Pubkey) -> IxResult<Mint> {
        self.accounts
            .get(key)
            .filter(|a| a.owner == spl_token::ID)
            .and_then(|a| Mint::unpack(&a.data).ok())
            .ok_or(InstructionError::InvalidAccountData)
    }

    fn write_token_account(&mut self, key: &Pubkey, info: &TokenAccount) -> IxResult {
        let account = self
            .accounts
            .get_mut(key)
            .ok_or(InstructionError::UninitializedAccount)?;
        account.data = packed(info);
        Ok(())
    }

    fn process_token(&mut self, ix: &Instruction, signers: &[Pubkey]) -> IxResult {
        let (amount, decimals) =
            spl::parse_transfer_checked(&ix.data).ok_or(InstructionError::InvalidInstructionData)?;
        let source = account_key(ix, 0)?;
        let mint = account_key(ix, 1)?;
        let destination = account_key(ix, 2)?;
        let owner = account_key(ix, 3)?;
        require_signer(&owner, signers)?;

        let mut from = self.token_account(&source)?;
        let mut to = self.token_account(&destination)?;
        let mint_info = self.mint(&mint)?;
        if from.owner != owner {
            return Err(token_error(TokenError::OwnerMismatch));
        }
        if from.mint != mint || to.mint != mint {
            return Err(token_error(TokenError::MintMismatch));
        }
        if decimals != mint_info.decimals {
            return Err(token_error(TokenError::MintDecimalsMismatch));
        }
        if from.amount < amount {
            return Err(token_error(TokenError::InsufficientFunds));
        }
        if source == destination {
            return Ok(());
        }

        from.amount -= amount;
        to.amount = to
            .amount
            .checked_add(amount)
            .ok_or(token_error(TokenError::Overflow))?;
        self.write_token_account(&source, &from)?;
        self.write_token_account(&destination, &to)
    }

    fn process_associated_token(&mut self, ix: &Instruction, signers: &[Pubkey]) -> IxResult {
        let payer = account_key(ix, 0)?;
        let ata = account_key(ix, 1)?;
        let owner = account_key(ix, 2)?;
        let mint = account_key(ix, 3)?;
        // Only the idempotent create is supported
        let expected = spl::create_associated_token_account_idempotent(&payer, &owner, &mint);
        if ix.data != expected.data {
            return Err(InstructionError::InvalidInstructionData);
        }
        require_signer(&payer, signers)?;

        if let Ok(existing) = self.token_account(&ata) {
            if existing.owner == owner && existing.mint == mint {
                return Ok(());
            }
            return Err(InstructionError::InvalidAccountData);
        }
        if ata != associated_token_address(&owner, &mint) {
            return Err(InstructionError::InvalidSeeds);
        }
        self.mint(&mint)?;

        let data = token_account_data(&mint, &owner, 0);
        self.create_account(&payer, &ata, spl_token::ID, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOL: u64 = 1_000_000_000;

    async fn funded(ledger: &InMemoryLedger, lamports: u64) -> Keypair {
        let keypair = Keypair::new();
        ledger.airdrop(&keypair.pubkey(), lamports).await;
        keypair
    }

    #[tokio::test]
    async fn test_transfer_charges_fee() {
        let ledger = InMemoryLedger::new();
        let alice = funded(&ledger, SOL).await;
        let bob = Pubkey::new_unique();

        let ix = native::transfer(&alice.pubkey(), &bob, SOL / 2);
        ledger.submit(&[ix], &alice, &[]).await.unwrap();

        assert_eq!(ledger.balance(&bob).await.unwrap(), SOL / 2);
        assert_eq!(
            ledger.balance(&alice.pubkey()).await.unwrap(),
            SOL / 2 - LAMPORTS_PER_SIGNATURE
        );
    }

    #[tokio::test]
    async fn test_signatures_are_unique() {
        let ledger = InMemoryLedger::new();
        let alice = funded(&ledger, SOL).await;
        let bob = Pubkey::new_unique();

        let first = ledger
            .submit(&[native::transfer(&alice.pubkey(), &bob, SOL / 10)], &alice, &[])
            .await
            .unwrap();
        let second = ledger
            .submit(&[native::transfer(&alice.pubkey(), &bob, SOL / 10)], &alice, &[])
            .await
            .unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_failed_transaction_is_atomic() {
        let ledger = InMemoryLedger::new();
        let alice = funded(&ledger, SOL).await;
        let bob = Pubkey::new_unique();

        let ok = native::transfer(&alice.pubkey(), &bob, SOL / 10);
        let too_much = native::transfer(&alice.pubkey(), &bob, 10 * SOL);
        let err = ledger.submit(&[ok, too_much], &alice, &[]).await.unwrap_err();

        assert_eq!(err.custom_code(), Some(1));
        assert_eq!(ledger.balance(&bob).await.unwrap(), 0);
        // the fee is still charged
        assert_eq!(
            ledger.balance(&alice.pubkey()).await.unwrap(),
            SOL - LAMPORTS_PER_SIGNATURE
        );
    }

    #[tokio::test]
    async fn test_rent_exemption_enforced() {
        let ledger = InMemoryLedger::new();
        let alice = funded(&ledger, SOL).await;
        let bob = Pubkey::new_unique();

        let ix = native::transfer(&alice.pubkey(), &bob, 1_000);
        let err = ledger.submit(&[ix], &alice, &[]).await.unwrap_err();
        assert!(matches!(
            err,
            ClientFailure::Rejected(TransactionError::InsufficientFundsForRent { .. })
        ));
    }

    #[tokio::test]
    async fn test_fee_payer_checks() {
        let ledger = InMemoryLedger::new();
        let ghost = Keypair::new();
        let ix = native::transfer(&ghost.pubkey(), &Pubkey::new_unique(), 1);
        assert_eq!(
            ledger.submit(&[ix.clone()], &ghost, &[]).await.unwrap_err(),
            ClientFailure::Rejected(TransactionError::AccountNotFound)
        );

        ledger.airdrop(&ghost.pubkey(), 100).await;
        assert_eq!(
            ledger.submit(&[ix], &ghost, &[]).await.unwrap_err(),
            ClientFailure::Rejected(TransactionError::InsufficientFundsForFee)
        );
    }

    #[tokio::test]
    async fn test_missing_signer() {
        let ledger = InMemoryLedger::new();
        let payer = funded(&ledger, SOL).await;
        let other = funded(&ledger, SOL).await;

        let ix = native::transfer(&other.pubkey(), &Pubkey::new_unique(), SOL / 10);
        let err = ledger.submit(&[ix], &payer, &[]).await.unwrap_err();
        assert!(matches!(err, ClientFailure::Signing(_)));
    }

    #[tokio::test]
    async fn test_offline() {
        let ledger = InMemoryLedger::new();
        ledger.set_offline(true).await;
        assert!(matches!(ledger.version().await, Err(ClientFailure::Transport(_))));
        ledger.set_offline(false).await;
        assert_eq!(ledger.version().await.unwrap(), "in-memory");
    }

    #[tokio::test]
    async fn test_token_transfer_and_idempotent_create() {
        let ledger = InMemoryLedger::new();
        let alice = funded(&ledger, SOL).await;
        let bob = Pubkey::new_unique();
        let mint = ledger.create_mint(6).await;
        let source = ledger.mint_to(&mint, &alice.pubkey(), 5_000_000).await;
        let destination = associated_token_address(&bob, &mint);

        let create = spl::create_associated_token_account_idempotent(&alice.pubkey(), &bob, &mint);
        let transfer =
            spl::transfer_checked(&source, &mint, &destination, &alice.pubkey(), 1_500_000, 6).unwrap();
        ledger
            .submit(&[create.clone(), create, transfer], &alice, &[])
            .await
            .unwrap();

        assert_eq!(ledger.token_balance(&bob, &mint).await, 1_500_000);
        assert_eq!(ledger.token_balance(&alice.pubkey(), &mint).await, 3_500_000);

        let wrong_decimals =
            spl::transfer_checked(&source, &mint, &destination, &alice.pubkey(), 1, 9).unwrap();
        let err = ledger.submit(&[wrong_decimals], &alice, &[]).await.unwrap_err();
        assert_eq!(
            err.custom_code(),
            Some(TokenError::MintDecimalsMismatch as u32)
        );
    }
}
