//! Vault transaction messages
//!
//! A vault transaction stores a compiled message whose fee payer is the
//! vault. The program receives it at creation time in a compact encoding
//! (u8 length prefixes, u16 for instruction data) and stores it with
//! regular borsh vectors.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// The compact encoding limits account keys to a u8 count
pub const MAX_MESSAGE_KEYS: usize = u8::MAX as usize;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MessageError {
    #[error("Message needs at least one instruction")]
    Empty,
    #[error("Too many {what}: {count}")]
    TooMany { what: &'static str, count: usize },
    #[error("Message truncated at byte {0}")]
    Truncated(usize),
    #[error("Trailing bytes after message: {0}")]
    TrailingBytes(usize),
    #[error("Account index {0} out of range")]
    IndexOutOfRange(u8),
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct MultisigCompiledInstruction {
    pub program_id_index: u8,
    pub account_indexes: Vec<u8>,
    pub data: Vec<u8>,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct MultisigMessageAddressTableLookup {
    pub account_key: Pubkey,
    pub writable_indexes: Vec<u8>,
    pub readonly_indexes: Vec<u8>,
}

/// Compiled message executed by the vault
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct VaultTransactionMessage {
    pub num_signers: u8,
    pub num_writable_signers: u8,
    pub num_writable_non_signers: u8,
    /// Signers first (writable, then read-only), then non-signers
    /// (writable, then read-only).
    pub account_keys: Vec<Pubkey>,
    pub instructions: Vec<MultisigCompiledInstruction>,
    pub address_table_lookups: Vec<MultisigMessageAddressTableLookup>,
}

impl VaultTransactionMessage {
    /// Compile `instructions` with `vault` as the fee payer
    pub fn compile(vault: &Pubkey, instructions: &[Instruction]) -> Result<Self, MessageError> {
        if instructions.is_empty() {
            return Err(MessageError::Empty);
        }

        let message = Message::new(instructions, Some(vault));
        if message.account_keys.len() > MAX_MESSAGE_KEYS {
            return Err(MessageError::TooMany {
                what: "account keys",
                count: message.account_keys.len(),
            });
        }

        let header = message.header;
        let num_keys = message.account_keys.len() as u8;
        let num_signers = header.num_required_signatures;
        let num_writable_signers = num_signers - header.num_readonly_signed_accounts;
        let num_writable_non_signers =
            num_keys - num_signers - header.num_readonly_unsigned_accounts;

        let instructions = message
            .instructions
            .into_iter()
            .map(|ix| MultisigCompiledInstruction {
                program_id_index: ix.program_id_index,
                account_indexes: ix.accounts,
                data: ix.data,
            })
            .collect();

        Ok(Self {
            num_signers,
            num_writable_signers,
            num_writable_non_signers,
            account_keys: message.account_keys,
            instructions,
            address_table_lookups: Vec::new(),
        })
    }

    pub fn is_signer_index(&self, index: usize) -> bool {
        index < usize::from(self.num_signers)
    }

    pub fn is_writable_index(&self, index: usize) -> bool {
        let num_signers = usize::from(self.num_signers);
        if index < num_signers {
            index < usize::from(self.num_writable_signers)
        } else {
            index - num_signers < usize::from(self.num_writable_non_signers)
        }
    }

    /// Accounts to append to the execute instruction, in message order.
    /// The vault signs through the program, never at transaction level.
    pub fn execution_accounts(&self) -> Vec<AccountMeta> {
        let lookups = self
            .address_table_lookups
            .iter()
            .map(|lookup| AccountMeta::new_readonly(lookup.account_key, false));
        let keys = self.account_keys.iter().enumerate().map(|(i, key)| {
            if self.is_writable_index(i) {
                AccountMeta::new(*key, false)
            } else {
                AccountMeta::new_readonly(*key, false)
            }
        });
        lookups.chain(keys).collect()
    }

    /// Resolve an instruction back into program id and account keys
    pub fn resolve(
        &self,
        ix: &MultisigCompiledInstruction,
    ) -> Result<(Pubkey, Vec<Pubkey>), MessageError> {
        let key = |i: u8| {
            self.account_keys
                .get(usize::from(i))
                .copied()
                .ok_or(MessageError::IndexOutOfRange(i))
        };
        let program_id = key(ix.program_id_index)?;
        let accounts = ix
            .account_indexes
            .iter()
            .map(|i| key(*i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((program_id, accounts))
    }

    /// Encode in the compact form `vault_transaction_create` expects
    pub fn to_compact_bytes(&self) -> Result<Vec<u8>, MessageError> {
        let mut out = vec![
            self.num_signers,
            self.num_writable_signers,
            self.num_writable_non_signers,
        ];

        out.push(u8_len("account keys", self.account_keys.len())?);
        for key in &self.account_keys {
            out.extend_from_slice(key.as_ref());
        }

        out.push(u8_len("instructions", self.instructions.len())?);
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            out.push(u8_len("instruction accounts", ix.account_indexes.len())?);
            out.extend_from_slice(&ix.account_indexes);
            let data_len = u16::try_from(ix.data.len()).map_err(|_| MessageError::TooMany {
                what: "instruction data bytes",
                count: ix.data.len(),
            })?;
            out.extend_from_slice(&data_len.to_le_bytes());
            out.extend_from_slice(&ix.data);
        }

        out.push(u8_len("address table lookups", self.address_table_lookups.len())?);
        for lookup in &self.address_table_lookups {
            out.extend_from_slice(lookup.account_key.as_ref());
            out.push(u8_len("writable indexes", lookup.writable_indexes.len())?);
            out.extend_from_slice(&lookup.writable_indexes);
            out.push(u8_len("readonly indexes", lookup.readonly_indexes.len())?);
            out.extend_from_slice(&lookup.readonly_indexes);
        }

        Ok(out)
    }

    /// Decode the compact form
    pub fn from_compact_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        let mut reader = CompactReader { bytes, pos: 0 };

        let num_signers = reader.u8()?;
        let num_writable_signers = reader.u8()?;
        let num_writable_non_signers = reader.u8()?;

        let key_count = reader.u8()?;
        let mut account_keys = Vec::with_capacity(usize::from(key_count));
        for _ in 0..key_count {
            account_keys.push(reader.pubkey()?);
        }

        let ix_count = reader.u8()?;
        let mut instructions = Vec::with_capacity(usize::from(ix_count));
        for _ in 0..ix_count {
            let program_id_index = reader.u8()?;
            let n = reader.u8()?;
            let account_indexes = reader.take(usize::from(n))?.to_vec();
            let data_len = reader.u16()?;
            let data = reader.take(usize::from(data_len))?.to_vec();
            instructions.push(MultisigCompiledInstruction {
                program_id_index,
                account_indexes,
                data,
            });
        }

        let lookup_count = reader.u8()?;
        let mut address_table_lookups = Vec::with_capacity(usize::from(lookup_count));
        for _ in 0..lookup_count {
            let account_key = reader.pubkey()?;
            let n = reader.u8()?;
            let writable_indexes = reader.take(usize::from(n))?.to_vec();
            let n = reader.u8()?;
            let readonly_indexes = reader.take(usize::from(n))?.to_vec();
            address_table_lookups.push(MultisigMessageAddressTableLookup {
                account_key,
                writable_indexes,
                readonly_indexes,
            });
        }

        if reader.pos != bytes.len() {
            return Err(MessageError::TrailingBytes(bytes.len() - reader.pos));
        }

        Ok(Self {
            num_signers,
            num_writable_signers,
            num_writable_non_signers,
            account_keys,
            instructions,
            address_table_lookups,
        })
    }
}

fn u8_len(what: &'static str, count: usize) -> Result<u8, MessageError> {
    u8::try_from(count).map_err(|_| MessageError::TooMany { what, count })
}

struct CompactReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> CompactReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], MessageError> {
        let end = self.pos.checked_add(n).ok_or(MessageError::Truncated(self.pos))?;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(MessageError::Truncated(self.pos))?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, MessageError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, MessageError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn pubkey(&mut self) -> Result<Pubkey, MessageError> {
        let b = self.take(32)?;
        let mut key = [0u8; 32];
        key.copy_from_slice(b);
        Ok(Pubkey::new_from_array(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::system_instruction;

    #[test]
    fn test_compile_transfer() {
        let vault = Pubkey::new_unique();
        let to = Pubkey::new_unique();
        let ix = system_instruction::transfer(&vault, &to, 100);

        let msg = VaultTransactionMessage::compile(&vault, &[ix]).unwrap();
        assert_eq!(msg.account_keys[0], vault);
        assert_eq!(msg.num_signers, 1);
        assert_eq!(msg.num_writable_signers, 1);
        // recipient writable, system program read-only
        assert_eq!(msg.num_writable_non_signers, 1);
        assert_eq!(msg.account_keys.len(), 3);
        assert!(msg.is_writable_index(1));
        assert!(!msg.is_writable_index(2));

        let (program, accounts) = msg.resolve(&msg.instructions[0]).unwrap();
        assert_eq!(program, solana_sdk::system_program::ID);
        assert_eq!(accounts, vec![vault, to]);
    }

    #[test]
    fn test_compact_encoding() {
        let vault = Pubkey::new_unique();
        let to = Pubkey::new_unique();
        let msg = VaultTransactionMessage::compile(
            &vault,
            &[system_instruction::transfer(&vault, &to, 42)],
        )
        .unwrap();

        let bytes = msg.to_compact_bytes().unwrap();
        // 3 header + 1 + 3*32 keys + 1 ix count + (1 + 1 + 2 + 2 + 12) + 1 lookups
        assert_eq!(bytes.len(), 3 + 1 + 96 + 1 + 18 + 1);
        assert_eq!(VaultTransactionMessage::from_compact_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_compact_rejects_truncation() {
        let vault = Pubkey::new_unique();
        let msg = VaultTransactionMessage::compile(
            &vault,
            &[system_instruction::transfer(&vault, &Pubkey::new_unique(), 1)],
        )
        .unwrap();
        let bytes = msg.to_compact_bytes().unwrap();

        assert!(matches!(
            VaultTransactionMessage::from_compact_bytes(&bytes[..bytes.len() - 3]),
            Err(MessageError::Truncated(_))
        ));
        let mut longer = bytes.clone();
        longer.push(0);
        assert_eq!(
            VaultTransactionMessage::from_compact_bytes(&longer),
            Err(MessageError::TrailingBytes(1))
        );
    }

    #[test]
    fn test_execution_accounts_never_sign() {
        let vault = Pubkey::new_unique();
        let msg = VaultTransactionMessage::compile(
            &vault,
            &[system_instruction::transfer(&vault, &Pubkey::new_unique(), 1)],
        )
        .unwrap();

        let metas = msg.execution_accounts();
        assert_eq!(metas.len(), 3);
        assert!(metas.iter().all(|m| !m.is_signer));
        assert!(metas[0].is_writable);
    }

    #[test]
    fn test_empty_message() {
        assert_eq!(
            VaultTransactionMessage::compile(&Pubkey::new_unique(), &[]),
            Err(MessageError::Empty)
        );
    }
}
