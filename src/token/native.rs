//! Native asset (lamport) transfers through the system program

use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_instruction;

/// System instruction tag of `Transfer`
const TRANSFER_TAG: u32 = 2;

pub fn transfer(from: &Pubkey, to: &Pubkey, lamports: u64) -> Instruction {
    system_instruction::transfer(from, to, lamports)
}

/// Lamports moved by a system `Transfer`, `None` for any other instruction
pub fn parse_transfer(data: &[u8]) -> Option<u64> {
    if data.len() != 12 || data[..4] != TRANSFER_TAG.to_le_bytes() {
        return None;
    }
    let mut lamports = [0u8; 8];
    lamports.copy_from_slice(&data[4..]);
    Some(u64::from_le_bytes(lamports))
}
