//! Command-line interface
//!
//! Amounts are entered in UI units (SOL, or whole tokens) and converted
//! to base units exactly.

pub mod commands;

pub use commands::*;
