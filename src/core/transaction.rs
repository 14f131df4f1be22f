//! Canonical transaction shape shared by every ingestion source
//!
//! Whatever the wire format, a notification is reduced to a
//! [`CanonicalTransaction`] whose instructions carry concrete account
//! addresses. Decoders only ever see this type.

use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Signature};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TransactionVersion {
    #[default]
    Legacy,
    V0,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalInstruction {
    pub program_id: Pubkey,
    pub accounts: Vec<Pubkey>,
    pub data: Vec<u8>,
    pub stack_height: Option<u32>,
}

/// Inner instructions executed by top-level instruction `index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnerInstructionGroup {
    pub index: usize,
    pub instructions: Vec<CanonicalInstruction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CanonicalTransaction {
    pub slot: u64,
    pub version: TransactionVersion,
    pub signatures: Vec<Signature>,
    pub instructions: Vec<CanonicalInstruction>,
    pub inner_instructions: Vec<InnerInstructionGroup>,
    pub log_messages: Vec<String>,
    pub pre_balances: Vec<u64>,
    pub post_balances: Vec<u64>,
    /// Execution error reported in the status metadata.
    pub failed: bool,
    pub captured_at_ms: i64,
}

/// Flattened instruction view handed to swap decoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedInstruction<'a> {
    pub program_id: Pubkey,
    pub accounts: &'a [Pubkey],
    pub data: &'a [u8],
    /// Top-level instruction this one belongs to.
    pub outer_index: usize,
    /// Position inside the parent's inner instruction list, `None` for top-level.
    pub inner_index: Option<usize>,
}

impl CanonicalTransaction {
    /// Primary signature; the default signature if none was carried.
    pub fn signature(&self) -> Signature {
        self.signatures.first().copied().unwrap_or_default()
    }

    /// Top-level instructions followed by their inner instructions, in execution order.
    pub fn parsed_instructions(&self) -> Vec<ParsedInstruction<'_>> {
        let inner_count: usize = self.inner_instructions.iter().map(|g| g.instructions.len()).sum();
        let mut out = Vec::with_capacity(self.instructions.len() + inner_count);

        for (outer_index, ix) in self.instructions.iter().enumerate() {
            out.push(ParsedInstruction {
                program_id: ix.program_id,
                accounts: &ix.accounts,
                data: &ix.data,
                outer_index,
                inner_index: None,
            });
            for group in self.inner_instructions.iter().filter(|g| g.index == outer_index) {
                for (inner_index, inner) in group.instructions.iter().enumerate() {
                    out.push(ParsedInstruction {
                        program_id: inner.program_id,
                        accounts: &inner.accounts,
                        data: &inner.data,
                        outer_index,
                        inner_index: Some(inner_index),
                    });
                }
            }
        }
        out
    }
}
