//! JSON transaction notifications
//!
//! Covers `transactionSubscribe` websocket results and `getTransaction` JSON
//! responses in both `json` (compiled indices) and `jsonParsed` (expanded
//! account objects) encodings.

use std::str::FromStr;

use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use solana_sdk::{pubkey::Pubkey, signature::Signature};

use super::{parse_pubkey_str, AccountKeys};
use crate::core::{
    CanonicalInstruction, CanonicalTransaction, InnerInstructionGroup, NormalizeError,
    TransactionVersion,
};

/// `params.result` of a `transactionNotification`.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonTransactionNotification {
    pub slot: u64,
    #[serde(default)]
    pub signature: Option<String>,
    pub transaction: JsonTransactionWithMeta,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonTransactionWithMeta {
    #[serde(default)]
    pub transaction: Option<JsonTransaction>,
    #[serde(default)]
    pub meta: Option<JsonMeta>,
    #[serde(default)]
    pub version: Option<JsonVersion>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JsonVersion {
    Number(u8),
    Label(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonTransaction {
    #[serde(default)]
    pub signatures: Vec<String>,
    #[serde(default)]
    pub message: Option<JsonMessage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonMessage {
    #[serde(default)]
    pub account_keys: Vec<JsonAccountKey>,
    #[serde(default)]
    pub instructions: Vec<JsonInstruction>,
    #[serde(default)]
    pub address_table_lookups: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JsonAccountKey {
    Plain(String),
    Expanded { pubkey: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JsonInstruction {
    #[serde(rename_all = "camelCase")]
    Compiled {
        program_id_index: u8,
        accounts: Vec<u8>,
        data: String,
        #[serde(default)]
        stack_height: Option<u32>,
    },
    #[serde(rename_all = "camelCase")]
    PartiallyDecoded {
        program_id: String,
        accounts: Vec<String>,
        data: String,
        #[serde(default)]
        stack_height: Option<u32>,
    },
    /// Instruction the node already decoded (system, spl-token, ...); raw
    /// accounts and data are not available in this form.
    #[serde(rename_all = "camelCase")]
    Parsed {
        program_id: String,
        #[serde(default)]
        stack_height: Option<u32>,
    },
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct JsonMeta {
    #[serde(default)]
    pub err: Option<serde_json::Value>,
    #[serde(default)]
    pub pre_balances: Option<Vec<u64>>,
    #[serde(default)]
    pub post_balances: Option<Vec<u64>>,
    #[serde(default)]
    pub inner_instructions: Option<Vec<JsonInnerInstructions>>,
    #[serde(default)]
    pub log_messages: Option<Vec<String>>,
    #[serde(default)]
    pub loaded_addresses: Option<JsonLoadedAddresses>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonInnerInstructions {
    pub index: usize,
    #[serde(default)]
    pub instructions: Vec<JsonInstruction>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct JsonLoadedAddresses {
    #[serde(default)]
    pub writable: Vec<String>,
    #[serde(default)]
    pub readonly: Vec<String>,
}

/// Base58 first; some gRPC-to-JSON bridges ship base64 signature bytes instead.
fn parse_signature(s: &str) -> Result<Signature, NormalizeError> {
    if let Ok(sig) = Signature::from_str(s) {
        return Ok(sig);
    }
    general_purpose::STANDARD
        .decode(s)
        .ok()
        .and_then(|bytes| <[u8; 64]>::try_from(bytes.as_slice()).ok())
        .map(Signature::from)
        .ok_or_else(|| NormalizeError::malformed(format!("invalid signature {}", s)))
}

fn decode_data(data: &str) -> Result<Vec<u8>, NormalizeError> {
    bs58::decode(data)
        .into_vec()
        .map_err(|e| NormalizeError::malformed(format!("failed to decode instruction data: {}", e)))
}

fn convert_instruction(
    ix: JsonInstruction,
    keys: &AccountKeys,
) -> Result<CanonicalInstruction, NormalizeError> {
    match ix {
        JsonInstruction::Compiled { program_id_index, accounts, data, stack_height } => {
            keys.resolve(program_id_index as usize, &accounts, decode_data(&data)?, stack_height)
        }
        JsonInstruction::PartiallyDecoded { program_id, accounts, data, stack_height } => {
            Ok(CanonicalInstruction {
                program_id: parse_pubkey_str(&program_id)?,
                accounts: accounts.iter().map(|a| parse_pubkey_str(a)).collect::<Result<_, _>>()?,
                data: decode_data(&data)?,
                stack_height,
            })
        }
        JsonInstruction::Parsed { program_id, stack_height } => Ok(CanonicalInstruction {
            program_id: parse_pubkey_str(&program_id)?,
            accounts: Vec::new(),
            data: Vec::new(),
            stack_height,
        }),
    }
}

pub fn normalize_json(
    notification: JsonTransactionNotification,
    captured_at_ms: i64,
) -> Result<CanonicalTransaction, NormalizeError> {
    normalize_with_meta(notification.transaction, notification.slot, captured_at_ms)
}

pub fn normalize_with_meta(
    with_meta: JsonTransactionWithMeta,
    slot: u64,
    captured_at_ms: i64,
) -> Result<CanonicalTransaction, NormalizeError> {
    let tx = with_meta
        .transaction
        .ok_or_else(|| NormalizeError::malformed("missing transaction"))?;
    let message = tx
        .message
        .ok_or_else(|| NormalizeError::malformed("missing message"))?;

    if message.account_keys.is_empty() {
        return Err(NormalizeError::malformed("missing account keys"));
    }
    if tx.signatures.is_empty() {
        return Err(NormalizeError::malformed("missing signatures"));
    }

    let signatures = tx
        .signatures
        .iter()
        .map(|s| parse_signature(s))
        .collect::<Result<Vec<_>, _>>()?;

    let meta = with_meta.meta.unwrap_or_default();

    // jsonParsed already lists lookup-table addresses inside accountKeys
    let expanded = message
        .account_keys
        .iter()
        .any(|k| matches!(k, JsonAccountKey::Expanded { .. }));

    let static_keys = message
        .account_keys
        .iter()
        .map(|k| match k {
            JsonAccountKey::Plain(s) | JsonAccountKey::Expanded { pubkey: s } => parse_pubkey_str(s),
        })
        .collect::<Result<Vec<Pubkey>, _>>()?;

    let (writable, readonly) = match (&meta.loaded_addresses, expanded) {
        (Some(loaded), false) => (
            loaded.writable.iter().map(|s| parse_pubkey_str(s)).collect::<Result<Vec<_>, _>>()?,
            loaded.readonly.iter().map(|s| parse_pubkey_str(s)).collect::<Result<Vec<_>, _>>()?,
        ),
        _ => (Vec::new(), Vec::new()),
    };
    let keys = AccountKeys::new(static_keys, writable, readonly);

    let instructions = message
        .instructions
        .into_iter()
        .map(|ix| convert_instruction(ix, &keys))
        .collect::<Result<Vec<_>, _>>()?;

    let inner_instructions = meta
        .inner_instructions
        .unwrap_or_default()
        .into_iter()
        .map(|group| {
            let instructions = group
                .instructions
                .into_iter()
                .map(|ix| convert_instruction(ix, &keys))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(InnerInstructionGroup { index: group.index, instructions })
        })
        .collect::<Result<Vec<_>, NormalizeError>>()?;

    let has_lookups = message
        .address_table_lookups
        .as_ref()
        .map(|l| !l.is_empty())
        .unwrap_or(false);
    let version = match with_meta.version {
        Some(JsonVersion::Number(_)) => TransactionVersion::V0,
        Some(JsonVersion::Label(_)) => TransactionVersion::Legacy,
        None if has_lookups => TransactionVersion::V0,
        None => TransactionVersion::Legacy,
    };

    Ok(CanonicalTransaction {
        slot,
        version,
        signatures,
        instructions,
        inner_instructions,
        log_messages: meta.log_messages.unwrap_or_default(),
        pre_balances: meta.pre_balances.unwrap_or_default(),
        post_balances: meta.post_balances.unwrap_or_default(),
        failed: meta.err.map(|e| !e.is_null()).unwrap_or(false),
        captured_at_ms,
    })
}
