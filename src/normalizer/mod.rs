//! Transaction normalizer
//!
//! Reduces every supported notification shape to a [`CanonicalTransaction`]:
//!
//! - Yellowstone gRPC `SubscribeUpdateTransaction` (raw bytes, compiled indices)
//! - JSON-parsed websocket / RPC payloads (see [`json`])
//! - RPC `getTransaction` responses in base64, base58 or JSON encoding
//!
//! Account indices resolve against static keys first, then addresses loaded
//! from lookup tables (writable before readonly). A missing message, missing
//! signatures or an index outside that list rejects the whole transaction;
//! missing status metadata falls back to empty defaults.

pub mod json;

use std::str::FromStr;

use base64::{engine::general_purpose, Engine as _};
use log::debug;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_sdk::{
    message::VersionedMessage, pubkey::Pubkey, signature::Signature,
    transaction::VersionedTransaction,
};
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction, TransactionBinaryEncoding,
    UiInstruction, UiLoadedAddresses, UiTransactionEncoding,
};
use yellowstone_grpc_proto::prelude::SubscribeUpdateTransaction;

use crate::core::{
    CanonicalInstruction, CanonicalTransaction, FetchError, InnerInstructionGroup, NormalizeError,
    TransactionVersion,
};

pub use json::{JsonTransactionNotification, JsonTransactionWithMeta};

/// Notification as received from an ingestion source, consumed by [`normalize`].
#[derive(Debug)]
pub enum RawNotification {
    Grpc(SubscribeUpdateTransaction),
    Json(JsonTransactionNotification),
    Rpc(EncodedConfirmedTransactionWithStatusMeta),
}

pub fn normalize(
    raw: RawNotification,
    captured_at_ms: i64,
) -> Result<CanonicalTransaction, NormalizeError> {
    match raw {
        RawNotification::Grpc(update) => normalize_grpc(update, captured_at_ms),
        RawNotification::Json(notification) => json::normalize_json(notification, captured_at_ms),
        RawNotification::Rpc(rpc_tx) => normalize_rpc(rpc_tx, captured_at_ms),
    }
}

/// Fetch a confirmed transaction by signature and normalize it.
pub async fn fetch_and_normalize(
    rpc: &RpcClient,
    signature: &Signature,
    captured_at_ms: i64,
) -> Result<CanonicalTransaction, FetchError> {
    let config = RpcTransactionConfig {
        encoding: Some(UiTransactionEncoding::Base64),
        commitment: None,
        max_supported_transaction_version: Some(0),
    };
    let rpc_tx = rpc
        .get_transaction_with_config(signature, config)
        .await
        .map_err(|e| FetchError::Rpc(e.to_string()))?;
    Ok(normalize_rpc(rpc_tx, captured_at_ms)?)
}

// ============================================================================
// Account key resolution
// ============================================================================

/// Ordered account list: static keys, loaded writable, loaded readonly.
pub(crate) struct AccountKeys {
    keys: Vec<Pubkey>,
}

impl AccountKeys {
    pub(crate) fn new(static_keys: Vec<Pubkey>, writable: Vec<Pubkey>, readonly: Vec<Pubkey>) -> Self {
        let mut keys = static_keys;
        keys.reserve(writable.len() + readonly.len());
        keys.extend(writable);
        keys.extend(readonly);
        Self { keys }
    }

    pub(crate) fn get(&self, index: usize) -> Result<Pubkey, NormalizeError> {
        self.keys.get(index).copied().ok_or_else(|| {
            NormalizeError::malformed(format!(
                "account index {} out of range ({} keys)",
                index,
                self.keys.len()
            ))
        })
    }

    pub(crate) fn resolve(
        &self,
        program_id_index: usize,
        accounts: &[u8],
        data: Vec<u8>,
        stack_height: Option<u32>,
    ) -> Result<CanonicalInstruction, NormalizeError> {
        let program_id = self.get(program_id_index)?;
        let accounts = accounts
            .iter()
            .map(|&i| self.get(i as usize))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CanonicalInstruction { program_id, accounts, data, stack_height })
    }
}

fn read_pubkey(bytes: &[u8]) -> Result<Pubkey, NormalizeError> {
    Pubkey::try_from(bytes)
        .map_err(|_| NormalizeError::malformed(format!("invalid pubkey length {}", bytes.len())))
}

fn read_signature(bytes: &[u8]) -> Result<Signature, NormalizeError> {
    <[u8; 64]>::try_from(bytes)
        .map(Signature::from)
        .map_err(|_| NormalizeError::malformed(format!("invalid signature length {}", bytes.len())))
}

pub(crate) fn parse_pubkey_str(s: &str) -> Result<Pubkey, NormalizeError> {
    Pubkey::from_str(s).map_err(|_| NormalizeError::malformed(format!("invalid pubkey {}", s)))
}

// ============================================================================
// Yellowstone gRPC
// ============================================================================

fn normalize_grpc(
    update: SubscribeUpdateTransaction,
    captured_at_ms: i64,
) -> Result<CanonicalTransaction, NormalizeError> {
    let info = update
        .transaction
        .ok_or_else(|| NormalizeError::malformed("missing transaction info"))?;
    let tx = info
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
        .map(|s| read_signature(s))
        .collect::<Result<Vec<_>, _>>()?;

    let meta = info.meta.unwrap_or_default();

    let keys = AccountKeys::new(
        message.account_keys.iter().map(|k| read_pubkey(k)).collect::<Result<_, _>>()?,
        meta.loaded_writable_addresses.iter().map(|k| read_pubkey(k)).collect::<Result<_, _>>()?,
        meta.loaded_readonly_addresses.iter().map(|k| read_pubkey(k)).collect::<Result<_, _>>()?,
    );

    let instructions = message
        .instructions
        .into_iter()
        .map(|ix| keys.resolve(ix.program_id_index as usize, &ix.accounts, ix.data, None))
        .collect::<Result<Vec<_>, _>>()?;

    let inner_instructions = meta
        .inner_instructions
        .into_iter()
        .map(|group| {
            let instructions = group
                .instructions
                .into_iter()
                .map(|ix| {
                    keys.resolve(ix.program_id_index as usize, &ix.accounts, ix.data, ix.stack_height)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(InnerInstructionGroup { index: group.index as usize, instructions })
        })
        .collect::<Result<Vec<_>, NormalizeError>>()?;

    Ok(CanonicalTransaction {
        slot: update.slot,
        version: if message.versioned { TransactionVersion::V0 } else { TransactionVersion::Legacy },
        signatures,
        instructions,
        inner_instructions,
        log_messages: meta.log_messages,
        pre_balances: meta.pre_balances,
        post_balances: meta.post_balances,
        failed: meta.err.is_some(),
        captured_at_ms,
    })
}

// ============================================================================
// RPC getTransaction
// ============================================================================

fn decode_versioned(bytes: &[u8]) -> Result<VersionedTransaction, NormalizeError> {
    bincode::deserialize(bytes)
        .map_err(|e| NormalizeError::malformed(format!("failed to deserialize transaction: {}", e)))
}

fn normalize_rpc(
    rpc_tx: EncodedConfirmedTransactionWithStatusMeta,
    captured_at_ms: i64,
) -> Result<CanonicalTransaction, NormalizeError> {
    let versioned = match &rpc_tx.transaction.transaction {
        EncodedTransaction::Binary(data, TransactionBinaryEncoding::Base64) => {
            let bytes = general_purpose::STANDARD
                .decode(data)
                .map_err(|e| NormalizeError::malformed(format!("failed to decode base64: {}", e)))?;
            decode_versioned(&bytes)?
        }
        EncodedTransaction::Binary(data, TransactionBinaryEncoding::Base58)
        | EncodedTransaction::LegacyBinary(data) => {
            let bytes = bs58::decode(data)
                .into_vec()
                .map_err(|e| NormalizeError::malformed(format!("failed to decode base58: {}", e)))?;
            decode_versioned(&bytes)?
        }
        EncodedTransaction::Json(_) => {
            debug!("rpc transaction in json encoding, routing through json normalizer");
            let value = serde_json::to_value(&rpc_tx.transaction)
                .map_err(|e| NormalizeError::malformed(e.to_string()))?;
            let with_meta: JsonTransactionWithMeta = serde_json::from_value(value)
                .map_err(|e| NormalizeError::malformed(e.to_string()))?;
            return json::normalize_with_meta(with_meta, rpc_tx.slot, captured_at_ms);
        }
        _ => return Err(NormalizeError::malformed("unsupported transaction encoding")),
    };

    if versioned.signatures.is_empty() {
        return Err(NormalizeError::malformed("missing signatures"));
    }

    let (version, static_keys, compiled) = match versioned.message {
        VersionedMessage::Legacy(msg) => (TransactionVersion::Legacy, msg.account_keys, msg.instructions),
        VersionedMessage::V0(msg) => (TransactionVersion::V0, msg.account_keys, msg.instructions),
    };
    if static_keys.is_empty() {
        return Err(NormalizeError::malformed("missing account keys"));
    }

    let meta = rpc_tx.transaction.meta;

    let loaded: Option<UiLoadedAddresses> =
        meta.as_ref().and_then(|m| m.loaded_addresses.clone().into());
    let (writable, readonly) = match loaded {
        Some(addrs) => (
            addrs.writable.iter().map(|s| parse_pubkey_str(s)).collect::<Result<Vec<_>, _>>()?,
            addrs.readonly.iter().map(|s| parse_pubkey_str(s)).collect::<Result<Vec<_>, _>>()?,
        ),
        None => (Vec::new(), Vec::new()),
    };
    let keys = AccountKeys::new(static_keys, writable, readonly);

    let instructions = compiled
        .into_iter()
        .map(|ix| keys.resolve(ix.program_id_index as usize, &ix.accounts, ix.data, None))
        .collect::<Result<Vec<_>, _>>()?;

    let mut inner_instructions = Vec::new();
    let mut log_messages = Vec::new();
    let mut pre_balances = Vec::new();
    let mut post_balances = Vec::new();
    let mut failed = false;

    if let Some(meta) = meta {
        let inner: Option<Vec<_>> = meta.inner_instructions.into();
        for group in inner.unwrap_or_default() {
            let mut instructions = Vec::with_capacity(group.instructions.len());
            for ix in group.instructions {
                if let UiInstruction::Compiled(compiled) = ix {
                    let data = bs58::decode(&compiled.data).into_vec().map_err(|e| {
                        NormalizeError::malformed(format!("failed to decode instruction data: {}", e))
                    })?;
                    instructions.push(keys.resolve(
                        compiled.program_id_index as usize,
                        &compiled.accounts,
                        data,
                        compiled.stack_height,
                    )?);
                }
            }
            inner_instructions.push(InnerInstructionGroup { index: group.index as usize, instructions });
        }

        let logs: Option<Vec<String>> = meta.log_messages.into();
        log_messages = logs.unwrap_or_default();
        pre_balances = meta.pre_balances;
        post_balances = meta.post_balances;
        failed = meta.err.is_some();
    }

    Ok(CanonicalTransaction {
        slot: rpc_tx.slot,
        version,
        signatures: versioned.signatures,
        instructions,
        inner_instructions,
        log_messages,
        pre_balances,
        post_balances,
        failed,
        captured_at_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use yellowstone_grpc_proto::prelude::{
        CompiledInstruction, InnerInstruction, InnerInstructions, Message,
        SubscribeUpdateTransactionInfo, Transaction, TransactionError, TransactionStatusMeta,
    };

    fn keys(n: usize) -> Vec<Pubkey> {
        (0..n).map(|_| Pubkey::new_unique()).collect()
    }

    fn grpc_update(
        static_keys: &[Pubkey],
        instructions: Vec<CompiledInstruction>,
        meta: Option<TransactionStatusMeta>,
    ) -> SubscribeUpdateTransaction {
        SubscribeUpdateTransaction {
            slot: 42,
            transaction: Some(SubscribeUpdateTransactionInfo {
                signature: vec![7u8; 64],
                transaction: Some(Transaction {
                    signatures: vec![vec![7u8; 64]],
                    message: Some(Message {
                        account_keys: static_keys.iter().map(|k| k.to_bytes().to_vec()).collect(),
                        instructions,
                        versioned: true,
                        ..Default::default()
                    }),
                }),
                meta,
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_grpc_resolves_loaded_addresses_in_order() {
        let statics = keys(3);
        let writable = keys(2);
        let readonly = keys(1);
        let meta = TransactionStatusMeta {
            loaded_writable_addresses: writable.iter().map(|k| k.to_bytes().to_vec()).collect(),
            loaded_readonly_addresses: readonly.iter().map(|k| k.to_bytes().to_vec()).collect(),
            log_messages: vec!["Program log: hi".to_string()],
            inner_instructions: vec![InnerInstructions {
                index: 0,
                instructions: vec![InnerInstruction {
                    program_id_index: 5,
                    accounts: vec![3],
                    data: vec![9],
                    stack_height: Some(2),
                }],
            }],
            ..Default::default()
        };
        let ix = CompiledInstruction { program_id_index: 2, accounts: vec![0, 3, 4, 5], data: vec![1, 2] };
        let tx = normalize(RawNotification::Grpc(grpc_update(&statics, vec![ix], Some(meta))), 1).unwrap();

        assert_eq!(tx.slot, 42);
        assert_eq!(tx.version, TransactionVersion::V0);
        assert_eq!(tx.instructions[0].program_id, statics[2]);
        assert_eq!(tx.instructions[0].accounts, vec![statics[0], writable[0], writable[1], readonly[0]]);
        assert_eq!(tx.inner_instructions[0].instructions[0].program_id, readonly[0]);
        assert_eq!(tx.inner_instructions[0].instructions[0].stack_height, Some(2));
        assert_eq!(tx.log_messages.len(), 1);
        assert!(!tx.failed);
    }

    #[test]
    fn test_grpc_out_of_range_index_is_malformed() {
        let statics = keys(2);
        let ix = CompiledInstruction { program_id_index: 1, accounts: vec![4], data: vec![] };
        let err = normalize(RawNotification::Grpc(grpc_update(&statics, vec![ix], None)), 0).unwrap_err();
        assert!(matches!(err, NormalizeError::MalformedTransaction(_)));
    }

    #[test]
    fn test_grpc_missing_message_is_malformed() {
        let mut update = grpc_update(&keys(1), vec![], None);
        if let Some(info) = update.transaction.as_mut() {
            if let Some(tx) = info.transaction.as_mut() {
                tx.message = None;
            }
        }
        assert!(normalize(RawNotification::Grpc(update), 0).is_err());
    }

    #[test]
    fn test_grpc_missing_meta_uses_defaults() {
        let statics = keys(2);
        let ix = CompiledInstruction { program_id_index: 1, accounts: vec![0], data: vec![] };
        let tx = normalize(RawNotification::Grpc(grpc_update(&statics, vec![ix], None)), 0).unwrap();
        assert!(tx.log_messages.is_empty());
        assert!(tx.inner_instructions.is_empty());
        assert!(!tx.failed);
    }

    #[test]
    fn test_grpc_error_marks_failed() {
        let meta = TransactionStatusMeta {
            err: Some(TransactionError { err: vec![1] }),
            ..Default::default()
        };
        let tx = normalize(RawNotification::Grpc(grpc_update(&keys(1), vec![], Some(meta))), 0).unwrap();
        assert!(tx.failed);
    }

    #[test]
    fn test_rpc_base64_legacy_transaction() {
        use solana_sdk::hash::Hash;
        use solana_sdk::message::compiled_instruction::CompiledInstruction as SdkCompiled;
        use solana_sdk::message::{legacy, MessageHeader};
        use solana_transaction_status::EncodedTransactionWithStatusMeta;

        let statics = keys(3);
        let message = legacy::Message {
            header: MessageHeader {
                num_required_signatures: 1,
                num_readonly_signed_accounts: 0,
                num_readonly_unsigned_accounts: 1,
            },
            account_keys: statics.clone(),
            recent_blockhash: Hash::default(),
            instructions: vec![SdkCompiled { program_id_index: 2, accounts: vec![0, 1], data: vec![5] }],
        };
        let versioned = VersionedTransaction {
            signatures: vec![Signature::from([3u8; 64])],
            message: VersionedMessage::Legacy(message),
        };
        let encoded = general_purpose::STANDARD.encode(bincode::serialize(&versioned).unwrap());

        let rpc_tx = EncodedConfirmedTransactionWithStatusMeta {
            slot: 9,
            transaction: EncodedTransactionWithStatusMeta {
                transaction: EncodedTransaction::Binary(encoded, TransactionBinaryEncoding::Base64),
                meta: None,
                version: None,
            },
            block_time: None,
        };

        let tx = normalize(RawNotification::Rpc(rpc_tx), 0).unwrap();
        assert_eq!(tx.slot, 9);
        assert_eq!(tx.version, TransactionVersion::Legacy);
        assert_eq!(tx.signature(), Signature::from([3u8; 64]));
        assert_eq!(tx.instructions[0].program_id, statics[2]);
        assert_eq!(tx.instructions[0].accounts, vec![statics[0], statics[1]]);
    }

    fn rpc_v0(
        statics: &[Pubkey],
        instructions: Vec<solana_sdk::message::compiled_instruction::CompiledInstruction>,
        meta: serde_json::Value,
    ) -> EncodedConfirmedTransactionWithStatusMeta {
        use solana_sdk::hash::Hash;
        use solana_sdk::message::{v0, MessageHeader};
        use solana_transaction_status::EncodedTransactionWithStatusMeta;

        let message = v0::Message {
            header: MessageHeader {
                num_required_signatures: 1,
                num_readonly_signed_accounts: 0,
                num_readonly_unsigned_accounts: 1,
            },
            account_keys: statics.to_vec(),
            recent_blockhash: Hash::default(),
            instructions,
            address_table_lookups: vec![v0::MessageAddressTableLookup {
                account_key: Pubkey::new_unique(),
                writable_indexes: vec![0, 1],
                readonly_indexes: vec![2],
            }],
        };
        let versioned = VersionedTransaction {
            signatures: vec![Signature::from([4u8; 64])],
            message: VersionedMessage::V0(message),
        };
        let encoded = general_purpose::STANDARD.encode(bincode::serialize(&versioned).unwrap());

        EncodedConfirmedTransactionWithStatusMeta {
            slot: 77,
            transaction: EncodedTransactionWithStatusMeta {
                transaction: EncodedTransaction::Binary(encoded, TransactionBinaryEncoding::Base64),
                meta: Some(serde_json::from_value(meta).unwrap()),
                version: None,
            },
            block_time: None,
        }
    }

    fn rpc_meta(writable: &[Pubkey], readonly: &[Pubkey]) -> serde_json::Value {
        serde_json::json!({
            "err": null,
            "status": { "Ok": null },
            "fee": 5000,
            "preBalances": [],
            "postBalances": [],
            "innerInstructions": [{
                "index": 0,
                "instructions": [{
                    "programIdIndex": 5,
                    "accounts": [3, 4],
                    "data": bs58::encode([9u8]).into_string(),
                    "stackHeight": 2
                }]
            }],
            "logMessages": ["Program log: hi"],
            "loadedAddresses": {
                "writable": writable.iter().map(|k| k.to_string()).collect::<Vec<_>>(),
                "readonly": readonly.iter().map(|k| k.to_string()).collect::<Vec<_>>()
            }
        })
    }

    #[test]
    fn test_rpc_v0_resolves_loaded_addresses_in_order() {
        use solana_sdk::message::compiled_instruction::CompiledInstruction as SdkCompiled;

        let statics = keys(3);
        let writable = keys(2);
        let readonly = keys(1);
        let ix = SdkCompiled { program_id_index: 2, accounts: vec![0, 3, 4, 5], data: vec![1] };
        let rpc_tx = rpc_v0(&statics, vec![ix], rpc_meta(&writable, &readonly));

        let tx = normalize(RawNotification::Rpc(rpc_tx), 5).unwrap();
        assert_eq!(tx.slot, 77);
        assert_eq!(tx.version, TransactionVersion::V0);
        assert_eq!(tx.signature(), Signature::from([4u8; 64]));
        assert_eq!(tx.instructions[0].program_id, statics[2]);
        assert_eq!(tx.instructions[0].accounts, vec![statics[0], writable[0], writable[1], readonly[0]]);

        let inner = &tx.inner_instructions[0].instructions[0];
        assert_eq!(inner.program_id, readonly[0]);
        assert_eq!(inner.accounts, vec![writable[0], writable[1]]);
        assert_eq!(inner.data, vec![9]);
        assert_eq!(inner.stack_height, Some(2));
        assert_eq!(tx.log_messages, vec!["Program log: hi".to_string()]);
        assert!(!tx.failed);
    }

    #[test]
    fn test_rpc_v0_index_past_loaded_keys_is_malformed() {
        use solana_sdk::message::compiled_instruction::CompiledInstruction as SdkCompiled;

        let statics = keys(3);
        // 3 static + 2 writable + 1 readonly = 6 keys, so index 6 is out of range
        let ix = SdkCompiled { program_id_index: 2, accounts: vec![0, 6], data: vec![] };
        let rpc_tx = rpc_v0(&statics, vec![ix], rpc_meta(&keys(2), &keys(1)));

        let err = normalize(RawNotification::Rpc(rpc_tx), 0).unwrap_err();
        assert!(matches!(err, NormalizeError::MalformedTransaction(_)));
    }

    #[test]
    fn test_rpc_garbage_payload_is_malformed() {
        use solana_transaction_status::EncodedTransactionWithStatusMeta;

        let rpc_tx = EncodedConfirmedTransactionWithStatusMeta {
            slot: 1,
            transaction: EncodedTransactionWithStatusMeta {
                transaction: EncodedTransaction::Binary("AAAA".to_string(), TransactionBinaryEncoding::Base64),
                meta: None,
                version: None,
            },
            block_time: None,
        };
        assert!(normalize(RawNotification::Rpc(rpc_tx), 0).is_err());
    }
}
