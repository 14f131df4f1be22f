//! Decode hot path benchmarks
//!
//! Per-notification work that runs inline on the subscription loop:
//! normalization, log tree parsing and swap dispatch.
//!
//! Run with: cargo bench --bench hot_path

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sol_swap_indexer::instr::orca_whirlpool::discriminators;
use sol_swap_indexer::instr::program_ids::ORCA_WHIRLPOOL_PROGRAM_ID;
use sol_swap_indexer::{normalize, parse_logs, process_notification, RawNotification, SwapDispatcher};
use solana_sdk::pubkey::Pubkey;
use yellowstone_grpc_proto::prelude::{
    CompiledInstruction, Message, SubscribeUpdateTransaction, SubscribeUpdateTransactionInfo,
    Transaction, TransactionStatusMeta,
};

const COMPUTE_BUDGET: &str = "ComputeBudget111111111111111111111111111111";
const TOKEN: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

fn swap_logs() -> Vec<String> {
    let orca = ORCA_WHIRLPOOL_PROGRAM_ID.to_string();
    vec![
        format!("Program {} invoke [1]", COMPUTE_BUDGET),
        format!("Program {} success", COMPUTE_BUDGET),
        format!("Program {} invoke [1]", orca),
        "Program log: Instruction: Swap".to_string(),
        format!("Program {} invoke [2]", TOKEN),
        "Program log: Instruction: Transfer".to_string(),
        format!("Program {} consumed 4645 of 180000 compute units", TOKEN),
        format!("Program {} success", TOKEN),
        format!("Program {} invoke [2]", TOKEN),
        "Program log: Instruction: Transfer".to_string(),
        format!("Program {} consumed 4736 of 171000 compute units", TOKEN),
        format!("Program {} success", TOKEN),
        format!("Program {} consumed 45000 of 200000 compute units", orca),
        format!("Program {} success", orca),
    ]
}

fn orca_notification() -> SubscribeUpdateTransaction {
    let mut keys = vec![ORCA_WHIRLPOOL_PROGRAM_ID];
    keys.extend((0..11).map(|_| Pubkey::new_unique()));
    let mut data = discriminators::SWAP.to_vec();
    data.extend_from_slice(&[0u8; 34]);

    SubscribeUpdateTransaction {
        slot: 1,
        transaction: Some(SubscribeUpdateTransactionInfo {
            signature: vec![5u8; 64],
            transaction: Some(Transaction {
                signatures: vec![vec![5u8; 64]],
                message: Some(Message {
                    account_keys: keys.iter().map(|k| k.to_bytes().to_vec()).collect(),
                    instructions: vec![CompiledInstruction {
                        program_id_index: 0,
                        accounts: (1..=11).collect(),
                        data,
                    }],
                    ..Default::default()
                }),
            }),
            meta: Some(TransactionStatusMeta { log_messages: swap_logs(), ..Default::default() }),
            ..Default::default()
        }),
    }
}

fn bench_normalize(c: &mut Criterion) {
    let update = orca_notification();
    c.bench_function("normalize_grpc", |b| {
        b.iter(|| normalize(RawNotification::Grpc(black_box(update.clone())), 0))
    });
}

fn bench_parse_logs(c: &mut Criterion) {
    let logs = swap_logs();
    c.bench_function("parse_logs", |b| b.iter(|| parse_logs(black_box(&logs))));
}

fn bench_dispatch(c: &mut Criterion) {
    let dispatcher = SwapDispatcher::all();
    let tx = normalize(RawNotification::Grpc(orca_notification()), 0).unwrap();
    c.bench_function("dispatch", |b| b.iter(|| dispatcher.dispatch(black_box(&tx))));
}

fn bench_process_notification(c: &mut Criterion) {
    let dispatcher = SwapDispatcher::all();
    let update = orca_notification();
    c.bench_function("process_notification", |b| {
        b.iter(|| process_notification(&dispatcher, RawNotification::Grpc(black_box(update.clone())), 0))
    });
}

criterion_group!(benches, bench_normalize, bench_parse_logs, bench_dispatch, bench_process_notification);
criterion_main!(benches);
