//! Ledger throughput benchmarks
//!
//! Measures the transactional paths with the divan benchmarking framework.
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench
//! ```
//!
//! Limits are raised so that volume, not policy, decides what gets measured.

use chrono::{NaiveDate, TimeZone, Utc};
use divan::Bencher;
use rust_decimal::Decimal;
use savings_ledger::core::{ManualClock, NoopEventSink};
use savings_ledger::{AccountId, AppConfig, LedgerEngine, MemoryStore, OwnerId, TransferRequest};
use std::sync::Arc;
use std::thread;

fn main() {
    divan::main();
}

fn engine_with_accounts(accounts: usize, funding: Decimal) -> LedgerEngine<MemoryStore> {
    let mut config = AppConfig::default();
    config.ledger.daily_limit = Decimal::new(1_000_000_000, 0);
    config.ledger.monthly_limit = Decimal::new(1_000_000_000, 0);
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap(),
    ));
    let engine = LedgerEngine::in_memory(&config, clock, Arc::new(NoopEventSink)).unwrap();

    for i in 0..accounts {
        let owner = format!("owner-{}", i);
        let account = format!("acct-{}", i);
        engine
            .accounts()
            .open_account(AccountId::from(account.as_str()), OwnerId::from(owner.as_str()))
            .unwrap();
        if funding > Decimal::ZERO {
            engine
                .ledger()
                .create_transfer(TransferRequest::deposit(owner, "bank", account, funding))
                .unwrap();
        }
    }
    engine
}

/// Sequential deposits spread over ten owners
#[divan::bench(args = [100, 1_000, 10_000])]
fn deposits(bencher: Bencher, count: usize) {
    bencher
        .with_inputs(|| engine_with_accounts(10, Decimal::ZERO))
        .bench_local_values(|engine| {
            for i in 0..count {
                let n = i % 10;
                engine
                    .ledger()
                    .create_transfer(TransferRequest::deposit(
                        format!("owner-{}", n),
                        "bank",
                        format!("acct-{}", n),
                        Decimal::ONE,
                    ))
                    .unwrap();
            }
            engine
        });
}

/// Many threads withdrawing from one account, all serialized on its lock
#[divan::bench(args = [1, 4, 8])]
fn contended_withdrawals(bencher: Bencher, threads: usize) {
    bencher
        .with_inputs(|| engine_with_accounts(1, Decimal::new(1_000_000, 0)))
        .bench_local_values(|engine| {
            thread::scope(|s| {
                for _ in 0..threads {
                    s.spawn(|| {
                        for _ in 0..250 {
                            let _ = engine.ledger().create_transfer(TransferRequest::withdrawal(
                                "owner-0",
                                "acct-0",
                                "bank",
                                Decimal::ONE,
                            ));
                        }
                    });
                }
            });
            engine
        });
}

/// One daily accrual run over funded accounts
#[divan::bench(args = [100, 1_000])]
fn daily_accrual(bencher: Bencher, accounts: usize) {
    let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
    bencher
        .with_inputs(|| engine_with_accounts(accounts, Decimal::new(1_000, 0)))
        .bench_local_values(|engine| {
            engine.accrual().run_daily_accrual(date).unwrap();
            engine
        });
}
