//! Ledger-wide invariants checked through the public engine API
//!
//! Each test drives a fresh in-memory engine, often from several threads at
//! once, and checks a property that must hold regardless of interleaving.

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use savings_ledger::core::{ManualClock, NoopEventSink};
use savings_ledger::types::{BalanceReason, Frequency, HistoryFilter, NewPool};
use savings_ledger::{
    AccountId, AppConfig, LedgerEngine, LedgerError, MemoryStore, OwnerId, TransferRequest,
    TransferStatus, TransferType,
};
use std::sync::Arc;
use std::thread;

fn engine() -> LedgerEngine<MemoryStore> {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap(),
    ));
    LedgerEngine::in_memory(&AppConfig::default(), clock, Arc::new(NoopEventSink)).unwrap()
}

fn dec(value: i64, scale: u32) -> Decimal {
    Decimal::new(value, scale)
}

fn open_funded(engine: &LedgerEngine<MemoryStore>, owner: &str, account: &str, amount: Decimal) {
    engine
        .accounts()
        .open_account(AccountId::from(account), OwnerId::from(owner))
        .unwrap();
    engine
        .ledger()
        .create_transfer(TransferRequest::deposit(owner, "bank", account, amount))
        .unwrap();
}

fn all_transfers(engine: &LedgerEngine<MemoryStore>, owner: &str) -> Vec<savings_ledger::Transfer> {
    let filter = HistoryFilter {
        limit: Some(engine.ledger().config().history_max_page_size),
        ..HistoryFilter::default()
    };
    engine
        .ledger()
        .get_history(&OwnerId::from(owner), &filter)
        .items
}

#[test]
fn test_balances_match_the_transfer_log() {
    let engine = engine();
    open_funded(&engine, "alice", "A1", dec(1_000, 0));
    open_funded(&engine, "bob", "B1", dec(500, 0));

    let ledger = engine.ledger();
    let _ = ledger.create_transfer(TransferRequest::withdrawal("alice", "A1", "bank", dec(120, 0)));
    let _ = ledger.create_transfer(TransferRequest::withdrawal("bob", "B1", "bank", dec(600, 0)));
    let held = ledger
        .submit_transfer(TransferRequest::withdrawal("bob", "B1", "bank", dec(50, 0)))
        .unwrap();
    let failed = ledger
        .submit_transfer(TransferRequest::withdrawal("alice", "A1", "bank", dec(75, 0)))
        .unwrap();
    ledger
        .fail_transfer(failed.id, &OwnerId::from("alice"), "bank rejected")
        .unwrap();
    let _ = ledger.create_transfer(TransferRequest::deposit("bob", "bank", "B1", dec(3333, 2)));

    for (owner, account) in [("alice", "A1"), ("bob", "B1")] {
        let mut expected = Decimal::ZERO;
        for transfer in all_transfers(&engine, owner) {
            let debited = matches!(
                transfer.status,
                TransferStatus::Pending | TransferStatus::Processing | TransferStatus::Completed
            );
            match transfer.transfer_type {
                TransferType::Deposit if transfer.status == TransferStatus::Completed => {
                    expected += transfer.amount
                }
                TransferType::Withdrawal | TransferType::PoolContribution if debited => {
                    expected -= transfer.debit_total().unwrap()
                }
                _ => {}
            }
        }
        let balance = engine
            .accounts()
            .get_balance(&AccountId::from(account))
            .unwrap();
        assert_eq!(balance, expected, "balance drift on {}", account);
        assert!(balance >= Decimal::ZERO);
    }

    assert_eq!(
        ledger.get_transfer(held.id, &OwnerId::from("bob")).unwrap().status,
        TransferStatus::Pending
    );
}

#[test]
fn test_concurrent_retries_with_one_key_record_one_transfer() {
    let engine = engine();
    open_funded(&engine, "alice", "A1", dec(100, 0));

    let ids: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    engine
                        .ledger()
                        .create_transfer(
                            TransferRequest::withdrawal("alice", "A1", "bank", dec(30, 0))
                                .with_idempotency_key("retry-1"),
                        )
                        .unwrap()
                        .id
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(
        engine.accounts().get_balance(&AccountId::from("A1")).unwrap(),
        dec(6975, 2)
    );
    let withdrawals = all_transfers(&engine, "alice")
        .into_iter()
        .filter(|t| t.transfer_type == TransferType::Withdrawal)
        .count();
    assert_eq!(withdrawals, 1);
}

#[test]
fn test_concurrent_withdrawals_never_overdraw() {
    let engine = engine();
    open_funded(&engine, "alice", "A1", dec(100, 0));

    let results: Vec<Result<_, LedgerError>> = thread::scope(|s| {
        let handles: Vec<_> = (0..20)
            .map(|_| {
                s.spawn(|| {
                    engine.ledger().create_transfer(TransferRequest::withdrawal(
                        "alice",
                        "A1",
                        "bank",
                        dec(10, 0),
                    ))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 9);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, LedgerError::InsufficientFunds { .. })));
    assert_eq!(
        engine.accounts().get_balance(&AccountId::from("A1")).unwrap(),
        dec(775, 2)
    );
}

#[test]
fn test_concurrent_withdrawals_never_exceed_daily_limit() {
    let engine = engine();
    let account = AccountId::from("A1");
    engine
        .accounts()
        .open_account(account.clone(), OwnerId::from("alice"))
        .unwrap();
    engine
        .accounts()
        .adjust_balance(&account, dec(20_000, 0), BalanceReason::Deposit)
        .unwrap();
    let limit = engine.ledger().config().daily_limit;

    let results: Vec<Result<_, LedgerError>> = thread::scope(|s| {
        let handles: Vec<_> = (0..16)
            .map(|_| {
                s.spawn(|| {
                    engine.ledger().create_transfer(TransferRequest::withdrawal(
                        "alice",
                        "A1",
                        "bank",
                        dec(1_000, 0),
                    ))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let accepted: Decimal = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|t| t.amount)
        .sum();
    assert!(accepted <= limit);
    assert_eq!(accepted, limit);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, LedgerError::DailyLimitExceeded { .. })));
    assert_eq!(results.iter().filter(|r| r.is_err()).count(), 6);
    assert_eq!(
        engine.accounts().get_balance(&account).unwrap(),
        dec(99_975, 1)
    );
}

#[test]
fn test_pool_total_matches_member_contributions() {
    let engine = engine();
    let members = ["alice", "bob", "carol", "dave"];
    for owner in members {
        open_funded(&engine, owner, &format!("{}-acct", owner), dec(1_000, 0));
    }

    let pool = engine
        .pools()
        .create_pool(NewPool {
            creator_id: OwnerId::from("alice"),
            name: "Cabin".to_string(),
            goal_amount: dec(2_000, 0),
            contribution_amount: dec(25, 0),
            frequency: Frequency::Weekly,
            start_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            max_members: 4,
        })
        .unwrap();
    for owner in &members[1..] {
        engine
            .pools()
            .join_pool(&pool.pool_id, &OwnerId::from(*owner), dec(25, 0))
            .unwrap();
    }

    thread::scope(|s| {
        for owner in members {
            let engine = &engine;
            let pool_id = &pool.pool_id;
            s.spawn(move || {
                let account = AccountId::from(format!("{}-acct", owner));
                for _ in 0..10 {
                    engine
                        .pools()
                        .contribute(pool_id, &OwnerId::from(owner), dec(25, 0), &account, None)
                        .unwrap();
                }
            });
        }
    });

    let (pool, memberships) = engine.pools().get_pool(&pool.pool_id).unwrap();
    let member_total: Decimal = memberships.iter().map(|m| m.total_contributed).sum();
    let completed: Decimal = members
        .iter()
        .flat_map(|owner| all_transfers(&engine, owner))
        .filter(|t| {
            t.transfer_type == TransferType::PoolContribution
                && t.status == TransferStatus::Completed
        })
        .map(|t| t.amount)
        .sum();

    assert_eq!(pool.current_amount, dec(1_000, 0));
    assert_eq!(member_total, pool.current_amount);
    assert_eq!(completed, pool.current_amount);
}

#[test]
fn test_concurrent_accrual_runs_credit_once() {
    let engine = engine();
    open_funded(&engine, "alice", "A1", dec(1_000, 0));
    open_funded(&engine, "bob", "B1", dec(2_500, 0));
    let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| engine.accrual().run_daily_accrual(date)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(results.iter().any(|r| r.is_ok()));
    assert!(results.iter().all(|r| match r {
        Ok(_) => true,
        Err(e) => matches!(e, LedgerError::ConcurrencyConflict { .. }),
    }));

    // A later run for the same date is a no-op
    let summary = engine.accrual().run_daily_accrual(date).unwrap();
    assert_eq!(summary.credited_this_run, 0);
    assert_eq!(summary.user_interest_count, 2);

    assert_eq!(
        engine.accounts().get_balance(&AccountId::from("A1")).unwrap(),
        dec(10_001_096, 4)
    );
    assert_eq!(
        engine.accounts().get_balance(&AccountId::from("B1")).unwrap(),
        dec(25_002_740, 4)
    );
}
