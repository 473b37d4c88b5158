//! Concurrency test: parallel claim-block edits.
//!
//! Validates that balance edits for one user are serialized, so no update
//! is lost, and that edits for different users do not interfere.

use std::sync::Arc;
use std::thread;

use claimward::config::TableNames;
use claimward::{ClaimContext, Settings, SqliteDatabase, User};
use uuid::Uuid;

fn context() -> Arc<ClaimContext> {
    let db = SqliteDatabase::open_in_memory(TableNames::default()).unwrap();
    Arc::new(
        ClaimContext::builder(Settings::default())
            .database(Arc::new(db))
            .build()
            .unwrap(),
    )
}

#[test]
fn stress_32_threads_editing_one_balance() {
    let context = context();
    let steve = User::new(Uuid::new_v4(), "Steve");
    context.listener().on_join(&steve).unwrap();

    let mut handles = Vec::new();
    for _ in 0..32 {
        let context = Arc::clone(&context);
        let steve = steve.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..25 {
                context
                    .ledger()
                    .edit_balance(&steve, |b| b + 1)
                    .expect("edit should succeed");
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(context.ledger().balance(&steve.uuid), 100 + 32 * 25);
}

#[test]
fn stress_concurrent_first_edits_create_one_record() {
    let context = context();
    let newcomer = User::new(Uuid::new_v4(), "Newcomer");

    let mut handles = Vec::new();
    for _ in 0..16 {
        let context = Arc::clone(&context);
        let newcomer = newcomer.clone();
        handles.push(thread::spawn(move || {
            context
                .ledger()
                .edit_balance(&newcomer, |b| b + 10)
                .expect("edit should succeed");
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(context.ledger().balance(&newcomer.uuid), 100 + 16 * 10);
}

#[test]
fn stress_mixed_deposits_and_withdrawals_stay_non_negative() {
    let context = context();
    let steve = User::new(Uuid::new_v4(), "Steve");
    context.listener().on_join(&steve).unwrap();

    let mut handles = Vec::new();
    for thread_id in 0..20 {
        let context = Arc::clone(&context);
        let steve = steve.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..20 {
                let balance = if thread_id % 2 == 0 {
                    context.ledger().edit_balance(&steve, |b| b - 37)
                } else {
                    context.ledger().edit_balance(&steve, |b| b + 5)
                }
                .expect("edit should succeed");
                assert!(balance >= 0, "balance went negative: {balance}");
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert!(context.ledger().balance(&steve.uuid) >= 0);
}

#[test]
fn stress_hourly_grants_and_joins_interleave() {
    let context = context();
    let users: Vec<User> = (0..8)
        .map(|i| User::new(Uuid::new_v4(), format!("User{i}")))
        .collect();
    for user in &users {
        context.listener().on_join(user).unwrap();
    }

    let mut handles = Vec::new();
    for user in &users {
        for _ in 0..5 {
            handles.push(context.listener().on_play_one_hour(user).unwrap());
        }
        // Rejoining in between must not drop a grant.
        context.listener().on_join(user).unwrap();
    }
    for handle in &handles {
        handle.join();
    }

    for user in &users {
        let saved = context.ledger().saved_user(&user.uuid).unwrap();
        assert_eq!(saved.hours_played, 5);
        assert_eq!(saved.claim_blocks, 100 + 5 * 100);
    }
}
