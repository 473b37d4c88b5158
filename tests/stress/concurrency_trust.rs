//! Concurrency test: parallel trust changes and permission checks.
//!
//! Validates that trust edits to one claim world are applied atomically,
//! that every edit is persisted, and that readers never block writers out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use claimward::{Actor, ClaimContext, OperationType, Region, Settings, Trustable, User, World};
use uuid::Uuid;

fn open(path: &std::path::Path) -> Arc<ClaimContext> {
    let mut settings = Settings::default();
    settings.database.file = path.to_path_buf();
    Arc::new(ClaimContext::builder(settings).build().unwrap())
}

#[test]
fn stress_parallel_trust_grants_are_all_kept() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("claims.db");
    let context = open(&path);
    let world = World::new("world", Uuid::new_v4(), "normal");
    context.claim_worlds().create(&world).unwrap();
    let owner = User::new(Uuid::new_v4(), "Owner");
    let claim = context
        .claim_worlds()
        .with_world_mut(&world, |cw| cw.create_claim(Some(owner.uuid), Region::new(0, 0, 255, 255)))
        .unwrap();

    let users: Vec<User> = (0..40)
        .map(|i| User::new(Uuid::new_v4(), format!("Player{i}")))
        .collect();
    for user in &users {
        context.listener().on_join(user).unwrap();
    }

    let mut handles = Vec::new();
    for chunk in users.chunks(5) {
        let context = Arc::clone(&context);
        let world = world.clone();
        let owner = Actor::player(owner.clone());
        let chunk = chunk.to_vec();
        handles.push(thread::spawn(move || {
            let build = context.registry().by_id("build").unwrap().clone();
            for user in chunk {
                context
                    .trust()
                    .set_trust_level(&owner, &user.name, &world, claim, &build)
                    .expect("owner may trust");
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    for user in &users {
        assert!(context
            .trust()
            .is_operation_allowed(&world, claim, &user.uuid, OperationType::BlockPlace));
    }

    drop(context);
    let reopened = open(&path);
    for user in &users {
        assert_eq!(
            reopened
                .trust()
                .trust_level(&world, claim, &Trustable::User(user.clone()))
                .map(|level| level.id),
            Some("build".to_string())
        );
    }
}

#[test]
fn stress_readers_during_trust_churn() {
    let dir = tempfile::tempdir().unwrap();
    let context = open(&dir.path().join("claims.db"));
    let world = World::new("world", Uuid::new_v4(), "normal");
    context.claim_worlds().create(&world).unwrap();
    let owner = User::new(Uuid::new_v4(), "Owner");
    let claim = context
        .claim_worlds()
        .with_world_mut(&world, |cw| cw.create_claim(Some(owner.uuid), Region::new(0, 0, 63, 63)))
        .unwrap();
    let alex = User::new(Uuid::new_v4(), "Alex");
    context.listener().on_join(&alex).unwrap();

    let alex_id = alex.uuid;
    let done = Arc::new(AtomicBool::new(false));
    let mut readers = Vec::new();
    for _ in 0..8 {
        let context = Arc::clone(&context);
        let world = world.clone();
        let done = Arc::clone(&done);
        let owner = owner.clone();
        readers.push(thread::spawn(move || {
            let mut checks = 0u64;
            loop {
                // The owner is always allowed, whatever Alex's state.
                assert!(context.trust().is_operation_allowed(
                    &world,
                    claim,
                    &owner.uuid,
                    OperationType::BlockBreak
                ));
                let _ = context
                    .trust()
                    .is_operation_allowed(&world, claim, &alex_id, OperationType::ContainerOpen);
                checks += 1;
                if done.load(Ordering::SeqCst) {
                    break checks;
                }
            }
        }));
    }

    let actor = Actor::player(owner.clone());
    let container = context.registry().by_id("container").unwrap().clone();
    for _ in 0..50 {
        context
            .trust()
            .set_trust_level(&actor, "Alex", &world, claim, &container)
            .unwrap();
        context
            .trust()
            .remove_trust(&actor, "Alex", &world, claim)
            .unwrap();
    }
    done.store(true, Ordering::SeqCst);

    let total: u64 = readers.into_iter().map(|h| h.join().unwrap()).sum();
    assert!(total > 0);
    assert!(context
        .trust()
        .trust_level(&world, claim, &Trustable::User(alex))
        .is_none());
}
