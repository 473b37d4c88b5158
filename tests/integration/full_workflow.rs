//! Integration test: full end-to-end workflow.
//!
//! Drives a complete server context the way a host would:
//! 1. Users join and receive their starting balance
//! 2. Owners claim land and hand out trust
//! 3. Group trust unlocks operations but not trust management
//! 4. Balances never go negative
//! 5. Removing trust that was never granted changes nothing
//! 6. Trust for a deleted group can still be removed

use std::sync::Arc;

use claimward::actions::{self, ClaimBlockOperation, CollectingSink, Message};
use claimward::config::TableNames;
use claimward::{
    Actor, ClaimContext, ClaimError, ClaimId, OperationType, Position, Region,
    Settings, SqliteDatabase, Trustable, User, World,
};
use uuid::Uuid;

struct Server {
    context: ClaimContext,
    world: World,
    claim: ClaimId,
    owner: User,
}

fn server() -> Server {
    let db = SqliteDatabase::open_in_memory(TableNames::default()).expect("in-memory database");
    let context = ClaimContext::builder(Settings::default())
        .database(Arc::new(db))
        .build()
        .expect("context should build");
    let world = World::new("world", Uuid::new_v4(), "normal");
    context
        .claim_worlds()
        .create(&world)
        .expect("world should be claimable");

    let owner = User::new(Uuid::new_v4(), "Owner");
    context.listener().on_join(&owner).expect("owner joins");
    let claim = context
        .claim_worlds()
        .with_world_mut(&world, |cw| {
            cw.create_claim(Some(owner.uuid), Region::new(-16, -16, 15, 15))
        })
        .expect("claim should be created");
    Server {
        context,
        world,
        claim,
        owner,
    }
}

impl Server {
    fn join(&self, name: &str) -> User {
        let user = User::new(Uuid::new_v4(), name);
        self.context.listener().on_join(&user).expect("user joins");
        user
    }

    fn level_of(&self, user: &User) -> Option<String> {
        self.context
            .trust()
            .trust_level(&self.world, self.claim, &Trustable::User(user.clone()))
            .map(|level| level.id)
    }
}

#[test]
fn full_workflow_join_to_untrust() {
    let s = server();
    let owner = Actor::player(s.owner.clone());
    let sink = CollectingSink::new();

    // ── Step 1: New users start with the starting balance ───────────────
    let alex = s.join("Alex");
    assert_eq!(
        s.context.ledger().balance(&alex.uuid),
        s.context.settings().claims.starting_claim_blocks
    );

    // ── Step 2: Owner trusts Alex to build ───────────────────────────────
    actions::trust(&s.context, &owner, "Alex", &s.world, s.claim, "trust", &sink);
    assert_eq!(
        sink.last(),
        Some(Message::TrustLevelSet {
            identifier: "Alex".into(),
            level: "Build".into()
        })
    );
    assert!(s.context.trust().is_operation_allowed(
        &s.world,
        s.claim,
        &alex.uuid,
        OperationType::BlockPlace
    ));
    let found = s
        .context
        .claim_worlds()
        .claim_at(&s.world, &Position::new(3, 70, -3))
        .expect("claim covers the position");
    assert_eq!(found.id, s.claim);

    // ── Step 3: Alex cannot manage trust at build level ──────────────────
    let sam = s.join("Sam");
    actions::trust(
        &s.context,
        &Actor::player(alex.clone()),
        "Sam",
        &s.world,
        s.claim,
        "accesstrust",
        &sink,
    );
    assert!(matches!(sink.last(), Some(Message::Failed { .. })));
    assert_eq!(s.level_of(&sam), None);

    // ── Step 4: Owner removes Alex again ─────────────────────────────────
    actions::untrust(&s.context, &owner, "Alex", &s.world, s.claim, &sink);
    assert_eq!(
        sink.last(),
        Some(Message::TrustRemoved {
            identifier: "Alex".into()
        })
    );
    assert_eq!(s.level_of(&alex), None);
}

#[test]
fn new_user_gets_starting_balance() {
    let s = server();
    let steve = s.join("Steve");
    assert_eq!(s.context.ledger().balance(&steve.uuid), 100);
    let saved = s.context.ledger().saved_user(&steve.uuid).unwrap();
    assert_eq!(saved.claim_blocks, 100);
    assert_eq!(saved.hours_played, 0);
}

#[test]
fn group_manager_cannot_remove_unrelated_user() {
    let s = server();
    let owner = Actor::player(s.owner.clone());
    let member = s.join("Member");
    let victim = s.join("Victim");
    s.context
        .groups()
        .create_group(&s.owner, "staff", vec![member.clone()])
        .unwrap();

    let manage = s.context.registry().by_id("manage").unwrap().clone();
    let access = s.context.registry().by_id("access").unwrap().clone();
    s.context
        .trust()
        .set_trust_level(&owner, "@staff", &s.world, s.claim, &manage)
        .unwrap();
    s.context
        .trust()
        .set_trust_level(&owner, "Victim", &s.world, s.claim, &access)
        .unwrap();

    // Group trust still unlocks operations for members.
    assert!(s.context.trust().is_operation_allowed(
        &s.world,
        s.claim,
        &member.uuid,
        OperationType::ContainerOpen
    ));

    let before = s.context.claim_worlds().claim_at(&s.world, &Position::new(0, 64, 0));
    let result = s
        .context
        .trust()
        .remove_trust(&Actor::player(member), "Victim", &s.world, s.claim);
    assert!(matches!(result, Err(ClaimError::PermissionDenied(_))));
    let after = s.context.claim_worlds().claim_at(&s.world, &Position::new(0, 64, 0));
    assert_eq!(before, after);
    assert_eq!(s.level_of(&victim), Some("access".to_string()));
}

#[test]
fn balance_never_goes_negative() {
    let s = server();
    let steve = s.join("Steve");
    s.context.ledger().edit_balance(&steve, |_| 50).unwrap();
    let balance = s
        .context
        .ledger()
        .edit_balance(&steve, |b| b - 1000)
        .unwrap();
    assert_eq!(balance, 0);
    assert_eq!(s.context.ledger().balance(&steve.uuid), 0);

    let sink = CollectingSink::new();
    let op = Actor::operator(User::new(Uuid::new_v4(), "Op"));
    actions::claim_blocks(
        &s.context,
        &op,
        &steve,
        ClaimBlockOperation::Remove,
        Some(5),
        &sink,
    );
    assert_eq!(
        sink.last(),
        Some(Message::ClaimBlocksUpdated {
            user: "Steve".into(),
            blocks: 0
        })
    );
}

#[test]
fn removing_untrusted_user_is_not_trusted() {
    let s = server();
    s.join("Stranger");
    let before = s.context.claim_worlds().claim_at(&s.world, &Position::new(0, 64, 0));
    let result = s.context.trust().remove_trust(
        &Actor::player(s.owner.clone()),
        "Stranger",
        &s.world,
        s.claim,
    );
    assert!(matches!(result, Err(ClaimError::NotTrusted(_))));
    let after = s.context.claim_worlds().claim_at(&s.world, &Position::new(0, 64, 0));
    assert_eq!(before, after);
}

#[test]
fn deleted_group_can_still_be_untrusted() {
    let s = server();
    let owner = Actor::player(s.owner.clone());
    let friend = s.join("Friend");
    s.context
        .groups()
        .create_group(&s.owner, "friends", vec![friend.clone()])
        .unwrap();
    let sink = CollectingSink::new();
    actions::trust(&s.context, &owner, "@friends", &s.world, s.claim, "containertrust", &sink);
    assert!(matches!(sink.last(), Some(Message::TrustLevelSet { .. })));

    s.context
        .groups()
        .delete_group(&s.owner.uuid, "friends")
        .unwrap();
    assert!(s.context.groups().group(&s.owner.uuid, "friends").is_none());
    // The stale entry no longer grants anything.
    assert!(!s.context.trust().is_operation_allowed(
        &s.world,
        s.claim,
        &friend.uuid,
        OperationType::ContainerOpen
    ));

    actions::untrust(&s.context, &owner, "@friends", &s.world, s.claim, &sink);
    assert_eq!(
        sink.last(),
        Some(Message::TrustRemoved {
            identifier: "@friends".into()
        })
    );
    let claim = s
        .context
        .claim_worlds()
        .claim_at(&s.world, &Position::new(0, 64, 0))
        .unwrap();
    assert!(claim.trusted_groups.is_empty());
}

#[test]
fn hourly_grant_accumulates() {
    let s = server();
    let steve = s.join("Steve");
    for _ in 0..3 {
        s.context
            .listener()
            .on_play_one_hour(&steve)
            .unwrap()
            .join();
    }
    let saved = s.context.ledger().saved_user(&steve.uuid).unwrap();
    assert_eq!(saved.hours_played, 3);
    assert_eq!(saved.claim_blocks, 400);
}
