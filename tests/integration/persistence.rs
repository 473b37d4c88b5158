//! Integration test: state survives a restart.
//!
//! Opens a context on a SQLite file, changes users, groups and claims,
//! drops it, and checks that a fresh context on the same file sees the
//! same state. Also covers schema migration and peer servers sharing
//! one database.

use std::path::Path;
use std::sync::Arc;

use claimward::config::TableNames;
use claimward::storage::schema::{create_statements, CURRENT_SCHEMA_VERSION};
use claimward::{
    Actor, ClaimContext, ClaimError, Database, LocalBroker, Position, Region, Settings,
    SqliteDatabase, SyncPayload, Trustable, User, World,
};
use uuid::Uuid;

fn settings(path: &Path, server: &str) -> Settings {
    let mut settings = Settings::default();
    settings.server_name = server.to_string();
    settings.database.file = path.to_path_buf();
    settings
}

fn open(path: &Path) -> ClaimContext {
    ClaimContext::builder(settings(path, "survival"))
        .build()
        .expect("context should open")
}

#[test]
fn state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("claims.db");
    let world = World::new("world", Uuid::new_v4(), "normal");
    let owner = User::new(Uuid::new_v4(), "Owner");
    let friend = User::new(Uuid::new_v4(), "Friend");

    let claim = {
        let context = open(&path);
        context.listener().on_join(&owner).unwrap();
        context.listener().on_join(&friend).unwrap();
        context.ledger().edit_balance(&owner, |b| b + 250).unwrap();
        context
            .groups()
            .create_group(&owner, "crew", vec![friend.clone()])
            .unwrap();
        context.claim_worlds().create(&world).unwrap();
        let claim = context
            .claim_worlds()
            .with_world_mut(&world, |cw| {
                cw.create_claim(Some(owner.uuid), Region::new(0, 0, 63, 63))
            })
            .unwrap();
        let build = context.registry().by_id("build").unwrap().clone();
        context
            .trust()
            .set_trust_level(&Actor::player(owner.clone()), "Friend", &world, claim, &build)
            .unwrap();
        claim
    };

    let context = open(&path);
    assert_eq!(context.ledger().balance(&owner.uuid), 350);
    assert_eq!(context.ledger().balance(&friend.uuid), 100);
    let crew = context.groups().group(&owner.uuid, "crew").unwrap();
    assert!(crew.contains(&friend.uuid));

    assert_eq!(context.claim_worlds().worlds(), vec![world.clone()]);
    let found = context
        .claim_worlds()
        .claim_at(&world, &Position::new(10, 64, 10))
        .unwrap();
    assert_eq!(found.id, claim);
    assert_eq!(
        context
            .trust()
            .trust_level(&world, claim, &Trustable::User(friend.clone()))
            .map(|level| level.id),
        Some("build".to_string())
    );

    // Claim ids keep counting after a restart.
    let next = context
        .claim_worlds()
        .with_world_mut(&world, |cw| {
            cw.create_claim(Some(owner.uuid), Region::new(100, 100, 110, 110))
        })
        .unwrap();
    assert!(next > claim);
}

#[test]
fn old_schema_is_migrated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("claims.db");
    {
        let db = SqliteDatabase::open(&path, TableNames::default()).unwrap();
        db.execute_script(&create_statements(&TableNames::default()))
            .unwrap();
        db.set_schema_version(1).unwrap();
    }

    let context = open(&path);
    assert_eq!(
        context.gateway().schema_version(),
        Some(CURRENT_SCHEMA_VERSION)
    );
}

#[test]
fn newer_schema_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("claims.db");
    {
        let db = SqliteDatabase::open(&path, TableNames::default()).unwrap();
        db.execute_script(&create_statements(&TableNames::default()))
            .unwrap();
        db.set_schema_version(CURRENT_SCHEMA_VERSION + 1).unwrap();
    }

    let result = ClaimContext::builder(settings(&path, "survival")).build();
    assert!(matches!(result, Err(ClaimError::SchemaInconsistency(_))));
}

#[test]
fn unreadable_world_stays_loaded_on_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("claims.db");
    let world = World::new("world", Uuid::new_v4(), "normal");
    let owner = User::new(Uuid::new_v4(), "Owner");

    let context = open(&path);
    let storage_id = context.claim_worlds().create(&world).unwrap();
    let claim = context
        .claim_worlds()
        .with_world_mut(&world, |cw| {
            cw.create_claim(Some(owner.uuid), Region::new(0, 0, 31, 31))
        })
        .unwrap();

    // A peer writes a blob from a newer format.
    let peer = SqliteDatabase::open(&path, TableNames::default()).unwrap();
    peer.execute_script(&[format!(
        "UPDATE `claimward_claim_data` SET `data` = CAST('{{\"version\":99,\"world\":{{}}}}' AS BLOB) \
         WHERE `id` = {storage_id};"
    )])
    .unwrap();

    context.claim_worlds().reload(storage_id);
    assert!(context.claim_worlds().is_loaded(&world));
    assert_eq!(
        context
            .claim_worlds()
            .claim_at(&world, &Position::new(5, 64, 5))
            .map(|c| c.id),
        Some(claim)
    );

    // Once the row is gone the world is unloaded.
    peer.delete_claim_world(storage_id).unwrap();
    context.claim_worlds().reload(storage_id);
    assert!(!context.claim_worlds().is_loaded(&world));
}

#[test]
fn custom_table_names_share_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");
    let user = User::new(Uuid::new_v4(), "Steve");

    let mut first = settings(&path, "a");
    first.database.table_names.user_data = "a_users".into();
    let a = ClaimContext::builder(first).build().unwrap();
    a.listener().on_join(&user).unwrap();
    a.ledger().edit_balance(&user, |_| 7).unwrap();

    let b = ClaimContext::builder(settings(&path, "b")).build().unwrap();
    assert!(b.ledger().saved_user(&user.uuid).is_none());
    assert_eq!(a.ledger().balance(&user.uuid), 7);
}

#[test]
fn peer_server_sees_claim_world_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("network.db");
    let broker = Arc::new(LocalBroker::new());
    let world = World::new("world", Uuid::new_v4(), "normal");

    let primary = ClaimContext::builder(settings(&path, "survival"))
        .broker(broker.clone())
        .build()
        .unwrap();
    primary.claim_worlds().create(&world).unwrap();

    // A second process for the same server, kept current by notifications.
    let replica = ClaimContext::builder(settings(&path, "survival-replica"))
        .build()
        .unwrap();
    let inbox = broker.subscribe();
    primary
        .claim_worlds()
        .with_world_mut(&world, |cw| cw.create_claim(None, Region::new(0, 0, 15, 15)))
        .unwrap();

    let raw = inbox.recv().unwrap();
    let payload = replica.sync().handle(&raw).unwrap();
    assert!(matches!(payload, SyncPayload::ClaimWorldUpdated { .. }));
    // Replica hosts a different server name, so the world stays unloaded.
    assert!(!replica.claim_worlds().is_loaded(&world));

    let reopened = ClaimContext::builder(settings(&path, "survival"))
        .build()
        .unwrap();
    assert_eq!(
        reopened
            .claim_worlds()
            .read(&world, |cw| cw.claim_count()),
        Some(1)
    );
}
