//! Edge case tests: trust resolution and access checks at the boundaries.

use std::sync::Arc;

use claimward::config::TableNames;
use claimward::{
    Actor, ClaimContext, ClaimError, ClaimId, OperationType, Region, Settings, SqliteDatabase,
    TrustLevel, Trustable, User, World,
};
use uuid::Uuid;

fn context_with(settings: Settings) -> ClaimContext {
    let db = SqliteDatabase::open_in_memory(TableNames::default()).unwrap();
    ClaimContext::builder(settings)
        .database(Arc::new(db))
        .build()
        .unwrap()
}

fn join(context: &ClaimContext, name: &str) -> User {
    let user = User::new(Uuid::new_v4(), name);
    context.listener().on_join(&user).unwrap();
    user
}

fn level(context: &ClaimContext, id: &str) -> TrustLevel {
    context.registry().by_id(id).unwrap().clone()
}

fn claimed_world(context: &ClaimContext, owner: Option<Uuid>) -> (World, ClaimId) {
    let world = World::new("world", Uuid::new_v4(), "normal");
    context.claim_worlds().create(&world).unwrap();
    let claim = context
        .claim_worlds()
        .with_world_mut(&world, |cw| cw.create_claim(owner, Region::new(0, 0, 99, 99)))
        .unwrap();
    (world, claim)
}

// ── Identifiers ──────────────────────────────────────────────────────────────

#[test]
fn edge_empty_identifier_is_invalid_syntax() {
    let context = context_with(Settings::default());
    let owner = join(&context, "Owner");
    let (world, claim) = claimed_world(&context, Some(owner.uuid));
    for identifier in ["", "   ", "@"] {
        let result = context.trust().set_trust_level(
            &Actor::player(owner.clone()),
            identifier,
            &world,
            claim,
            &level(&context, "access"),
        );
        assert!(
            matches!(result, Err(ClaimError::InvalidSyntax(_))),
            "identifier {identifier:?} gave {result:?}"
        );
    }
}

#[test]
fn edge_unknown_user_and_group_are_not_found() {
    let context = context_with(Settings::default());
    let owner = join(&context, "Owner");
    let (world, claim) = claimed_world(&context, Some(owner.uuid));
    let actor = Actor::player(owner);
    let access = level(&context, "access");

    let by_name = context
        .trust()
        .set_trust_level(&actor, "Nobody", &world, claim, &access);
    assert!(matches!(by_name, Err(ClaimError::NotFound(_))));

    let by_uuid = context.trust().set_trust_level(
        &actor,
        &Uuid::new_v4().to_string(),
        &world,
        claim,
        &access,
    );
    assert!(matches!(by_uuid, Err(ClaimError::NotFound(_))));

    let group = context
        .trust()
        .set_trust_level(&actor, "@ghosts", &world, claim, &access);
    assert!(matches!(group, Err(ClaimError::NotFound(_))));
}

#[test]
fn edge_user_resolves_by_uuid() {
    let context = context_with(Settings::default());
    let owner = join(&context, "Owner");
    let alex = join(&context, "Alex");
    let (world, claim) = claimed_world(&context, Some(owner.uuid));
    let target = context
        .trust()
        .set_trust_level(
            &Actor::player(owner),
            &alex.uuid.to_string(),
            &world,
            claim,
            &level(&context, "access"),
        )
        .unwrap();
    assert_eq!(target, Trustable::User(alex));
}

#[test]
fn edge_groups_disabled_treats_prefix_as_name() {
    let mut settings = Settings::default();
    settings.user_groups.enabled = false;
    let context = context_with(settings);
    let owner = join(&context, "Owner");
    let (world, claim) = claimed_world(&context, Some(owner.uuid));

    let created = context.groups().create_group(&owner, "crew", Vec::new());
    assert!(matches!(created, Err(ClaimError::PermissionDenied(_))));
    let result = context.trust().set_trust_level(
        &Actor::player(owner),
        "@crew",
        &world,
        claim,
        &level(&context, "access"),
    );
    assert!(matches!(result, Err(ClaimError::NotFound(_))));
}

// ── Owners and administrator claims ──────────────────────────────────────────

#[test]
fn edge_owner_of_enclosing_claim_is_not_trustable() {
    let context = context_with(Settings::default());
    let owner = join(&context, "Owner");
    let (world, claim) = claimed_world(&context, Some(owner.uuid));
    let child = context
        .claim_worlds()
        .with_world_mut(&world, |cw| cw.create_child_claim(claim, Region::new(10, 10, 20, 20)))
        .unwrap();

    let result = context.trust().set_trust_level(
        &Actor::operator(join(&context, "Op")),
        "Owner",
        &world,
        child,
        &level(&context, "build"),
    );
    assert!(matches!(result, Err(ClaimError::OwnerNotTrustable(_))));
}

#[test]
fn edge_admin_claim_needs_operator() {
    let context = context_with(Settings::default());
    let alex = join(&context, "Alex");
    let steve = join(&context, "Steve");
    let (world, claim) = claimed_world(&context, None);
    let manage = level(&context, "manage");

    let op = Actor::operator(join(&context, "Op"));
    context
        .trust()
        .set_trust_level(&op, "Alex", &world, claim, &manage)
        .unwrap();

    // Even a manager of an administrator claim cannot change its trust.
    let result = context.trust().set_trust_level(
        &Actor::player(alex),
        "Steve",
        &world,
        claim,
        &level(&context, "access"),
    );
    assert!(matches!(result, Err(ClaimError::PermissionDenied(_))));

    let group = context
        .trust()
        .set_trust_level(&op, "@anything", &world, claim, &manage);
    assert!(matches!(group, Err(ClaimError::NotFound(_))));
    assert!(!context.trust().is_operation_allowed(
        &world,
        claim,
        &steve.uuid,
        OperationType::BlockInteract
    ));
}

#[test]
fn edge_admin_claim_allows_self_removal() {
    let context = context_with(Settings::default());
    let guest = join(&context, "Guest");
    let (world, claim) = claimed_world(&context, None);
    let op = Actor::operator(join(&context, "Op"));
    context
        .trust()
        .set_trust_level(&op, "Guest", &world, claim, &level(&context, "build"))
        .unwrap();

    let actor = Actor::player(guest.clone());
    let raise = context.trust().set_trust_level(
        &actor,
        "Guest",
        &world,
        claim,
        &level(&context, "manage"),
    );
    assert!(matches!(raise, Err(ClaimError::PermissionDenied(_))));

    context
        .trust()
        .set_trust_level(&actor, "Guest", &world, claim, &level(&context, "access"))
        .unwrap();
    context
        .trust()
        .remove_trust(&actor, "Guest", &world, claim)
        .unwrap();
    assert!(context
        .trust()
        .trust_level(&world, claim, &Trustable::User(guest))
        .is_none());
}

// ── Managers ─────────────────────────────────────────────────────────────────

fn settings_with_coowner() -> Settings {
    let mut settings = Settings::default();
    let mut coowner = settings
        .trust_levels
        .last()
        .cloned()
        .expect("default levels");
    coowner.id = "coowner".into();
    coowner.display_name = "Co-owner".into();
    coowner.command_aliases = vec!["coownertrust".into()];
    coowner.weight = 500;
    settings.trust_levels.push(coowner);
    settings
}

#[test]
fn edge_manager_cannot_grant_above_own_level() {
    let context = context_with(settings_with_coowner());
    let owner = join(&context, "Owner");
    let manager = join(&context, "Manager");
    join(&context, "Guest");
    let (world, claim) = claimed_world(&context, Some(owner.uuid));
    context
        .trust()
        .set_trust_level(&Actor::player(owner), "Manager", &world, claim, &level(&context, "manage"))
        .unwrap();

    let actor = Actor::player(manager);
    let too_high = context.trust().set_trust_level(
        &actor,
        "Guest",
        &world,
        claim,
        &level(&context, "coowner"),
    );
    assert!(matches!(too_high, Err(ClaimError::PermissionDenied(_))));

    context
        .trust()
        .set_trust_level(&actor, "Guest", &world, claim, &level(&context, "manage"))
        .unwrap();
}

#[test]
fn edge_manager_cannot_touch_heavier_entry() {
    let context = context_with(settings_with_coowner());
    let owner = join(&context, "Owner");
    let manager = join(&context, "Manager");
    join(&context, "Partner");
    let (world, claim) = claimed_world(&context, Some(owner.uuid));
    let actor = Actor::player(owner);
    context
        .trust()
        .set_trust_level(&actor, "Manager", &world, claim, &level(&context, "manage"))
        .unwrap();
    context
        .trust()
        .set_trust_level(&actor, "Partner", &world, claim, &level(&context, "coowner"))
        .unwrap();

    let result = context
        .trust()
        .remove_trust(&Actor::player(manager), "Partner", &world, claim);
    assert!(matches!(result, Err(ClaimError::PermissionDenied(_))));
}

#[test]
fn edge_user_may_lower_or_remove_own_trust_only() {
    let context = context_with(Settings::default());
    let owner = join(&context, "Owner");
    let alex = join(&context, "Alex");
    let (world, claim) = claimed_world(&context, Some(owner.uuid));
    context
        .trust()
        .set_trust_level(&Actor::player(owner), "Alex", &world, claim, &level(&context, "build"))
        .unwrap();
    let actor = Actor::player(alex.clone());

    let raise = context
        .trust()
        .set_trust_level(&actor, "Alex", &world, claim, &level(&context, "manage"));
    assert!(matches!(raise, Err(ClaimError::PermissionDenied(_))));

    context
        .trust()
        .set_trust_level(&actor, "Alex", &world, claim, &level(&context, "access"))
        .unwrap();
    context
        .trust()
        .remove_trust(&actor, "Alex", &world, claim)
        .unwrap();
    assert!(context
        .trust()
        .trust_level(&world, claim, &Trustable::User(alex))
        .is_none());
}

// ── Child claims ─────────────────────────────────────────────────────────────

#[test]
fn edge_child_claim_inherits_unless_disabled() {
    let context = context_with(Settings::default());
    let owner = join(&context, "Owner");
    let alex = join(&context, "Alex");
    let (world, claim) = claimed_world(&context, Some(owner.uuid));
    let child = context
        .claim_worlds()
        .with_world_mut(&world, |cw| cw.create_child_claim(claim, Region::new(10, 10, 20, 20)))
        .unwrap();
    context
        .trust()
        .set_trust_level(&Actor::player(owner), "Alex", &world, claim, &level(&context, "build"))
        .unwrap();

    assert!(context
        .trust()
        .is_operation_allowed(&world, child, &alex.uuid, OperationType::BlockBreak));

    context
        .claim_worlds()
        .with_world_mut(&world, |cw| {
            if let Some(child) = cw.claim_mut(child) {
                child.inherit_parent = false;
            }
            Ok(())
        })
        .unwrap();
    assert!(!context
        .trust()
        .is_operation_allowed(&world, child, &alex.uuid, OperationType::BlockBreak));
    assert!(context
        .trust()
        .is_operation_allowed(&world, claim, &alex.uuid, OperationType::BlockBreak));
}

#[test]
fn edge_unclaimable_world_is_refused() {
    let mut settings = Settings::default();
    settings.claims.unclaimable_worlds = vec!["world_the_end".into()];
    let context = context_with(settings);
    let end = World::new("world_the_end", Uuid::new_v4(), "the_end");
    let result = context.claim_worlds().create(&end);
    assert!(matches!(result, Err(ClaimError::PermissionDenied(_))));
    assert!(!context.claim_worlds().is_loaded(&end));
}
