//! JSON blob encoding for the structured columns.
//!
//! Claim worlds are wrapped in a versioned envelope:
//!
//! ```json
//! { "version": 1, "world": { "id": 4, "claims": [ ... ], ... } }
//! ```
//!
//! Preferences and group member lists are stored as bare JSON values.
//! Decoding failures are reported as `ClaimError::SchemaInconsistency`,
//! since they mean a persisted row no longer matches what this build reads.

use serde::{Deserialize, Serialize};

use crate::claim::ClaimWorld;
use crate::error::{ClaimError, Result};
use crate::user::{Preferences, User};

// ── Format constants ──────────────────────────────────────────────────────────

const CLAIM_WORLD_FORMAT_VERSION: u32 = 1;

// ── Envelopes ─────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ClaimWorldEnvelopeRef<'a> {
    version: u32,
    world: &'a ClaimWorld,
}

#[derive(Deserialize)]
struct ClaimWorldEnvelope {
    version: u32,
    world: ClaimWorld,
}

// ── Claim worlds ──────────────────────────────────────────────────────────────

/// Encode a whole claim world as one blob.
///
/// # Errors
///
/// Returns `ClaimError::Serialization` if encoding fails.
pub fn encode_claim_world(world: &ClaimWorld) -> Result<Vec<u8>> {
    let envelope = ClaimWorldEnvelopeRef {
        version: CLAIM_WORLD_FORMAT_VERSION,
        world,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Decode a claim world blob.
///
/// # Errors
///
/// Returns `ClaimError::SchemaInconsistency` if the blob is malformed or was
/// written in a newer format.
pub fn decode_claim_world(bytes: &[u8]) -> Result<ClaimWorld> {
    let envelope: ClaimWorldEnvelope = serde_json::from_slice(bytes).map_err(|e| {
        ClaimError::SchemaInconsistency(format!("failed to decode claim world: {e}"))
    })?;
    if envelope.version > CLAIM_WORLD_FORMAT_VERSION {
        return Err(ClaimError::SchemaInconsistency(format!(
            "claim world format version {} is newer than supported version {}",
            envelope.version, CLAIM_WORLD_FORMAT_VERSION
        )));
    }
    Ok(envelope.world)
}

// ── Preferences and members ───────────────────────────────────────────────────

pub fn encode_preferences(preferences: &Preferences) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(preferences)?)
}

pub fn decode_preferences(bytes: &[u8]) -> Result<Preferences> {
    serde_json::from_slice(bytes).map_err(|e| {
        ClaimError::SchemaInconsistency(format!("failed to decode preferences: {e}"))
    })
}

pub fn encode_members(members: &[User]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(members)?)
}

pub fn decode_members(bytes: &[u8]) -> Result<Vec<User>> {
    serde_json::from_slice(bytes).map_err(|e| {
        ClaimError::SchemaInconsistency(format!("failed to decode group members: {e}"))
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
