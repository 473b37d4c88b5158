//! Command-level actions.
//!
//! Hosts parse their own commands and call these functions. Every outcome,
//! success or failure, is delivered to a [`MessageSink`]; nothing is
//! returned for the caller to inspect.

use std::fmt;
use std::str::FromStr;

use parking_lot::Mutex;

use crate::claim::{ClaimId, World};
use crate::context::ClaimContext;
use crate::error::{ClaimError, Result};
use crate::trust::{Actor, Trustable};
use crate::user::User;

// ── Messages ─────────────────────────────────────────────────────────────────

/// An outcome reported to whoever ran an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    TrustLevelSet { identifier: String, level: String },
    TrustRemoved { identifier: String },
    ClaimBlockBalance { user: String, blocks: i64 },
    ClaimBlocksUpdated { user: String, blocks: i64 },
    Failed { reason: String },
}

impl Message {
    fn failed(error: &ClaimError) -> Self {
        Message::Failed {
            reason: error.to_string(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::TrustLevelSet { identifier, level } => {
                write!(f, "{identifier} now has {level} trust in this claim")
            }
            Message::TrustRemoved { identifier } => {
                write!(f, "{identifier} is no longer trusted in this claim")
            }
            Message::ClaimBlockBalance { user, blocks } => {
                write!(f, "{user} has {blocks} claim blocks")
            }
            Message::ClaimBlocksUpdated { user, blocks } => {
                write!(f, "{user} now has {blocks} claim blocks")
            }
            Message::Failed { reason } => write!(f, "{reason}"),
        }
    }
}

/// Receives action outcomes.
pub trait MessageSink {
    fn send(&self, message: Message);
}

/// Sink that keeps every message, in order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<Message>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    pub fn last(&self) -> Option<Message> {
        self.messages.lock().last().cloned()
    }
}

impl MessageSink for CollectingSink {
    fn send(&self, message: Message) {
        self.messages.lock().push(message);
    }
}

fn report<T>(sink: &dyn MessageSink, result: Result<T>, success: impl FnOnce(T) -> Message) {
    let message = match result {
        Ok(value) => success(value),
        Err(e) => {
            log::debug!("Action failed: {e}");
            Message::failed(&e)
        }
    };
    sink.send(message);
}

// ── Trust ────────────────────────────────────────────────────────────────────

/// Grant the level named by `level_alias` to `identifier` in a claim.
pub fn trust(
    context: &ClaimContext,
    actor: &Actor,
    identifier: &str,
    world: &World,
    claim: ClaimId,
    level_alias: &str,
    sink: &dyn MessageSink,
) {
    let registry = context.registry();
    let result = registry
        .by_alias(level_alias)
        .or_else(|| registry.by_id(level_alias))
        .ok_or_else(|| ClaimError::InvalidSyntax(format!("unknown trust level '{level_alias}'")))
        .and_then(|level| {
            context
                .trust()
                .set_trust_level(actor, identifier, world, claim, level)
                .map(|target| (target, level.display_name.clone()))
        });
    let prefix = context.trust().group_prefix();
    report(sink, result, |(target, level): (Trustable, String)| {
        Message::TrustLevelSet {
            identifier: target.trust_identifier(prefix),
            level,
        }
    });
}

/// Remove `identifier`'s trust from a claim.
pub fn untrust(
    context: &ClaimContext,
    actor: &Actor,
    identifier: &str,
    world: &World,
    claim: ClaimId,
    sink: &dyn MessageSink,
) {
    let result = context.trust().remove_trust(actor, identifier, world, claim);
    let prefix = context.trust().group_prefix();
    report(sink, result, |target| Message::TrustRemoved {
        identifier: target.trust_identifier(prefix),
    });
}

// ── Claim blocks ─────────────────────────────────────────────────────────────

/// What to do with a claim-block balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimBlockOperation {
    Show,
    Add,
    Remove,
    Set,
}

impl FromStr for ClaimBlockOperation {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "show" => Ok(Self::Show),
            "add" => Ok(Self::Add),
            "remove" => Ok(Self::Remove),
            "set" => Ok(Self::Set),
            other => Err(ClaimError::InvalidSyntax(format!(
                "unknown claim block operation '{other}' (expected show, add, remove or set)"
            ))),
        }
    }
}

/// Show or change `target`'s balance.
///
/// Anyone may see their own balance; seeing another user's balance and any
/// change require an elevated executor. Negative amounts count as zero.
pub fn claim_blocks(
    context: &ClaimContext,
    executor: &Actor,
    target: &User,
    operation: ClaimBlockOperation,
    amount: Option<i64>,
    sink: &dyn MessageSink,
) {
    let result = apply_claim_blocks(context, executor, target, operation, amount);
    report(sink, result, |(operation, blocks)| match operation {
        ClaimBlockOperation::Show => Message::ClaimBlockBalance {
            user: target.name.clone(),
            blocks,
        },
        _ => Message::ClaimBlocksUpdated {
            user: target.name.clone(),
            blocks,
        },
    });
}

fn apply_claim_blocks(
    context: &ClaimContext,
    executor: &Actor,
    target: &User,
    operation: ClaimBlockOperation,
    amount: Option<i64>,
) -> Result<(ClaimBlockOperation, i64)> {
    let is_self = executor.user == *target;
    if !is_self && !executor.elevated {
        return Err(ClaimError::PermissionDenied(format!(
            "{} cannot view or edit {}'s claim blocks",
            executor.user.name, target.name
        )));
    }
    if operation == ClaimBlockOperation::Show {
        return Ok((operation, context.ledger().balance(&target.uuid)));
    }
    if !executor.elevated {
        return Err(ClaimError::PermissionDenied(format!(
            "{} cannot edit claim blocks",
            executor.user.name
        )));
    }
    let amount = amount
        .ok_or_else(|| ClaimError::InvalidSyntax("an amount is required".into()))?
        .max(0);
    let blocks = context.ledger().edit_balance(target, |blocks| match operation {
        ClaimBlockOperation::Add => blocks.saturating_add(amount),
        ClaimBlockOperation::Remove => blocks.saturating_sub(amount),
        _ => amount,
    })?;
    log::info!(
        "{} changed {}'s claim blocks to {blocks}",
        executor.user.name,
        target.name
    );
    Ok((operation, blocks))
}
