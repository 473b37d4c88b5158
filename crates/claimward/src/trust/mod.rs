//! Trust — who may do what inside a claim.
//!
//! The trust module provides:
//! - Weighted trust levels and their validated registry
//! - The user-or-group trust target
//! - Identifier resolution and the access check for trust changes
//! - The trust manager that applies and persists trust changes

pub mod level;
pub mod manager;
pub mod resolve;
pub mod trustable;

pub use level::{OperationType, Privilege, TrustLevel, TrustLevelRegistry};
pub use manager::TrustManager;
pub use resolve::{check_access, Actor, Purpose, TrustableResolver};
pub use trustable::Trustable;
