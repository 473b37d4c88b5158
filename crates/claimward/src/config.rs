//! Configuration for a claimward deployment.
//!
//! Settings are read from TOML. Every field has a default, so an empty
//! file (or no file at all) yields a working single-server setup.
//!
//! ```toml
//! server_name = "survival"
//!
//! [database]
//! file = "claimward.db"
//!
//! [claims]
//! starting_claim_blocks = 100
//! hourly_claim_blocks = 100
//! unclaimable_worlds = ["world_the_end"]
//!
//! [user_groups]
//! group_specifier_prefix = "@"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::claim::World;
use crate::error::{ClaimError, Result};
use crate::trust::TrustLevel;

/// Top-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Name of this server within a network sharing one dataset.
    #[serde(default = "default_server_name")]
    pub server_name: String,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub claims: ClaimSettings,
    #[serde(default)]
    pub user_groups: UserGroupSettings,
    #[serde(default = "TrustLevel::defaults")]
    pub trust_levels: Vec<TrustLevel>,
}

fn default_server_name() -> String {
    "server".into()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_name: default_server_name(),
            database: DatabaseSettings::default(),
            claims: ClaimSettings::default(),
            user_groups: UserGroupSettings::default(),
            trust_levels: TrustLevel::defaults(),
        }
    }
}

impl Settings {
    /// Parse settings from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::Config` if the TOML is malformed.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ClaimError::Config(e.to_string()))
    }

    /// Read settings from a file, falling back to defaults if it is absent.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::Io` if the file exists but cannot be read, or
    /// `ClaimError::Config` if it cannot be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No settings file at {}; using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }
}

/// Storage location and table naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite database file.
    #[serde(default = "default_database_file")]
    pub file: PathBuf,
    #[serde(default)]
    pub table_names: TableNames,
}

fn default_database_file() -> PathBuf {
    PathBuf::from("claimward.db")
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            file: default_database_file(),
            table_names: TableNames::default(),
        }
    }
}

/// Names of the four tables, so several deployments can share a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableNames {
    #[serde(default = "default_user_data")]
    pub user_data: String,
    #[serde(default = "default_user_group_data")]
    pub user_group_data: String,
    #[serde(default = "default_claim_data")]
    pub claim_data: String,
    #[serde(default = "default_meta_data")]
    pub meta_data: String,
}

fn default_user_data() -> String {
    "claimward_users".into()
}
fn default_user_group_data() -> String {
    "claimward_user_groups".into()
}
fn default_claim_data() -> String {
    "claimward_claim_data".into()
}
fn default_meta_data() -> String {
    "claimward_metadata".into()
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            user_data: default_user_data(),
            user_group_data: default_user_group_data(),
            claim_data: default_claim_data(),
            meta_data: default_meta_data(),
        }
    }
}

/// Claim economy and world rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimSettings {
    /// Balance a user starts with on first join.
    #[serde(default = "default_starting_blocks")]
    pub starting_claim_blocks: i64,
    /// Blocks granted for every hour played.
    #[serde(default = "default_hourly_blocks")]
    pub hourly_claim_blocks: i64,
    /// Worlds in which claims are disabled, by name.
    #[serde(default)]
    pub unclaimable_worlds: Vec<String>,
}

fn default_starting_blocks() -> i64 {
    100
}
fn default_hourly_blocks() -> i64 {
    100
}

impl Default for ClaimSettings {
    fn default() -> Self {
        Self {
            starting_claim_blocks: default_starting_blocks(),
            hourly_claim_blocks: default_hourly_blocks(),
            unclaimable_worlds: Vec::new(),
        }
    }
}

impl ClaimSettings {
    pub fn is_world_unclaimable(&self, world: &World) -> bool {
        self.unclaimable_worlds
            .iter()
            .any(|name| name.eq_ignore_ascii_case(&world.name))
    }
}

/// User group behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserGroupSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Prefix that marks an identifier as a group name rather than a user.
    #[serde(default = "default_group_prefix")]
    pub group_specifier_prefix: String,
    /// Maximum members per group, if limited.
    #[serde(default)]
    pub max_members: Option<usize>,
}

fn default_true() -> bool {
    true
}
fn default_group_prefix() -> String {
    "@".into()
}

impl Default for UserGroupSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            group_specifier_prefix: default_group_prefix(),
            max_members: None,
        }
    }
}
