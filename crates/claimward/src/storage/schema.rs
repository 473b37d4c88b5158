//! Database schema definitions and migrations.
//!
//! Table names are configurable, so statements are written against
//! `%placeholder%` names and formatted with [`TableNames`] before use.

use crate::config::TableNames;

/// Current schema version for migrations.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// A forward migration to `version` from the version before it.
#[derive(Debug)]
pub struct Migration {
    pub version: i32,
    pub description: &'static str,
    statements: &'static [&'static str],
}

impl Migration {
    pub fn statements(&self, tables: &TableNames) -> Vec<String> {
        self.statements
            .iter()
            .map(|sql| format_tables(sql, tables))
            .collect()
    }
}

/// Ordered migrations; every version after the first has exactly one.
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 2,
    description: "index user names for name lookups",
    statements: &[USERNAME_INDEX],
}];

/// Migrations needed to bring a database at `from` up to date, in order.
pub fn pending_migrations(from: i32) -> impl Iterator<Item = &'static Migration> {
    MIGRATIONS
        .iter()
        .filter(move |migration| migration.version > from)
}

/// Statements creating the full current schema.
pub fn create_statements(tables: &TableNames) -> Vec<String> {
    [
        USER_DATA_TABLE,
        USER_GROUP_DATA_TABLE,
        CLAIM_DATA_TABLE,
        META_DATA_TABLE,
        USERNAME_INDEX,
    ]
    .iter()
    .map(|sql| format_tables(sql, tables))
    .collect()
}

/// Substitute configured table names into a statement.
pub fn format_tables(sql: &str, tables: &TableNames) -> String {
    sql.replace("%user_data%", &tables.user_data)
        .replace("%user_group_data%", &tables.user_group_data)
        .replace("%claim_data%", &tables.claim_data)
        .replace("%meta_data%", &tables.meta_data)
}

const USER_DATA_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS `%user_data%` (
    `uuid`          TEXT    NOT NULL PRIMARY KEY,
    `username`      TEXT    NOT NULL,
    `last_login`    INTEGER NOT NULL,
    `claim_blocks`  INTEGER NOT NULL DEFAULT 0,
    `hours_played`  INTEGER NOT NULL DEFAULT 0,
    `preferences`   BLOB    NOT NULL
);"#;

const USER_GROUP_DATA_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS `%user_group_data%` (
    `uuid`      TEXT NOT NULL,
    `name`      TEXT NOT NULL,
    `members`   BLOB NOT NULL,
    PRIMARY KEY (`uuid`, `name`)
);"#;

// AUTOINCREMENT so a deleted world's id is never handed out again.
const CLAIM_DATA_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS `%claim_data%` (
    `id`                INTEGER PRIMARY KEY AUTOINCREMENT,
    `server_name`       TEXT NOT NULL,
    `world_uuid`        TEXT NOT NULL,
    `world_name`        TEXT NOT NULL,
    `world_environment` TEXT NOT NULL,
    `data`              BLOB NOT NULL
);"#;

const META_DATA_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS `%meta_data%` (
    `schema_version` INTEGER NOT NULL PRIMARY KEY
);"#;

const USERNAME_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS `%user_data%_username` ON `%user_data%` (`username`);"#;
