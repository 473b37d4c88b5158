//! SQLite storage engine.
//!
//! One connection guarded by a mutex; every public operation is a single
//! statement, or a transaction for scripts, so readers never observe a
//! half-applied write. File databases run in WAL mode so several server
//! processes can share one file.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use crate::claim::{ClaimWorld, ServerWorld, World};
use crate::config::TableNames;
use crate::error::{ClaimError, Result};
use crate::group::UserGroup;
use crate::user::{SavedUser, User};

use super::codec;
use super::schema::format_tables;
use super::Database;

const USER_COLUMNS: &str =
    "`uuid`, `username`, `last_login`, `claim_blocks`, `hours_played`, `preferences`";

/// Raw `user_data` row, converted outside the row callback so decode
/// failures surface as our own errors.
struct UserRow {
    uuid: String,
    username: String,
    last_login: i64,
    claim_blocks: i64,
    hours_played: i32,
    preferences: Vec<u8>,
}

impl UserRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            uuid: row.get(0)?,
            username: row.get(1)?,
            last_login: row.get(2)?,
            claim_blocks: row.get(3)?,
            hours_played: row.get(4)?,
            preferences: row.get(5)?,
        })
    }

    fn into_saved_user(self) -> Result<SavedUser> {
        Ok(SavedUser {
            user: User::new(parse_uuid(&self.uuid)?, self.username),
            preferences: codec::decode_preferences(&self.preferences)?,
            last_login: crate::time::from_millis(self.last_login),
            claim_blocks: self.claim_blocks.max(0),
            hours_played: self.hours_played.max(0),
        })
    }
}

/// Raw `claim_data` row.
struct ClaimRow {
    id: i64,
    server_name: String,
    world_uuid: String,
    world_name: String,
    world_environment: String,
    data: Vec<u8>,
}

impl ClaimRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            server_name: row.get(1)?,
            world_uuid: row.get(2)?,
            world_name: row.get(3)?,
            world_environment: row.get(4)?,
            data: row.get(5)?,
        })
    }

    fn into_server_world(self) -> Result<(ServerWorld, ClaimWorld)> {
        let world = World::new(
            self.world_name,
            parse_uuid(&self.world_uuid)?,
            self.world_environment,
        );
        let mut claim_world = codec::decode_claim_world(&self.data)?;
        claim_world.set_id(self.id);
        Ok((
            ServerWorld {
                server: self.server_name,
                world,
            },
            claim_world,
        ))
    }
}

fn parse_uuid(text: &str) -> Result<Uuid> {
    Uuid::parse_str(text)
        .map_err(|e| ClaimError::SchemaInconsistency(format!("invalid uuid '{text}': {e}")))
}

/// `rusqlite`-backed [`Database`].
pub struct SqliteDatabase {
    conn: Mutex<Connection>,
    tables: TableNames,
}

impl SqliteDatabase {
    /// Open or create a database file.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::StorageFailure` if the file cannot be opened.
    pub fn open(path: &Path, tables: TableNames) -> Result<Self> {
        log::info!("Opening SQLite database at {}", path.display());
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Ok(Self {
            conn: Mutex::new(conn),
            tables,
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory(tables: TableNames) -> Result<Self> {
        log::debug!("Opening in-memory SQLite database");
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            tables,
        })
    }

    fn sql(&self, template: &str) -> String {
        format_tables(template, &self.tables)
    }

    fn query_users(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<SavedUser>> {
        let conn = self.conn.lock();
        let mut statement = conn.prepare(sql)?;
        let rows = statement
            .query_map(params, UserRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(UserRow::into_saved_user).collect()
    }

    fn query_groups(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<UserGroup>> {
        let conn = self.conn.lock();
        let mut statement = conn.prepare(sql)?;
        let rows = statement
            .query_map(params, |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|(owner, name, members)| {
                Ok(UserGroup::with_members(
                    parse_uuid(&owner)?,
                    name,
                    codec::decode_members(&members)?,
                ))
            })
            .collect()
    }

    fn query_claim_rows(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<ClaimRow>> {
        let conn = self.conn.lock();
        let mut statement = conn.prepare(sql)?;
        let rows = statement
            .query_map(params, ClaimRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

impl Database for SqliteDatabase {
    fn table_names(&self) -> &TableNames {
        &self.tables
    }

    fn execute_script(&self, statements: &[String]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for statement in statements {
            tx.execute_batch(statement)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn is_created(&self) -> bool {
        let sql = self.sql("SELECT `uuid` FROM `%user_data%` LIMIT 1;");
        self.conn.lock().prepare(&sql).is_ok()
    }

    fn schema_version(&self) -> Result<Option<i32>> {
        let sql = self.sql("SELECT `schema_version` FROM `%meta_data%` LIMIT 1;");
        let version = self
            .conn
            .lock()
            .query_row(&sql, [], |row| row.get(0))
            .optional()?;
        Ok(version)
    }

    fn set_schema_version(&self, version: i32) -> Result<()> {
        let probe = self.sql("SELECT `schema_version` FROM `%meta_data%` LIMIT 1;");
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing: Option<i32> = tx.query_row(&probe, [], |row| row.get(0)).optional()?;
        let sql = match existing {
            None => self.sql("INSERT INTO `%meta_data%` (`schema_version`) VALUES (?1);"),
            Some(_) => self.sql("UPDATE `%meta_data%` SET `schema_version` = ?1;"),
        };
        tx.execute(&sql, params![version])?;
        tx.commit()?;
        Ok(())
    }

    fn get_user(&self, uuid: &Uuid) -> Result<Option<SavedUser>> {
        let sql = self.sql(&format!(
            "SELECT {USER_COLUMNS} FROM `%user_data%` WHERE `uuid` = ?1;"
        ));
        Ok(self.query_users(&sql, &[&uuid.to_string()])?.into_iter().next())
    }

    fn get_user_by_name(&self, name: &str) -> Result<Option<SavedUser>> {
        let sql = self.sql(&format!(
            "SELECT {USER_COLUMNS} FROM `%user_data%` WHERE `username` = ?1 \
             ORDER BY `last_login` DESC LIMIT 1;"
        ));
        Ok(self.query_users(&sql, &[&name])?.into_iter().next())
    }

    fn get_inactive_users(&self, days: u32) -> Result<Vec<SavedUser>> {
        let cutoff = crate::time::to_millis(crate::time::days_before(crate::time::now(), days));
        let sql = self.sql(&format!(
            "SELECT {USER_COLUMNS} FROM `%user_data%` WHERE `last_login` <= ?1;"
        ));
        self.query_users(&sql, &[&cutoff])
    }

    fn create_user(&self, user: &SavedUser) -> Result<()> {
        let sql = self.sql(&format!(
            "INSERT INTO `%user_data%` ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6);"
        ));
        self.conn.lock().execute(
            &sql,
            params![
                user.user.uuid.to_string(),
                user.user.name,
                crate::time::to_millis(user.last_login),
                user.claim_blocks,
                user.hours_played,
                codec::encode_preferences(&user.preferences)?,
            ],
        )?;
        Ok(())
    }

    fn update_user(&self, user: &SavedUser) -> Result<()> {
        let sql = self.sql(
            "UPDATE `%user_data%` SET `username` = ?1, `last_login` = ?2, `claim_blocks` = ?3, \
             `hours_played` = ?4, `preferences` = ?5 WHERE `uuid` = ?6;",
        );
        let changed = self.conn.lock().execute(
            &sql,
            params![
                user.user.name,
                crate::time::to_millis(user.last_login),
                user.claim_blocks,
                user.hours_played,
                codec::encode_preferences(&user.preferences)?,
                user.user.uuid.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(ClaimError::StorageFailure(format!(
                "user {} has no stored row",
                user.user.uuid
            )));
        }
        Ok(())
    }

    fn get_user_groups(&self, owner: &Uuid) -> Result<Vec<UserGroup>> {
        let sql = self.sql(
            "SELECT `uuid`, `name`, `members` FROM `%user_group_data%` WHERE `uuid` = ?1 \
             ORDER BY `name`;",
        );
        self.query_groups(&sql, &[&owner.to_string()])
    }

    fn get_all_user_groups(&self) -> Result<Vec<UserGroup>> {
        let sql = self.sql(
            "SELECT `uuid`, `name`, `members` FROM `%user_group_data%` ORDER BY `uuid`, `name`;",
        );
        self.query_groups(&sql, &[])
    }

    fn add_user_group(&self, group: &UserGroup) -> Result<()> {
        let sql = self.sql(
            "INSERT INTO `%user_group_data%` (`uuid`, `name`, `members`) VALUES (?1, ?2, ?3);",
        );
        self.conn.lock().execute(
            &sql,
            params![
                group.owner.to_string(),
                group.name,
                codec::encode_members(&group.members)?,
            ],
        )?;
        Ok(())
    }

    fn update_user_group(&self, owner: &Uuid, name: &str, group: &UserGroup) -> Result<()> {
        let sql = self.sql(
            "UPDATE `%user_group_data%` SET `name` = ?1, `members` = ?2 \
             WHERE `uuid` = ?3 AND `name` = ?4;",
        );
        let changed = self.conn.lock().execute(
            &sql,
            params![
                group.name,
                codec::encode_members(&group.members)?,
                owner.to_string(),
                name,
            ],
        )?;
        if changed == 0 {
            return Err(ClaimError::StorageFailure(format!(
                "user group {name} of {owner} has no stored row"
            )));
        }
        Ok(())
    }

    fn delete_user_group(&self, owner: &Uuid, name: &str) -> Result<()> {
        let sql = self.sql("DELETE FROM `%user_group_data%` WHERE `uuid` = ?1 AND `name` = ?2;");
        self.conn
            .lock()
            .execute(&sql, params![owner.to_string(), name])?;
        Ok(())
    }

    fn get_claim_world(&self, id: i64) -> Result<Option<(ServerWorld, ClaimWorld)>> {
        let sql = self.sql(
            "SELECT `id`, `server_name`, `world_uuid`, `world_name`, `world_environment`, `data` \
             FROM `%claim_data%` WHERE `id` = ?1;",
        );
        self.query_claim_rows(&sql, &[&id])?
            .into_iter()
            .next()
            .map(ClaimRow::into_server_world)
            .transpose()
    }

    fn get_claim_worlds(&self, server: &str) -> Result<Vec<(World, ClaimWorld)>> {
        let sql = self.sql(
            "SELECT `id`, `server_name`, `world_uuid`, `world_name`, `world_environment`, `data` \
             FROM `%claim_data%` WHERE `server_name` = ?1 ORDER BY `id`;",
        );
        self.query_claim_rows(&sql, &[&server])?
            .into_iter()
            .map(|row| row.into_server_world().map(|(sw, cw)| (sw.world, cw)))
            .collect()
    }

    fn get_all_claim_worlds(&self) -> Result<Vec<(ServerWorld, ClaimWorld)>> {
        let sql = self.sql(
            "SELECT `id`, `server_name`, `world_uuid`, `world_name`, `world_environment`, `data` \
             FROM `%claim_data%` ORDER BY `id`;",
        );
        self.query_claim_rows(&sql, &[])?
            .into_iter()
            .map(ClaimRow::into_server_world)
            .collect()
    }

    fn create_claim_world(&self, server: &str, world: &World) -> Result<ClaimWorld> {
        let mut claim_world = ClaimWorld::new();
        let sql = self.sql(
            "INSERT INTO `%claim_data%` (`server_name`, `world_uuid`, `world_name`, \
             `world_environment`, `data`) VALUES (?1, ?2, ?3, ?4, ?5);",
        );
        let conn = self.conn.lock();
        conn.execute(
            &sql,
            params![
                server,
                world.uuid.to_string(),
                world.name,
                world.environment,
                codec::encode_claim_world(&claim_world)?,
            ],
        )?;
        claim_world.set_id(conn.last_insert_rowid());
        Ok(claim_world)
    }

    fn update_claim_world(&self, world: &ClaimWorld) -> Result<()> {
        let sql = self.sql("UPDATE `%claim_data%` SET `data` = ?1 WHERE `id` = ?2;");
        let changed = self
            .conn
            .lock()
            .execute(&sql, params![codec::encode_claim_world(world)?, world.id()])?;
        if changed == 0 {
            return Err(ClaimError::StorageFailure(format!(
                "claim world {} has no stored row",
                world.id()
            )));
        }
        Ok(())
    }

    fn delete_claim_world(&self, id: i64) -> Result<()> {
        let sql = self.sql("DELETE FROM `%claim_data%` WHERE `id` = ?1;");
        self.conn.lock().execute(&sql, params![id])?;
        Ok(())
    }
}
