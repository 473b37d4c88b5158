//! In-memory user group store backed by the gateway.
//!
//! Readers get an `Arc` snapshot of the whole group list and can iterate it
//! while writers swap in a new list. Writers serialize on one mutex, persist
//! first, and only then publish the new snapshot, so memory never shows a
//! group the database does not have.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::config::UserGroupSettings;
use crate::error::{ClaimError, Result};
use crate::storage::Gateway;
use crate::sync::{Publisher, SyncPayload};
use crate::user::User;

use super::{validate_group_name, UserGroup};

/// Snapshot-on-read store of every user group.
pub struct UserGroupStore {
    gateway: Gateway,
    settings: UserGroupSettings,
    publisher: Publisher,
    groups: RwLock<Arc<Vec<UserGroup>>>,
    writer: Mutex<()>,
}

impl UserGroupStore {
    pub fn new(gateway: Gateway, settings: UserGroupSettings, publisher: Publisher) -> Self {
        Self {
            gateway,
            settings,
            publisher,
            groups: RwLock::new(Arc::new(Vec::new())),
            writer: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &UserGroupSettings {
        &self.settings
    }

    /// Replace the in-memory list with everything in storage.
    pub fn load(&self) -> usize {
        let _guard = self.writer.lock();
        let groups = self.gateway.get_all_user_groups();
        let count = groups.len();
        *self.groups.write() = Arc::new(groups);
        log::debug!("Loaded {count} user groups");
        count
    }

    /// Re-read one owner's groups from storage, after a peer changed them.
    pub fn reload_owner(&self, owner: &Uuid) {
        let _guard = self.writer.lock();
        let fresh = self.gateway.get_user_groups(owner);
        self.swap(|groups| {
            groups.retain(|group| &group.owner != owner);
            groups.extend(fresh);
        });
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    /// The current snapshot of every group.
    pub fn all_groups(&self) -> Arc<Vec<UserGroup>> {
        self.groups.read().clone()
    }

    pub fn group(&self, owner: &Uuid, name: &str) -> Option<UserGroup> {
        self.all_groups()
            .iter()
            .find(|group| group.is(owner, name))
            .cloned()
    }

    pub fn groups_of(&self, owner: &Uuid) -> Vec<UserGroup> {
        self.all_groups()
            .iter()
            .filter(|group| &group.owner == owner)
            .cloned()
            .collect()
    }

    /// Groups `uuid` is a member of, across all owners.
    pub fn groups_containing(&self, uuid: &Uuid) -> Vec<UserGroup> {
        self.all_groups()
            .iter()
            .filter(|group| group.contains(uuid))
            .cloned()
            .collect()
    }

    // ── Mutations ────────────────────────────────────────────────────────────

    /// Create a group with its initial members.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::InvalidSyntax` for a bad name,
    /// `ClaimError::GroupExists` if the owner already has a group by that
    /// name, `ClaimError::PermissionDenied` if groups are disabled or the
    /// member cap is exceeded, or `ClaimError::StorageFailure` if the write
    /// fails.
    pub fn create_group(&self, owner: &User, name: &str, members: Vec<User>) -> Result<UserGroup> {
        self.ensure_enabled()?;
        validate_group_name(name)?;
        let _guard = self.writer.lock();
        if self.group(&owner.uuid, name).is_some() {
            return Err(ClaimError::GroupExists {
                owner: owner.name.clone(),
                name: name.to_owned(),
            });
        }
        let group = UserGroup::with_members(owner.uuid, name, members);
        self.check_capacity(&group)?;

        self.gateway.add_user_group(&group)?;
        let created = group.clone();
        self.swap(|groups| groups.push(group));
        self.publisher
            .publish(SyncPayload::UserGroupsUpdated { owner: owner.uuid });
        Ok(created)
    }

    /// Delete a group.
    ///
    /// Claims that still trust the group keep their entry; it can be
    /// removed later through ephemeral resolution.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::NotFound` if there is no such group, or
    /// `ClaimError::StorageFailure` if the write fails.
    pub fn delete_group(&self, owner: &Uuid, name: &str) -> Result<()> {
        let _guard = self.writer.lock();
        if self.group(owner, name).is_none() {
            return Err(ClaimError::NotFound(format!("group {name}")));
        }
        self.gateway.delete_user_group(owner, name)?;
        self.swap(|groups| groups.retain(|group| !group.is(owner, name)));
        self.publisher
            .publish(SyncPayload::UserGroupsUpdated { owner: *owner });
        Ok(())
    }

    /// Add a member; returns `false` if they already belonged.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::NotFound` if there is no such group,
    /// `ClaimError::PermissionDenied` if the group is full, or
    /// `ClaimError::StorageFailure` if the write fails.
    pub fn add_member(&self, owner: &Uuid, name: &str, member: User) -> Result<bool> {
        self.edit_group(owner, name, |group| Ok(group.add_member(member)))
    }

    /// Remove a member; returns `false` if they did not belong.
    ///
    /// # Errors
    ///
    /// Returns `ClaimError::NotFound` if there is no such group, or
    /// `ClaimError::StorageFailure` if the write fails.
    pub fn remove_member(&self, owner: &Uuid, name: &str, member: &Uuid) -> Result<bool> {
        self.edit_group(owner, name, |group| Ok(group.remove_member(member)))
    }

    fn edit_group(
        &self,
        owner: &Uuid,
        name: &str,
        edit: impl FnOnce(&mut UserGroup) -> Result<bool>,
    ) -> Result<bool> {
        self.ensure_enabled()?;
        let _guard = self.writer.lock();
        let mut group = self
            .group(owner, name)
            .ok_or_else(|| ClaimError::NotFound(format!("group {name}")))?;
        if !edit(&mut group)? {
            return Ok(false);
        }
        self.check_capacity(&group)?;

        self.gateway.update_user_group(owner, name, &group)?;
        self.swap(|groups| {
            if let Some(slot) = groups.iter_mut().find(|g| g.is(owner, name)) {
                *slot = group;
            }
        });
        self.publisher
            .publish(SyncPayload::UserGroupsUpdated { owner: *owner });
        Ok(true)
    }

    fn ensure_enabled(&self) -> Result<()> {
        if self.settings.enabled {
            Ok(())
        } else {
            Err(ClaimError::PermissionDenied("user groups are disabled".into()))
        }
    }

    fn check_capacity(&self, group: &UserGroup) -> Result<()> {
        match self.settings.max_members {
            Some(max) if group.members.len() > max => Err(ClaimError::PermissionDenied(format!(
                "group {} would exceed {max} members",
                group.name
            ))),
            _ => Ok(()),
        }
    }

    /// Publish a modified copy of the current list. Callers hold `writer`.
    fn swap(&self, edit: impl FnOnce(&mut Vec<UserGroup>)) {
        let mut next = (*self.all_groups()).clone();
        edit(&mut next);
        *self.groups.write() = Arc::new(next);
    }
}
