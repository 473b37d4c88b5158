//! Trustables — anything a trust level can be granted to.

use crate::group::UserGroup;
use crate::user::User;

/// An individual user or a named group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trustable {
    User(User),
    Group(UserGroup),
}

impl Trustable {
    /// The identifier shown to users and accepted back by the resolver.
    ///
    /// Users are identified by name; groups by the group-specifier prefix
    /// followed by the group name.
    pub fn trust_identifier(&self, group_prefix: &str) -> String {
        match self {
            Trustable::User(user) => user.name.clone(),
            Trustable::Group(group) => format!("{group_prefix}{}", group.name),
        }
    }

    pub fn as_user(&self) -> Option<&User> {
        match self {
            Trustable::User(user) => Some(user),
            Trustable::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&UserGroup> {
        match self {
            Trustable::User(_) => None,
            Trustable::Group(group) => Some(group),
        }
    }
}

impl From<User> for Trustable {
    fn from(user: User) -> Self {
        Trustable::User(user)
    }
}

impl From<UserGroup> for Trustable {
    fn from(group: UserGroup) -> Self {
        Trustable::Group(group)
    }
}
