//! Identity value types shared by the whole request pipeline.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::identity::password::PasswordHash;

/// Privilege level of an account.
///
/// Guards compare against one specific level; the ordering only reflects
/// the numeric ids stored alongside each user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Role {
    Member = 1,
    Trainer = 2,
    Admin = 3,
}

impl Role {
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Trainer => "trainer",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown role id {0}")]
pub struct UnknownRole(pub u8);

impl TryFrom<u8> for Role {
    type Error = UnknownRole;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(Role::Member),
            2 => Ok(Role::Trainer),
            3 => Ok(Role::Admin),
            other => Err(UnknownRole(other)),
        }
    }
}

impl From<Role> for u8 {
    fn from(role: Role) -> u8 {
        role.id()
    }
}

/// An account record as handed out by the user store.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub full_name: String,
    pub email: String,
    #[serde(skip)]
    pub password: PasswordHash,
    #[serde(rename = "role_id")]
    pub role: Role,
    #[serde(rename = "image_url", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// The caller behind one request.
///
/// Anonymous access is a tag rather than a placeholder record, so a real
/// user can never compare equal to it.
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    User(Arc<User>),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Anonymous => None,
            Identity::User(user) => Some(user),
        }
    }

    /// Role of the caller, `None` when anonymous.
    pub fn role(&self) -> Option<Role> {
        self.user().map(|u| u.role)
    }
}

impl From<User> for Identity {
    fn from(user: User) -> Self {
        Identity::User(Arc::new(user))
    }
}
