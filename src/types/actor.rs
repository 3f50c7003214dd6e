//! Caller identity
//!
//! Admin actions may be performed by a real admin account or by the
//! system admin, which has no backing user record. Modelling the latter as
//! its own variant keeps code from dereferencing a user that does not exist.

use super::user::{Role, UserId};
use serde::Serialize;

/// Identity a core operation is performed on behalf of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Actor {
    /// Authenticated user with a backing record
    User { id: UserId, role: Role },

    /// Operator acting without a user record
    SystemAdmin,
}

impl Actor {
    /// Regular member
    pub fn member(id: UserId) -> Self {
        Actor::User {
            id,
            role: Role::User,
        }
    }

    /// Admin with a backing user record
    pub fn admin(id: UserId) -> Self {
        Actor::User {
            id,
            role: Role::Admin,
        }
    }

    /// The backing user id, if any
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Actor::User { id, .. } => Some(*id),
            Actor::SystemAdmin => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        match self {
            Actor::User { role, .. } => *role == Role::Admin,
            Actor::SystemAdmin => true,
        }
    }
}
