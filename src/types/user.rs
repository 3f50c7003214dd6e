//! User-related types for the swap exchange engine
//!
//! This module defines the User record and the role supplied by the
//! identity provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User identifier
pub type UserId = u32;

/// Non-negative point amount (balances and costs)
pub type Points = u64;

/// Role supplied by the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

labelled_enum!(Role, "role" {
    User => "user",
    Admin => "admin",
});

/// Marketplace member
///
/// `points` is a cached projection of the user's ledger. It is only ever
/// written in the same commit as the ledger entry that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,

    pub name: String,

    pub role: Role,

    /// Current balance, equal to the `new_balance` of the latest ledger entry
    pub points: Points,

    /// Deactivated accounts keep their records but cannot act as members
    pub active: bool,

    pub created_at: DateTime<Utc>,

    /// Optimistic concurrency version, bumped on every committed write
    pub version: u64,
}

impl User {
    /// Create a new user with a zero balance
    pub fn new(id: UserId, name: impl Into<String>, role: Role, created_at: DateTime<Utc>) -> Self {
        User {
            id,
            name: name.into(),
            role,
            points: 0,
            active: true,
            created_at,
            version: 0,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
