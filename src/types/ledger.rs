//! Ledger-related types for the swap exchange engine
//!
//! A ledger entry is the immutable record of one balance change, carrying
//! the balance before and after it. The ledger is the system of record for
//! point history; the `points` field on a user is a projection of it.

use super::item::ItemId;
use super::swap::SwapId;
use super::user::{Points, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ledger entry identifier, allocated in commit order
pub type EntryId = u64;

/// Why a balance changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    /// Upload bonus awarded on approval
    Upload,
    /// Points transfer of an accepted swap
    Swap,
    /// Direct redemption of a points item
    Redeem,
    Manual,
    ItemRedemption,
    /// Admin correction
    AdminAdjustment,
}

labelled_enum!(LedgerReason, "reason" {
    Upload => "upload",
    Swap => "swap",
    Redeem => "redeem",
    Manual => "manual",
    ItemRedemption => "item_redemption",
    AdminAdjustment => "admin_adjustment",
});

/// Apply `delta` to `previous`, flooring the result at zero
///
/// Returns `None` only when a credit would overflow `Points`.
pub fn clamped_balance(previous: Points, delta: i64) -> Option<Points> {
    if delta < 0 {
        Some(previous.saturating_sub(delta.unsigned_abs()))
    } else {
        previous.checked_add(delta.unsigned_abs())
    }
}

/// Immutable record of one point movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub user: UserId,

    /// Requested change; never zero
    pub delta: i64,

    pub reason: LedgerReason,

    /// Balance before this entry
    pub previous_balance: Points,

    /// Balance after this entry, `max(0, previous_balance + delta)`
    pub new_balance: Points,

    pub item: Option<ItemId>,
    pub swap: Option<SwapId>,

    /// Admin who posted the entry, for adjustments made by a real admin
    pub admin: Option<UserId>,

    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Whether the balance snapshots agree with the clamping rule
    pub fn is_consistent(&self) -> bool {
        self.delta != 0 && clamped_balance(self.previous_balance, self.delta) == Some(self.new_balance)
    }

    /// Change actually applied, which differs from `delta` when clamping occurred
    pub fn applied_delta(&self) -> i128 {
        i128::from(self.new_balance) - i128::from(self.previous_balance)
    }
}

/// Ledger row staged by a unit of work, before balances are known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub user: UserId,
    pub delta: i64,
    pub reason: LedgerReason,
    pub item: Option<ItemId>,
    pub swap: Option<SwapId>,
    pub admin: Option<UserId>,
    pub description: Option<String>,
}

impl NewLedgerEntry {
    pub fn new(user: UserId, delta: i64, reason: LedgerReason) -> Self {
        NewLedgerEntry {
            user,
            delta,
            reason,
            item: None,
            swap: None,
            admin: None,
            description: None,
        }
    }

    pub fn with_item(mut self, item: ItemId) -> Self {
        self.item = Some(item);
        self
    }

    pub fn with_swap(mut self, swap: SwapId) -> Self {
        self.swap = Some(swap);
        self
    }

    pub fn with_admin(mut self, admin: Option<UserId>) -> Self {
        self.admin = admin;
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

/// Per-user ledger aggregates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserStats {
    /// Sum of positive deltas
    pub total_earned: Points,
    /// Sum of the magnitudes of negative deltas
    pub total_spent: Points,
    pub transactions: u64,
}

impl UserStats {
    /// Fold one entry into the aggregates
    pub fn record(&mut self, entry: &LedgerEntry) {
        if entry.delta > 0 {
            self.total_earned = self.total_earned.saturating_add(entry.delta.unsigned_abs());
        } else {
            self.total_spent = self.total_spent.saturating_add(entry.delta.unsigned_abs());
        }
        self.transactions += 1;
    }
}

/// System-wide ledger aggregates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SystemStats {
    pub total_earned: Points,
    pub total_spent: Points,
    pub transactions: u64,
    /// Users with at least one entry
    pub unique_users: u64,
}

impl SystemStats {
    /// Merge one user's aggregates
    pub fn absorb(&mut self, user: &UserStats) {
        if user.transactions == 0 {
            return;
        }
        self.total_earned = self.total_earned.saturating_add(user.total_earned);
        self.total_spent = self.total_spent.saturating_add(user.total_spent);
        self.transactions += user.transactions;
        self.unique_users += 1;
    }
}
