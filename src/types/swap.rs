//! Swap-related types for the swap exchange engine
//!
//! A swap is a request by one user for another user's listed item, paid for
//! either with one of the requester's own items or with points.

use super::item::ItemId;
use super::user::{Points, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Swap identifier
pub type SwapId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapType {
    /// Item for item
    Swap,
    /// Item for points
    Points,
}

labelled_enum!(SwapType, "type" {
    Swap => "swap",
    Points => "points",
});

/// Swap state machine
///
/// `pending → accepted → completed`, or `pending → rejected`.
/// `completed` and `rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

labelled_enum!(SwapStatus, "status" {
    Pending => "pending",
    Accepted => "accepted",
    Rejected => "rejected",
    Completed => "completed",
});

impl SwapStatus {
    /// Whether the state machine permits moving from `self` to `next`
    pub fn can_transition_to(self, next: SwapStatus) -> bool {
        matches!(
            (self, next),
            (SwapStatus::Pending, SwapStatus::Accepted)
                | (SwapStatus::Pending, SwapStatus::Rejected)
                | (SwapStatus::Accepted, SwapStatus::Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SwapStatus::Rejected | SwapStatus::Completed)
    }
}

/// What the requester pays with
///
/// Exactly one of "offered item" or "points used" exists, and which one is
/// fixed by the swap type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SwapTerms {
    ItemForItem {
        offered_item: ItemId,
        offered_item_owner: UserId,
    },
    Points {
        points_used: Points,
    },
}

/// Swap request as received from the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub request_item: ItemId,
    /// Required for `swap`, forbidden for `points`
    pub offered_item: Option<ItemId>,
    pub swap_type: SwapType,
    /// Required for `points`, forbidden for `swap`
    pub points_used: Option<Points>,
    pub notes: Option<String>,
}

impl SwapRequest {
    /// Item-for-item request
    pub fn item_for_item(request_item: ItemId, offered_item: ItemId) -> Self {
        SwapRequest {
            request_item,
            offered_item: Some(offered_item),
            swap_type: SwapType::Swap,
            points_used: None,
            notes: None,
        }
    }

    /// Points request
    pub fn for_points(request_item: ItemId, points_used: Points) -> Self {
        SwapRequest {
            request_item,
            offered_item: None,
            swap_type: SwapType::Points,
            points_used: Some(points_used),
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Swap record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Swap {
    pub id: SwapId,
    pub requester: UserId,
    pub request_item: ItemId,
    pub request_item_owner: UserId,
    pub terms: SwapTerms,
    pub status: SwapStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,

    /// Optimistic concurrency version, bumped on every committed write
    pub version: u64,
}

impl Swap {
    pub fn swap_type(&self) -> SwapType {
        match self.terms {
            SwapTerms::ItemForItem { .. } => SwapType::Swap,
            SwapTerms::Points { .. } => SwapType::Points,
        }
    }

    pub fn offered_item(&self) -> Option<ItemId> {
        match self.terms {
            SwapTerms::ItemForItem { offered_item, .. } => Some(offered_item),
            SwapTerms::Points { .. } => None,
        }
    }

    pub fn offered_item_owner(&self) -> Option<UserId> {
        match self.terms {
            SwapTerms::ItemForItem {
                offered_item_owner, ..
            } => Some(offered_item_owner),
            SwapTerms::Points { .. } => None,
        }
    }

    pub fn points_used(&self) -> Option<Points> {
        match self.terms {
            SwapTerms::ItemForItem { .. } => None,
            SwapTerms::Points { points_used } => Some(points_used),
        }
    }

    /// Every item involved in the swap
    pub fn items(&self) -> Vec<ItemId> {
        let mut items = vec![self.request_item];
        items.extend(self.offered_item());
        items
    }

    /// Owner of the requested item or of the offered item
    pub fn is_owner(&self, user: UserId) -> bool {
        self.request_item_owner == user || self.offered_item_owner() == Some(user)
    }

    /// Requester or either owner
    pub fn is_participant(&self, user: UserId) -> bool {
        self.requester == user || self.is_owner(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn swap_with(terms: SwapTerms) -> Swap {
        let now = Utc::now();
        Swap {
            id: 1,
            requester: 1,
            request_item: 10,
            request_item_owner: 2,
            terms,
            status: SwapStatus::Pending,
            notes: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            version: 1,
        }
    }

    #[rstest]
    #[case::accept(SwapStatus::Pending, SwapStatus::Accepted, true)]
    #[case::reject(SwapStatus::Pending, SwapStatus::Rejected, true)]
    #[case::complete(SwapStatus::Accepted, SwapStatus::Completed, true)]
    #[case::skip_accept(SwapStatus::Pending, SwapStatus::Completed, false)]
    #[case::reject_accepted(SwapStatus::Accepted, SwapStatus::Rejected, false)]
    #[case::reaccept(SwapStatus::Accepted, SwapStatus::Accepted, false)]
    #[case::reopen_rejected(SwapStatus::Rejected, SwapStatus::Pending, false)]
    #[case::accept_rejected(SwapStatus::Rejected, SwapStatus::Accepted, false)]
    #[case::reopen_completed(SwapStatus::Completed, SwapStatus::Pending, false)]
    #[case::reject_completed(SwapStatus::Completed, SwapStatus::Rejected, false)]
    fn test_transition_table(
        #[case] from: SwapStatus,
        #[case] to: SwapStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_terminal_states() {
        assert!(SwapStatus::Rejected.is_terminal());
        assert!(SwapStatus::Completed.is_terminal());
        assert!(!SwapStatus::Pending.is_terminal());
        assert!(!SwapStatus::Accepted.is_terminal());
    }

    #[test]
    fn test_item_for_item_terms() {
        let swap = swap_with(SwapTerms::ItemForItem {
            offered_item: 11,
            offered_item_owner: 1,
        });
        assert_eq!(swap.swap_type(), SwapType::Swap);
        assert_eq!(swap.offered_item(), Some(11));
        assert_eq!(swap.points_used(), None);
        assert_eq!(swap.items(), vec![10, 11]);
        assert!(swap.is_owner(1));
        assert!(swap.is_owner(2));
    }

    #[test]
    fn test_points_terms() {
        let swap = swap_with(SwapTerms::Points { points_used: 40 });
        assert_eq!(swap.swap_type(), SwapType::Points);
        assert_eq!(swap.offered_item(), None);
        assert_eq!(swap.offered_item_owner(), None);
        assert_eq!(swap.points_used(), Some(40));
        assert_eq!(swap.items(), vec![10]);
        assert!(!swap.is_owner(1));
        assert!(swap.is_participant(1));
        assert!(!swap.is_participant(3));
    }
}
