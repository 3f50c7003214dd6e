//! Listing types for the swap exchange engine
//!
//! This module defines the Item record, its enumerated attributes and the
//! lifecycle status that moderation and the swap workflow move it through.

use super::user::{Points, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Item identifier
pub type ItemId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tops,
    Bottoms,
    Dresses,
    Outerwear,
    Shoes,
    Accessories,
    Other,
}

labelled_enum!(Category, "category" {
    Tops => "tops",
    Bottoms => "bottoms",
    Dresses => "dresses",
    Outerwear => "outerwear",
    Shoes => "shoes",
    Accessories => "accessories",
    Other => "other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Size {
    XS,
    S,
    M,
    L,
    XL,
    XXL,
    /// One size
    OS,
    /// Not applicable
    NA,
}

labelled_enum!(Size, "size" {
    XS => "XS",
    S => "S",
    M => "M",
    L => "L",
    XL => "XL",
    XXL => "XXL",
    OS => "OS",
    NA => "NA",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Condition {
    New,
    LikeNew,
    Good,
    Fair,
    Poor,
}

labelled_enum!(Condition, "condition" {
    New => "new",
    LikeNew => "like-new",
    Good => "good",
    Fair => "fair",
    Poor => "poor",
});

/// How a listing can be acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// Exchanged for another item
    Swap,
    /// Redeemed for points
    Points,
}

labelled_enum!(ItemType, "type" {
    Swap => "swap",
    Points => "points",
});

/// Listing lifecycle
///
/// ```text
/// pending ──approve──▶ approved ──accept──▶ reserved ──complete──▶ swapped
///    │                  (listed)  ──redeem──────────────────────▶ redeemed
///    └──reject──▶ rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Approved,
    Rejected,
    Listed,
    Reserved,
    Swapped,
    Redeemed,
}

labelled_enum!(ItemStatus, "status" {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    Listed => "listed",
    Reserved => "reserved",
    Swapped => "swapped",
    Redeemed => "redeemed",
});

impl ItemStatus {
    /// Approved and listed items are visible and open to requests
    pub fn is_available(self) -> bool {
        matches!(self, ItemStatus::Approved | ItemStatus::Listed)
    }

    /// Listings can be edited until moderation rejects them or a buyer takes them
    pub fn is_editable(self) -> bool {
        self == ItemStatus::Pending || self.is_available()
    }
}

/// Admin verdict on a pending listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationDecision {
    Approved,
    Rejected,
}

labelled_enum!(ModerationDecision, "status" {
    Approved => "approved",
    Rejected => "rejected",
});

impl ModerationDecision {
    /// Status the item moves to
    pub fn status(self) -> ItemStatus {
        match self {
            ModerationDecision::Approved => ItemStatus::Approved,
            ModerationDecision::Rejected => ItemStatus::Rejected,
        }
    }
}

/// Item type together with its point cost
///
/// A cost exists exactly when the item is redeemable for points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Pricing {
    Swap,
    Points { cost: Points },
}

impl Pricing {
    pub fn item_type(&self) -> ItemType {
        match self {
            Pricing::Swap => ItemType::Swap,
            Pricing::Points { .. } => ItemType::Points,
        }
    }

    pub fn point_cost(&self) -> Option<Points> {
        match self {
            Pricing::Swap => None,
            Pricing::Points { cost } => Some(*cost),
        }
    }
}

/// Listing submission as received from the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub size: Size,
    pub condition: Condition,
    pub item_type: ItemType,
    /// Required and positive for points items, forbidden otherwise
    pub point_cost: Option<Points>,
    pub tags: Vec<String>,
    /// Image URLs hosted by the external object store
    pub images: Vec<String>,
}

/// Edit to an existing listing; `None` leaves a field unchanged
///
/// The item type is fixed at submission, so a swap item cannot gain a cost.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub size: Option<Size>,
    pub condition: Option<Condition>,
    pub point_cost: Option<Points>,
    pub tags: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
}

impl ItemUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The submission `item` would have been with these changes applied
    pub fn apply_to(&self, item: &Item) -> NewItem {
        NewItem {
            title: self.title.clone().unwrap_or_else(|| item.title.clone()),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| item.description.clone()),
            category: self.category.unwrap_or(item.category),
            size: self.size.unwrap_or(item.size),
            condition: self.condition.unwrap_or(item.condition),
            item_type: item.item_type(),
            point_cost: self.point_cost.or(item.point_cost()),
            tags: self.tags.clone().unwrap_or_else(|| item.tags.clone()),
            images: self.images.clone().unwrap_or_else(|| item.images.clone()),
        }
    }
}

/// Marketplace listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub size: Size,
    pub condition: Condition,
    pub pricing: Pricing,
    pub tags: Vec<String>,
    pub images: Vec<String>,
    pub status: ItemStatus,

    /// Owning user
    pub uploader: UserId,

    /// Users who liked the item
    pub likes: BTreeSet<UserId>,

    /// Monotonic view counter
    pub views: u64,

    /// Approving admin; `None` when approved by the system admin
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub admin_notes: Option<String>,

    pub redeemed_by: Option<UserId>,
    pub redeemed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Optimistic concurrency version, bumped on every committed write
    pub version: u64,
}

impl Item {
    pub fn item_type(&self) -> ItemType {
        self.pricing.item_type()
    }

    pub fn point_cost(&self) -> Option<Points> {
        self.pricing.point_cost()
    }

    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.uploader == user
    }

    /// Case-insensitive match against title, description and tags
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
            || self.tags.iter().any(|tag| tag.contains(&needle))
    }
}
