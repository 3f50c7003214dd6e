//! Item Registry operations
//!
//! Listing submission and validation, edits and removal by the uploader
//! or an admin, engagement counters and the listed-items queries.

use crate::core::engine::{check_text_len, require_active, require_member, ExchangeEngine};
use crate::core::store::UnitOfWork;
use crate::types::{
    Actor, Category, Entity, ExchangeError, Item, ItemId, ItemStatus, ItemType, ItemUpdate,
    NewItem, Pricing, UserId,
};
use std::collections::BTreeSet;
use tracing::info;

pub const MIN_TITLE_LEN: usize = 3;
pub const MAX_TITLE_LEN: usize = 100;
pub const MIN_DESCRIPTION_LEN: usize = 10;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_TAG_LEN: usize = 20;

/// Validate a submission and derive the stored pricing
///
/// Tags are trimmed and lowercased; empty tags are dropped.
fn validate_listing(item: &NewItem) -> Result<(Pricing, Vec<String>), ExchangeError> {
    check_text_len("title", item.title.trim(), MIN_TITLE_LEN, MAX_TITLE_LEN)?;
    check_text_len(
        "description",
        item.description.trim(),
        MIN_DESCRIPTION_LEN,
        MAX_DESCRIPTION_LEN,
    )?;

    let pricing = match (item.item_type, item.point_cost) {
        (ItemType::Swap, None) => Pricing::Swap,
        (ItemType::Swap, Some(_)) => {
            return Err(ExchangeError::invalid_argument(
                "point_cost",
                "only points items carry a point cost",
            ))
        }
        (ItemType::Points, Some(cost)) if cost > 0 => Pricing::Points { cost },
        (ItemType::Points, _) => {
            return Err(ExchangeError::invalid_argument(
                "point_cost",
                "points items require a positive point cost",
            ))
        }
    };

    let mut tags = Vec::with_capacity(item.tags.len());
    for tag in &item.tags {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            continue;
        }
        if tag.chars().count() > MAX_TAG_LEN {
            return Err(ExchangeError::invalid_argument(
                "tags",
                format!("tag '{tag}' exceeds {MAX_TAG_LEN} characters"),
            ));
        }
        tags.push(tag);
    }

    if let Some(url) = item
        .images
        .iter()
        .find(|url| !(url.starts_with("http://") || url.starts_with("https://")) || url.len() <= 8)
    {
        return Err(ExchangeError::invalid_argument(
            "images",
            format!("'{url}' is not an http(s) URL"),
        ));
    }

    Ok((pricing, tags))
}

/// Admins may change any listing, members only their own
fn authorize_listing_change(
    uow: &mut UnitOfWork<'_>,
    actor: &Actor,
    id: ItemId,
    action: &str,
) -> Result<(), ExchangeError> {
    if actor.is_admin() {
        return Ok(());
    }
    let user = require_member(actor, action)?;
    require_active(uow, user, action)?;
    if uow.item(id)?.is_owned_by(user) {
        Ok(())
    } else {
        Err(ExchangeError::forbidden(user, format!("{action} item {id}")))
    }
}

impl ExchangeEngine {
    /// Submit a listing; it starts `pending` until an admin moderates it
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for the system admin, out-of-bounds text, a bad
    ///   tag or image URL, or a point cost inconsistent with the item type
    /// - `NotFound` if the uploader is not registered
    pub fn submit_item(&self, actor: &Actor, item: NewItem) -> Result<Item, ExchangeError> {
        let uploader = require_member(actor, "upload items")?;
        let (pricing, tags) = validate_listing(&item)?;

        let (id, receipt) = self.store.transact("submit_item", |uow| {
            require_active(uow, uploader, "upload items")?;
            let now = uow.now();
            Ok(uow.insert_item(|id| Item {
                id,
                title: item.title.trim().to_string(),
                description: item.description.trim().to_string(),
                category: item.category,
                size: item.size,
                condition: item.condition,
                pricing,
                tags: tags.clone(),
                images: item.images.clone(),
                status: ItemStatus::Pending,
                uploader,
                likes: BTreeSet::new(),
                views: 0,
                approved_by: None,
                approved_at: None,
                admin_notes: None,
                redeemed_by: None,
                redeemed_at: None,
                created_at: now,
                updated_at: now,
                version: 0,
            }))
        })?;

        info!(item = id, uploader, item_type = %pricing.item_type(), "item submitted");
        receipt.item(id)
    }

    pub fn item(&self, id: ItemId) -> Result<Item, ExchangeError> {
        self.store
            .items
            .get(id)
            .ok_or_else(|| ExchangeError::not_found(Entity::Item, id))
    }

    /// Every item, sorted by id
    pub fn items(&self) -> Vec<Item> {
        self.store.items.values()
    }

    /// Fetch an item for display, counting the view
    pub fn view_item(&self, id: ItemId) -> Result<Item, ExchangeError> {
        let (_, receipt) = self.store.transact("view_item", |uow| {
            let item = uow.item_mut(id)?;
            item.views = item.views.saturating_add(1);
            Ok(())
        })?;
        receipt.item(id)
    }

    /// Add the actor to the item's likes, or remove them if already present
    pub fn toggle_like(&self, actor: &Actor, id: ItemId) -> Result<Item, ExchangeError> {
        let user = require_member(actor, "like items")?;
        let (liked, receipt) = self.store.transact("toggle_like", |uow| {
            require_active(uow, user, "like items")?;
            let item = uow.item_mut(id)?;
            let liked = item.likes.insert(user);
            if !liked {
                item.likes.remove(&user);
            }
            Ok(liked)
        })?;

        info!(item = id, user, liked, "like toggled");
        receipt.item(id)
    }

    /// The listed-items query: available items, newest first
    pub fn available_items(&self, category: Option<Category>) -> Vec<Item> {
        newest_first(self.store.items.filter(|item| {
            item.status.is_available() && category.map_or(true, |category| item.category == category)
        }))
    }

    /// Available items whose title, description or tags contain `text`
    pub fn search_items(&self, text: &str) -> Vec<Item> {
        newest_first(
            self.store
                .items
                .filter(|item| item.status.is_available() && item.matches_text(text)),
        )
    }

    /// Available items ordered by views, then likes
    pub fn trending_items(&self, limit: usize) -> Vec<Item> {
        let mut items = self.store.items.filter(|item| item.status.is_available());
        items.sort_by(|a, b| {
            b.views
                .cmp(&a.views)
                .then(b.likes.len().cmp(&a.likes.len()))
                .then(b.id.cmp(&a.id))
        });
        items.truncate(limit);
        items
    }

    pub fn items_by_uploader(&self, uploader: UserId) -> Vec<Item> {
        newest_first(self.store.items.filter(|item| item.uploader == uploader))
    }

    pub fn items_by_status(&self, status: ItemStatus) -> Vec<Item> {
        newest_first(self.store.items.filter(|item| item.status == status))
    }

    /// Edit a pending or available listing
    ///
    /// The edited listing is validated like a submission. Status,
    /// moderation fields and engagement counters are left alone, so an
    /// approved item stays approved. A pending points swap for the item whose
    /// offered points no longer match the cost fails at accept.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `changes` is empty or the edited listing is invalid
    /// - `NotFound` if the item does not exist
    /// - `Forbidden` if the actor is neither the uploader nor an admin, or is
    ///   deactivated
    /// - `InvalidState` once the item is rejected, reserved or gone to a buyer
    pub fn update_item(
        &self,
        actor: &Actor,
        id: ItemId,
        changes: ItemUpdate,
    ) -> Result<Item, ExchangeError> {
        if changes.is_empty() {
            return Err(ExchangeError::invalid_argument("changes", "nothing to update"));
        }

        let (_, receipt) = self.store.transact("update_item", |uow| {
            authorize_listing_change(uow, actor, id, "update")?;
            let item = uow.item(id)?;
            if !item.status.is_editable() {
                return Err(ExchangeError::invalid_state(
                    Entity::Item,
                    id,
                    item.status,
                    "pending or listed",
                    "update",
                ));
            }
            let edited = changes.apply_to(item);
            let (pricing, tags) = validate_listing(&edited)?;

            let item = uow.item_mut(id)?;
            item.title = edited.title.trim().to_string();
            item.description = edited.description.trim().to_string();
            item.category = edited.category;
            item.size = edited.size;
            item.condition = edited.condition;
            item.pricing = pricing;
            item.tags = tags;
            item.images = edited.images;
            Ok(())
        })?;

        info!(item = id, by = ?actor.user_id(), "item updated");
        receipt.item(id)
    }

    /// Hard-delete a listing
    ///
    /// The uploader may withdraw their own listing; admins may remove any.
    /// Ledger entries referencing the item are kept.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the item does not exist
    /// - `Forbidden` if the actor is neither the uploader nor an admin, or is
    ///   deactivated
    /// - `InvalidState` while the item is reserved by an accepted swap
    pub fn remove_item(&self, actor: &Actor, id: ItemId) -> Result<Item, ExchangeError> {
        let (removed, _) = self.store.transact("remove_item", |uow| {
            authorize_listing_change(uow, actor, id, "remove")?;
            let item = uow.item(id)?;
            if item.status == ItemStatus::Reserved {
                return Err(ExchangeError::invalid_state(
                    Entity::Item,
                    id,
                    item.status,
                    "any status but reserved",
                    "remove",
                ));
            }
            uow.remove_item(id)
        })?;

        info!(item = id, by = ?actor.user_id(), "item removed");
        Ok(removed)
    }
}

fn newest_first(mut items: Vec<Item>) -> Vec<Item> {
    items.reverse();
    items
}
