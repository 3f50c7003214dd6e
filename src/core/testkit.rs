//! Shared fixtures for engine tests

use crate::core::{ExchangeConfig, ExchangeEngine};
use crate::types::{
    Actor, Category, Condition, ItemId, ItemType, ModerationDecision, NewItem, Points, Role, Size,
    UserId,
};
use rstest::fixture;
use std::ops::Deref;

pub const ADMIN: UserId = 100;
pub const ALICE: UserId = 1;
pub const BOB: UserId = 2;
pub const CAROL: UserId = 3;

/// Engine without an upload bonus, so balances only move where a test says so
#[fixture]
pub fn engine() -> ExchangeEngine {
    ExchangeEngine::new(ExchangeConfig::new(0))
}

/// Engine with an admin and three members registered
#[fixture]
pub fn market(engine: ExchangeEngine) -> Market {
    Market::new(engine)
}

pub fn new_item(item_type: ItemType, point_cost: Option<Points>) -> NewItem {
    NewItem {
        title: "Denim jacket".to_string(),
        description: "Lightly worn, fits true to size".to_string(),
        category: Category::Outerwear,
        size: Size::M,
        condition: Condition::Good,
        item_type,
        point_cost,
        tags: vec!["denim".to_string(), "vintage".to_string()],
        images: vec!["https://img.example/jacket.jpg".to_string()],
    }
}

pub struct Market {
    pub engine: ExchangeEngine,
}

impl Market {
    pub fn new(engine: ExchangeEngine) -> Self {
        engine.register_user(ADMIN, "Admin", Role::Admin).unwrap();
        engine.register_user(ALICE, "Alice", Role::User).unwrap();
        engine.register_user(BOB, "Bob", Role::User).unwrap();
        engine.register_user(CAROL, "Carol", Role::User).unwrap();
        Self { engine }
    }

    pub fn seed_points(&self, user: UserId, points: Points) {
        self.engine
            .adjust_points(&Actor::SystemAdmin, user, points as i64, None)
            .unwrap();
    }

    pub fn pending_item(&self, uploader: UserId) -> ItemId {
        self.submit(uploader, new_item(ItemType::Swap, None))
    }

    pub fn pending_points_item(&self, uploader: UserId, cost: Points) -> ItemId {
        self.submit(uploader, new_item(ItemType::Points, Some(cost)))
    }

    /// Approved swap-type item
    pub fn listed_item(&self, uploader: UserId) -> ItemId {
        let id = self.pending_item(uploader);
        self.approve(id);
        id
    }

    /// Approved points-type item
    pub fn listed_points_item(&self, uploader: UserId, cost: Points) -> ItemId {
        let id = self.pending_points_item(uploader, cost);
        self.approve(id);
        id
    }

    pub fn approve(&self, item: ItemId) {
        self.engine
            .approve_item(
                &Actor::admin(ADMIN),
                item,
                ModerationDecision::Approved,
                None,
            )
            .unwrap();
    }

    /// Cached balance on the user record
    pub fn points(&self, user: UserId) -> Points {
        self.engine.user(user).unwrap().points
    }

    fn submit(&self, uploader: UserId, item: NewItem) -> ItemId {
        self.engine
            .submit_item(&Actor::member(uploader), item)
            .unwrap()
            .id
    }
}

impl Deref for Market {
    type Target = ExchangeEngine;

    fn deref(&self) -> &ExchangeEngine {
        &self.engine
    }
}
