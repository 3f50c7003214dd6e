//! Core traits for record storage and time
//!
//! This module defines the abstractions shared by the record tables and the
//! unit of work: what a versioned record looks like, and where timestamps
//! come from.

use crate::types::{Entity, Item, Swap, User};
use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Source of the current time
///
/// Every timestamp the core writes (`created_at`, `approved_at`, ledger
/// entry times, ...) is taken from a `Clock`, so tests can pin it.
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A record kept in a versioned table
///
/// `version` starts at 1 on first commit and increases by one on every
/// committed write. The unit of work compares it at commit time to detect
/// concurrent modification.
pub trait Record: Clone + Debug + Send + Sync + 'static {
    /// Record family, used in errors
    const ENTITY: Entity;

    fn id(&self) -> u32;

    fn version(&self) -> u64;

    /// Set the version and any modification timestamp on commit
    fn stamp(&mut self, version: u64, now: DateTime<Utc>);
}

impl Record for User {
    const ENTITY: Entity = Entity::User;

    fn id(&self) -> u32 {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn stamp(&mut self, version: u64, _now: DateTime<Utc>) {
        self.version = version;
    }
}

impl Record for Item {
    const ENTITY: Entity = Entity::Item;

    fn id(&self) -> u32 {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn stamp(&mut self, version: u64, now: DateTime<Utc>) {
        self.version = version;
        self.updated_at = now;
    }
}

impl Record for Swap {
    const ENTITY: Entity = Entity::Swap;

    fn id(&self) -> u32 {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn stamp(&mut self, version: u64, now: DateTime<Utc>) {
        self.version = version;
        self.updated_at = now;
    }
}
