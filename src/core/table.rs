//! Thread-safe versioned record table
//!
//! `Table` stores users, items and swaps keyed by id in a `DashMap`, so
//! readers on different records never block each other. Writes go through
//! the unit of work in [`crate::core::store`], which holds the commit lock;
//! nothing outside the crate mutates a table directly.

use crate::core::traits::Record;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// Concurrent map of records with an id allocator
#[derive(Debug)]
pub struct Table<R: Record> {
    records: DashMap<u32, R>,

    /// Last allocated id; the first allocation returns 1
    last_id: AtomicU32,
}

impl<R: Record> Table<R> {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            last_id: AtomicU32::new(0),
        }
    }

    /// Snapshot of one record
    ///
    /// The returned value is a clone; later commits are not reflected in it.
    pub fn get(&self, id: u32) -> Option<R> {
        self.records.get(&id).map(|record| record.value().clone())
    }

    pub fn contains(&self, id: u32) -> bool {
        self.records.contains_key(&id)
    }

    /// Committed version of a record, `None` if absent
    pub fn version(&self, id: u32) -> Option<u64> {
        self.records.get(&id).map(|record| record.version())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Snapshot of every record, sorted by id
    pub fn values(&self) -> Vec<R> {
        self.filter(|_| true)
    }

    /// Snapshot of the records matching `predicate`, sorted by id
    pub fn filter<P>(&self, predicate: P) -> Vec<R>
    where
        P: Fn(&R) -> bool,
    {
        let mut matched: Vec<R> = self
            .records
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matched.sort_by_key(|record| record.id());
        matched
    }

    /// Number of records matching `predicate`
    pub fn count<P>(&self, predicate: P) -> usize
    where
        P: Fn(&R) -> bool,
    {
        self.records
            .iter()
            .filter(|entry| predicate(entry.value()))
            .count()
    }

    /// Reserve the next id
    ///
    /// Ids are unique and increasing; an id reserved by a unit of work that
    /// never commits is not reused.
    pub fn allocate_id(&self) -> u32 {
        self.last_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn put(&self, record: R) {
        self.records.insert(record.id(), record);
    }

    pub(crate) fn remove(&self, id: u32) -> Option<R> {
        self.records.remove(&id).map(|(_, record)| record)
    }
}

impl<R: Record> Default for Table<R> {
    fn default() -> Self {
        Self::new()
    }
}
