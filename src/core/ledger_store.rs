//! Append-only points ledger
//!
//! Entries are grouped per user in a `DashMap`, each group kept in commit
//! order. The store never rewrites or removes an entry; appends happen only
//! from a unit of work holding the commit lock, so entry ids are allocated in
//! the same order rows become visible.
//!
//! The ledger is the authority for balances: [`LedgerStore::balance`] reads
//! the `new_balance` of a user's latest entry, independent of the `points`
//! cache on the user record.

use crate::types::{
    EntryId, ItemId, LedgerEntry, Points, SwapId, SystemStats, UserId, UserStats,
};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe append-only ledger
#[derive(Debug)]
pub struct LedgerStore {
    /// Entries per user, oldest first
    by_user: DashMap<UserId, Vec<LedgerEntry>>,

    last_id: AtomicU64,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self {
            by_user: DashMap::new(),
            last_id: AtomicU64::new(0),
        }
    }

    /// Reserve the next entry id
    pub(crate) fn allocate_id(&self) -> EntryId {
        self.last_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn append(&self, entry: LedgerEntry) {
        self.by_user.entry(entry.user).or_default().push(entry);
    }

    /// Most recent entry for a user
    pub fn latest(&self, user: UserId) -> Option<LedgerEntry> {
        self.by_user
            .get(&user)
            .and_then(|entries| entries.last().cloned())
    }

    /// Balance according to the ledger
    ///
    /// # Returns
    ///
    /// The `new_balance` of the user's most recent entry, or 0 when the user
    /// has no entries.
    pub fn balance(&self, user: UserId) -> Points {
        self.latest(user).map_or(0, |entry| entry.new_balance)
    }

    /// A user's entries, newest first
    pub fn history(&self, user: UserId) -> Vec<LedgerEntry> {
        self.by_user
            .get(&user)
            .map(|entries| entries.iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    /// Every entry matching `predicate`, sorted by id
    pub fn filter<P>(&self, predicate: P) -> Vec<LedgerEntry>
    where
        P: Fn(&LedgerEntry) -> bool,
    {
        let mut matched: Vec<LedgerEntry> = self
            .by_user
            .iter()
            .flat_map(|group| {
                group
                    .value()
                    .iter()
                    .filter(|entry| predicate(entry))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        matched.sort_by_key(|entry| entry.id);
        matched
    }

    /// Every entry, sorted by id
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.filter(|_| true)
    }

    pub fn entries_for_swap(&self, swap: SwapId) -> Vec<LedgerEntry> {
        self.filter(|entry| entry.swap == Some(swap))
    }

    pub fn entries_for_item(&self, item: ItemId) -> Vec<LedgerEntry> {
        self.filter(|entry| entry.item == Some(item))
    }

    /// Earned, spent and count aggregates for one user
    pub fn user_stats(&self, user: UserId) -> UserStats {
        let mut stats = UserStats::default();
        if let Some(entries) = self.by_user.get(&user) {
            for entry in entries.iter() {
                stats.record(entry);
            }
        }
        stats
    }

    /// Aggregates across every user
    pub fn system_stats(&self) -> SystemStats {
        let mut system = SystemStats::default();
        for group in self.by_user.iter() {
            let mut stats = UserStats::default();
            for entry in group.value() {
                stats.record(entry);
            }
            system.absorb(&stats);
        }
        system
    }

    /// Users with at least one entry
    pub fn users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.by_user.iter().map(|group| *group.key()).collect();
        users.sort_unstable();
        users
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LedgerReason;
    use chrono::Utc;

    fn entry(store: &LedgerStore, user: UserId, delta: i64, previous: Points, new: Points) -> LedgerEntry {
        LedgerEntry {
            id: store.allocate_id(),
            user,
            delta,
            reason: LedgerReason::Manual,
            previous_balance: previous,
            new_balance: new,
            item: None,
            swap: None,
            admin: None,
            description: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_balance_defaults_to_zero() {
        let store = LedgerStore::new();
        assert_eq!(store.balance(1), 0);
        assert!(store.latest(1).is_none());
        assert!(store.history(1).is_empty());
    }

    #[test]
    fn test_balance_reads_latest_entry() {
        let store = LedgerStore::new();
        store.append(entry(&store, 1, 50, 0, 50));
        store.append(entry(&store, 2, 10, 0, 10));
        store.append(entry(&store, 1, -20, 50, 30));

        assert_eq!(store.balance(1), 30);
        assert_eq!(store.balance(2), 10);

        let history: Vec<EntryId> = store.history(1).iter().map(|e| e.id).collect();
        assert_eq!(history, vec![3, 1]);

        let all: Vec<EntryId> = store.entries().iter().map(|e| e.id).collect();
        assert_eq!(all, vec![1, 2, 3]);
        assert_eq!(store.users(), vec![1, 2]);
    }

    #[test]
    fn test_cross_reference_queries() {
        let store = LedgerStore::new();
        let mut debit = entry(&store, 1, -40, 100, 60);
        debit.swap = Some(7);
        debit.item = Some(3);
        let mut credit = entry(&store, 2, 40, 0, 40);
        credit.swap = Some(7);
        credit.item = Some(3);
        store.append(debit);
        store.append(credit);
        store.append(entry(&store, 1, 5, 60, 65));

        assert_eq!(store.entries_for_swap(7).len(), 2);
        assert_eq!(store.entries_for_item(3).len(), 2);
        assert!(store.entries_for_swap(8).is_empty());
    }

    #[test]
    fn test_stats() {
        let store = LedgerStore::new();
        store.append(entry(&store, 1, 50, 0, 50));
        store.append(entry(&store, 1, -80, 50, 0));
        store.append(entry(&store, 2, 30, 0, 30));

        let user = store.user_stats(1);
        assert_eq!(user.total_earned, 50);
        assert_eq!(user.total_spent, 80);
        assert_eq!(user.transactions, 2);

        let system = store.system_stats();
        assert_eq!(system.total_earned, 80);
        assert_eq!(system.total_spent, 80);
        assert_eq!(system.transactions, 3);
        assert_eq!(system.unique_users, 2);
    }
}
