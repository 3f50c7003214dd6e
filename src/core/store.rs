//! Record storage and the unit of work
//!
//! Every mutating operation runs inside a [`UnitOfWork`]. The unit reads
//! records into a staging area, remembering the version it saw, stages new
//! record states and ledger rows, then commits once.
//!
//! # Commit protocol
//!
//! Commit takes the store-wide commit lock, then:
//! 1. compares every staged record's version with the committed version and
//!    fails with [`ExchangeError::Conflict`] on any mismatch,
//! 2. appends the staged ledger rows, allocating entry ids in order,
//! 3. writes the staged records, bumping their versions.
//!
//! Validation errors abort before commit and conflicts abort before step 2,
//! so a failed unit leaves no trace. Writers never interleave. Readers do not
//! take the lock: a reader running alongside a commit can see a ledger row
//! before the `points` cache that goes with it.

use crate::core::ledger_store::LedgerStore;
use crate::core::table::Table;
use crate::core::traits::{Clock, Record, SystemClock};
use crate::types::{
    clamped_balance, Entity, ExchangeError, Item, ItemId, LedgerEntry, NewLedgerEntry, Points,
    Swap, SwapId, User, UserId,
};
use chrono::{DateTime, Utc};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Users keyed by id
pub type UserStore = Table<User>;

/// Catalog of listings keyed by id
pub type ItemRegistry = Table<Item>;

/// Swaps keyed by id
pub type SwapStore = Table<Swap>;

/// Attempts made by [`ExchangeStore::transact`] before a conflict is surfaced
pub const MAX_COMMIT_ATTEMPTS: usize = 3;

/// Longest ledger description accepted
pub const MAX_DESCRIPTION_LEN: usize = 200;

/// All marketplace state
#[derive(Debug)]
pub struct ExchangeStore {
    pub users: UserStore,
    pub items: ItemRegistry,
    pub swaps: SwapStore,
    pub ledger: LedgerStore,
    clock: Arc<dyn Clock>,
    commit_lock: Mutex<()>,
}

impl ExchangeStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            users: Table::new(),
            items: Table::new(),
            swaps: Table::new(),
            ledger: LedgerStore::new(),
            clock,
            commit_lock: Mutex::new(()),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Start a unit of work for `operation`
    pub fn begin(&self, operation: &'static str) -> UnitOfWork<'_> {
        UnitOfWork {
            store: self,
            operation,
            now: self.clock.now(),
            users: Staging::default(),
            items: Staging::default(),
            swaps: Staging::default(),
            entries: Vec::new(),
        }
    }

    /// Run `work` in a fresh unit of work and commit it
    ///
    /// On [`ExchangeError::Conflict`] the closure is run again against fresh
    /// reads, up to [`MAX_COMMIT_ATTEMPTS`] times. Any other error is
    /// returned immediately with nothing applied.
    ///
    /// # Returns
    ///
    /// The closure's value together with the commit receipt.
    pub fn transact<T, F>(
        &self,
        operation: &'static str,
        mut work: F,
    ) -> Result<(T, CommitReceipt), ExchangeError>
    where
        F: FnMut(&mut UnitOfWork<'_>) -> Result<T, ExchangeError>,
    {
        let mut attempt = 1;
        loop {
            let mut uow = self.begin(operation);
            let value = work(&mut uow)?;
            match uow.commit() {
                Ok(receipt) => return Ok((value, receipt)),
                Err(error @ ExchangeError::Conflict { .. }) if attempt < MAX_COMMIT_ATTEMPTS => {
                    debug!(operation, attempt, %error, "retrying after commit conflict");
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Recompute a user's cached `points` from the ledger
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the user does not exist.
    pub fn rebuild_balance(&self, user: UserId) -> Result<Points, ExchangeError> {
        let _guard = self.lock()?;
        let mut record = self
            .users
            .get(user)
            .ok_or_else(|| ExchangeError::not_found(Entity::User, user))?;

        let balance = self.ledger.balance(user);
        if record.points != balance {
            debug!(user, cached = record.points, ledger = balance, "rebuilding balance cache");
            record.points = balance;
            let version = record.version + 1;
            record.stamp(version, self.clock.now());
            self.users.put(record);
        }
        Ok(balance)
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, ExchangeError> {
        self.commit_lock
            .lock()
            .map_err(|_| ExchangeError::storage("commit lock poisoned"))
    }
}

impl Default for ExchangeStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A record held by a unit of work
#[derive(Debug)]
struct Staged<R> {
    /// Staged state; `None` once removed
    record: Option<R>,

    /// Version read from the table; `None` for a record created by this unit
    read_version: Option<u64>,

    dirty: bool,
}

/// Records of one family held by a unit of work
#[derive(Debug)]
struct Staging<R: Record> {
    records: BTreeMap<u32, Staged<R>>,
}

impl<R: Record> Default for Staging<R> {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }
}

impl<R: Record> Staging<R> {
    fn load(&mut self, table: &Table<R>, id: u32) -> Result<&mut Staged<R>, ExchangeError> {
        match self.records.entry(id) {
            Entry::Occupied(staged) => Ok(staged.into_mut()),
            Entry::Vacant(slot) => {
                let record = table
                    .get(id)
                    .ok_or_else(|| ExchangeError::not_found(R::ENTITY, id))?;
                Ok(slot.insert(Staged {
                    read_version: Some(record.version()),
                    record: Some(record),
                    dirty: false,
                }))
            }
        }
    }

    fn get(&mut self, table: &Table<R>, id: u32) -> Result<&R, ExchangeError> {
        self.load(table, id)?
            .record
            .as_ref()
            .ok_or_else(|| ExchangeError::not_found(R::ENTITY, id))
    }

    fn get_mut(&mut self, table: &Table<R>, id: u32) -> Result<&mut R, ExchangeError> {
        let staged = self.load(table, id)?;
        staged.dirty = true;
        staged
            .record
            .as_mut()
            .ok_or_else(|| ExchangeError::not_found(R::ENTITY, id))
    }

    fn insert(&mut self, record: R) {
        self.records.insert(
            record.id(),
            Staged {
                record: Some(record),
                read_version: None,
                dirty: true,
            },
        );
    }

    fn remove(&mut self, table: &Table<R>, id: u32) -> Result<R, ExchangeError> {
        let staged = self.load(table, id)?;
        staged.dirty = true;
        staged
            .record
            .take()
            .ok_or_else(|| ExchangeError::not_found(R::ENTITY, id))
    }

    /// Check every staged record against the committed table
    fn verify(&self, table: &Table<R>, operation: &str) -> Result<(), ExchangeError> {
        for (&id, staged) in &self.records {
            let committed = table.version(id);
            let unchanged = match staged.read_version {
                Some(version) => committed == Some(version),
                None => committed.is_none(),
            };
            if !unchanged {
                return Err(ExchangeError::conflict(R::ENTITY, id, operation));
            }
        }
        Ok(())
    }

    /// Write dirty records back, returning the committed states
    fn apply(self, table: &Table<R>, now: DateTime<Utc>) -> Vec<R> {
        let mut written = Vec::new();
        for (id, staged) in self.records {
            if !staged.dirty {
                continue;
            }
            match staged.record {
                Some(mut record) => {
                    let version = staged.read_version.map_or(1, |version| version + 1);
                    record.stamp(version, now);
                    table.put(record.clone());
                    written.push(record);
                }
                None => {
                    table.remove(id);
                }
            }
        }
        written
    }
}

/// Ledger row whose balances were fixed when it was staged
#[derive(Debug)]
struct StagedEntry {
    entry: NewLedgerEntry,
    previous_balance: Points,
    new_balance: Points,
}

/// Staged changes of one operation, committed all at once
#[derive(Debug)]
pub struct UnitOfWork<'a> {
    store: &'a ExchangeStore,
    operation: &'static str,
    now: DateTime<Utc>,
    users: Staging<User>,
    items: Staging<Item>,
    swaps: Staging<Swap>,
    entries: Vec<StagedEntry>,
}

impl<'a> UnitOfWork<'a> {
    /// Timestamp shared by everything this unit writes
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn user(&mut self, id: UserId) -> Result<&User, ExchangeError> {
        self.users.get(&self.store.users, id)
    }

    pub fn user_mut(&mut self, id: UserId) -> Result<&mut User, ExchangeError> {
        self.users.get_mut(&self.store.users, id)
    }

    /// Stage a new user
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the id is already taken.
    pub fn insert_user(&mut self, user: User) -> Result<(), ExchangeError> {
        if self.store.users.contains(user.id) || self.users.records.contains_key(&user.id) {
            return Err(ExchangeError::invalid_argument(
                "user",
                format!("user {} already exists", user.id),
            ));
        }
        self.users.insert(user);
        Ok(())
    }

    pub fn item(&mut self, id: ItemId) -> Result<&Item, ExchangeError> {
        self.items.get(&self.store.items, id)
    }

    pub fn item_mut(&mut self, id: ItemId) -> Result<&mut Item, ExchangeError> {
        self.items.get_mut(&self.store.items, id)
    }

    /// Stage a new item under a freshly allocated id
    pub fn insert_item<F>(&mut self, build: F) -> ItemId
    where
        F: FnOnce(ItemId) -> Item,
    {
        let id = self.store.items.allocate_id();
        self.items.insert(build(id));
        id
    }

    pub fn remove_item(&mut self, id: ItemId) -> Result<Item, ExchangeError> {
        self.items.remove(&self.store.items, id)
    }

    pub fn swap(&mut self, id: SwapId) -> Result<&Swap, ExchangeError> {
        self.swaps.get(&self.store.swaps, id)
    }

    pub fn swap_mut(&mut self, id: SwapId) -> Result<&mut Swap, ExchangeError> {
        self.swaps.get_mut(&self.store.swaps, id)
    }

    /// Stage a new swap under a freshly allocated id
    pub fn insert_swap<F>(&mut self, build: F) -> SwapId
    where
        F: FnOnce(SwapId) -> Swap,
    {
        let id = self.store.swaps.allocate_id();
        self.swaps.insert(build(id));
        id
    }

    /// Stage a ledger row and the matching balance change
    ///
    /// The previous balance is the staged user's `points`, so several rows
    /// for one user in the same unit chain correctly. The new balance is
    /// floored at zero.
    ///
    /// # Returns
    ///
    /// `(previous_balance, new_balance)`
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `delta` is zero or the description is too long
    /// - `NotFound` if the user does not exist
    /// - `ArithmeticOverflow` if a credit would exceed the representable balance
    pub fn post(&mut self, entry: NewLedgerEntry) -> Result<(Points, Points), ExchangeError> {
        if entry.delta == 0 {
            return Err(ExchangeError::invalid_argument("delta", "must not be zero"));
        }
        if let Some(description) = &entry.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(ExchangeError::invalid_argument(
                    "description",
                    format!("cannot exceed {MAX_DESCRIPTION_LEN} characters"),
                ));
            }
        }

        let operation = self.operation;
        let user = self.user_mut(entry.user)?;
        let previous_balance = user.points;
        let new_balance = clamped_balance(previous_balance, entry.delta)
            .ok_or_else(|| ExchangeError::arithmetic_overflow(operation, entry.user))?;
        user.points = new_balance;

        self.entries.push(StagedEntry {
            entry,
            previous_balance,
            new_balance,
        });
        Ok((previous_balance, new_balance))
    }

    /// Verify versions and apply every staged change
    ///
    /// # Errors
    ///
    /// - `Conflict` if any staged record changed since it was read
    /// - `Storage` if the commit lock is poisoned
    pub fn commit(self) -> Result<CommitReceipt, ExchangeError> {
        let store = self.store;
        let _guard = store.lock()?;

        self.users.verify(&store.users, self.operation)?;
        self.items.verify(&store.items, self.operation)?;
        self.swaps.verify(&store.swaps, self.operation)?;

        let mut entries = Vec::with_capacity(self.entries.len());
        for staged in self.entries {
            let NewLedgerEntry {
                user,
                delta,
                reason,
                item,
                swap,
                admin,
                description,
            } = staged.entry;
            let entry = LedgerEntry {
                id: store.ledger.allocate_id(),
                user,
                delta,
                reason,
                previous_balance: staged.previous_balance,
                new_balance: staged.new_balance,
                item,
                swap,
                admin,
                description,
                created_at: self.now,
            };
            debug!(
                entry = entry.id,
                user,
                delta,
                reason = %reason,
                previous = entry.previous_balance,
                new = entry.new_balance,
                "ledger entry appended"
            );
            store.ledger.append(entry.clone());
            entries.push(entry);
        }

        Ok(CommitReceipt {
            users: self.users.apply(&store.users, self.now),
            items: self.items.apply(&store.items, self.now),
            swaps: self.swaps.apply(&store.swaps, self.now),
            entries,
        })
    }
}

/// Records written by a committed unit of work
#[derive(Debug, Clone, Default)]
pub struct CommitReceipt {
    pub users: Vec<User>,
    pub items: Vec<Item>,
    pub swaps: Vec<Swap>,
    pub entries: Vec<LedgerEntry>,
}

impl CommitReceipt {
    pub fn user(&self, id: UserId) -> Result<User, ExchangeError> {
        find_written(&self.users, id)
    }

    pub fn item(&self, id: ItemId) -> Result<Item, ExchangeError> {
        find_written(&self.items, id)
    }

    pub fn swap(&self, id: SwapId) -> Result<Swap, ExchangeError> {
        find_written(&self.swaps, id)
    }

    /// The single ledger row written by the commit
    pub fn entry(&self) -> Result<LedgerEntry, ExchangeError> {
        match self.entries.as_slice() {
            [entry] => Ok(entry.clone()),
            entries => Err(ExchangeError::storage(format!(
                "expected one ledger entry in commit, found {}",
                entries.len()
            ))),
        }
    }
}

fn find_written<R: Record>(written: &[R], id: u32) -> Result<R, ExchangeError> {
    written
        .iter()
        .find(|record| record.id() == id)
        .cloned()
        .ok_or_else(|| ExchangeError::storage(format!("{} {} was not written by the commit", R::ENTITY, id)))
}
