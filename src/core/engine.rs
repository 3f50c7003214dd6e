//! Exchange engine
//!
//! This module provides the `ExchangeEngine`, the entry point every caller
//! goes through. It owns the shared store and configuration; the swap
//! workflow, redemption, moderation and catalog operations are implemented
//! on it in their own modules.
//!
//! This module holds the Ledger Store operations (entry creation, balance
//! reads, stats, reconciliation), user registration, the admin overview and
//! the command router used by the replay strategies.

use crate::core::config::ExchangeConfig;
use crate::core::store::{ExchangeStore, UnitOfWork};
use crate::core::traits::Clock;
use crate::types::{
    Actor, Command, CommandActor, CommandRecord, Entity, ExchangeError, Item, ItemId, ItemStatus,
    LedgerEntry, LedgerReason, NewLedgerEntry, Page, Points, Role, SwapId, SwapStatus,
    SystemStats, User, UserId, UserStats,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Shortest accepted user name
pub const MIN_NAME_LEN: usize = 2;

/// Longest accepted user name
pub const MAX_NAME_LEN: usize = 50;

/// Rows in the points leaderboard report
pub const DEFAULT_LEADERBOARD_SIZE: usize = 10;

/// Cached balance next to the ledger aggregates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointsSummary {
    pub user: UserId,
    /// `points` on the user record
    pub points: Points,
    /// Balance according to the ledger
    pub ledger_balance: Points,
    pub stats: UserStats,
}

/// A user whose cached balance disagrees with the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceMismatch {
    pub user: UserId,
    pub cached: Points,
    pub ledger: Points,
}

/// Marketplace-wide counts for administrators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminOverview {
    pub users: usize,
    pub items: usize,
    pub pending_items: usize,
    pub swaps: usize,
    pub pending_swaps: usize,
    pub ledger: SystemStats,
}

/// Marketplace core
///
/// Cloning is cheap: clones share the same store, so an engine can be
/// handed to several tasks.
#[derive(Debug, Clone)]
pub struct ExchangeEngine {
    pub(crate) store: Arc<ExchangeStore>,
    pub(crate) config: ExchangeConfig,
}

impl ExchangeEngine {
    /// Create an engine with an empty store and the wall clock
    pub fn new(config: ExchangeConfig) -> Self {
        Self {
            store: Arc::new(ExchangeStore::new()),
            config,
        }
    }

    /// Create an engine whose timestamps come from `clock`
    pub fn with_clock(config: ExchangeConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(ExchangeStore::with_clock(clock)),
            config,
        }
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// Direct access to the underlying tables
    pub fn store(&self) -> &ExchangeStore {
        &self.store
    }

    /// Apply one replayed command
    ///
    /// `register` is accepted from any actor; every other command resolves
    /// its actor against the registered user record first.
    ///
    /// # Errors
    ///
    /// Returns whatever the routed operation returns, or `NotFound` when the
    /// acting user is not registered.
    pub fn process(&self, record: CommandRecord) -> Result<(), ExchangeError> {
        let CommandRecord { actor, command } = record;
        debug!(op = command.name(), ?actor, "processing command");

        match command {
            Command::Register { user, name, role } => {
                self.register_user(user, &name, role).map(drop)
            }
            command => {
                let actor = self.resolve_actor(actor)?;
                self.apply(&actor, command)
            }
        }
    }

    /// Apply one command on behalf of an already resolved actor
    pub fn apply(&self, actor: &Actor, command: Command) -> Result<(), ExchangeError> {
        match command {
            Command::Register { user, name, role } => {
                self.register_user(user, &name, role).map(drop)
            }
            Command::List(item) => self.submit_item(actor, item).map(drop),
            Command::Moderate {
                item,
                decision,
                reason,
            } => self.approve_item(actor, item, decision, reason).map(drop),
            Command::Request(request) => self.request_swap(actor, request).map(drop),
            Command::Accept { swap } => self.accept_swap(actor, swap).map(drop),
            Command::Reject { swap } => self.reject_swap(actor, swap).map(drop),
            Command::Complete { swap } => self.complete_swap(actor, swap).map(drop),
            Command::Redeem { item, points } => self.redeem_item(actor, item, points).map(drop),
            Command::Adjust {
                user,
                delta,
                description,
            } => self.adjust_points(actor, user, delta, description).map(drop),
            Command::View { item } => self.view_item(item).map(drop),
            Command::Like { item } => self.toggle_like(actor, item).map(drop),
            Command::Update { item, changes } => self.update_item(actor, item, changes).map(drop),
            Command::Remove { item } => self.remove_item(actor, item).map(drop),
            Command::UpdateUser { user, role, active } => {
                self.update_user(actor, user, role, active).map(drop)
            }
        }
    }

    /// Turn a replay identity into an actor, reading the role from the user record
    ///
    /// # Errors
    ///
    /// - `NotFound` if the user is not registered
    /// - `Forbidden` if the account is deactivated
    pub fn resolve_actor(&self, actor: CommandActor) -> Result<Actor, ExchangeError> {
        match actor {
            CommandActor::System => Ok(Actor::SystemAdmin),
            CommandActor::User(id) => {
                let user = self.user(id)?;
                if !user.active {
                    return Err(ExchangeError::forbidden(id, "act while deactivated"));
                }
                Ok(Actor::User { id, role: user.role })
            }
        }
    }

    // Users

    /// Register a user with a zero balance
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the id is taken or the name is out of bounds
    pub fn register_user(&self, id: UserId, name: &str, role: Role) -> Result<User, ExchangeError> {
        let name = name.trim();
        check_text_len("name", name, MIN_NAME_LEN, MAX_NAME_LEN)?;

        let (_, receipt) = self.store.transact("register", |uow| {
            let user = User::new(id, name, role, uow.now());
            uow.insert_user(user)
        })?;

        info!(user = id, %role, "user registered");
        receipt.user(id)
    }

    pub fn user(&self, id: UserId) -> Result<User, ExchangeError> {
        self.store
            .users
            .get(id)
            .ok_or_else(|| ExchangeError::not_found(Entity::User, id))
    }

    /// Every user, sorted by id
    pub fn users(&self) -> Vec<User> {
        self.store.users.values()
    }

    /// Admin change of a user's role or active flag
    ///
    /// A deactivated user keeps their balance and listings but is refused by
    /// every operation a member performs.
    ///
    /// # Errors
    ///
    /// - `Forbidden` if the actor is not an admin
    /// - `InvalidArgument` if neither `role` nor `active` is given
    /// - `NotFound` if the user does not exist
    pub fn update_user(
        &self,
        actor: &Actor,
        id: UserId,
        role: Option<Role>,
        active: Option<bool>,
    ) -> Result<User, ExchangeError> {
        require_admin(actor, || format!("update user {id}"))?;
        if role.is_none() && active.is_none() {
            return Err(ExchangeError::invalid_argument("user", "nothing to update"));
        }

        let (_, receipt) = self.store.transact("update_user", |uow| {
            let user = uow.user_mut(id)?;
            if let Some(role) = role {
                user.role = role;
            }
            if let Some(active) = active {
                user.active = active;
            }
            Ok(())
        })?;

        info!(user = id, ?role, ?active, admin = ?actor.user_id(), "user updated");
        receipt.user(id)
    }

    /// Points leaderboard: active users by cached balance, highest first
    ///
    /// Ties are broken by user id.
    pub fn top_users(&self, limit: usize) -> Vec<User> {
        let mut users = self.store.users.filter(|user| user.active);
        users.sort_by(|a, b| b.points.cmp(&a.points).then(a.id.cmp(&b.id)));
        users.truncate(limit);
        users
    }

    // Ledger

    /// Append one ledger row and update the user's cached balance with it
    ///
    /// The new balance is `max(0, previous + delta)`: an overspend floors
    /// the balance at zero instead of failing, and the entry records the
    /// clamped result.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `delta` is zero or the description is too long
    /// - `NotFound` if the user does not exist; no entry is written
    /// - `ArithmeticOverflow` if a credit would exceed the representable balance
    pub fn create_entry(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, ExchangeError> {
        let (_, receipt) = self
            .store
            .transact("create_entry", |uow| uow.post(entry.clone()))?;
        receipt.entry()
    }

    /// Balance according to the ledger: the latest entry's `new_balance`, or 0
    pub fn get_user_balance(&self, user: UserId) -> Points {
        self.store.ledger.balance(user)
    }

    pub fn user_stats(&self, user: UserId) -> UserStats {
        self.store.ledger.user_stats(user)
    }

    pub fn system_stats(&self) -> SystemStats {
        self.store.ledger.system_stats()
    }

    /// A user's ledger, newest first
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the user does not exist.
    pub fn points_history(&self, user: UserId, page: Page) -> Result<Vec<LedgerEntry>, ExchangeError> {
        self.user(user)?;
        Ok(page.apply(self.store.ledger.history(user)))
    }

    pub fn entries_for_swap(&self, swap: SwapId) -> Vec<LedgerEntry> {
        self.store.ledger.entries_for_swap(swap)
    }

    pub fn entries_for_item(&self, item: ItemId) -> Vec<LedgerEntry> {
        self.store.ledger.entries_for_item(item)
    }

    /// Every ledger entry in commit order
    pub fn ledger_entries(&self) -> Vec<LedgerEntry> {
        self.store.ledger.entries()
    }

    /// Cached balance together with ledger aggregates
    pub fn points_summary(&self, user: UserId) -> Result<PointsSummary, ExchangeError> {
        let record = self.user(user)?;
        Ok(PointsSummary {
            user,
            points: record.points,
            ledger_balance: self.get_user_balance(user),
            stats: self.user_stats(user),
        })
    }

    /// Admin balance correction
    ///
    /// Posts an `admin_adjustment` entry. `admin_id` on the entry is the
    /// acting admin, or unset for the system admin.
    ///
    /// # Errors
    ///
    /// - `Forbidden` if the actor is not an admin
    /// - anything [`ExchangeEngine::create_entry`] returns
    pub fn adjust_points(
        &self,
        actor: &Actor,
        user: UserId,
        delta: i64,
        description: Option<String>,
    ) -> Result<LedgerEntry, ExchangeError> {
        require_admin(actor, || format!("adjust points of user {user}"))?;

        let entry = self.create_entry(
            NewLedgerEntry::new(user, delta, LedgerReason::AdminAdjustment)
                .with_admin(actor.user_id())
                .with_description(description),
        )?;

        info!(
            user,
            delta,
            admin = ?actor.user_id(),
            new_balance = entry.new_balance,
            "points adjusted"
        );
        Ok(entry)
    }

    /// Users whose cached `points` differ from the ledger
    ///
    /// Reads are not synchronised with writers, so a user committed
    /// mid-scan can be reported spuriously; re-check before repairing.
    pub fn verify_balances(&self) -> Vec<BalanceMismatch> {
        self.store
            .users
            .values()
            .into_iter()
            .filter_map(|user| {
                let ledger = self.store.ledger.balance(user.id);
                (ledger != user.points).then_some(BalanceMismatch {
                    user: user.id,
                    cached: user.points,
                    ledger,
                })
            })
            .collect()
    }

    /// Recompute a user's cached balance from the ledger
    pub fn rebuild_balance(&self, user: UserId) -> Result<Points, ExchangeError> {
        self.store.rebuild_balance(user)
    }

    // Admin

    /// Counts across the marketplace
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` if the actor is not an admin.
    pub fn admin_overview(&self, actor: &Actor) -> Result<AdminOverview, ExchangeError> {
        require_admin(actor, || "view the admin overview".to_string())?;

        Ok(AdminOverview {
            users: self.store.users.len(),
            items: self.store.items.len(),
            pending_items: self
                .store
                .items
                .count(|item: &Item| item.status == ItemStatus::Pending),
            swaps: self.store.swaps.len(),
            pending_swaps: self
                .store
                .swaps
                .count(|swap| swap.status == SwapStatus::Pending),
            ledger: self.system_stats(),
        })
    }
}

impl Default for ExchangeEngine {
    fn default() -> Self {
        Self::new(ExchangeConfig::default())
    }
}

/// Fail with `Forbidden` unless the actor is an admin
pub(crate) fn require_admin<F>(actor: &Actor, operation: F) -> Result<(), ExchangeError>
where
    F: FnOnce() -> String,
{
    match actor {
        Actor::User { id, role } if *role != Role::Admin => {
            Err(ExchangeError::forbidden(*id, operation()))
        }
        _ => Ok(()),
    }
}

/// The acting user's id
///
/// # Errors
///
/// Returns `InvalidArgument` for the system admin, which has no user record
/// to act with.
pub(crate) fn require_member(actor: &Actor, operation: &str) -> Result<UserId, ExchangeError> {
    actor.user_id().ok_or_else(|| {
        ExchangeError::invalid_argument("actor", format!("the system admin cannot {operation}"))
    })
}

/// Load the acting member in `uow`, refusing deactivated accounts
///
/// # Errors
///
/// - `NotFound` if the user is not registered
/// - `Forbidden` if the account is deactivated
pub(crate) fn require_active(
    uow: &mut UnitOfWork<'_>,
    user: UserId,
    operation: &str,
) -> Result<(), ExchangeError> {
    if uow.user(user)?.active {
        Ok(())
    } else {
        Err(ExchangeError::forbidden(
            user,
            format!("{operation} while deactivated"),
        ))
    }
}

/// Check a text field's length in characters
pub(crate) fn check_text_len(
    field: &str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), ExchangeError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ExchangeError::invalid_argument(
            field,
            format!("must be between {min} and {max} characters, got {len}"),
        ));
    }
    Ok(())
}
