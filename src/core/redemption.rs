//! Spending points on an item
//!
//! Two routes acquire an item with points: a points-type swap (debited when
//! the owner accepts) and direct redemption. Both run the same purchase
//! checks and the same debit primitive, so their balance and status rules
//! cannot drift apart.

use crate::core::engine::{require_active, require_member, ExchangeEngine};
use crate::core::store::UnitOfWork;
use crate::types::{
    Actor, Entity, ExchangeError, Item, ItemId, ItemStatus, LedgerReason, NewLedgerEntry, Points,
    SwapId, UserId,
};
use tracing::info;

/// Checks shared by every way of buying an item with points
///
/// # Returns
///
/// The item's point cost.
///
/// # Errors
///
/// - `NotFound` if the item or buyer does not exist
/// - `InvalidState` if the item is not approved or listed
/// - `Forbidden` if the buyer uploaded the item
/// - `InvalidArgument` if the item is not a points item, or `points_used`
///   is missing, zero, or differs from the cost
/// - `InsufficientFunds` if the buyer's balance is below the cost
pub(crate) fn check_point_purchase(
    uow: &mut UnitOfWork<'_>,
    buyer: UserId,
    item_id: ItemId,
    points_used: Option<Points>,
    operation: &str,
) -> Result<Points, ExchangeError> {
    let item = uow.item(item_id)?;
    if !item.status.is_available() {
        return Err(ExchangeError::invalid_state(
            Entity::Item,
            item_id,
            item.status,
            "listed",
            operation,
        ));
    }
    if item.is_owned_by(buyer) {
        return Err(ExchangeError::forbidden(
            buyer,
            format!("{operation} their own item {item_id}"),
        ));
    }
    let cost = item.point_cost().ok_or_else(|| {
        ExchangeError::invalid_argument(
            "type",
            format!("item {item_id} is not available for points"),
        )
    })?;

    let points_used = points_used.filter(|points| *points > 0).ok_or_else(|| {
        ExchangeError::invalid_argument("points_used", "must be a positive integer")
    })?;
    if points_used != cost {
        return Err(ExchangeError::invalid_argument(
            "points_used",
            format!("{points_used} does not match the item's point cost of {cost}"),
        ));
    }

    let balance = uow.user(buyer)?.points;
    if balance < cost {
        return Err(ExchangeError::insufficient_funds(buyer, balance, cost));
    }
    Ok(cost)
}

/// Stage the buyer's debit for an item
pub(crate) fn spend_points_for_item(
    uow: &mut UnitOfWork<'_>,
    buyer: UserId,
    item_id: ItemId,
    cost: Points,
    reason: LedgerReason,
    swap: Option<SwapId>,
) -> Result<(), ExchangeError> {
    let mut debit = NewLedgerEntry::new(buyer, -signed(cost)?, reason).with_item(item_id);
    if let Some(swap) = swap {
        debit = debit.with_swap(swap);
    }
    uow.post(debit)?;
    Ok(())
}

/// A point amount as a ledger delta
pub(crate) fn signed(points: Points) -> Result<i64, ExchangeError> {
    i64::try_from(points).map_err(|_| {
        ExchangeError::invalid_argument("points", format!("{points} exceeds the ledger range"))
    })
}

impl ExchangeEngine {
    /// Buy a listed points item outright, without a swap
    ///
    /// Debits the cost with reason `redeem` and marks the item `redeemed`,
    /// which removes it from the listed-items query.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for the system admin, or any error of
    /// [`check_point_purchase`]. Nothing is written on error.
    pub fn redeem_item(
        &self,
        actor: &Actor,
        item_id: ItemId,
        points_used: Points,
    ) -> Result<Item, ExchangeError> {
        let buyer = require_member(actor, "redeem items")?;

        let (cost, receipt) = self.store.transact("redeem_item", |uow| {
            require_active(uow, buyer, "redeem items")?;
            let cost = check_point_purchase(uow, buyer, item_id, Some(points_used), "redeem")?;
            spend_points_for_item(uow, buyer, item_id, cost, LedgerReason::Redeem, None)?;

            let now = uow.now();
            let item = uow.item_mut(item_id)?;
            item.status = ItemStatus::Redeemed;
            item.redeemed_by = Some(buyer);
            item.redeemed_at = Some(now);
            Ok(cost)
        })?;

        info!(item = item_id, user = buyer, cost, "item redeemed");
        receipt.item(item_id)
    }
}
