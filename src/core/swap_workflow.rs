//! Swap Workflow
//!
//! A swap moves through `pending → accepted → completed`, or
//! `pending → rejected`. Each transition runs as one unit of work: the swap
//! status, both items and any ledger rows commit together or not at all,
//! and the version check at commit turns a second concurrent transition of
//! the same swap into a conflict instead of a double-accept.
//!
//! Points for a points-type swap move exactly once, when the owner accepts:
//! the requester is debited and the request-item owner credited, both with
//! reason `swap`. Completion only settles item and swap status.

use crate::core::engine::{check_text_len, require_active, require_member, ExchangeEngine};
use crate::core::redemption::{check_point_purchase, signed, spend_points_for_item};
use crate::core::store::UnitOfWork;
use crate::types::{
    Actor, Entity, ExchangeError, ItemId, ItemStatus, LedgerReason, NewLedgerEntry, Page, Swap,
    SwapId, SwapRequest, SwapStatus, SwapTerms, SwapType, UserId,
};
use tracing::info;

/// Longest accepted swap note
pub const MAX_NOTES_LEN: usize = 500;

/// Fail with `InvalidState` unless `swap` may move to `next`
fn ensure_transition(swap: &Swap, next: SwapStatus, operation: &str) -> Result<(), ExchangeError> {
    if swap.status.can_transition_to(next) {
        return Ok(());
    }
    let expected = match next {
        SwapStatus::Completed => "accepted",
        _ => "pending",
    };
    Err(ExchangeError::invalid_state(
        Entity::Swap,
        swap.id,
        swap.status,
        expected,
        operation,
    ))
}

/// Fail with `InvalidState` unless the item is open to requests
fn ensure_available(
    uow: &mut UnitOfWork<'_>,
    item_id: ItemId,
    operation: &str,
) -> Result<(), ExchangeError> {
    let item = uow.item(item_id)?;
    if item.status.is_available() {
        Ok(())
    } else {
        Err(ExchangeError::invalid_state(
            Entity::Item,
            item_id,
            item.status,
            "listed",
            operation,
        ))
    }
}

impl ExchangeEngine {
    /// Propose a swap for another user's item
    ///
    /// Creates a `pending` swap. No item changes status and no points move
    /// until the owner accepts; the balance check here is advisory and is
    /// repeated at accept time.
    ///
    /// # Errors
    ///
    /// - `NotFound` if an item or the requester does not exist
    /// - `InvalidState` if an involved item is not listed
    /// - `Forbidden` if the requester owns the requested item or does not own
    ///   the offered one
    /// - `InvalidArgument` if the offered item or points do not fit the swap type
    /// - `InsufficientFunds` if the requester cannot cover the point cost
    pub fn request_swap(&self, actor: &Actor, request: SwapRequest) -> Result<Swap, ExchangeError> {
        let requester = require_member(actor, "request swaps")?;
        if let Some(notes) = &request.notes {
            check_text_len("notes", notes, 0, MAX_NOTES_LEN)?;
        }
        let request_item = request.request_item;

        let (id, receipt) = self.store.transact("request_swap", |uow| {
            require_active(uow, requester, "request swaps")?;
            ensure_available(uow, request_item, "request")?;
            let owner = uow.item(request_item)?.uploader;
            if owner == requester {
                return Err(ExchangeError::forbidden(
                    requester,
                    format!("request their own item {request_item}"),
                ));
            }

            let terms = match request.swap_type {
                SwapType::Swap => {
                    if request.points_used.is_some() {
                        return Err(ExchangeError::invalid_argument(
                            "points_used",
                            "not allowed for item swaps",
                        ));
                    }
                    let offered_item = request.offered_item.ok_or_else(|| {
                        ExchangeError::invalid_argument("offered_item", "required for item swaps")
                    })?;
                    ensure_available(uow, offered_item, "offer")?;
                    if uow.item(offered_item)?.uploader != requester {
                        return Err(ExchangeError::forbidden(
                            requester,
                            format!("offer item {offered_item}, which they do not own"),
                        ));
                    }
                    SwapTerms::ItemForItem {
                        offered_item,
                        offered_item_owner: requester,
                    }
                }
                SwapType::Points => {
                    if request.offered_item.is_some() {
                        return Err(ExchangeError::invalid_argument(
                            "offered_item",
                            "not allowed for points swaps",
                        ));
                    }
                    let points_used = check_point_purchase(
                        uow,
                        requester,
                        request_item,
                        request.points_used,
                        "request",
                    )?;
                    SwapTerms::Points { points_used }
                }
            };

            let now = uow.now();
            Ok(uow.insert_swap(|id| Swap {
                id,
                requester,
                request_item,
                request_item_owner: owner,
                terms,
                status: SwapStatus::Pending,
                notes: request.notes.clone(),
                created_at: now,
                updated_at: now,
                completed_at: None,
                version: 0,
            }))
        })?;

        info!(swap = id, requester, item = request_item, swap_type = %request.swap_type, "swap requested");
        receipt.swap(id)
    }

    /// Accept a pending swap
    ///
    /// Only the counterparty may accept: the owner of the requested item.
    /// The requester's balance and both items' availability are checked
    /// again; if either check fails the swap stays `pending`. On success
    /// both items become `reserved`, a points swap transfers `points_used`
    /// from the requester to the owner, and the swap becomes `accepted`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the swap or an involved item no longer exists
    /// - `InvalidState` if the swap is not pending or an item is no longer listed
    /// - `Forbidden` if the caller is not the requested item's owner
    /// - `InsufficientFunds` if the requester can no longer cover the cost
    /// - `Conflict` if a concurrent transition kept winning the commit
    pub fn accept_swap(&self, actor: &Actor, swap_id: SwapId) -> Result<Swap, ExchangeError> {
        let user = require_member(actor, "accept swaps")?;

        let (swap, receipt) = self.store.transact("accept_swap", |uow| {
            require_active(uow, user, "accept swaps")?;
            let swap = uow.swap(swap_id)?.clone();
            ensure_transition(&swap, SwapStatus::Accepted, "accept")?;
            if !swap.is_owner(user) || user == swap.requester {
                return Err(ExchangeError::forbidden(user, format!("accept swap {swap_id}")));
            }

            for item_id in swap.items() {
                ensure_available(uow, item_id, "accept")?;
            }

            if let SwapTerms::Points { points_used } = swap.terms {
                let cost = check_point_purchase(
                    uow,
                    swap.requester,
                    swap.request_item,
                    Some(points_used),
                    "accept",
                )?;
                spend_points_for_item(
                    uow,
                    swap.requester,
                    swap.request_item,
                    cost,
                    LedgerReason::Swap,
                    Some(swap.id),
                )?;
                uow.post(
                    NewLedgerEntry::new(swap.request_item_owner, signed(cost)?, LedgerReason::Swap)
                        .with_item(swap.request_item)
                        .with_swap(swap.id),
                )?;
            }

            for item_id in swap.items() {
                uow.item_mut(item_id)?.status = ItemStatus::Reserved;
            }
            uow.swap_mut(swap_id)?.status = SwapStatus::Accepted;
            Ok(swap)
        })?;

        info!(
            swap = swap_id,
            by = user,
            requester = swap.requester,
            points = ?swap.points_used(),
            "swap accepted"
        );
        receipt.swap(swap_id)
    }

    /// Reject a pending swap
    ///
    /// Either item owner may reject; for an item swap that includes the
    /// requester withdrawing. Involved items that are still available revert
    /// to `listed`; items already held by another swap, exchanged or removed
    /// are left alone. No points move.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the swap does not exist
    /// - `InvalidState` if the swap is not pending
    /// - `Forbidden` if the caller owns neither item
    pub fn reject_swap(&self, actor: &Actor, swap_id: SwapId) -> Result<Swap, ExchangeError> {
        let user = require_member(actor, "reject swaps")?;

        self.store.transact("reject_swap", |uow| {
            require_active(uow, user, "reject swaps")?;
            let swap = uow.swap(swap_id)?.clone();
            ensure_transition(&swap, SwapStatus::Rejected, "reject")?;
            if !swap.is_owner(user) {
                return Err(ExchangeError::forbidden(user, format!("reject swap {swap_id}")));
            }

            for item_id in swap.items() {
                let available = match uow.item(item_id) {
                    Ok(item) => item.status.is_available(),
                    Err(ExchangeError::NotFound { .. }) => false,
                    Err(error) => return Err(error),
                };
                if available {
                    uow.item_mut(item_id)?.status = ItemStatus::Listed;
                }
            }
            uow.swap_mut(swap_id)?.status = SwapStatus::Rejected;
            Ok(())
        })
        .and_then(|(_, receipt)| {
            info!(swap = swap_id, by = user, "swap rejected");
            receipt.swap(swap_id)
        })
    }

    /// Complete an accepted swap
    ///
    /// The requester or either owner may complete. Both items become
    /// `swapped` and `completed_at` is stamped. No points move: a points swap
    /// was settled at accept.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the swap does not exist
    /// - `InvalidState` if the swap is not accepted
    /// - `Forbidden` if the caller is not a participant
    pub fn complete_swap(&self, actor: &Actor, swap_id: SwapId) -> Result<Swap, ExchangeError> {
        let user = require_member(actor, "complete swaps")?;

        let (_, receipt) = self.store.transact("complete_swap", |uow| {
            require_active(uow, user, "complete swaps")?;
            let swap = uow.swap(swap_id)?.clone();
            ensure_transition(&swap, SwapStatus::Completed, "complete")?;
            if !swap.is_participant(user) {
                return Err(ExchangeError::forbidden(user, format!("complete swap {swap_id}")));
            }

            for item_id in swap.items() {
                uow.item_mut(item_id)?.status = ItemStatus::Swapped;
            }
            let now = uow.now();
            let swap = uow.swap_mut(swap_id)?;
            swap.status = SwapStatus::Completed;
            swap.completed_at = Some(now);
            Ok(())
        })?;

        info!(swap = swap_id, by = user, "swap completed");
        receipt.swap(swap_id)
    }

    pub fn swap(&self, id: SwapId) -> Result<Swap, ExchangeError> {
        self.store
            .swaps
            .get(id)
            .ok_or_else(|| ExchangeError::not_found(Entity::Swap, id))
    }

    /// Every swap, oldest first
    pub fn swaps(&self) -> Vec<Swap> {
        self.store.swaps.values()
    }

    /// Swaps the user requested or owns an item in, newest first
    pub fn swaps_for_user(&self, user: UserId, status: Option<SwapStatus>, page: Page) -> Vec<Swap> {
        let mut swaps = self.store.swaps.filter(|swap| {
            swap.is_participant(user) && status.map_or(true, |status| swap.status == status)
        });
        swaps.reverse();
        page.apply(swaps)
    }

    /// Every pending swap, oldest first
    pub fn pending_swaps(&self) -> Vec<Swap> {
        self.store
            .swaps
            .filter(|swap| swap.status == SwapStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testkit::{market, Market, ADMIN, ALICE, BOB, CAROL};
    use crate::core::ExchangeConfig;
    use crate::types::{ErrorKind, Points};
    use rstest::rstest;
    use std::sync::{Arc, Barrier};

    /// Bob requests Alice's 40-point item with a balance of 100
    fn points_swap(market: &Market) -> (ItemId, Swap) {
        market.seed_points(BOB, 100);
        let item = market.listed_points_item(ALICE, 40);
        let swap = market
            .request_swap(&Actor::member(BOB), SwapRequest::for_points(item, 40))
            .unwrap();
        (item, swap)
    }

    /// Bob offers his item for Alice's
    fn item_swap(market: &Market) -> (ItemId, ItemId, Swap) {
        let wanted = market.listed_item(ALICE);
        let offered = market.listed_item(BOB);
        let swap = market
            .request_swap(
                &Actor::member(BOB),
                SwapRequest::item_for_item(wanted, offered).with_notes("fair trade?"),
            )
            .unwrap();
        (wanted, offered, swap)
    }

    fn assert_terms_match_type(swap: &Swap) {
        match swap.swap_type() {
            SwapType::Swap => {
                assert!(swap.offered_item().is_some());
                assert!(swap.points_used().is_none());
            }
            SwapType::Points => {
                assert!(swap.offered_item().is_none());
                assert!(swap.points_used().is_some());
            }
        }
    }

    #[rstest]
    fn test_request_creates_pending_swap(market: Market) {
        let (wanted, offered, swap) = item_swap(&market);

        assert_eq!(swap.status, SwapStatus::Pending);
        assert_eq!(swap.requester, BOB);
        assert_eq!(swap.request_item_owner, ALICE);
        assert_eq!(swap.offered_item_owner(), Some(BOB));
        assert_eq!(swap.notes.as_deref(), Some("fair trade?"));
        assert_terms_match_type(&swap);

        // Requests touch neither items nor points.
        assert_eq!(market.item(wanted).unwrap().status, ItemStatus::Approved);
        assert_eq!(market.item(offered).unwrap().status, ItemStatus::Approved);
        assert!(market.ledger_entries().is_empty());
    }

    #[rstest]
    fn test_deactivated_members_cannot_trade(market: Market) {
        let (item, swap) = points_swap(&market);
        market
            .update_user(&Actor::SystemAdmin, ALICE, None, Some(false))
            .unwrap();

        let err = market.accept_swap(&Actor::member(ALICE), swap.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(market.swap(swap.id).unwrap().status, SwapStatus::Pending);
        assert_eq!(market.points(BOB), 100);

        market
            .update_user(&Actor::SystemAdmin, ALICE, None, Some(true))
            .unwrap();
        market
            .update_user(&Actor::SystemAdmin, BOB, None, Some(false))
            .unwrap();
        let err = market
            .request_swap(&Actor::member(BOB), SwapRequest::for_points(item, 40))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let err = market.reject_swap(&Actor::member(BOB), swap.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(market.swap(swap.id).unwrap().status, SwapStatus::Pending);
    }

    #[rstest]
    fn test_request_own_item_forbidden(market: Market) {
        let item = market.listed_item(ALICE);
        let other = market.listed_item(ALICE);
        let err = market
            .request_swap(&Actor::member(ALICE), SwapRequest::item_for_item(item, other))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[rstest]
    fn test_request_offering_foreign_item_forbidden(market: Market) {
        let wanted = market.listed_item(ALICE);
        let carols = market.listed_item(CAROL);
        let err = market
            .request_swap(&Actor::member(BOB), SwapRequest::item_for_item(wanted, carols))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[rstest]
    fn test_request_unlisted_item(market: Market) {
        let pending = market.pending_item(ALICE);
        let offered = market.listed_item(BOB);
        let err = market
            .request_swap(&Actor::member(BOB), SwapRequest::item_for_item(pending, offered))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err = market
            .request_swap(&Actor::member(BOB), SwapRequest::item_for_item(99, offered))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[rstest]
    #[case::swap_without_offer(SwapType::Swap, None, None)]
    #[case::swap_with_points(SwapType::Swap, Some(2), Some(40))]
    #[case::points_with_offer(SwapType::Points, Some(2), Some(40))]
    #[case::points_without_points(SwapType::Points, None, None)]
    #[case::points_zero(SwapType::Points, None, Some(0))]
    #[case::points_mismatch(SwapType::Points, None, Some(30))]
    fn test_request_shape_mismatch(
        market: Market,
        #[case] swap_type: SwapType,
        #[case] offered_item: Option<ItemId>,
        #[case] points_used: Option<Points>,
    ) {
        market.seed_points(BOB, 100);
        let wanted = market.listed_points_item(ALICE, 40);
        let offered = market.listed_item(BOB);
        assert_eq!(offered, 2);

        let err = market
            .request_swap(
                &Actor::member(BOB),
                SwapRequest {
                    request_item: wanted,
                    offered_item,
                    swap_type,
                    points_used,
                    notes: None,
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(market.pending_swaps().is_empty());
    }

    #[rstest]
    fn test_request_points_for_swap_item(market: Market) {
        market.seed_points(BOB, 100);
        let wanted = market.listed_item(ALICE);
        let err = market
            .request_swap(&Actor::member(BOB), SwapRequest::for_points(wanted, 40))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[rstest]
    fn test_request_points_insufficient_balance(market: Market) {
        market.seed_points(BOB, 10);
        let wanted = market.listed_points_item(ALICE, 40);
        let err = market
            .request_swap(&Actor::member(BOB), SwapRequest::for_points(wanted, 40))
            .unwrap_err();
        assert_eq!(
            err,
            ExchangeError::insufficient_funds(BOB, 10, 40)
        );
    }

    #[rstest]
    fn test_request_notes_limit(market: Market) {
        let (wanted, offered) = (market.listed_item(ALICE), market.listed_item(BOB));
        let err = market
            .request_swap(
                &Actor::member(BOB),
                SwapRequest::item_for_item(wanted, offered).with_notes("n".repeat(501)),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[rstest]
    fn test_accept_points_swap_transfers_once(market: Market) {
        let (item, swap) = points_swap(&market);

        let accepted = market.accept_swap(&Actor::member(ALICE), swap.id).unwrap();

        assert_eq!(accepted.status, SwapStatus::Accepted);
        assert_terms_match_type(&accepted);
        assert_eq!(market.points(BOB), 60);
        assert_eq!(market.points(ALICE), 40);
        assert_eq!(market.item(item).unwrap().status, ItemStatus::Reserved);

        let entries = market.entries_for_swap(swap.id);
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.reason == LedgerReason::Swap));
        assert_eq!((entries[0].user, entries[0].delta), (BOB, -40));
        assert_eq!((entries[1].user, entries[1].delta), (ALICE, 40));

        // Completion settles status only.
        let completed = market.complete_swap(&Actor::member(BOB), swap.id).unwrap();
        assert_eq!(completed.status, SwapStatus::Completed);
        assert!(completed.completed_at.is_some());
        assert_eq!(market.item(item).unwrap().status, ItemStatus::Swapped);
        assert_eq!(market.points(BOB), 60);
        assert_eq!(market.entries_for_swap(swap.id).len(), 2);
        assert!(market.verify_balances().is_empty());
    }

    #[rstest]
    fn test_accept_item_swap_reserves_both(market: Market) {
        let (wanted, offered, swap) = item_swap(&market);

        market.accept_swap(&Actor::member(ALICE), swap.id).unwrap();

        assert_eq!(market.item(wanted).unwrap().status, ItemStatus::Reserved);
        assert_eq!(market.item(offered).unwrap().status, ItemStatus::Reserved);
        assert!(market.ledger_entries().is_empty());
        assert!(market.available_items(None).is_empty());

        market.complete_swap(&Actor::member(ALICE), swap.id).unwrap();
        assert_eq!(market.item(wanted).unwrap().status, ItemStatus::Swapped);
        assert_eq!(market.item(offered).unwrap().status, ItemStatus::Swapped);
    }

    #[rstest]
    #[case::requester(BOB)]
    #[case::outsider(CAROL)]
    #[case::admin_user(ADMIN)]
    fn test_accept_by_non_counterparty_forbidden(market: Market, #[case] caller: UserId) {
        let (_, _, swap) = item_swap(&market);
        let err = market.accept_swap(&Actor::member(caller), swap.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(market.swap(swap.id).unwrap().status, SwapStatus::Pending);
    }

    #[rstest]
    fn test_accept_with_drained_balance_leaves_swap_pending(market: Market) {
        let (item, swap) = points_swap(&market);
        market
            .adjust_points(&Actor::SystemAdmin, BOB, -70, None)
            .unwrap();

        let err = market.accept_swap(&Actor::member(ALICE), swap.id).unwrap_err();

        assert_eq!(err, ExchangeError::insufficient_funds(BOB, 30, 40));
        assert_eq!(market.swap(swap.id).unwrap().status, SwapStatus::Pending);
        assert_eq!(market.item(item).unwrap().status, ItemStatus::Approved);
        assert!(market.entries_for_swap(swap.id).is_empty());
        assert_eq!(market.points(BOB), 30);
        assert_eq!(market.points(ALICE), 0);
    }

    #[rstest]
    fn test_accept_when_item_taken_by_other_swap(market: Market) {
        let wanted = market.listed_item(ALICE);
        let bobs = market.listed_item(BOB);
        let carols = market.listed_item(CAROL);
        let first = market
            .request_swap(&Actor::member(BOB), SwapRequest::item_for_item(wanted, bobs))
            .unwrap();
        let second = market
            .request_swap(&Actor::member(CAROL), SwapRequest::item_for_item(wanted, carols))
            .unwrap();

        market.accept_swap(&Actor::member(ALICE), first.id).unwrap();
        let err = market.accept_swap(&Actor::member(ALICE), second.id).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(market.item(carols).unwrap().status, ItemStatus::Approved);

        // Rejecting the stale request leaves the reserved item alone.
        market.reject_swap(&Actor::member(ALICE), second.id).unwrap();
        assert_eq!(market.item(wanted).unwrap().status, ItemStatus::Reserved);
        assert_eq!(market.item(carols).unwrap().status, ItemStatus::Listed);
    }

    #[rstest]
    fn test_reject_points_swap_moves_nothing(market: Market) {
        let (item, swap) = points_swap(&market);

        let rejected = market.reject_swap(&Actor::member(ALICE), swap.id).unwrap();

        assert_eq!(rejected.status, SwapStatus::Rejected);
        assert_eq!(market.item(item).unwrap().status, ItemStatus::Listed);
        assert!(market.entries_for_swap(swap.id).is_empty());
        assert_eq!(market.points(BOB), 100);
    }

    #[rstest]
    fn test_reject_item_swap_relists_both(market: Market) {
        let (wanted, offered, swap) = item_swap(&market);

        market.reject_swap(&Actor::member(BOB), swap.id).unwrap();

        assert_eq!(market.item(wanted).unwrap().status, ItemStatus::Listed);
        assert_eq!(market.item(offered).unwrap().status, ItemStatus::Listed);
        assert!(market.entries_for_swap(swap.id).is_empty());

        let err = market.reject_swap(&Actor::member(CAROL), swap.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[rstest]
    fn test_reject_by_outsider_forbidden(market: Market) {
        let (_, _, swap) = item_swap(&market);
        let err = market.reject_swap(&Actor::member(CAROL), swap.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[rstest]
    fn test_reject_after_item_removed(market: Market) {
        let (wanted, offered, swap) = item_swap(&market);
        market.remove_item(&Actor::SystemAdmin, offered).unwrap();

        market.reject_swap(&Actor::member(ALICE), swap.id).unwrap();
        assert_eq!(market.item(wanted).unwrap().status, ItemStatus::Listed);
    }

    #[rstest]
    fn test_complete_by_outsider_forbidden(market: Market) {
        let (_, swap) = points_swap(&market);
        market.accept_swap(&Actor::member(ALICE), swap.id).unwrap();
        let err = market.complete_swap(&Actor::member(CAROL), swap.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    /// Drive a fresh swap into `status`
    fn swap_in(market: &Market, status: SwapStatus) -> SwapId {
        let (_, _, swap) = item_swap(market);
        let owner = Actor::member(ALICE);
        match status {
            SwapStatus::Pending => {}
            SwapStatus::Accepted => {
                market.accept_swap(&owner, swap.id).unwrap();
            }
            SwapStatus::Rejected => {
                market.reject_swap(&owner, swap.id).unwrap();
            }
            SwapStatus::Completed => {
                market.accept_swap(&owner, swap.id).unwrap();
                market.complete_swap(&owner, swap.id).unwrap();
            }
        }
        swap.id
    }

    #[rstest]
    fn test_state_machine_rejects_illegal_transitions(market: Market) {
        let owner = Actor::member(ALICE);
        for from in SwapStatus::ALL.iter().copied() {
            for to in [SwapStatus::Accepted, SwapStatus::Rejected, SwapStatus::Completed] {
                let id = swap_in(&market, from);
                let result = match to {
                    SwapStatus::Accepted => market.accept_swap(&owner, id),
                    SwapStatus::Rejected => market.reject_swap(&owner, id),
                    _ => market.complete_swap(&owner, id),
                };

                if from.can_transition_to(to) {
                    assert_eq!(result.unwrap().status, to, "{from} -> {to}");
                } else {
                    let err = result.unwrap_err();
                    assert_eq!(err.kind(), ErrorKind::InvalidState, "{from} -> {to}: {err}");
                    assert_eq!(market.swap(id).unwrap().status, from);
                }
            }
        }
    }

    #[rstest]
    fn test_swap_queries(market: Market) {
        let (_, _, first) = item_swap(&market);
        let (_, second) = points_swap(&market);
        market.accept_swap(&Actor::member(ALICE), second.id).unwrap();

        let ids = |swaps: Vec<Swap>| swaps.iter().map(|s| s.id).collect::<Vec<_>>();

        assert_eq!(ids(market.swaps_for_user(ALICE, None, Page::default())), vec![second.id, first.id]);
        assert_eq!(
            ids(market.swaps_for_user(BOB, Some(SwapStatus::Pending), Page::default())),
            vec![first.id]
        );
        assert_eq!(
            ids(market.swaps_for_user(ALICE, None, Page::new(2, 1).unwrap())),
            vec![first.id]
        );
        assert!(market.swaps_for_user(CAROL, None, Page::default()).is_empty());
        assert_eq!(ids(market.pending_swaps()), vec![first.id]);
    }

    #[test]
    fn test_concurrent_accepts_settle_once() {
        let market = Market::new(ExchangeEngine::new(ExchangeConfig::new(0)));
        let (item, swap) = points_swap(&market);
        let engine = market.engine.clone();

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let engine = engine.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    engine.accept_swap(&Actor::member(ALICE), swap.id)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let accepted = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(accepted, 1);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(
                matches!(err.kind(), ErrorKind::InvalidState | ErrorKind::InternalFailure),
                "unexpected error: {err}"
            );
        }

        assert_eq!(market.entries_for_swap(swap.id).len(), 2);
        assert_eq!(market.points(BOB), 60);
        assert_eq!(market.points(ALICE), 40);
        assert_eq!(market.item(item).unwrap().status, ItemStatus::Reserved);
        assert!(market.verify_balances().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_and_redemption_keep_ledger_consistent() {
        let market = Market::new(ExchangeEngine::new(ExchangeConfig::new(0)));
        market.seed_points(BOB, 100);
        market.seed_points(CAROL, 100);
        let item = market.listed_points_item(ALICE, 40);

        let bob = {
            let engine = market.engine.clone();
            tokio::spawn(async move { engine.redeem_item(&Actor::member(BOB), item, 40) })
        };
        let carol = {
            let engine = market.engine.clone();
            tokio::spawn(async move { engine.redeem_item(&Actor::member(CAROL), item, 40) })
        };

        let outcomes = [bob.await.unwrap(), carol.await.unwrap()];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);

        assert_eq!(market.points(BOB) + market.points(CAROL), 160);
        assert_eq!(market.entries_for_item(item).len(), 1);
        assert!(market.ledger_entries().iter().all(|e| e.is_consistent()));
        assert!(market.verify_balances().is_empty());
    }
}
