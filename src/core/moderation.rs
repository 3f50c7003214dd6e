//! Moderation Gateway
//!
//! Admins approve or reject pending listings. Approval credits the
//! configured upload bonus to the uploader in a separate commit after the
//! status change; a failed bonus is logged and the approval stands.

use crate::core::engine::{check_text_len, require_admin, ExchangeEngine};
use crate::types::{
    Actor, Entity, ExchangeError, Item, ItemId, ItemStatus, LedgerReason, ModerationDecision,
    NewLedgerEntry,
};
use tracing::{error, info};

/// Longest accepted moderation note
pub const MAX_REASON_LEN: usize = 500;

impl ExchangeEngine {
    /// Decide on a pending listing
    ///
    /// # Arguments
    ///
    /// * `actor` - Must be an admin user or the system admin
    /// * `item_id` - The pending item
    /// * `decision` - `Approved` makes the item available, `Rejected` closes it
    /// * `reason` - Optional note stored as the item's admin notes
    ///
    /// # Returns
    ///
    /// The item after the decision. Its `approved_by` is the acting admin's
    /// id, or `None` for the system admin.
    ///
    /// # Errors
    ///
    /// - `Forbidden` if the actor is not an admin
    /// - `NotFound` if the item does not exist
    /// - `InvalidState` if the item is not pending
    /// - `InvalidArgument` if the reason is too long
    pub fn approve_item(
        &self,
        actor: &Actor,
        item_id: ItemId,
        decision: ModerationDecision,
        reason: Option<String>,
    ) -> Result<Item, ExchangeError> {
        require_admin(actor, || format!("moderate item {item_id}"))?;
        if let Some(reason) = &reason {
            check_text_len("reason", reason, 0, MAX_REASON_LEN)?;
        }

        let (uploader, receipt) = self.store.transact("approve_item", |uow| {
            let now = uow.now();
            let item = uow.item_mut(item_id)?;
            if item.status != ItemStatus::Pending {
                return Err(ExchangeError::invalid_state(
                    Entity::Item,
                    item_id,
                    item.status,
                    "pending",
                    "moderate",
                ));
            }
            item.status = decision.status();
            item.admin_notes = reason.clone();
            item.approved_by = actor.user_id();
            item.approved_at = Some(now);
            Ok(item.uploader)
        })?;

        info!(item = item_id, %decision, admin = ?actor.user_id(), "item moderated");

        let bonus = self.config.points_per_upload;
        if decision == ModerationDecision::Approved && bonus > 0 {
            let credit = i64::try_from(bonus)
                .map_err(|_| ExchangeError::arithmetic_overflow("upload bonus", uploader))
                .and_then(|delta| {
                    self.create_entry(
                        NewLedgerEntry::new(uploader, delta, LedgerReason::Upload)
                            .with_item(item_id),
                    )
                });
            if let Err(err) = credit {
                error!(item = item_id, user = uploader, %err, "upload bonus not credited");
            }
        }

        receipt.item(item_id)
    }
}
