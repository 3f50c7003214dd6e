//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `user`: users, roles and point amounts
//! - `actor`: the identity a call is made on behalf of
//! - `item`: listings and their lifecycle
//! - `swap`: swap requests and their state machine
//! - `ledger`: immutable point-movement records and aggregates
//! - `command`: replayable marketplace commands
//! - `page`: pagination window for history queries
//! - `error`: error types for the exchange engine

/// Implements `as_str`, `Display` and case-insensitive `FromStr` for a
/// fieldless enum whose variants map to fixed wire labels.
macro_rules! labelled_enum {
    ($name:ident, $field:literal { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire label of this variant
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::types::ExchangeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|variant| variant.as_str().eq_ignore_ascii_case(needle))
                    .ok_or_else(|| {
                        crate::types::ExchangeError::invalid_argument(
                            $field,
                            format!("unknown value '{}'", s),
                        )
                    })
            }
        }
    };
}

pub mod actor;
pub mod command;
pub mod error;
pub mod item;
pub mod ledger;
pub mod page;
pub mod swap;
pub mod user;

pub use actor::Actor;
pub use command::{Command, CommandActor, CommandRecord};
pub use error::{Entity, ErrorKind, ExchangeError};
pub use item::{
    Category, Condition, Item, ItemId, ItemStatus, ItemType, ItemUpdate, ModerationDecision,
    NewItem, Pricing, Size,
};
pub use ledger::{
    clamped_balance, EntryId, LedgerEntry, LedgerReason, NewLedgerEntry, SystemStats, UserStats,
};
pub use page::Page;
pub use swap::{Swap, SwapId, SwapRequest, SwapStatus, SwapTerms, SwapType};
pub use user::{Points, Role, User, UserId};
