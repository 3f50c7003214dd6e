//! Replayable marketplace commands
//!
//! A command is one caller action against the core, as read from a replay
//! log. Each variant carries exactly the inputs its operation needs.

use super::item::{ItemId, ItemUpdate, ModerationDecision, NewItem};
use super::swap::{SwapId, SwapRequest};
use super::user::{Points, Role, UserId};

/// Identity named in the `actor` column
///
/// The role of a user actor is looked up from the registered user record
/// when the command is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandActor {
    User(UserId),

    /// The system admin, written as `system`
    System,
}

/// Marketplace action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a user record
    Register {
        user: UserId,
        name: String,
        role: Role,
    },

    /// Submit a listing for moderation
    List(NewItem),

    /// Approve or reject a pending listing
    Moderate {
        item: ItemId,
        decision: ModerationDecision,
        reason: Option<String>,
    },

    /// Request another user's item
    Request(SwapRequest),

    Accept { swap: SwapId },

    Reject { swap: SwapId },

    Complete { swap: SwapId },

    /// Spend points on a listed item without a swap
    Redeem { item: ItemId, points: Points },

    /// Admin balance correction
    Adjust {
        user: UserId,
        delta: i64,
        description: Option<String>,
    },

    View { item: ItemId },

    Like { item: ItemId },

    /// Edit a listing; uploader or admin
    Update { item: ItemId, changes: ItemUpdate },

    /// Hard delete; uploader or admin
    Remove { item: ItemId },

    /// Admin change of a user's role or active flag
    UpdateUser {
        user: UserId,
        role: Option<Role>,
        active: Option<bool>,
    },
}

impl Command {
    /// Operation label as written in the `op` column
    pub fn name(&self) -> &'static str {
        match self {
            Command::Register { .. } => "register",
            Command::List(_) => "list",
            Command::Moderate { .. } => "moderate",
            Command::Request(_) => "request",
            Command::Accept { .. } => "accept",
            Command::Reject { .. } => "reject",
            Command::Complete { .. } => "complete",
            Command::Redeem { .. } => "redeem",
            Command::Adjust { .. } => "adjust",
            Command::View { .. } => "view",
            Command::Like { .. } => "like",
            Command::Update { .. } => "update",
            Command::Remove { .. } => "remove",
            Command::UpdateUser { .. } => "update-user",
        }
    }
}

/// A parsed replay row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    pub actor: CommandActor,
    pub command: Command,
}
