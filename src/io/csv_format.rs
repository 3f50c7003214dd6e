//! CSV format handling for replayed commands and reports
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvCommand structure for deserialization
//! - Conversion from CSV rows to domain commands
//! - Balance, ledger, item and leaderboard report serialization
//!
//! All functions are pure (no file I/O) for easy testing.

use crate::core::PointsSummary;
use crate::types::{
    Command, CommandActor, CommandRecord, ExchangeError, Item, ItemId, ItemUpdate, LedgerEntry,
    NewItem, Points, Role, SwapRequest, User, UserId,
};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::str::FromStr;

/// Separator between tags in the `note` column of a `list` row
pub const TAG_SEPARATOR: char = ';';

/// CSV row structure for deserialization
///
/// Matches the input columns
/// `op,actor,target,offered,points,kind,title,description,category,size,condition,note`.
/// Every column after `actor` is optional; which ones an op reads is
/// decided in [`convert_csv_command`].
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct CsvCommand {
    pub op: String,
    pub actor: String,
    pub target: Option<u32>,
    pub offered: Option<u32>,
    /// Signed for `adjust`, a non-negative amount everywhere else
    pub points: Option<i64>,
    pub kind: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub size: Option<String>,
    pub condition: Option<String>,
    pub note: Option<String>,
}

fn required<T>(value: Option<T>, field: &str, op: &str) -> Result<T, ExchangeError> {
    value.ok_or_else(|| ExchangeError::invalid_argument(field, format!("required for {op}")))
}

fn parse_required<T>(value: Option<String>, field: &str, op: &str) -> Result<T, ExchangeError>
where
    T: FromStr<Err = ExchangeError>,
{
    required(value, field, op)?.parse()
}

fn parse_optional<T>(value: Option<String>) -> Result<Option<T>, ExchangeError>
where
    T: FromStr<Err = ExchangeError>,
{
    value.map(|value| value.parse()).transpose()
}

fn split_tags(note: &str) -> Vec<String> {
    note.split(TAG_SEPARATOR).map(str::to_string).collect()
}

/// `active` or `inactive` in the `note` column of an `update-user` row
fn parse_active(note: Option<String>) -> Result<Option<bool>, ExchangeError> {
    note.map(|note| match note.trim().to_lowercase().as_str() {
        "active" => Ok(true),
        "inactive" => Ok(false),
        other => Err(ExchangeError::invalid_argument(
            "active",
            format!("expected 'active' or 'inactive', got '{other}'"),
        )),
    })
    .transpose()
}

fn unsigned(points: Option<i64>) -> Result<Option<Points>, ExchangeError> {
    points
        .map(|points| {
            Points::try_from(points).map_err(|_| {
                ExchangeError::invalid_argument("points", format!("{points} must not be negative"))
            })
        })
        .transpose()
}

fn parse_actor(actor: &str) -> Result<CommandActor, ExchangeError> {
    let actor = actor.trim();
    if actor.eq_ignore_ascii_case("system") {
        return Ok(CommandActor::System);
    }
    actor
        .parse::<UserId>()
        .map(CommandActor::User)
        .map_err(|_| {
            ExchangeError::invalid_argument(
                "actor",
                format!("'{actor}' is neither a user id nor 'system'"),
            )
        })
}

/// Convert a CsvCommand to a CommandRecord
///
/// This function:
/// - Parses the op and actor columns
/// - Reads the columns the op uses and parses labelled values (roles,
///   categories, swap types, ...) case-insensitively
/// - Ignores columns the op does not use
///
/// # Errors
///
/// Returns `InvalidArgument` naming the offending column when the op is
/// unknown, a required column is empty, or a value does not parse.
pub fn convert_csv_command(row: CsvCommand) -> Result<CommandRecord, ExchangeError> {
    let actor = parse_actor(&row.actor)?;
    let op = row.op.trim().to_lowercase();
    let op = op.as_str();
    let target = || required(row.target, "target", op);

    let command = match op {
        "register" => Command::Register {
            user: target()?,
            name: required(row.title.clone(), "title", op)?,
            role: match row.kind.clone() {
                Some(kind) => kind.parse()?,
                None => Role::User,
            },
        },
        "list" => Command::List(NewItem {
            title: required(row.title.clone(), "title", op)?,
            description: required(row.description.clone(), "description", op)?,
            category: parse_required(row.category.clone(), "category", op)?,
            size: parse_required(row.size.clone(), "size", op)?,
            condition: parse_required(row.condition.clone(), "condition", op)?,
            item_type: parse_required(row.kind.clone(), "kind", op)?,
            point_cost: unsigned(row.points)?,
            tags: row.note.as_deref().map(split_tags).unwrap_or_default(),
            images: Vec::new(),
        }),
        "moderate" => Command::Moderate {
            item: target()?,
            decision: parse_required(row.kind.clone(), "kind", op)?,
            reason: row.note.clone(),
        },
        "request" => Command::Request(SwapRequest {
            request_item: target()?,
            offered_item: row.offered,
            swap_type: parse_required(row.kind.clone(), "kind", op)?,
            points_used: unsigned(row.points)?,
            notes: row.note.clone(),
        }),
        "accept" => Command::Accept { swap: target()? },
        "reject" => Command::Reject { swap: target()? },
        "complete" => Command::Complete { swap: target()? },
        "redeem" => Command::Redeem {
            item: target()?,
            points: required(unsigned(row.points)?, "points", op)?,
        },
        "adjust" => Command::Adjust {
            user: target()?,
            delta: required(row.points, "points", op)?,
            description: row.note.clone(),
        },
        "view" => Command::View { item: target()? },
        "like" => Command::Like { item: target()? },
        "update" => Command::Update {
            item: target()?,
            changes: ItemUpdate {
                title: row.title.clone(),
                description: row.description.clone(),
                category: parse_optional(row.category.clone())?,
                size: parse_optional(row.size.clone())?,
                condition: parse_optional(row.condition.clone())?,
                point_cost: unsigned(row.points)?,
                tags: row.note.as_deref().map(split_tags),
                images: None,
            },
        },
        "remove" => Command::Remove { item: target()? },
        "update-user" => Command::UpdateUser {
            user: target()?,
            role: parse_optional(row.kind.clone())?,
            active: parse_active(row.note.clone())?,
        },
        _ => {
            return Err(ExchangeError::invalid_argument(
                "op",
                format!("unknown operation '{}'", row.op),
            ))
        }
    };

    Ok(CommandRecord { actor, command })
}

#[derive(Serialize)]
struct BalanceRow {
    user: UserId,
    points: Points,
    ledger_balance: Points,
    earned: Points,
    spent: Points,
    transactions: u64,
}

#[derive(Serialize)]
struct LedgerRow<'a> {
    entry: u64,
    user: UserId,
    delta: i64,
    reason: &'a str,
    previous_balance: Points,
    new_balance: Points,
    item: Option<ItemId>,
    swap: Option<u32>,
}

#[derive(Serialize)]
struct ItemRow<'a> {
    item: ItemId,
    uploader: UserId,
    item_type: &'a str,
    point_cost: Option<Points>,
    status: &'a str,
    views: u64,
    likes: usize,
}

#[derive(Serialize)]
struct LeaderboardRow<'a> {
    rank: usize,
    user: UserId,
    name: &'a str,
    points: Points,
}

/// Write the header even when there are no rows, then one line per row
fn write_rows<T, I>(header: &[&str], rows: I, output: &mut dyn Write) -> Result<(), ExchangeError>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(output);
    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write per-user balances
///
/// Columns: `user,points,ledger_balance,earned,spent,transactions`, sorted
/// by user id for deterministic output.
///
/// # Errors
///
/// Returns `IoError` or `ParseError` if the output cannot be written.
pub fn write_balances_csv(
    summaries: &[PointsSummary],
    output: &mut dyn Write,
) -> Result<(), ExchangeError> {
    let mut sorted = summaries.to_vec();
    sorted.sort_by_key(|summary| summary.user);

    write_rows(
        &["user", "points", "ledger_balance", "earned", "spent", "transactions"],
        sorted.iter().map(|summary| BalanceRow {
            user: summary.user,
            points: summary.points,
            ledger_balance: summary.ledger_balance,
            earned: summary.stats.total_earned,
            spent: summary.stats.total_spent,
            transactions: summary.stats.transactions,
        }),
        output,
    )
}

/// Write ledger entries in creation order
///
/// Columns: `entry,user,delta,reason,previous_balance,new_balance,item,swap`.
pub fn write_ledger_csv(entries: &[LedgerEntry], output: &mut dyn Write) -> Result<(), ExchangeError> {
    let mut sorted = entries.to_vec();
    sorted.sort_by_key(|entry| entry.id);

    write_rows(
        &[
            "entry",
            "user",
            "delta",
            "reason",
            "previous_balance",
            "new_balance",
            "item",
            "swap",
        ],
        sorted.iter().map(|entry| LedgerRow {
            entry: entry.id,
            user: entry.user,
            delta: entry.delta,
            reason: entry.reason.as_str(),
            previous_balance: entry.previous_balance,
            new_balance: entry.new_balance,
            item: entry.item,
            swap: entry.swap,
        }),
        output,
    )
}

/// Write listings sorted by item id
///
/// Columns: `item,uploader,type,point_cost,status,views,likes`.
pub fn write_items_csv(items: &[Item], output: &mut dyn Write) -> Result<(), ExchangeError> {
    let mut sorted = items.to_vec();
    sorted.sort_by_key(|item| item.id);

    write_rows(
        &["item", "uploader", "type", "point_cost", "status", "views", "likes"],
        sorted.iter().map(|item| ItemRow {
            item: item.id,
            uploader: item.uploader,
            item_type: item.item_type().as_str(),
            point_cost: item.point_cost(),
            status: item.status.as_str(),
            views: item.views,
            likes: item.likes.len(),
        }),
        output,
    )
}

/// Write leaderboard users in the order given, ranked from 1
///
/// Columns: `rank,user,name,points`.
pub fn write_leaderboard_csv(users: &[User], output: &mut dyn Write) -> Result<(), ExchangeError> {
    write_rows(
        &["rank", "user", "name", "points"],
        users.iter().enumerate().map(|(index, user)| LeaderboardRow {
            rank: index + 1,
            user: user.id,
            name: &user.name,
            points: user.points,
        }),
        output,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Category, Condition, ErrorKind, ItemType, LedgerReason, ModerationDecision, Size, SwapType,
        UserStats,
    };
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn row(op: &str, actor: &str) -> CsvCommand {
        CsvCommand {
            op: op.to_string(),
            actor: actor.to_string(),
            ..CsvCommand::default()
        }
    }

    fn text(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn test_convert_register_defaults_to_member() {
        let record = convert_csv_command(CsvCommand {
            target: Some(7),
            title: text("Dana"),
            ..row("register", "system")
        })
        .unwrap();

        assert_eq!(record.actor, CommandActor::System);
        assert_eq!(
            record.command,
            Command::Register {
                user: 7,
                name: "Dana".to_string(),
                role: Role::User
            }
        );
    }

    #[test]
    fn test_convert_list_splits_tags() {
        let record = convert_csv_command(CsvCommand {
            points: Some(40),
            kind: text("Points"),
            title: text("Wool coat"),
            description: text("Warm winter coat, barely worn"),
            category: text("outerwear"),
            size: text("l"),
            condition: text("like-new"),
            note: text("wool;Winter"),
            ..row("LIST", "3")
        })
        .unwrap();

        assert_eq!(record.actor, CommandActor::User(3));
        let Command::List(item) = record.command else {
            panic!("expected a list command");
        };
        assert_eq!(item.item_type, ItemType::Points);
        assert_eq!(item.point_cost, Some(40));
        assert_eq!(item.category, Category::Outerwear);
        assert_eq!(item.size, Size::L);
        assert_eq!(item.condition, Condition::LikeNew);
        assert_eq!(item.tags, vec!["wool".to_string(), "Winter".to_string()]);
        assert!(item.images.is_empty());
    }

    #[test]
    fn test_convert_request_and_moderate() {
        let request = convert_csv_command(CsvCommand {
            target: Some(1),
            offered: Some(2),
            kind: text("swap"),
            note: text("straight swap?"),
            ..row("request", "2")
        })
        .unwrap();
        assert_eq!(
            request.command,
            Command::Request(SwapRequest {
                request_item: 1,
                offered_item: Some(2),
                swap_type: SwapType::Swap,
                points_used: None,
                notes: text("straight swap?"),
            })
        );

        let moderate = convert_csv_command(CsvCommand {
            target: Some(1),
            kind: text("rejected"),
            ..row("moderate", "system")
        })
        .unwrap();
        assert_eq!(
            moderate.command,
            Command::Moderate {
                item: 1,
                decision: ModerationDecision::Rejected,
                reason: None
            }
        );
    }

    #[test]
    fn test_convert_adjust_keeps_sign() {
        let record = convert_csv_command(CsvCommand {
            target: Some(4),
            points: Some(-25),
            note: text("refund reversal"),
            ..row("adjust", "100")
        })
        .unwrap();
        assert_eq!(
            record.command,
            Command::Adjust {
                user: 4,
                delta: -25,
                description: text("refund reversal")
            }
        );
    }

    #[test]
    fn test_convert_update_reads_only_filled_columns() {
        let record = convert_csv_command(CsvCommand {
            target: Some(2),
            points: Some(30),
            size: text("xl"),
            note: text("wool;sale"),
            ..row("update", "1")
        })
        .unwrap();

        assert_eq!(
            record.command,
            Command::Update {
                item: 2,
                changes: ItemUpdate {
                    size: Some(Size::XL),
                    point_cost: Some(30),
                    tags: Some(vec!["wool".to_string(), "sale".to_string()]),
                    ..ItemUpdate::default()
                }
            }
        );
    }

    #[rstest]
    #[case::deactivate(None, text("Inactive"), None, Some(false))]
    #[case::promote(text("admin"), None, Some(Role::Admin), None)]
    fn test_convert_update_user(
        #[case] kind: Option<String>,
        #[case] note: Option<String>,
        #[case] role: Option<Role>,
        #[case] active: Option<bool>,
    ) {
        let record = convert_csv_command(CsvCommand {
            target: Some(3),
            kind,
            note,
            ..row("update-user", "system")
        })
        .unwrap();
        assert_eq!(record.command, Command::UpdateUser { user: 3, role, active });
    }

    #[rstest]
    #[case::unknown_op(CsvCommand { target: Some(1), ..row("trade", "1") }, "op")]
    #[case::bad_actor(CsvCommand { target: Some(1), ..row("accept", "bob") }, "actor")]
    #[case::missing_target(row("accept", "1"), "target")]
    #[case::missing_points(CsvCommand { target: Some(1), ..row("redeem", "1") }, "points")]
    #[case::negative_points(CsvCommand { target: Some(1), points: Some(-5), ..row("redeem", "1") }, "points")]
    #[case::bad_kind(CsvCommand { target: Some(1), kind: text("barter"), ..row("request", "1") }, "type")]
    #[case::bad_role(CsvCommand { target: Some(1), title: text("Eve"), kind: text("root"), ..row("register", "system") }, "role")]
    #[case::bad_active(CsvCommand { target: Some(1), note: text("banned"), ..row("update-user", "system") }, "active")]
    #[case::bad_size(CsvCommand { target: Some(1), size: text("XXXL"), ..row("update", "1") }, "size")]
    fn test_convert_errors(#[case] row: CsvCommand, #[case] field: &str) {
        let err = convert_csv_command(row).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        match err {
            ExchangeError::InvalidArgument { field: actual, .. } => assert_eq!(actual, field),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_write_balances_sorted_by_user() {
        let summary = |user, points| PointsSummary {
            user,
            points,
            ledger_balance: points,
            stats: UserStats {
                total_earned: points + 10,
                total_spent: 10,
                transactions: 2,
            },
        };
        let mut output = Vec::new();
        write_balances_csv(&[summary(2, 60), summary(1, 40)], &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "user,points,ledger_balance,earned,spent,transactions\n\
             1,40,40,50,10,2\n\
             2,60,60,70,10,2\n"
        );
    }

    #[test]
    fn test_write_leaderboard_quotes_names() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut first = User::new(4, "Lee, Jordan", Role::User, now);
        first.points = 90;
        let second = User::new(1, "Ada", Role::Admin, now);

        let mut output = Vec::new();
        write_leaderboard_csv(&[first, second], &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "rank,user,name,points\n\
             1,4,\"Lee, Jordan\",90\n\
             2,1,Ada,0\n"
        );
    }

    #[test]
    fn test_empty_report_keeps_header() {
        let mut output = Vec::new();
        write_items_csv(&[], &mut output).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "item,uploader,type,point_cost,status,views,likes\n"
        );
    }

    #[test]
    fn test_write_ledger_leaves_missing_links_empty() {
        let entry = LedgerEntry {
            id: 1,
            user: 2,
            delta: -40,
            reason: LedgerReason::Swap,
            previous_balance: 100,
            new_balance: 60,
            item: Some(3),
            swap: Some(1),
            admin: None,
            description: None,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        };
        let adjustment = LedgerEntry {
            id: 0,
            reason: LedgerReason::AdminAdjustment,
            delta: 100,
            previous_balance: 0,
            new_balance: 100,
            item: None,
            swap: None,
            ..entry.clone()
        };

        let mut output = Vec::new();
        write_ledger_csv(&[entry, adjustment], &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "entry,user,delta,reason,previous_balance,new_balance,item,swap\n\
             0,2,100,admin_adjustment,0,100,,\n\
             1,2,-40,swap,100,60,3,1\n"
        );
    }
}
