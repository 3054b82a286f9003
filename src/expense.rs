//! Code for creating the expense table and querying it through a [Scope].
//!
//! Every read and write in this module takes the caller's resolved [Scope]
//! and applies it as a filter predicate, so a regular user can neither see
//! nor mutate another user's records. Amounts are stored as exact decimal
//! strings and handled as [Decimal] everywhere; they are never summed or
//! compared as binary floats.

use std::{fmt::Display, str::FromStr};

use rusqlite::{Connection, Row, ToSql, types::Type};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, Month, OffsetDateTime};

use crate::{Error, scope::Scope, user::UserID};

/// A newtype wrapper for integer expense IDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct ExpenseId(i64);

impl ExpenseId {
    /// Create a new expense ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the expense ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for ExpenseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A single recorded expense.
#[derive(Debug, Clone, PartialEq)]
pub struct Expense {
    /// The expense's ID in the application database.
    pub id: ExpenseId,
    /// What the money was spent on.
    pub title: String,
    /// How much money was spent.
    pub amount: Decimal,
    /// The free-text category used for grouping in analytics.
    pub category: String,
    /// The calendar date the expense occurred on.
    pub date: Date,
    /// The user who owns this expense.
    pub user_id: UserID,
    /// When the record was created. Assigned by the store, immutable afterwards.
    pub created_at: OffsetDateTime,
}

/// The data needed to insert a new expense.
#[derive(Debug, Clone)]
pub struct NewExpense {
    /// What the money was spent on.
    pub title: String,
    /// How much money was spent.
    pub amount: Decimal,
    /// The free-text category used for grouping in analytics.
    pub category: String,
    /// The calendar date the expense occurred on.
    pub date: Date,
    /// The user who owns this expense.
    pub user_id: UserID,
}

/// The fields of an expense that may be changed after creation.
///
/// Fields that are `None` keep their current value. Unknown keys in a request
/// body are rejected during deserialization, so the owner, id and creation
/// timestamp can never be reassigned through an update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpenseUpdate {
    /// Replace the title.
    pub title: Option<String>,
    /// Replace the amount.
    pub amount: Option<Decimal>,
    /// Replace the category.
    pub category: Option<String>,
    /// Replace the date.
    pub date: Option<Date>,
}

/// Optional criteria for narrowing an expense listing.
///
/// The date bounds are inclusive. The category filter matches records whose
/// category contains the given text, ignoring ASCII case. The amount bounds
/// are applied to the decimal amounts after the rows are fetched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseFilter {
    /// Keep expenses dated on or after this date.
    pub start_date: Option<Date>,
    /// Keep expenses dated on or before this date.
    pub end_date: Option<Date>,
    /// Keep expenses with an amount of at least this value.
    pub min_amount: Option<Decimal>,
    /// Keep expenses with an amount of at most this value.
    pub max_amount: Option<Decimal>,
    /// Keep expenses whose category contains this text (case-insensitive).
    pub category: Option<String>,
}

/// An expense joined with its owner's username, as needed for CSV export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseWithOwner {
    /// The expense record.
    pub expense: Expense,
    /// The username of the owning user.
    pub username: String,
}

/// Create the expense table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_expense_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS expense (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                amount TEXT NOT NULL,
                category TEXT NOT NULL,
                date TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

const EXPENSE_COLUMNS: &str = "id, title, amount, category, date, user_id, created_at";

fn map_expense_row(row: &Row) -> rusqlite::Result<Expense> {
    let raw_amount: String = row.get(2)?;
    let amount = Decimal::from_str(&raw_amount)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(error)))?;

    Ok(Expense {
        id: ExpenseId::new(row.get(0)?),
        title: row.get(1)?,
        amount,
        category: row.get(3)?,
        date: row.get(4)?,
        user_id: UserID::new(row.get(5)?),
        created_at: row.get(6)?,
    })
}

/// Create and insert a new expense into the database.
///
/// The creation timestamp is assigned here and cannot be set by the caller.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn create_expense(new_expense: NewExpense, connection: &Connection) -> Result<Expense, Error> {
    let created_at = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO expense (title, amount, category, date, user_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            &new_expense.title,
            new_expense.amount.to_string(),
            &new_expense.category,
            new_expense.date,
            new_expense.user_id.as_i64(),
            created_at,
        ),
    )?;

    let id = ExpenseId::new(connection.last_insert_rowid());

    Ok(Expense {
        id,
        title: new_expense.title,
        amount: new_expense.amount,
        category: new_expense.category,
        date: new_expense.date,
        user_id: new_expense.user_id,
        created_at,
    })
}

/// Get the expense with `id`, if it is visible within `scope`.
///
/// # Errors
///
/// Returns [Error::NotFound] both when no expense has `id` and when the
/// expense exists but belongs to a user outside `scope`. The two cases are
/// deliberately indistinguishable.
pub fn get_expense(id: ExpenseId, scope: &Scope, connection: &Connection) -> Result<Expense, Error> {
    let sql = format!(
        "SELECT {EXPENSE_COLUMNS} FROM expense WHERE id = :id AND {}",
        scope.sql_predicate()
    );

    let id = id.as_i64();
    let owner = scope.owner_id();
    let mut params: Vec<(&str, &dyn ToSql)> = vec![(":id", &id)];
    if let Some(ref owner) = owner {
        params.push((":owner", owner));
    }

    connection
        .prepare(&sql)?
        .query_row(&params[..], map_expense_row)
        .map_err(Error::from)
}

/// List the expenses visible within `scope` that match `filter`.
///
/// Results are returned in insertion (id) order.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn list_expenses(
    scope: &Scope,
    filter: &ExpenseFilter,
    connection: &Connection,
) -> Result<Vec<Expense>, Error> {
    let mut sql = format!(
        "SELECT {EXPENSE_COLUMNS} FROM expense WHERE {}",
        scope.sql_predicate()
    );

    if filter.start_date.is_some() {
        sql.push_str(" AND date >= :start_date");
    }
    if filter.end_date.is_some() {
        sql.push_str(" AND date <= :end_date");
    }
    if filter.category.is_some() {
        sql.push_str(" AND instr(lower(category), lower(:category)) > 0");
    }
    sql.push_str(" ORDER BY id");

    let owner = scope.owner_id();
    let mut params: Vec<(&str, &dyn ToSql)> = Vec::new();
    if let Some(ref owner) = owner {
        params.push((":owner", owner));
    }
    if let Some(ref start_date) = filter.start_date {
        params.push((":start_date", start_date));
    }
    if let Some(ref end_date) = filter.end_date {
        params.push((":end_date", end_date));
    }
    if let Some(ref category) = filter.category {
        params.push((":category", category));
    }

    let expenses = connection
        .prepare(&sql)?
        .query_map(&params[..], map_expense_row)?
        .collect::<Result<Vec<_>, _>>()?;

    // The amount bounds are checked on the decimal values rather than in SQL
    // because amounts are stored as text.
    Ok(expenses
        .into_iter()
        .filter(|expense| filter.min_amount.is_none_or(|min| expense.amount >= min))
        .filter(|expense| filter.max_amount.is_none_or(|max| expense.amount <= max))
        .collect())
}

/// Apply a partial update to the expense with `id`, if it is visible within
/// `scope`.
///
/// Only the title, amount, category and date can change; the owner and the
/// creation timestamp are never touched.
///
/// # Errors
///
/// Returns [Error::NotFound] when the expense does not exist within `scope`,
/// without revealing whether it exists at all.
pub fn update_expense(
    id: ExpenseId,
    scope: &Scope,
    update: ExpenseUpdate,
    connection: &Connection,
) -> Result<Expense, Error> {
    let expense = get_expense(id, scope, connection)?;

    let title = update.title.unwrap_or(expense.title);
    let amount = update.amount.unwrap_or(expense.amount);
    let category = update.category.unwrap_or(expense.category);
    let date = update.date.unwrap_or(expense.date);

    connection.execute(
        "UPDATE expense SET title = ?1, amount = ?2, category = ?3, date = ?4 WHERE id = ?5",
        (&title, amount.to_string(), &category, date, id.as_i64()),
    )?;

    Ok(Expense {
        id,
        title,
        amount,
        category,
        date,
        user_id: expense.user_id,
        created_at: expense.created_at,
    })
}

/// Delete the expense with `id`, if it is visible within `scope`.
///
/// # Errors
///
/// Returns [Error::NotFound] when the expense does not exist within `scope`.
/// The deletion never silently succeeds against another user's record.
pub fn delete_expense(id: ExpenseId, scope: &Scope, connection: &Connection) -> Result<(), Error> {
    let sql = format!(
        "DELETE FROM expense WHERE id = :id AND {}",
        scope.sql_predicate()
    );

    let id = id.as_i64();
    let owner = scope.owner_id();
    let mut params: Vec<(&str, &dyn ToSql)> = vec![(":id", &id)];
    if let Some(ref owner) = owner {
        params.push((":owner", owner));
    }

    let rows_deleted = connection.execute(&sql, &params[..])?;

    if rows_deleted == 0 {
        Err(Error::NotFound)
    } else {
        Ok(())
    }
}

/// Get every expense visible within `scope`.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn expenses_for_scope(scope: &Scope, connection: &Connection) -> Result<Vec<Expense>, Error> {
    list_expenses(scope, &ExpenseFilter::default(), connection)
}

/// Get the expenses visible within `scope` whose date falls in the calendar
/// year `year`.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn expenses_in_year(
    scope: &Scope,
    year: i32,
    connection: &Connection,
) -> Result<Vec<Expense>, Error> {
    let sql = format!(
        "SELECT {EXPENSE_COLUMNS} FROM expense
            WHERE CAST(strftime('%Y', date) AS INTEGER) = :year AND {}
            ORDER BY id",
        scope.sql_predicate()
    );

    let year = i64::from(year);
    let owner = scope.owner_id();
    let mut params: Vec<(&str, &dyn ToSql)> = vec![(":year", &year)];
    if let Some(ref owner) = owner {
        params.push((":owner", owner));
    }

    connection
        .prepare(&sql)?
        .query_map(&params[..], map_expense_row)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::from)
}

/// Get the expenses visible within `scope` whose date falls in the calendar
/// month `month`, in any year.
///
/// Matching the month number without a year constraint mirrors how the
/// weekly trend report has always selected its data; see DESIGN.md.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn expenses_in_month_of_year(
    scope: &Scope,
    month: Month,
    connection: &Connection,
) -> Result<Vec<Expense>, Error> {
    let sql = format!(
        "SELECT {EXPENSE_COLUMNS} FROM expense
            WHERE CAST(strftime('%m', date) AS INTEGER) = :month AND {}
            ORDER BY id",
        scope.sql_predicate()
    );

    let month = month as u8 as i64;
    let owner = scope.owner_id();
    let mut params: Vec<(&str, &dyn ToSql)> = vec![(":month", &month)];
    if let Some(ref owner) = owner {
        params.push((":owner", owner));
    }

    connection
        .prepare(&sql)?
        .query_map(&params[..], map_expense_row)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::from)
}

/// Get the expenses visible within `scope` whose date falls in the inclusive
/// range `[start_date, end_date]`, joined with their owner's username.
///
/// An inverted range matches no rows; that is not an error. Results are
/// returned in insertion (id) order.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn expenses_in_date_range(
    scope: &Scope,
    start_date: Date,
    end_date: Date,
    connection: &Connection,
) -> Result<Vec<ExpenseWithOwner>, Error> {
    let sql = format!(
        "SELECT e.id, e.title, e.amount, e.category, e.date, e.user_id, e.created_at, u.username
            FROM expense e
            INNER JOIN user u ON e.user_id = u.id
            WHERE e.date >= :start_date AND e.date <= :end_date AND {}
            ORDER BY e.id",
        scope.sql_predicate()
    );

    let owner = scope.owner_id();
    let mut params: Vec<(&str, &dyn ToSql)> =
        vec![(":start_date", &start_date), (":end_date", &end_date)];
    if let Some(ref owner) = owner {
        params.push((":owner", owner));
    }

    connection
        .prepare(&sql)?
        .query_map(&params[..], |row| {
            Ok(ExpenseWithOwner {
                expense: map_expense_row(row)?,
                username: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::from)
}
