//! Spending analytics computed over a scoped set of expenses.
//!
//! Each report section is aggregated in memory from its own scoped query.
//! The sections are not guaranteed to observe a single atomic snapshot;
//! concurrent writes may land between queries, which the report accepts in
//! exchange for not holding a read transaction across the whole computation.
//! All sums are accumulated as [Decimal] values.

use std::collections::BTreeMap;

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer, ser::SerializeMap};
use time::{Date, Duration, Month};

use crate::{
    Error,
    expense::{Expense, expenses_for_scope, expenses_in_month_of_year, expenses_in_year},
    scope::Scope,
};

/// Total spending per calendar month, in chronological order.
///
/// Serializes as a JSON object whose keys are English month names and whose
/// entries appear in ascending month order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonthlySummary(Vec<(String, Decimal)>);

impl MonthlySummary {
    /// The month name and total pairs, in ascending month order.
    pub fn entries(&self) -> &[(String, Decimal)] {
        &self.0
    }
}

impl Serialize for MonthlySummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (month, total) in &self.0 {
            map.serialize_entry(month, total)?;
        }
        map.end()
    }
}

/// Total spending for one calendar week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyTotal {
    /// The Monday of the week.
    pub week: Date,
    /// The sum of the amounts in that week.
    pub total: Decimal,
}

/// The single largest expense in the report's scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighestExpense {
    /// What the money was spent on.
    pub title: String,
    /// How much money was spent.
    pub amount: Decimal,
    /// The expense's category.
    pub category: String,
    /// The calendar date the expense occurred on.
    pub date: Date,
}

impl From<&Expense> for HighestExpense {
    fn from(expense: &Expense) -> Self {
        Self {
            title: expense.title.clone(),
            amount: expense.amount,
            category: expense.category.clone(),
            date: expense.date,
        }
    }
}

/// The spending report returned by [compute_analytics].
///
/// The optional fields are `None` exactly when the scoped expense set is
/// empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    /// Total spending per category, over all scoped expenses.
    pub category_summary: BTreeMap<String, Decimal>,
    /// Total spending per month of the reference year.
    pub monthly_summary: MonthlySummary,
    /// Weekly totals for the month before the reference month.
    pub weekly_trends: Vec<WeeklyTotal>,
    /// The category with the largest total.
    pub highest_spending_category: Option<String>,
    /// The single expense with the largest amount.
    pub highest_single_expense: Option<HighestExpense>,
}

/// Compute the full spending report for `scope`.
///
/// `reference_date` anchors the time-based sections: monthly totals cover its
/// calendar year, weekly trends cover the calendar month before its month.
/// Calling this twice without intervening writes yields identical reports.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn compute_analytics(
    scope: &Scope,
    reference_date: Date,
    connection: &Connection,
) -> Result<AnalyticsReport, Error> {
    let scoped = expenses_for_scope(scope, connection)?;
    let category_summary = category_totals(&scoped);
    let highest_spending_category = highest_spending_category(&category_summary);
    let highest_single_expense = highest_single_expense(&scoped).map(HighestExpense::from);

    let in_year = expenses_in_year(scope, reference_date.year(), connection)?;
    let monthly_summary = monthly_totals(&in_year);

    let in_last_month = expenses_in_month_of_year(scope, previous_month(reference_date), connection)?;
    let weekly_trends = weekly_totals(&in_last_month);

    Ok(AnalyticsReport {
        category_summary,
        monthly_summary,
        weekly_trends,
        highest_spending_category,
        highest_single_expense,
    })
}

/// The calendar month immediately before the month containing
/// `reference_date`. January wraps back to December.
pub(crate) fn previous_month(reference_date: Date) -> Month {
    reference_date.month().previous()
}

/// The Monday of the week containing `date`.
pub(crate) fn week_start(date: Date) -> Date {
    date - Duration::days(i64::from(date.weekday().number_days_from_monday()))
}

/// Sum the amounts of `expenses` per category.
///
/// Categories are grouped on the stored text as-is: "Food" and "food" are
/// distinct buckets even though the list filter matches them both.
pub(crate) fn category_totals(expenses: &[Expense]) -> BTreeMap<String, Decimal> {
    let mut totals = BTreeMap::new();

    for expense in expenses {
        *totals
            .entry(expense.category.clone())
            .or_insert(Decimal::ZERO) += expense.amount;
    }

    totals
}

/// Sum the amounts of `expenses` per calendar month, in chronological order.
///
/// The caller restricts the input to a single year, so month names alone are
/// unambiguous keys.
pub(crate) fn monthly_totals(expenses: &[Expense]) -> MonthlySummary {
    let mut totals: BTreeMap<Date, Decimal> = BTreeMap::new();

    for expense in expenses {
        let month = expense.date.replace_day(1).unwrap();
        *totals.entry(month).or_insert(Decimal::ZERO) += expense.amount;
    }

    MonthlySummary(
        totals
            .into_iter()
            .map(|(month, total)| (month_name(month.month()).to_owned(), total))
            .collect(),
    )
}

/// Sum the amounts of `expenses` per calendar week, ascending by week start.
pub(crate) fn weekly_totals(expenses: &[Expense]) -> Vec<WeeklyTotal> {
    let mut totals: BTreeMap<Date, Decimal> = BTreeMap::new();

    for expense in expenses {
        *totals
            .entry(week_start(expense.date))
            .or_insert(Decimal::ZERO) += expense.amount;
    }

    totals
        .into_iter()
        .map(|(week, total)| WeeklyTotal { week, total })
        .collect()
}

/// The category with the largest total.
///
/// Ties are broken in favour of the lexicographically smallest category name
/// so the result is deterministic for a given snapshot.
pub(crate) fn highest_spending_category(totals: &BTreeMap<String, Decimal>) -> Option<String> {
    let mut highest: Option<(&String, Decimal)> = None;

    for (category, &total) in totals {
        match highest {
            Some((_, highest_total)) if total <= highest_total => {}
            _ => highest = Some((category, total)),
        }
    }

    highest.map(|(category, _)| category.clone())
}

/// The expense with the largest amount.
///
/// Ties are broken by the most recent date, then by the largest id, so the
/// result is deterministic for a given snapshot.
pub(crate) fn highest_single_expense(expenses: &[Expense]) -> Option<&Expense> {
    expenses.iter().max_by(|a, b| {
        (a.amount, a.date, a.id.as_i64()).cmp(&(b.amount, b.date, b.id.as_i64()))
    })
}

fn month_name(month: Month) -> &'static str {
    match month {
        Month::January => "January",
        Month::February => "February",
        Month::March => "March",
        Month::April => "April",
        Month::May => "May",
        Month::June => "June",
        Month::July => "July",
        Month::August => "August",
        Month::September => "September",
        Month::October => "October",
        Month::November => "November",
        Month::December => "December",
    }
}
