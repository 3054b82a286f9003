//! Route handlers for creating, reading, updating, deleting and listing expenses.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    AppState, Error,
    auth::Caller,
    expense::{
        Expense, ExpenseFilter, ExpenseId, ExpenseUpdate, NewExpense, create_expense,
        delete_expense, get_expense, list_expenses, update_expense,
    },
    scope::resolve_scope,
    user::{Role, UserID},
};

/// The request body for creating an expense.
#[derive(Debug, Deserialize)]
pub struct ExpenseData {
    /// What the money was spent on.
    pub title: String,
    /// How much money was spent.
    pub amount: Decimal,
    /// The free-text category used for grouping in analytics.
    pub category: String,
    /// The calendar date the expense occurred on.
    pub date: Date,
}

/// An expense as returned to clients.
///
/// The owner is only included for admin callers; regular users never see an
/// ownership field, not even their own.
#[derive(Debug, Serialize)]
pub struct ExpenseResponse {
    /// The expense's ID.
    pub id: ExpenseId,
    /// What the money was spent on.
    pub title: String,
    /// How much money was spent.
    pub amount: Decimal,
    /// The expense's category.
    pub category: String,
    /// The calendar date the expense occurred on.
    pub date: Date,
    /// The owning user, shown to admins only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserID>,
    /// When the record was created.
    pub created_at: OffsetDateTime,
}

impl ExpenseResponse {
    fn new(expense: Expense, caller: Caller) -> Self {
        Self {
            id: expense.id,
            title: expense.title,
            amount: expense.amount,
            category: expense.category,
            date: expense.date,
            user: (caller.role == Role::Admin).then_some(expense.user_id),
            created_at: expense.created_at,
        }
    }
}

/// A route handler for creating a new expense owned by the caller.
///
/// # Errors
///
/// Returns an error if the expense could not be stored.
pub async fn create_expense_endpoint(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(data): Json<ExpenseData>,
) -> Result<(StatusCode, Json<ExpenseResponse>), Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let expense = create_expense(
        NewExpense {
            title: data.title,
            amount: data.amount,
            category: data.category,
            date: data.date,
            user_id: caller.id,
        },
        &connection,
    )?;

    Ok((StatusCode::CREATED, Json(ExpenseResponse::new(expense, caller))))
}

/// A route handler for listing the expenses visible to the caller.
///
/// Supports the optional query parameters `start_date`, `end_date`,
/// `min_amount`, `max_amount` and `category`.
///
/// # Errors
///
/// Returns an error if the expenses could not be read.
pub async fn list_expenses_endpoint(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(filter): Query<ExpenseFilter>,
) -> Result<Json<Vec<ExpenseResponse>>, Error> {
    let scope = resolve_scope(caller.role, caller.id);

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let expenses = list_expenses(&scope, &filter, &connection)?;

    Ok(Json(
        expenses
            .into_iter()
            .map(|expense| ExpenseResponse::new(expense, caller))
            .collect(),
    ))
}

/// A route handler for getting an expense by its ID.
///
/// # Errors
///
/// Returns [Error::NotFound] when the expense does not exist within the
/// caller's scope, without revealing whether it exists at all.
pub async fn get_expense_endpoint(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(expense_id): Path<ExpenseId>,
) -> Result<Json<ExpenseResponse>, Error> {
    let scope = resolve_scope(caller.role, caller.id);

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let expense = get_expense(expense_id, &scope, &connection)?;

    Ok(Json(ExpenseResponse::new(expense, caller)))
}

/// A route handler for partially updating an expense.
///
/// Only the title, amount, category and date can change; request bodies with
/// any other key are rejected.
///
/// # Errors
///
/// Returns [Error::NotFound] when the expense does not exist within the
/// caller's scope.
pub async fn update_expense_endpoint(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(expense_id): Path<ExpenseId>,
    Json(update): Json<ExpenseUpdate>,
) -> Result<Json<ExpenseResponse>, Error> {
    let scope = resolve_scope(caller.role, caller.id);

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let expense = update_expense(expense_id, &scope, update, &connection)?;

    Ok(Json(ExpenseResponse::new(expense, caller)))
}

/// A route handler for deleting an expense.
///
/// # Errors
///
/// Returns [Error::NotFound] when the expense does not exist within the
/// caller's scope; the deletion never lands on another user's record.
pub async fn delete_expense_endpoint(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(expense_id): Path<ExpenseId>,
) -> Result<StatusCode, Error> {
    let scope = resolve_scope(caller.role, caller.id);

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    delete_expense(expense_id, &scope, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod expense_route_tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::{
        routes::{
            endpoints,
            test_utils::{get_test_server, register_and_log_in},
        },
        user::Role,
    };

    #[tokio::test]
    async fn create_expense_returns_created_record() {
        let server = get_test_server();
        let auth_cookie = register_and_log_in(&server, "alice", Role::Regular).await;

        let response = server
            .post(endpoints::EXPENSES)
            .add_cookie(auth_cookie)
            .json(&json!({
                "title": "Groceries",
                "amount": "42.50",
                "category": "Food",
                "date": "2024-03-15",
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["title"], "Groceries");
        assert_eq!(body["amount"], "42.50");
        assert_eq!(body["category"], "Food");
        assert_eq!(body["date"], "2024-03-15");
    }

    #[tokio::test]
    async fn regular_user_does_not_see_an_owner_field() {
        let server = get_test_server();
        let auth_cookie = register_and_log_in(&server, "alice", Role::Regular).await;

        let response = server
            .post(endpoints::EXPENSES)
            .add_cookie(auth_cookie)
            .json(&json!({
                "title": "Groceries",
                "amount": "42.50",
                "category": "Food",
                "date": "2024-03-15",
            }))
            .await;

        let body: Value = response.json();
        assert!(body.get("user").is_none());
    }

    #[tokio::test]
    async fn admin_sees_the_owner_field() {
        let server = get_test_server();
        let auth_cookie = register_and_log_in(&server, "admin", Role::Admin).await;

        let response = server
            .post(endpoints::EXPENSES)
            .add_cookie(auth_cookie)
            .json(&json!({
                "title": "Groceries",
                "amount": "42.50",
                "category": "Food",
                "date": "2024-03-15",
            }))
            .await;

        let body: Value = response.json();
        assert_eq!(body["user"], 1);
    }

    #[tokio::test]
    async fn get_expense_returns_own_record() {
        let server = get_test_server();
        let auth_cookie = register_and_log_in(&server, "alice", Role::Regular).await;

        let created: Value = server
            .post(endpoints::EXPENSES)
            .add_cookie(auth_cookie.clone())
            .json(&json!({
                "title": "Groceries",
                "amount": "42.50",
                "category": "Food",
                "date": "2024-03-15",
            }))
            .await
            .json();

        let response = server
            .get(&format!("/expenses/{}", created["id"]))
            .add_cookie(auth_cookie)
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["id"], created["id"]);
        assert_eq!(body["title"], "Groceries");
    }

    #[tokio::test]
    async fn get_another_users_expense_is_not_found() {
        let server = get_test_server();
        let alice_cookie = register_and_log_in(&server, "alice", Role::Regular).await;
        let bob_cookie = register_and_log_in(&server, "bob", Role::Regular).await;

        let created: Value = server
            .post(endpoints::EXPENSES)
            .add_cookie(alice_cookie)
            .json(&json!({
                "title": "Groceries",
                "amount": "42.50",
                "category": "Food",
                "date": "2024-03-15",
            }))
            .await
            .json();

        let response = server
            .get(&format!("/expenses/{}", created["id"]))
            .add_cookie(bob_cookie)
            .await;

        response.assert_status_not_found();
    }

    #[tokio::test]
    async fn admin_list_includes_everyones_expenses() {
        let server = get_test_server();
        let admin_cookie = register_and_log_in(&server, "admin", Role::Admin).await;
        let alice_cookie = register_and_log_in(&server, "alice", Role::Regular).await;

        server
            .post(endpoints::EXPENSES)
            .add_cookie(alice_cookie.clone())
            .json(&json!({
                "title": "Groceries",
                "amount": "10.00",
                "category": "Food",
                "date": "2024-03-15",
            }))
            .await
            .assert_status(StatusCode::CREATED);

        server
            .post(endpoints::EXPENSES)
            .add_cookie(admin_cookie.clone())
            .json(&json!({
                "title": "Stationery",
                "amount": "5.00",
                "category": "Office",
                "date": "2024-03-16",
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let admin_list: Vec<Value> = server
            .get(endpoints::EXPENSES)
            .add_cookie(admin_cookie)
            .await
            .json();
        assert_eq!(admin_list.len(), 2);

        let alice_list: Vec<Value> = server
            .get(endpoints::EXPENSES)
            .add_cookie(alice_cookie)
            .await
            .json();
        assert_eq!(alice_list.len(), 1);
        assert_eq!(alice_list[0]["title"], "Groceries");
    }

    #[tokio::test]
    async fn list_applies_query_filters() {
        let server = get_test_server();
        let auth_cookie = register_and_log_in(&server, "alice", Role::Regular).await;

        for (title, amount, category, date) in [
            ("A", "10.00", "Food", "2024-01-05"),
            ("B", "5.00", "Food", "2024-01-20"),
            ("C", "7.00", "Transport", "2024-02-01"),
        ] {
            server
                .post(endpoints::EXPENSES)
                .add_cookie(auth_cookie.clone())
                .json(&json!({
                    "title": title,
                    "amount": amount,
                    "category": category,
                    "date": date,
                }))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let filtered: Vec<Value> = server
            .get(endpoints::EXPENSES)
            .add_query_param("start_date", "2024-01-01")
            .add_query_param("end_date", "2024-01-31")
            .add_query_param("category", "food")
            .add_query_param("min_amount", "6")
            .add_cookie(auth_cookie)
            .await
            .json();

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0]["title"], "A");
    }

    #[tokio::test]
    async fn update_expense_applies_partial_changes() {
        let server = get_test_server();
        let auth_cookie = register_and_log_in(&server, "alice", Role::Regular).await;

        let created: Value = server
            .post(endpoints::EXPENSES)
            .add_cookie(auth_cookie.clone())
            .json(&json!({
                "title": "Groceries",
                "amount": "42.50",
                "category": "Food",
                "date": "2024-03-15",
            }))
            .await
            .json();

        let response = server
            .patch(&format!("/expenses/{}", created["id"]))
            .add_cookie(auth_cookie)
            .json(&json!({ "amount": "50.00" }))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["amount"], "50.00");
        assert_eq!(body["title"], "Groceries");
    }

    #[tokio::test]
    async fn update_with_unknown_field_is_rejected() {
        let server = get_test_server();
        let auth_cookie = register_and_log_in(&server, "alice", Role::Regular).await;

        let created: Value = server
            .post(endpoints::EXPENSES)
            .add_cookie(auth_cookie.clone())
            .json(&json!({
                "title": "Groceries",
                "amount": "42.50",
                "category": "Food",
                "date": "2024-03-15",
            }))
            .await
            .json();

        // Reassigning the owner is not a recognized update field.
        let response = server
            .patch(&format!("/expenses/{}", created["id"]))
            .add_cookie(auth_cookie)
            .json(&json!({ "user_id": 2 }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn update_another_users_expense_is_not_found() {
        let server = get_test_server();
        let alice_cookie = register_and_log_in(&server, "alice", Role::Regular).await;
        let bob_cookie = register_and_log_in(&server, "bob", Role::Regular).await;

        let created: Value = server
            .post(endpoints::EXPENSES)
            .add_cookie(alice_cookie)
            .json(&json!({
                "title": "Groceries",
                "amount": "42.50",
                "category": "Food",
                "date": "2024-03-15",
            }))
            .await
            .json();

        let response = server
            .patch(&format!("/expenses/{}", created["id"]))
            .add_cookie(bob_cookie)
            .json(&json!({ "title": "Hijacked" }))
            .await;

        response.assert_status_not_found();
    }

    #[tokio::test]
    async fn delete_expense_then_get_is_not_found() {
        let server = get_test_server();
        let auth_cookie = register_and_log_in(&server, "alice", Role::Regular).await;

        let created: Value = server
            .post(endpoints::EXPENSES)
            .add_cookie(auth_cookie.clone())
            .json(&json!({
                "title": "Groceries",
                "amount": "42.50",
                "category": "Food",
                "date": "2024-03-15",
            }))
            .await
            .json();

        server
            .delete(&format!("/expenses/{}", created["id"]))
            .add_cookie(auth_cookie.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server
            .get(&format!("/expenses/{}", created["id"]))
            .add_cookie(auth_cookie)
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn delete_another_users_expense_is_not_found() {
        let server = get_test_server();
        let alice_cookie = register_and_log_in(&server, "alice", Role::Regular).await;
        let bob_cookie = register_and_log_in(&server, "bob", Role::Regular).await;

        let created: Value = server
            .post(endpoints::EXPENSES)
            .add_cookie(alice_cookie.clone())
            .json(&json!({
                "title": "Groceries",
                "amount": "42.50",
                "category": "Food",
                "date": "2024-03-15",
            }))
            .await
            .json();

        server
            .delete(&format!("/expenses/{}", created["id"]))
            .add_cookie(bob_cookie)
            .await
            .assert_status_not_found();

        // Alice's record is untouched.
        server
            .get(&format!("/expenses/{}", created["id"]))
            .add_cookie(alice_cookie)
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn expenses_require_authentication() {
        let server = get_test_server();

        server
            .get(endpoints::EXPENSES)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
