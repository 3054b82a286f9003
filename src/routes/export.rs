//! Route handler for exporting expenses as a CSV attachment.

use axum::{
    Extension,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use time::Date;

use crate::{
    AppState, Error,
    auth::Caller,
    expense::expenses_in_date_range,
    export::{export_filename, generate_csv},
    scope::resolve_scope,
    user::Role,
};

/// The query parameters for a CSV export.
///
/// Both bounds are required; they are optional here only so that a missing
/// bound produces [Error::MissingDateRange] instead of a generic rejection.
#[derive(Debug, Deserialize)]
pub struct ExportParams {
    /// The first date to include.
    pub start_date: Option<Date>,
    /// The last date to include.
    pub end_date: Option<Date>,
}

/// A route handler for exporting the caller's visible expenses as CSV.
///
/// The inclusive range `[start_date, end_date]` selects the rows; an
/// inverted range simply selects nothing. Admin callers get an extra User
/// column holding each owner's username.
///
/// # Errors
///
/// Returns [Error::MissingDateRange] when either bound is absent. The bounds
/// are validated before the store is queried.
pub async fn export_expenses_endpoint(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<ExportParams>,
) -> Result<Response, Error> {
    let (Some(start_date), Some(end_date)) = (params.start_date, params.end_date) else {
        return Err(Error::MissingDateRange);
    };

    let scope = resolve_scope(caller.role, caller.id);
    let include_owner = caller.role == Role::Admin;

    let rows = {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        expenses_in_date_range(&scope, start_date, end_date, &connection)?
    };

    let csv_text = generate_csv(&rows, include_owner)?;

    let headers = [
        (header::CONTENT_TYPE, "text/csv".to_owned()),
        (
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"",
                export_filename(start_date, end_date)
            ),
        ),
    ];

    Ok((headers, csv_text).into_response())
}

#[cfg(test)]
mod export_route_tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        routes::{
            endpoints,
            test_utils::{get_test_server, register_and_log_in},
        },
        user::Role,
    };

    async fn insert_fixture_expenses(
        server: &axum_test::TestServer,
        auth_cookie: &axum_extra::extract::cookie::Cookie<'static>,
    ) {
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
    }

    #[tokio::test]
    async fn export_includes_exactly_the_rows_in_range() {
        let server = get_test_server();
        let auth_cookie = register_and_log_in(&server, "alice", Role::Regular).await;
        insert_fixture_expenses(&server, &auth_cookie).await;

        let response = server
            .get(endpoints::EXPORT)
            .add_query_param("start_date", "2024-01-01")
            .add_query_param("end_date", "2024-01-31")
            .add_cookie(auth_cookie)
            .await;

        response.assert_status_ok();
        assert_eq!(response.header("content-type"), "text/csv");
        assert_eq!(
            response.header("content-disposition"),
            "attachment; filename=\"expenses_2024-01-01_to_2024-01-31.csv\""
        );
        assert_eq!(
            response.text(),
            "Title,Amount,Category,Date\n\
            A,10.00,Food,2024-01-05\n\
            B,5.00,Food,2024-01-20\n"
        );
    }

    #[tokio::test]
    async fn admin_export_includes_the_user_column() {
        let server = get_test_server();
        let admin_cookie = register_and_log_in(&server, "admin", Role::Admin).await;
        let alice_cookie = register_and_log_in(&server, "alice", Role::Regular).await;

        server
            .post(endpoints::EXPENSES)
            .add_cookie(alice_cookie)
            .json(&json!({
                "title": "Groceries",
                "amount": "10.00",
                "category": "Food",
                "date": "2024-01-05",
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .get(endpoints::EXPORT)
            .add_query_param("start_date", "2024-01-01")
            .add_query_param("end_date", "2024-01-31")
            .add_cookie(admin_cookie)
            .await;

        response.assert_status_ok();
        assert_eq!(
            response.text(),
            "Title,Amount,Category,Date,User\n\
            Groceries,10.00,Food,2024-01-05,alice\n"
        );
    }

    #[tokio::test]
    async fn export_without_bounds_is_a_validation_error() {
        let server = get_test_server();
        let auth_cookie = register_and_log_in(&server, "alice", Role::Regular).await;

        let response = server
            .get(endpoints::EXPORT)
            .add_query_param("start_date", "2024-01-01")
            .add_cookie(auth_cookie)
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({
            "error": "both start_date and end_date are required"
        }));
    }

    #[tokio::test]
    async fn export_with_inverted_range_is_empty_not_an_error() {
        let server = get_test_server();
        let auth_cookie = register_and_log_in(&server, "alice", Role::Regular).await;
        insert_fixture_expenses(&server, &auth_cookie).await;

        let response = server
            .get(endpoints::EXPORT)
            .add_query_param("start_date", "2024-02-01")
            .add_query_param("end_date", "2024-01-01")
            .add_cookie(auth_cookie)
            .await;

        response.assert_status_ok();
        assert_eq!(response.text(), "Title,Amount,Category,Date\n");
    }

    #[tokio::test]
    async fn export_only_covers_the_callers_scope() {
        let server = get_test_server();
        let alice_cookie = register_and_log_in(&server, "alice", Role::Regular).await;
        let bob_cookie = register_and_log_in(&server, "bob", Role::Regular).await;

        server
            .post(endpoints::EXPENSES)
            .add_cookie(bob_cookie)
            .json(&json!({
                "title": "Secret",
                "amount": "99.00",
                "category": "Misc",
                "date": "2024-01-10",
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .get(endpoints::EXPORT)
            .add_query_param("start_date", "2024-01-01")
            .add_query_param("end_date", "2024-01-31")
            .add_cookie(alice_cookie)
            .await;

        response.assert_status_ok();
        assert_eq!(response.text(), "Title,Amount,Category,Date\n");
    }
}
