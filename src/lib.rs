//! Outlay is a small expense-tracking backend.
//!
//! This library provides a JSON REST API for recording expenses, listing and
//! filtering them, exporting them as CSV, and computing spending analytics.
//! Regular users only ever see their own records; admins see everyone's.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod analytics;
mod app_state;
mod auth;
mod db;
mod expense;
mod export;
mod password;
mod routes;
mod scope;
mod user;

pub use analytics::{AnalyticsReport, compute_analytics};
pub use app_state::AppState;
pub use auth::Caller;
pub use db::initialize as initialize_db;
pub use expense::{Expense, ExpenseId};
pub use password::{PasswordHash, ValidatedPassword};
pub use routes::build_router;
pub use scope::{Scope, resolve_scope};
pub use user::{Role, User, UserID};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The user provided a username and password combination that does not
    /// match a registered user.
    ///
    /// The same error is used for an unknown username and a wrong password so
    /// that the response does not reveal which usernames exist.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The specified username already exists in the database.
    #[error("the username is already taken")]
    DuplicateUsername,

    /// A CSV export was requested without both date bounds.
    ///
    /// The bounds must be validated before the store is queried.
    #[error("both start_date and end_date are required")]
    MissingDateRange,

    /// The requested resource was not found.
    ///
    /// This error is returned both when a record does not exist and when it
    /// exists but is outside the caller's scope, so a client cannot tell
    /// whether another user's record exists.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The database holds a role string this build does not recognize.
    ///
    /// This is a configuration error: it cannot be fixed by the client
    /// retrying and must never fall back to a default scope.
    #[error("unrecognized role {0:?} in the database")]
    UnknownRole(String),

    /// An error occurred while writing CSV output.
    #[error("could not write CSV output: {0}")]
    CsvError(String),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("user.username") =>
            {
                Error::DuplicateUsername
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Error::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),
            Error::TooWeak(_) | Error::DuplicateUsername | Error::MissingDateRange => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            Error::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
