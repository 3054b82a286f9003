//! Route handler for the spending analytics report.

use axum::{Extension, Json, extract::State};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    analytics::{AnalyticsReport, compute_analytics},
    auth::Caller,
    scope::resolve_scope,
};

/// A route handler for computing the caller's spending report.
///
/// The report is anchored to today's date (UTC): monthly totals cover the
/// current calendar year, weekly trends cover the previous calendar month.
///
/// # Errors
///
/// Returns an error if the report could not be computed.
pub async fn get_analytics_endpoint(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<AnalyticsReport>, Error> {
    let scope = resolve_scope(caller.role, caller.id);
    let reference_date = OffsetDateTime::now_utc().date();

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let report = compute_analytics(&scope, reference_date, &connection)?;

    Ok(Json(report))
}
