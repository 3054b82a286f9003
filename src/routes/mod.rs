//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router, middleware,
    routing::{get, patch, post},
};

use crate::{
    AppState,
    auth::{auth_guard, log_in, log_out},
};

mod analytics;
mod expense;
mod export;
mod user;

pub mod endpoints;

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::USERS, post(user::register_user))
        .route(endpoints::LOG_IN, post(log_in));

    let protected_routes = Router::new()
        .route(endpoints::LOG_OUT, post(log_out))
        .route(endpoints::PROFILE, patch(user::update_profile_endpoint))
        .route(
            endpoints::EXPENSES,
            get(expense::list_expenses_endpoint).post(expense::create_expense_endpoint),
        )
        .route(
            endpoints::EXPENSE,
            get(expense::get_expense_endpoint)
                .patch(expense::update_expense_endpoint)
                .delete(expense::delete_expense_endpoint),
        )
        .route(endpoints::EXPORT, get(export::export_expenses_endpoint))
        .route(endpoints::ANALYTICS, get(analytics::get_analytics_endpoint))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes.merge(unprotected_routes).with_state(state)
}
