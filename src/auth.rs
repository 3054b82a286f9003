//! User authentication with private cookies.
//!
//! Logging in sets a signed and encrypted cookie holding the user's ID. The
//! [auth_guard] middleware resolves that cookie back to the stored user on
//! every request and places a [Caller] into the request extensions, so route
//! handlers always know both who is calling and what role they hold.

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use serde::Deserialize;
use serde_json::{Value, json};
use time::{Duration, OffsetDateTime};

use crate::{
    AppState, Error,
    user::{Role, UserID, get_user_by_id, get_user_by_username},
};

pub(crate) const COOKIE_USER_ID: &str = "user_id";

/// The default duration for which auth cookies are valid.
pub(crate) const DEFAULT_COOKIE_DURATION: Duration = Duration::minutes(15);

/// The authenticated user making the current request.
///
/// Inserted into the request extensions by [auth_guard]; route handlers
/// receive it with `Extension(caller): Extension<Caller>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    /// The caller's user ID.
    pub id: UserID,
    /// The caller's role, read from the store for this request.
    pub role: Role,
}

/// The credentials sent to the log-in endpoint.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    /// Username entered during log-in.
    pub username: String,
    /// Password entered during log-in.
    pub password: String,
}

/// Handler for log-in requests.
///
/// # Errors
///
/// Returns [Error::InvalidCredentials] when the username does not belong to a
/// registered user or the password is wrong; the two cases produce the same
/// response.
pub async fn log_in(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(credentials): Json<Credentials>,
) -> Result<(PrivateCookieJar, Json<Value>), Error> {
    let user = {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        get_user_by_username(&credentials.username, &connection).map_err(|error| match error {
            Error::NotFound => Error::InvalidCredentials,
            error => error,
        })?
    };

    let password_is_correct = user
        .password_hash
        .verify(&credentials.password)
        .map_err(|error| {
            tracing::error!("Error verifying password: {}", error);
            Error::HashingError(error.to_string())
        })?;

    if !password_is_correct {
        return Err(Error::InvalidCredentials);
    }

    let jar = set_auth_cookie(jar, user.id, state.cookie_duration);

    Ok((jar, Json(json!({ "message": "Logged in successfully!" }))))
}

/// Handler for log-out requests.
///
/// Always succeeds, even when no one was logged in.
pub async fn log_out(jar: PrivateCookieJar) -> (PrivateCookieJar, Json<Value>) {
    (
        invalidate_auth_cookie(jar),
        Json(json!({ "message": "Logged out successfully!" })),
    )
}

pub(crate) fn set_auth_cookie(
    jar: PrivateCookieJar,
    user_id: UserID,
    duration: Duration,
) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_USER_ID, user_id.as_i64().to_string()))
            .expires(OffsetDateTime::now_utc() + duration)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

/// Set the auth cookie to an invalid value and set its max age to zero, which should delete the
/// cookie on the client side.
pub(crate) fn invalidate_auth_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_USER_ID, "deleted"))
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

pub(crate) fn get_user_id_from_auth_cookie(jar: &PrivateCookieJar) -> Result<UserID, Error> {
    match jar.get(COOKIE_USER_ID) {
        None => Err(Error::InvalidCredentials),
        Some(user_id_cookie) => user_id_cookie
            .value_trimmed()
            .parse()
            .map(UserID::new)
            .map_err(|_| Error::InvalidCredentials),
    }
}

/// Middleware function that checks for a valid authorization cookie and resolves the caller.
///
/// The cookie's user ID is looked up in the store so that the caller's current role is used,
/// then a [Caller] is placed into the request extensions and the request executed normally.
/// Requests without a valid cookie receive a 401 response.
///
/// **Note**: The app state must contain an `axum_extra::extract::cookie::Key` for decrypting and
/// verifying the cookie contents.
pub async fn auth_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let jar: PrivateCookieJar = PrivateCookieJar::from_request_parts(&mut parts, &state)
        .await
        .expect("could not get cookie jar from request parts");

    let user_id = match get_user_id_from_auth_cookie(&jar) {
        Ok(user_id) => user_id,
        Err(error) => return error.into_response(),
    };

    let caller = match resolve_caller(user_id, &state) {
        Ok(caller) => caller,
        Err(error) => return error.into_response(),
    };

    parts.extensions.insert(caller);
    let request = Request::from_parts(parts, body);

    next.run(request).await
}

/// Look up the user behind an auth cookie.
///
/// A cookie referring to a user that no longer exists is treated the same as
/// no cookie at all. An unrecognized stored role propagates as the
/// configuration error it is.
fn resolve_caller(user_id: UserID, state: &AppState) -> Result<Caller, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let user = get_user_by_id(user_id, &connection).map_err(|error| match error {
        Error::NotFound => Error::InvalidCredentials,
        error => error,
    })?;

    Ok(Caller {
        id: user.id,
        role: user.role,
    })
}
