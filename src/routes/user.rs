//! Route handlers for user registration and profile updates.

use axum::{Extension, Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    AppState, Error, PasswordHash, ValidatedPassword,
    auth::Caller,
    user::{NewUser, Role, User, UserID, UserProfileUpdate, create_user, update_user_profile},
};

/// The request body for registering a new user.
#[derive(Debug, Deserialize)]
pub struct RegisterData {
    /// The unique name the user will log in with.
    pub username: String,
    /// The raw password; validated and hashed before storage.
    pub password: String,
    /// The user's email address.
    #[serde(default)]
    pub email: String,
    /// The user's first name.
    #[serde(default)]
    pub first_name: String,
    /// The user's last name.
    #[serde(default)]
    pub last_name: String,
    /// The user's role; regular when omitted.
    pub role: Option<Role>,
}

/// A route handler for registering a new user.
///
/// # Errors
///
/// Returns an error if the password is too weak or the username is taken.
pub async fn register_user(
    State(state): State<AppState>,
    Json(data): Json<RegisterData>,
) -> Result<(StatusCode, Json<Value>), Error> {
    let password_hash = PasswordHash::new(
        ValidatedPassword::new(&data.password)?,
        PasswordHash::DEFAULT_COST,
    )?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    create_user(
        NewUser {
            username: data.username,
            email: data.email,
            first_name: data.first_name,
            last_name: data.last_name,
            password_hash,
            role: data.role.unwrap_or(Role::Regular),
        },
        &connection,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User registered successfully!" })),
    ))
}

/// The request body for a profile update.
#[derive(Debug, Deserialize)]
pub struct ProfileUpdateData {
    /// The user to update. Only honoured for admin callers; regular users
    /// always update their own profile.
    pub user_id: Option<UserID>,
    /// The profile fields to change.
    #[serde(flatten)]
    pub update: UserProfileUpdate,
}

/// The profile fields echoed back after an update.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    /// The user's username (read-only through this endpoint).
    pub username: String,
    /// The user's email address.
    pub email: String,
    /// The user's first name.
    pub first_name: String,
    /// The user's last name.
    pub last_name: String,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

/// A route handler for partially updating a user profile.
///
/// Only the email, first name and last name can change; the username, role
/// and password are not reachable through this endpoint. Admins may target
/// another user with `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the targeted user does not exist.
pub async fn update_profile_endpoint(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(data): Json<ProfileUpdateData>,
) -> Result<Json<Value>, Error> {
    let target = match caller.role {
        Role::Admin => data.user_id.unwrap_or(caller.id),
        Role::Regular => caller.id,
    };

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let user = update_user_profile(target, data.update, &connection)?;

    Ok(Json(json!({
        "message": "Profile updated successfully!",
        "data": ProfileResponse::from(user),
    })))
}
