//! Code for creating the user table and fetching and updating users in the database.

use std::fmt::Display;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, PasswordHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// What a user is allowed to see.
///
/// Admins see every user's expenses, regular users only their own. The role
/// is stored as text in the user table and resolved on every request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May read and export every user's expenses.
    Admin,
    /// May only touch their own expenses.
    Regular,
}

impl Role {
    /// The text stored in the role column for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Regular => "regular",
        }
    }

    /// Parse a role from its stored text form.
    ///
    /// # Errors
    ///
    /// Returns [Error::UnknownRole] for any text other than `"admin"` or
    /// `"regular"`. Callers must treat this as fatal for the request rather
    /// than falling back to a default role.
    pub(crate) fn from_db(text: &str) -> Result<Self, Error> {
        match text {
            "admin" => Ok(Role::Admin),
            "regular" => Ok(Role::Regular),
            other => Err(Error::UnknownRole(other.to_owned())),
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The unique name the user logs in with.
    pub username: String,
    /// The user's email address.
    pub email: String,
    /// The user's first name.
    pub first_name: String,
    /// The user's last name.
    pub last_name: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// Whether the user is an admin or a regular user.
    pub role: Role,
}

/// The data needed to insert a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// The unique name the user will log in with.
    pub username: String,
    /// The user's email address.
    pub email: String,
    /// The user's first name.
    pub first_name: String,
    /// The user's last name.
    pub last_name: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// Whether the user is an admin or a regular user.
    pub role: Role,
}

/// The fields of a user's profile that may be changed after registration.
///
/// Listing the mutable fields explicitly means the username, role, id and
/// password can never be reached through a profile update, no matter what
/// keys a request body contains.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserProfileUpdate {
    /// Replace the user's email address.
    pub email: Option<String>,
    /// Replace the user's first name.
    pub first_name: Option<String>,
    /// Replace the user's last name.
    pub last_name: Option<String>,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                password TEXT NOT NULL,
                role TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, password, role";

/// The raw columns of a user row, before the role text has been checked.
struct UserRow {
    id: i64,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    password_hash: String,
    role: String,
}

impl UserRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            first_name: row.get(3)?,
            last_name: row.get(4)?,
            password_hash: row.get(5)?,
            role: row.get(6)?,
        })
    }

    fn into_user(self) -> Result<User, Error> {
        Ok(User {
            id: UserID::new(self.id),
            username: self.username,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            password_hash: PasswordHash::new_unchecked(&self.password_hash),
            role: Role::from_db(&self.role)?,
        })
    }
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// This function will return an error if:
/// - the username is already taken ([Error::DuplicateUsername]),
/// - or an SQL related error occurred ([Error::SqlError]).
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    connection.execute(
        "INSERT INTO user (username, email, first_name, last_name, password, role)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            &new_user.username,
            &new_user.email,
            &new_user.first_name,
            &new_user.last_name,
            new_user.password_hash.as_ref(),
            new_user.role.as_str(),
        ),
    )?;

    let id = UserID::new(connection.last_insert_rowid());

    Ok(User {
        id,
        username: new_user.username,
        email: new_user.email,
        first_name: new_user.first_name,
        last_name: new_user.last_name,
        password_hash: new_user.password_hash,
        role: new_user.role,
    })
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user,
/// - the stored role text is not recognized,
/// - or there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!("SELECT {USER_COLUMNS} FROM user WHERE id = :id"))?
        .query_row(&[(":id", &user_id.as_i64())], UserRow::from_row)
        .map_err(Error::from)?
        .into_user()
}

/// Get the user from the database with a username equal to `username`.
///
/// # Errors
///
/// This function will return an error if:
/// - `username` does not belong to a registered user,
/// - the stored role text is not recognized,
/// - or there was an error trying to access the store.
pub fn get_user_by_username(username: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!(
            "SELECT {USER_COLUMNS} FROM user WHERE username = :username"
        ))?
        .query_row(&[(":username", &username)], UserRow::from_row)
        .map_err(Error::from)?
        .into_user()
}

/// Apply a partial profile update to the user with `user_id`.
///
/// Fields that are `None` keep their current value.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user,
/// - or there was an error trying to access the store.
pub fn update_user_profile(
    user_id: UserID,
    update: UserProfileUpdate,
    connection: &Connection,
) -> Result<User, Error> {
    let user = get_user_by_id(user_id, connection)?;

    let email = update.email.unwrap_or(user.email);
    let first_name = update.first_name.unwrap_or(user.first_name);
    let last_name = update.last_name.unwrap_or(user.last_name);

    connection.execute(
        "UPDATE user SET email = ?1, first_name = ?2, last_name = ?3 WHERE id = ?4",
        (&email, &first_name, &last_name, user_id.as_i64()),
    )?;

    Ok(User {
        email,
        first_name,
        last_name,
        ..user
    })
}
