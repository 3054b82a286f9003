//! The visibility boundary applied to every expense query.
//!
//! A [Scope] is resolved once per request from the caller's role and then
//! threaded through every read and write. Query functions never receive a raw
//! role flag, so there is a single place where the admin decision is made.

use crate::user::{Role, UserID};

/// The set of expense records a request is allowed to touch.
///
/// A scope is request-transient: it is recomputed from the caller's role on
/// every request and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every user's records are visible (admins).
    AllUsers,
    /// Only the records owned by this user are visible.
    OwnedBy(UserID),
}

/// Resolve the scope for a caller.
///
/// This is a pure, total function over the defined roles: admins get
/// [Scope::AllUsers], regular users get [Scope::OwnedBy] their own ID.
/// An unrecognized role never reaches this function; it is rejected as a
/// configuration error when the user row is read.
pub fn resolve_scope(role: Role, caller_id: UserID) -> Scope {
    match role {
        Role::Admin => Scope::AllUsers,
        Role::Regular => Scope::OwnedBy(caller_id),
    }
}

impl Scope {
    /// The SQL predicate that restricts a query on the expense table to this
    /// scope.
    ///
    /// Queries using the [Scope::OwnedBy] predicate must bind the owner's ID
    /// to the `:owner` parameter; [Scope::owner_id] supplies it.
    pub(crate) fn sql_predicate(&self) -> &'static str {
        match self {
            Scope::AllUsers => "1 = 1",
            Scope::OwnedBy(_) => "user_id = :owner",
        }
    }

    /// The owner's ID to bind to `:owner`, if this scope has one.
    pub(crate) fn owner_id(&self) -> Option<i64> {
        match self {
            Scope::AllUsers => None,
            Scope::OwnedBy(user_id) => Some(user_id.as_i64()),
        }
    }
}
