//! The API endpoint URIs.

/// The route for registering new users.
pub const USERS: &str = "/users";
/// The route for logging in a user.
pub const LOG_IN: &str = "/log_in";
/// The route for logging out the current user.
pub const LOG_OUT: &str = "/log_out";
/// The route for updating the current user's profile.
pub const PROFILE: &str = "/user/profile";
/// The route for listing and creating expenses.
pub const EXPENSES: &str = "/expenses";
/// The route for a single expense.
pub const EXPENSE: &str = "/expenses/{expense_id}";
/// The route for exporting expenses as CSV.
pub const EXPORT: &str = "/expenses/export";
/// The route for the spending analytics report.
pub const ANALYTICS: &str = "/analytics";
