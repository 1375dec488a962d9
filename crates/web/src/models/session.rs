//! Session-related types.

/// Session keys for authentication data.
pub mod keys {
    /// Key for the logged-in user's id.
    pub const USER_ID: &str = "user_id";

    /// Key for the OAuth `state` parameter (CSRF protection).
    pub const GITHUB_OAUTH_STATE: &str = "github_oauth_state";

    /// Key for where to send the user after signing in.
    pub const LOGIN_REDIRECT: &str = "login_redirect";
}
