//! Google OAuth constants
//!
//! Public endpoint locations and request parameters. The client id and secret
//! are deployment configuration and live in `ClientConfig`, not here.

/// Authorization endpoint the browser is redirected to
pub const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Token endpoint for code exchange and token refresh
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Userinfo endpoint returning the signed-in user's profile
pub const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Scopes requested at login. Profile lookup only needs these two.
pub const SCOPES: &str = "email profile";

/// Path on the gateway that receives the authorization code.
pub const CALLBACK_PATH: &str = "/oauth2callback";

/// `access_type=offline` makes Google issue a refresh token.
pub const ACCESS_TYPE: &str = "offline";

/// `prompt=select_account` shows the account chooser even with one session.
pub const PROMPT: &str = "select_account";
