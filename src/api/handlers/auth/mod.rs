//! Auth handlers and supporting modules.
//!
//! This module coordinates local and federated sign-in, and session
//! management.
//!
//! ## Local accounts
//!
//! Passwords are stored as Argon2id PHC strings. Unknown usernames and wrong
//! passwords fail with the same error after the same amount of work.
//!
//! ## Federated accounts
//!
//! Google and Twitter use the OAuth2 authorization-code flow with PKCE. The
//! provider profile id is the only identity attribute kept; the first
//! callback for an id creates the user.
//!
//! ## Sessions
//!
//! The browser holds a random token in the `secrets_session` cookie. The
//! store keeps only `SHA-256(session_secret || 0x00 || token)`.
//!
//! > **Warning:** Rotating the session secret signs everybody out.

pub(crate) mod error;
pub(crate) mod federated;
mod identity;
pub(crate) mod local;
pub(crate) mod oauth;
mod password;
pub(crate) mod session;
mod state;
mod utils;

pub use error::AuthError;
pub use identity::{AuthStrategy, Credentials, IdentityVerifier};
pub use oauth::{
    Endpoints, OAuthClient, OAuthConfig, OAuthProviders, PendingStates, GOOGLE_USERINFO_URL,
    TWITTER_USERINFO_URL,
};
pub use session::{SessionId, SessionManager};
pub use state::{AuthConfig, AuthState, DEFAULT_SESSION_SWEEP_SECONDS, DEFAULT_SESSION_TTL_SECONDS};
