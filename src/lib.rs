//! # Secrets
//!
//! `secrets` is a small web application where signed-in users post anonymous
//! secrets to a shared wall.
//!
//! ## Sign-in
//!
//! Users sign in with a local username and password, or through Google or
//! Twitter using the OAuth2 authorization code flow with PKCE. Federated users
//! are found or created by the provider's stable profile id.
//!
//! Local passwords are hashed with Argon2id. Sessions are opaque random tokens
//! carried in an `HttpOnly` cookie; only a SHA-256 hash of the token is stored.
//!
//! ## Storage
//!
//! Users, secrets and sessions live in Postgres when a DSN is configured and in
//! memory otherwise. Expired sessions are swept in the background.

pub mod api;
pub mod cli;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
