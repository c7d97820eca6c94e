//! Credential store: users, their secrets, and server-side sessions.
//!
//! Two backends implement the same traits:
//!
//! - [`PgStore`] keeps everything in Postgres (`sql/schema.sql`).
//! - [`MemoryStore`] keeps everything in process memory. It is used when no
//!   DSN is configured and by the test suite.
//!
//! Both backends make federated find-or-create and secret append single
//! atomic operations, so concurrent callbacks for the same external id never
//! create two users and concurrent submissions never lose an append.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use std::{fmt, str::FromStr, time::Duration};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint (username, session hash) was violated.
    #[error("unique constraint violated")]
    Conflict,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Federated identity providers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Provider {
    Google,
    Twitter,
}

impl Provider {
    pub const ALL: [Self; 2] = [Self::Google, Self::Twitter];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Twitter => "twitter",
        }
    }

    /// Column holding the provider profile id in the `users` table.
    pub(crate) const fn column(self) -> &'static str {
        match self {
            Self::Google => "google_id",
            Self::Twitter => "twitter_id",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "google" => Ok(Self::Google),
            "twitter" => Ok(Self::Twitter),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// One registrant.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: Option<String>,
    /// Argon2id PHC string; never the plaintext password.
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub twitter_id: Option<String>,
    pub secrets: Vec<String>,
}

impl User {
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            username: None,
            password_hash: None,
            google_id: None,
            twitter_id: None,
            secrets: Vec::new(),
        }
    }

    #[must_use]
    pub fn external_id(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Google => self.google_id.as_deref(),
            Provider::Twitter => self.twitter_id.as_deref(),
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "***"))
            .field("google_id", &self.google_id)
            .field("twitter_id", &self.twitter_id)
            .field("secrets", &self.secrets.len())
            .finish()
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a local user. Returns [`StoreError::Conflict`] when the username is taken.
    async fn insert_local(&self, username: &str, password_hash: &str) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Atomic upsert keyed on `(provider, external_id)`.
    async fn find_or_create_federated(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<User, StoreError>;

    /// Atomically append a secret. Returns `false` when the user does not exist.
    async fn append_secret(&self, id: Uuid, secret: &str) -> Result<bool, StoreError>;

    /// Every user's secrets, flattened in user creation order.
    async fn all_secrets(&self) -> Result<Vec<String>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a session. Returns [`StoreError::Conflict`] when the hash already exists.
    async fn insert_session(
        &self,
        session_hash: &[u8],
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Resolve a live (non-expired) session to its user id.
    async fn lookup_session(&self, session_hash: &[u8]) -> Result<Option<Uuid>, StoreError>;

    /// Returns `true` when a session was removed.
    async fn delete_session(&self, session_hash: &[u8]) -> Result<bool, StoreError>;

    /// Remove expired sessions, returning how many were deleted.
    async fn purge_expired_sessions(&self) -> Result<u64, StoreError>;
}

/// Split a schema file into statements, skipping `\ir` includes used by `psql`.
pub(crate) fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("\\ir ") || trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}
