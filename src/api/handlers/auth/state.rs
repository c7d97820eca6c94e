//! Auth state and configuration.

use secrecy::SecretString;
use std::{fmt, sync::Arc, time::Duration};

use super::{identity::IdentityVerifier, oauth::OAuthProviders, session::SessionManager};
use crate::store::{SessionStore, UserStore};

pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 12 * 60 * 60;
pub const DEFAULT_SESSION_SWEEP_SECONDS: u64 = 5 * 60;

#[derive(Clone)]
pub struct AuthConfig {
    base_url: String,
    session_secret: SecretString,
    session_ttl_seconds: u64,
    session_sweep_seconds: u64,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("base_url", &self.base_url)
            .field("session_secret", &"***")
            .field("session_ttl_seconds", &self.session_ttl_seconds)
            .field("session_sweep_seconds", &self.session_sweep_seconds)
            .finish()
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new(base_url: String, session_secret: SecretString) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session_secret,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_sweep_seconds: DEFAULT_SESSION_SWEEP_SECONDS,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_sweep_seconds(mut self, seconds: u64) -> Self {
        self.session_sweep_seconds = seconds;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn session_secret(&self) -> &SecretString {
        &self.session_secret
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    /// Interval of the expired-session sweeper; zero disables it.
    #[must_use]
    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_seconds)
    }

    pub(crate) fn session_cookie_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

pub struct AuthState {
    config: AuthConfig,
    identity: IdentityVerifier,
    sessions: SessionManager,
    users: Arc<dyn UserStore>,
    session_store: Arc<dyn SessionStore>,
    oauth: OAuthProviders,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn UserStore>,
        session_store: Arc<dyn SessionStore>,
        oauth: OAuthProviders,
    ) -> Self {
        let identity = IdentityVerifier::new(users.clone());
        let sessions = SessionManager::new(
            session_store.clone(),
            users.clone(),
            config.session_secret().clone(),
            config.session_ttl(),
        );
        Self {
            config,
            identity,
            sessions,
            users,
            session_store,
            oauth,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn identity(&self) -> &IdentityVerifier {
        &self.identity
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    #[must_use]
    pub fn users(&self) -> &dyn UserStore {
        self.users.as_ref()
    }

    pub(crate) fn session_store(&self) -> Arc<dyn SessionStore> {
        self.session_store.clone()
    }

    #[must_use]
    pub fn oauth(&self) -> &OAuthProviders {
        &self.oauth
    }
}
