//! Identity verification for local and federated sign-in.

use super::{
    error::AuthError,
    password::{hash_password, verify_password},
};
use crate::store::{Provider, StoreError, User, UserStore};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Proof of identity presented to an [`AuthStrategy`].
pub enum Credentials {
    Password {
        username: String,
        password: SecretString,
    },
    /// Profile id returned by a federated provider after code exchange.
    Profile { external_id: String },
}

/// Sign-in strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthStrategy {
    Local,
    Google,
    Twitter,
}

impl From<Provider> for AuthStrategy {
    fn from(provider: Provider) -> Self {
        match provider {
            Provider::Google => Self::Google,
            Provider::Twitter => Self::Twitter,
        }
    }
}

impl AuthStrategy {
    #[must_use]
    pub const fn provider(self) -> Option<Provider> {
        match self {
            Self::Local => None,
            Self::Google => Some(Provider::Google),
            Self::Twitter => Some(Provider::Twitter),
        }
    }

    /// Resolve `credentials` into a user.
    ///
    /// # Errors
    /// `InvalidCredentials` / `FederatedAuthFailure` when the credentials do
    /// not fit the strategy or do not verify, `StoreUnavailable` on store errors.
    pub async fn resolve(
        self,
        verifier: &IdentityVerifier,
        credentials: Credentials,
    ) -> Result<User, AuthError> {
        match (self.provider(), credentials) {
            (None, Credentials::Password { username, password }) => {
                verifier.verify_local(&username, &password).await
            }
            (None, Credentials::Profile { .. }) => Err(AuthError::InvalidCredentials),
            (Some(provider), Credentials::Profile { external_id }) => {
                verifier.resolve_federated(provider, &external_id).await
            }
            (Some(provider), Credentials::Password { .. }) => Err(
                AuthError::FederatedAuthFailure(format!("{provider} does not accept passwords")),
            ),
        }
    }
}

#[derive(Clone)]
pub struct IdentityVerifier {
    users: Arc<dyn UserStore>,
}

impl IdentityVerifier {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Register a local user and return it.
    ///
    /// # Errors
    /// `DuplicateUsername` if the username is taken; nothing is written in that case.
    #[instrument(skip(self, password))]
    pub async fn register_local(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<User, AuthError> {
        let password_hash = hash_password(password).await.map_err(|err| {
            error!("Failed to hash password: {err:#}");
            AuthError::StoreUnavailable(StoreError::Unavailable(err.to_string()))
        })?;

        match self.users.insert_local(username, &password_hash).await {
            Ok(user) => {
                info!(user_id = %user.id, "registered local user");
                Ok(user)
            }
            Err(StoreError::Conflict) => Err(AuthError::DuplicateUsername),
            Err(err) => Err(err.into()),
        }
    }

    /// Check a local username/password pair.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown username or a wrong password.
    #[instrument(skip(self, password))]
    pub async fn verify_local(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<User, AuthError> {
        let user = self.users.find_by_username(username).await?;
        let hash = user.as_ref().and_then(|user| user.password_hash.clone());

        let matches = verify_password(password, hash).await.map_err(|err| {
            error!("Failed to verify password: {err:#}");
            AuthError::StoreUnavailable(StoreError::Unavailable(err.to_string()))
        })?;

        match user {
            Some(user) if matches => Ok(user),
            _ => {
                debug!("local credentials rejected");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Find or atomically create the user keyed on `(provider, external_id)`.
    ///
    /// # Errors
    /// Only `StoreUnavailable`.
    #[instrument(skip(self))]
    pub async fn resolve_federated(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<User, AuthError> {
        Ok(self
            .users
            .find_or_create_federated(provider, external_id)
            .await?)
    }
}
