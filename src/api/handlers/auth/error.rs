use crate::store::StoreError;
use thiserror::Error;

/// Authentication failures.
///
/// Handlers never show these to the client; they redirect to `/login` or
/// `/register` and log the detail server-side.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username already registered")]
    DuplicateUsername,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("credential store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
    #[error("session not found")]
    SessionNotFound,
    #[error("federated authentication failed: {0}")]
    FederatedAuthFailure(String),
}

impl AuthError {
    /// Failures caused by the caller rather than infrastructure.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::StoreUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_are_not_client_errors() {
        assert!(!AuthError::from(StoreError::Unavailable("down".to_string())).is_client_error());
        assert!(AuthError::InvalidCredentials.is_client_error());
        assert!(AuthError::FederatedAuthFailure("denied".to_string()).is_client_error());
    }

    #[test]
    fn invalid_credentials_message_does_not_name_the_field() {
        let message = AuthError::InvalidCredentials.to_string();
        assert_eq!(message, "invalid username or password");
    }
}
