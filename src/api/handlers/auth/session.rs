//! Server-side sessions carried by an opaque cookie token.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Redirect, Response},
};
use secrecy::SecretString;
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, error, warn};

use super::{
    error::AuthError,
    state::{AuthConfig, AuthState},
    utils::{generate_session_token, hash_session_token},
};
use crate::store::{SessionStore, StoreError, User, UserStore};

pub(crate) const SESSION_COOKIE_NAME: &str = "secrets_session";
const MAX_TOKEN_ATTEMPTS: usize = 3;

/// Raw session token as held by the browser.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionId(String);

impl SessionId {
    #[must_use]
    pub fn new(token: String) -> Self {
        Self(token)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionId(***)")
    }
}

#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
    session_secret: SecretString,
    ttl: Duration,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        session_secret: SecretString,
        ttl: Duration,
    ) -> Self {
        Self {
            sessions,
            users,
            session_secret,
            ttl,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Allocate a fresh token for `user` and persist its hash.
    ///
    /// # Errors
    /// `StoreUnavailable` if the token cannot be generated or stored.
    pub async fn start_session(&self, user: &User) -> Result<SessionId, AuthError> {
        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let token = generate_session_token()
                .map_err(|err| AuthError::StoreUnavailable(StoreError::Unavailable(err.to_string())))?;
            let token_hash = hash_session_token(&self.session_secret, &token);
            match self
                .sessions
                .insert_session(&token_hash, user.id, self.ttl)
                .await
            {
                Ok(()) => {
                    debug!(user_id = %user.id, "session started");
                    return Ok(SessionId(token));
                }
                // Retry on hash collisions; never hand out a live id twice.
                Err(StoreError::Conflict) => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Err(AuthError::StoreUnavailable(StoreError::Unavailable(
            "failed to allocate a unique session id".to_string(),
        )))
    }

    /// Resolve a token to the current user, fetched live from the store.
    ///
    /// Unknown, expired, or orphaned sessions yield `None`; store errors are
    /// logged and also yield `None`.
    pub async fn load_session(&self, session_id: &SessionId) -> Option<User> {
        let token_hash = hash_session_token(&self.session_secret, session_id.as_str());
        let user_id = match self.sessions.lookup_session(&token_hash).await {
            Ok(Some(user_id)) => user_id,
            Ok(None) => return None,
            Err(err) => {
                error!("Failed to lookup session: {err}");
                return None;
            }
        };

        match self.users.find_by_id(user_id).await {
            Ok(Some(user)) => Some(user),
            Ok(None) => {
                warn!(%user_id, "session references a missing user");
                None
            }
            Err(err) => {
                error!("Failed to load session user: {err}");
                None
            }
        }
    }

    /// Invalidate a token.
    ///
    /// # Errors
    /// `SessionNotFound` when no live session matched, `StoreUnavailable` on store errors.
    pub async fn end_session(&self, session_id: &SessionId) -> Result<(), AuthError> {
        let token_hash = hash_session_token(&self.session_secret, session_id.as_str());
        if self.sessions.delete_session(&token_hash).await? {
            Ok(())
        } else {
            Err(AuthError::SessionNotFound)
        }
    }

    /// End a session that was never handed out; failures are only logged.
    async fn discard_session(&self, session_id: &SessionId) {
        if let Err(err) = self.end_session(session_id).await {
            error!("Failed to discard session: {err}");
        }
    }

    /// Start a session for `user` and build the `Set-Cookie` headers for it.
    pub(crate) async fn login_headers(
        &self,
        config: &AuthConfig,
        user: &User,
    ) -> Result<HeaderMap, AuthError> {
        let session_id = self.start_session(user).await?;
        let mut headers = HeaderMap::new();
        match session_cookie(config, self.ttl, &session_id) {
            Ok(cookie) => {
                headers.insert(SET_COOKIE, cookie);
                Ok(headers)
            }
            Err(err) => {
                error!("Failed to build session cookie: {err}");
                // The session is unusable without a cookie; drop it.
                self.discard_session(&session_id).await;
                Err(AuthError::StoreUnavailable(StoreError::Unavailable(
                    err.to_string(),
                )))
            }
        }
    }
}

/// Resolve the request's session cookie into the signed-in user, if any.
pub(crate) async fn current_user(headers: &HeaderMap, auth_state: &AuthState) -> Option<User> {
    let session_id = extract_session_id(headers)?;
    auth_state.sessions().load_session(&session_id).await
}

/// Start a session for a freshly authenticated user and send them to `/secrets`.
pub(crate) async fn sign_in(auth_state: &AuthState, user: &User) -> Response {
    match auth_state
        .sessions()
        .login_headers(auth_state.config(), user)
        .await
    {
        Ok(headers) => (headers, Redirect::to("/secrets")).into_response(),
        Err(err) => {
            error!("Failed to start session: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/logout",
    responses(
        (status = 303, description = "Session ended, redirect to /")
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    if let Some(session_id) = extract_session_id(&headers) {
        match auth_state.sessions().end_session(&session_id).await {
            Ok(()) | Err(AuthError::SessionNotFound) => {}
            Err(err) => error!("Failed to delete session: {err}"),
        }
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(auth_state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (response_headers, Redirect::to("/"))
}

/// Build an `HttpOnly` cookie for the session token.
pub(crate) fn session_cookie(
    config: &AuthConfig,
    ttl: Duration,
    session_id: &SessionId,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = ttl.as_secs();
    let token = session_id.as_str();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    // Only mark cookies secure when the site is served over HTTPS.
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn extract_session_id(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            let val = val.trim();
            (key.trim() == SESSION_COOKIE_NAME && !val.is_empty())
                .then(|| SessionId(val.to_string()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use axum::http::header::COOKIE;

    fn manager(store: &Arc<MemoryStore>, ttl: Duration) -> SessionManager {
        SessionManager::new(
            store.clone(),
            store.clone(),
            SecretString::from("test-session-secret"),
            ttl,
        )
    }

    #[tokio::test]
    async fn session_lifecycle() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&store, Duration::from_secs(60));
        let user = store.insert_local("alice", "hash").await?;

        let session_id = manager.start_session(&user).await?;
        let loaded = manager.load_session(&session_id).await;
        assert_eq!(loaded.map(|user| user.id), Some(user.id));

        manager.end_session(&session_id).await?;
        assert!(manager.load_session(&session_id).await.is_none());
        assert!(matches!(
            manager.end_session(&session_id).await,
            Err(AuthError::SessionNotFound)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn discard_session_removes_it_and_tolerates_missing() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&store, Duration::from_secs(60));
        let user = store.insert_local("alice", "hash").await?;
        let session_id = manager.start_session(&user).await?;

        manager.discard_session(&session_id).await;
        assert!(manager.load_session(&session_id).await.is_none());

        // Already gone: logged, not propagated.
        manager.discard_session(&session_id).await;
        Ok(())
    }

    #[tokio::test]
    async fn sessions_get_distinct_ids() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&store, Duration::from_secs(60));
        let user = store.insert_local("alice", "hash").await?;

        let first = manager.start_session(&user).await?;
        let second = manager.start_session(&user).await?;
        assert_ne!(first, second);

        // Ending one session leaves the other alive.
        manager.end_session(&first).await?;
        assert!(manager.load_session(&second).await.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn load_session_refetches_user() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&store, Duration::from_secs(60));
        let user = store.insert_local("alice", "hash").await?;
        let session_id = manager.start_session(&user).await?;

        store.append_secret(user.id, "fresh").await?;
        let loaded = manager.load_session(&session_id).await;
        assert_eq!(
            loaded.map(|user| user.secrets),
            Some(vec!["fresh".to_string()])
        );
        Ok(())
    }

    #[tokio::test]
    async fn load_session_ignores_unknown_expired_and_orphaned() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        assert!(manager(&store, Duration::from_secs(60))
            .load_session(&SessionId::new("unknown".to_string()))
            .await
            .is_none());

        let user = store.insert_local("alice", "hash").await?;
        let expired = manager(&store, Duration::ZERO).start_session(&user).await?;
        assert!(manager(&store, Duration::from_secs(60))
            .load_session(&expired)
            .await
            .is_none());

        // A session whose user record is gone is treated as anonymous.
        let orphan = User::new(uuid::Uuid::new_v4());
        let manager = manager(&store, Duration::from_secs(60));
        let session_id = manager.start_session(&orphan).await?;
        assert!(manager.load_session(&session_id).await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn tokens_are_bound_to_the_session_secret() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let user = store.insert_local("alice", "hash").await?;
        let session_id = manager(&store, Duration::from_secs(60))
            .start_session(&user)
            .await?;

        let other = SessionManager::new(
            store.clone(),
            store.clone(),
            SecretString::from("rotated-secret"),
            Duration::from_secs(60),
        );
        assert!(other.load_session(&session_id).await.is_none());
        Ok(())
    }

    #[test]
    fn extract_session_id_reads_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; secrets_session=abc123; other=1"),
        );
        assert_eq!(
            extract_session_id(&headers),
            Some(SessionId::new("abc123".to_string()))
        );
    }

    #[test]
    fn extract_session_id_ignores_missing_or_empty() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_session_id(&headers), None);
        headers.insert(COOKIE, HeaderValue::from_static("secrets_session="));
        assert_eq!(extract_session_id(&headers), None);
        headers.insert(COOKIE, HeaderValue::from_static("malformed"));
        assert_eq!(extract_session_id(&headers), None);
    }

    #[test]
    fn session_cookie_is_http_only_and_secure_on_https() {
        let session_id = SessionId::new("token".to_string());
        let http = AuthConfig::new(
            "http://localhost:3000".to_string(),
            SecretString::from("secret"),
        );
        let cookie = session_cookie(&http, Duration::from_secs(60), &session_id)
            .ok()
            .and_then(|value| value.to_str().ok().map(str::to_string));
        assert_eq!(
            cookie.as_deref(),
            Some("secrets_session=token; Path=/; HttpOnly; SameSite=Lax; Max-Age=60")
        );

        let https = AuthConfig::new(
            "https://secrets.example".to_string(),
            SecretString::from("secret"),
        );
        let cookie = session_cookie(&https, Duration::from_secs(60), &session_id)
            .ok()
            .and_then(|value| value.to_str().ok().map(str::to_string));
        assert!(cookie.is_some_and(|cookie| cookie.ends_with("; Secure")));
    }

    #[test]
    fn clear_session_cookie_expires_immediately() {
        let config = AuthConfig::new(
            "http://localhost:3000".to_string(),
            SecretString::from("secret"),
        );
        let cookie = clear_session_cookie(&config)
            .ok()
            .and_then(|value| value.to_str().ok().map(str::to_string));
        assert!(cookie.is_some_and(|cookie| cookie.contains("Max-Age=0")));
    }
}
