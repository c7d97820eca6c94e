//! OAuth2 authorization-code flow (with PKCE) for the federated providers.
//!
//! 1. [`OAuthClient::authorize_url`] builds the provider redirect and a CSRF
//!    state; the state and PKCE verifier are parked in [`PendingStates`].
//! 2. On callback, the state is consumed once (it must belong to the same
//!    provider and be younger than the TTL), the code is exchanged for an
//!    access token, and the profile endpoint is queried for the stable
//!    external id.

use anyhow::{anyhow, Context, Result};
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope,
    TokenResponse, TokenUrl,
};
use reqwest::{header::ACCEPT, Client};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tracing::{debug, instrument, Instrument};
use url::Url;

use super::error::AuthError;
use crate::store::Provider;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";
const TWITTER_AUTH_URL: &str = "https://twitter.com/i/oauth2/authorize";
const TWITTER_TOKEN_URL: &str = "https://api.twitter.com/2/oauth2/token";
pub const TWITTER_USERINFO_URL: &str = "https://api.twitter.com/2/users/me";

const PENDING_STATE_TTL: Duration = Duration::from_secs(10 * 60);
const MAX_PENDING_STATES: usize = 10_000;
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// Endpoints and credentials for one provider.
#[derive(Clone, Debug)]
pub struct OAuthConfig {
    provider: Provider,
    client_id: ClientId,
    client_secret: ClientSecret,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
    userinfo_url: Url,
    scopes: Vec<String>,
}

impl OAuthConfig {
    /// Build a config with explicit endpoints.
    ///
    /// # Errors
    /// Returns an error if any URL is invalid.
    pub fn new(
        provider: Provider,
        client_id: String,
        client_secret: &SecretString,
        endpoints: Endpoints<'_>,
    ) -> Result<Self> {
        let scopes = match provider {
            Provider::Google => vec!["profile".to_string()],
            Provider::Twitter => vec!["users.read".to_string(), "tweet.read".to_string()],
        };

        Ok(Self {
            provider,
            client_id: ClientId::new(client_id),
            client_secret: ClientSecret::new(client_secret.expose_secret().to_string()),
            auth_url: AuthUrl::new(endpoints.auth_url.to_string())
                .with_context(|| format!("invalid {provider} authorization URL"))?,
            token_url: TokenUrl::new(endpoints.token_url.to_string())
                .with_context(|| format!("invalid {provider} token URL"))?,
            redirect_url: RedirectUrl::new(endpoints.redirect_url.to_string())
                .with_context(|| format!("invalid {provider} callback URL"))?,
            userinfo_url: Url::parse(endpoints.userinfo_url)
                .with_context(|| format!("invalid {provider} userinfo URL"))?,
            scopes,
        })
    }

    /// Google with its public endpoints.
    ///
    /// # Errors
    /// Returns an error if the callback or userinfo URL is invalid.
    pub fn google(
        client_id: String,
        client_secret: &SecretString,
        redirect_url: &str,
        userinfo_url: &str,
    ) -> Result<Self> {
        Self::new(
            Provider::Google,
            client_id,
            client_secret,
            Endpoints {
                auth_url: GOOGLE_AUTH_URL,
                token_url: GOOGLE_TOKEN_URL,
                redirect_url,
                userinfo_url,
            },
        )
    }

    /// Twitter (OAuth 2.0 user context) with its public endpoints.
    ///
    /// # Errors
    /// Returns an error if the callback or userinfo URL is invalid.
    pub fn twitter(
        client_id: String,
        client_secret: &SecretString,
        redirect_url: &str,
        userinfo_url: &str,
    ) -> Result<Self> {
        Self::new(
            Provider::Twitter,
            client_id,
            client_secret,
            Endpoints {
                auth_url: TWITTER_AUTH_URL,
                token_url: TWITTER_TOKEN_URL,
                redirect_url,
                userinfo_url,
            },
        )
    }

    #[must_use]
    pub fn provider(&self) -> Provider {
        self.provider
    }
}

/// Provider endpoint URLs.
#[derive(Clone, Copy, Debug)]
pub struct Endpoints<'a> {
    pub auth_url: &'a str,
    pub token_url: &'a str,
    pub redirect_url: &'a str,
    pub userinfo_url: &'a str,
}

#[derive(Debug)]
pub struct OAuthClient {
    config: OAuthConfig,
    http: Client,
}

impl OAuthClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: OAuthConfig) -> Result<Self> {
        // Token and userinfo responses are never followed.
        let http = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to build OAuth HTTP client")?;
        Ok(Self { config, http })
    }

    #[must_use]
    pub fn provider(&self) -> Provider {
        self.config.provider
    }

    fn client(&self) -> ConfiguredClient {
        BasicClient::new(self.config.client_id.clone())
            .set_client_secret(self.config.client_secret.clone())
            .set_auth_uri(self.config.auth_url.clone())
            .set_token_uri(self.config.token_url.clone())
            .set_redirect_uri(self.config.redirect_url.clone())
    }

    /// Authorization URL plus the CSRF state and PKCE verifier to park.
    #[must_use]
    pub fn authorize_url(&self) -> (Url, CsrfToken, PkceCodeVerifier) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let client = self.client();
        let mut request = client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge);
        for scope in &self.config.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        let (url, csrf_state) = request.url();
        (url, csrf_state, pkce_verifier)
    }

    /// Exchange an authorization code and return the provider profile id.
    ///
    /// # Errors
    /// `FederatedAuthFailure` if the exchange or profile lookup fails.
    #[instrument(skip_all, fields(provider = %self.config.provider))]
    pub async fn exchange(
        &self,
        code: &str,
        pkce_verifier: PkceCodeVerifier,
    ) -> Result<String, AuthError> {
        let token = self
            .client()
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http)
            .await
            .map_err(|err| AuthError::FederatedAuthFailure(format!("token exchange failed: {err}")))?;

        let profile = self
            .fetch_profile(token.access_token().secret())
            .await
            .map_err(|err| AuthError::FederatedAuthFailure(format!("{err:#}")))?;

        extract_profile_id(&profile).ok_or_else(|| {
            AuthError::FederatedAuthFailure("profile response carries no id".to_string())
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<Value> {
        let span = tracing::info_span!(
            "oauth.userinfo",
            http.method = "GET",
            url = %self.config.userinfo_url
        );
        async {
            let response = self
                .http
                .get(self.config.userinfo_url.clone())
                .bearer_auth(access_token)
                .header(ACCEPT, "application/json")
                .send()
                .await
                .context("userinfo request failed")?;
            let status = response.status();
            if !status.is_success() {
                return Err(anyhow!("userinfo request failed: {status}"));
            }
            response
                .json::<Value>()
                .await
                .context("userinfo response is not JSON")
        }
        .instrument(span)
        .await
    }
}

/// Pull the stable profile id out of a userinfo document.
///
/// Handles OpenID Connect (`sub`), Google v2 (`id`) and Twitter v2
/// (`data.id`) shapes. Numeric ids are accepted as strings.
pub(crate) fn extract_profile_id(profile: &Value) -> Option<String> {
    let candidates = [
        profile.pointer("/data/id"),
        profile.get("sub"),
        profile.get("id"),
    ];
    candidates.into_iter().flatten().find_map(|value| match value {
        Value::String(id) if !id.trim().is_empty() => Some(id.trim().to_string()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    })
}

struct PendingState {
    provider: Provider,
    pkce_verifier: String,
    created_at: Instant,
}

/// CSRF states awaiting their callback, each usable once.
pub struct PendingStates {
    ttl: Duration,
    max_entries: usize,
    states: Mutex<HashMap<String, PendingState>>,
}

impl Default for PendingStates {
    fn default() -> Self {
        Self::new(PENDING_STATE_TTL)
    }
}

impl PendingStates {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            max_entries: MAX_PENDING_STATES,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Bound the number of parked states; the oldest are evicted first.
    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub async fn store(&self, provider: Provider, state: &CsrfToken, verifier: &PkceCodeVerifier) {
        let mut states = self.states.lock().await;
        states.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        while states.len() >= self.max_entries {
            let Some(oldest) = states
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            states.remove(&oldest);
            debug!("pending oauth states full, evicted the oldest");
        }
        states.insert(
            state.secret().clone(),
            PendingState {
                provider,
                pkce_verifier: verifier.secret().clone(),
                created_at: Instant::now(),
            },
        );
    }

    /// Consume `state` for `provider`; expired or foreign states yield `None`.
    pub async fn take(&self, provider: Provider, state: &str) -> Option<PkceCodeVerifier> {
        let entry = self.states.lock().await.remove(state)?;
        if entry.provider != provider || entry.created_at.elapsed() >= self.ttl {
            debug!(%provider, "discarding mismatched or expired oauth state");
            return None;
        }
        Some(PkceCodeVerifier::new(entry.pkce_verifier))
    }
}

/// Configured providers plus their in-flight states.
#[derive(Default)]
pub struct OAuthProviders {
    google: Option<OAuthClient>,
    twitter: Option<OAuthClient>,
    pending: PendingStates,
}

impl OAuthProviders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_client(mut self, client: OAuthClient) -> Self {
        match client.provider() {
            Provider::Google => self.google = Some(client),
            Provider::Twitter => self.twitter = Some(client),
        }
        self
    }

    #[must_use]
    pub fn with_pending_states(mut self, pending: PendingStates) -> Self {
        self.pending = pending;
        self
    }

    #[must_use]
    pub fn get(&self, provider: Provider) -> Option<&OAuthClient> {
        match provider {
            Provider::Google => self.google.as_ref(),
            Provider::Twitter => self.twitter.as_ref(),
        }
    }

    #[must_use]
    pub fn pending(&self) -> &PendingStates {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn google_client() -> Result<OAuthClient> {
        let config = OAuthConfig::google(
            "client-id".to_string(),
            &SecretString::from("client-secret"),
            "http://localhost:3000/auth/google/callback",
            GOOGLE_USERINFO_URL,
        )?;
        OAuthClient::new(config)
    }

    #[test]
    fn extract_profile_id_handles_provider_shapes() {
        assert_eq!(
            extract_profile_id(&json!({"sub": "1234", "name": "A"})),
            Some("1234".to_string())
        );
        assert_eq!(
            extract_profile_id(&json!({"id": "g-42"})),
            Some("g-42".to_string())
        );
        assert_eq!(
            extract_profile_id(&json!({"data": {"id": "2244994945", "username": "x"}})),
            Some("2244994945".to_string())
        );
        assert_eq!(extract_profile_id(&json!({"id": 99})), Some("99".to_string()));
        assert_eq!(extract_profile_id(&json!({"id": "  "})), None);
        assert_eq!(extract_profile_id(&json!({"name": "no id"})), None);
    }

    #[test]
    fn authorize_url_carries_state_pkce_and_scope() -> Result<()> {
        let client = google_client()?;
        let (url, state, _verifier) = client.authorize_url();
        assert!(url.as_str().starts_with(GOOGLE_AUTH_URL));

        let query: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(query.get("state"), Some(state.secret()));
        assert_eq!(query.get("client_id").map(String::as_str), Some("client-id"));
        assert_eq!(query.get("scope").map(String::as_str), Some("profile"));
        assert_eq!(
            query.get("code_challenge_method").map(String::as_str),
            Some("S256")
        );
        assert_eq!(
            query.get("redirect_uri").map(String::as_str),
            Some("http://localhost:3000/auth/google/callback")
        );
        Ok(())
    }

    #[test]
    fn invalid_callback_url_is_rejected() {
        let config = OAuthConfig::twitter(
            "id".to_string(),
            &SecretString::from("secret"),
            "not a url",
            TWITTER_USERINFO_URL,
        );
        assert!(config.is_err());
    }

    #[tokio::test]
    async fn pending_state_is_single_use_and_provider_bound() {
        let pending = PendingStates::default();
        let state = CsrfToken::new("state-1".to_string());
        let verifier = PkceCodeVerifier::new("verifier-1".to_string());

        pending.store(Provider::Google, &state, &verifier).await;
        assert!(pending.take(Provider::Twitter, "state-1").await.is_none());

        pending.store(Provider::Google, &state, &verifier).await;
        let taken = pending.take(Provider::Google, "state-1").await;
        assert_eq!(
            taken.map(|verifier| verifier.secret().clone()),
            Some("verifier-1".to_string())
        );
        assert!(pending.take(Provider::Google, "state-1").await.is_none());
    }

    #[tokio::test]
    async fn pending_state_expires() {
        let pending = PendingStates::new(Duration::ZERO);
        let state = CsrfToken::new("state-1".to_string());
        let verifier = PkceCodeVerifier::new("verifier-1".to_string());
        pending.store(Provider::Google, &state, &verifier).await;
        assert!(pending.take(Provider::Google, "state-1").await.is_none());
    }

    #[tokio::test]
    async fn pending_states_evict_the_oldest_when_full() {
        let pending = PendingStates::default().with_max_entries(2);
        for index in 1..=3 {
            let state = CsrfToken::new(format!("state-{index}"));
            let verifier = PkceCodeVerifier::new(format!("verifier-{index}"));
            pending.store(Provider::Google, &state, &verifier).await;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(pending.take(Provider::Google, "state-1").await.is_none());
        assert!(pending.take(Provider::Google, "state-2").await.is_some());
        assert!(pending.take(Provider::Google, "state-3").await.is_some());
    }

    #[test]
    fn providers_are_looked_up_by_kind() -> Result<()> {
        let providers = OAuthProviders::new().with_client(google_client()?);
        assert!(providers.get(Provider::Google).is_some());
        assert!(providers.get(Provider::Twitter).is_none());
        Ok(())
    }
}
