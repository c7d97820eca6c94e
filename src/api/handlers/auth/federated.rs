//! Federated sign-in: provider redirect and callback.

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, warn};
use utoipa::IntoParams;

use super::{
    identity::{AuthStrategy, Credentials},
    session::sign_in,
    state::AuthState,
};
use crate::store::Provider;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    /// Authorization code issued by the provider.
    pub code: Option<String>,
    /// CSRF state echoed back by the provider.
    pub state: Option<String>,
    /// Set when the user denied consent or the provider failed.
    pub error: Option<String>,
}

#[utoipa::path(
    get,
    path = "/auth/{provider}",
    params(
        ("provider" = String, Path, description = "google or twitter")
    ),
    responses(
        (status = 303, description = "Redirect to the provider, or to /login when it is not configured"),
        (status = 404, description = "Unknown provider")
    ),
    tag = "auth"
)]
pub async fn authorize(
    Path(provider): Path<String>,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    let Ok(provider) = provider.parse::<Provider>() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(client) = auth_state.oauth().get(provider) else {
        warn!(%provider, "sign-in requested for an unconfigured provider");
        return Redirect::to("/login").into_response();
    };

    let (url, csrf_state, pkce_verifier) = client.authorize_url();
    auth_state
        .oauth()
        .pending()
        .store(provider, &csrf_state, &pkce_verifier)
        .await;
    debug!(%provider, "redirecting to provider");
    Redirect::to(url.as_str()).into_response()
}

#[utoipa::path(
    get,
    path = "/auth/{provider}/callback",
    params(
        ("provider" = String, Path, description = "google or twitter"),
        CallbackQuery
    ),
    responses(
        (status = 303, description = "Signed in (to /secrets), or rejected (to /login)"),
        (status = 404, description = "Unknown provider"),
        (status = 500, description = "Session could not be started")
    ),
    tag = "auth"
)]
pub async fn callback(
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    match provider.parse::<Provider>() {
        Ok(provider) => complete(provider, query, &auth_state).await,
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Legacy callback path. Only Google was ever registered under it.
#[utoipa::path(
    get,
    path = "/auth/{provider}/secrets",
    params(
        ("provider" = String, Path, description = "google"),
        CallbackQuery
    ),
    responses(
        (status = 303, description = "Signed in (to /secrets), or rejected (to /login)"),
        (status = 404, description = "Any provider other than google"),
        (status = 500, description = "Session could not be started")
    ),
    tag = "auth"
)]
pub async fn google_legacy_callback(
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    match provider.parse::<Provider>() {
        Ok(Provider::Google) => complete(Provider::Google, query, &auth_state).await,
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn complete(provider: Provider, query: CallbackQuery, auth_state: &AuthState) -> Response {
    let to_login = || Redirect::to("/login").into_response();

    let Some(client) = auth_state.oauth().get(provider) else {
        warn!(%provider, "callback for an unconfigured provider");
        return to_login();
    };

    if let Some(error) = query.error {
        debug!(%provider, %error, "provider returned an error");
        return to_login();
    }

    let (Some(code), Some(state)) = (query.code, query.state) else {
        debug!(%provider, "callback without code or state");
        return to_login();
    };

    let Some(pkce_verifier) = auth_state.oauth().pending().take(provider, &state).await else {
        warn!(%provider, "callback with unknown or expired state");
        return to_login();
    };

    let external_id = match client.exchange(&code, pkce_verifier).await {
        Ok(external_id) => external_id,
        Err(err) => {
            warn!(%provider, "{err}");
            return to_login();
        }
    };

    match AuthStrategy::from(provider)
        .resolve(auth_state.identity(), Credentials::Profile { external_id })
        .await
    {
        Ok(user) => sign_in(auth_state, &user).await,
        Err(err) => {
            error!(%provider, "Failed to resolve federated user: {err}");
            to_login()
        }
    }
}
