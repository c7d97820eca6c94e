//! Local username/password registration and login.

use axum::{
    extract::{rejection::FormRejection, Extension},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

use super::{
    error::AuthError,
    identity::{AuthStrategy, Credentials},
    session::sign_in,
    state::AuthState,
};

#[derive(Deserialize, ToSchema)]
pub struct CredentialsForm {
    pub username: String,
    #[schema(value_type = String, format = Password)]
    pub password: SecretString,
}

fn log_failure(action: &str, err: &AuthError) {
    if err.is_client_error() {
        debug!("{action} rejected: {err}");
    } else {
        error!("{action} failed: {err}");
    }
}

/// Unwrap a credentials form; malformed bodies are treated as a failed attempt.
fn accept_form(
    action: &str,
    form: Result<Form<CredentialsForm>, FormRejection>,
) -> Option<CredentialsForm> {
    match form {
        Ok(Form(form)) => Some(form),
        Err(rejection) => {
            debug!("{action} rejected: {rejection}");
            None
        }
    }
}

#[utoipa::path(
    post,
    path = "/register",
    request_body(content = CredentialsForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Registered and signed in (to /secrets), or rejected (to /register)"),
        (status = 500, description = "Session could not be started")
    ),
    tag = "auth"
)]
pub async fn register(
    auth_state: Extension<Arc<AuthState>>,
    form: Result<Form<CredentialsForm>, FormRejection>,
) -> Response {
    let Some(form) = accept_form("registration", form) else {
        return Redirect::to("/register").into_response();
    };
    match auth_state
        .identity()
        .register_local(&form.username, &form.password)
        .await
    {
        Ok(user) => sign_in(&auth_state, &user).await,
        Err(err) => {
            log_failure("registration", &err);
            Redirect::to("/register").into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/login",
    request_body(content = CredentialsForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Signed in (to /secrets), or rejected (to /login)"),
        (status = 500, description = "Session could not be started")
    ),
    tag = "auth"
)]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    form: Result<Form<CredentialsForm>, FormRejection>,
) -> Response {
    let Some(form) = accept_form("login", form) else {
        return Redirect::to("/login").into_response();
    };
    let credentials = Credentials::Password {
        username: form.username,
        password: form.password,
    };
    match AuthStrategy::Local
        .resolve(auth_state.identity(), credentials)
        .await
    {
        Ok(user) => sign_in(&auth_state, &user).await,
        Err(err) => {
            log_failure("login", &err);
            Redirect::to("/login").into_response()
        }
    }
}
