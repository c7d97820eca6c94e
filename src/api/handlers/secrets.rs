//! The shared secrets wall and submission.

use axum::{
    extract::{rejection::FormRejection, Extension},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, warn};
use utoipa::ToSchema;

use super::{auth::session::current_user, auth::AuthState, views};

#[derive(Deserialize, ToSchema)]
pub struct SecretForm {
    pub secret: String,
}

#[utoipa::path(
    get,
    path = "/secrets",
    responses(
        (status = 200, description = "Every user's secrets", content_type = "text/html", body = String),
        (status = 303, description = "Not signed in, redirect to /login"),
        (status = 500, description = "Store unavailable")
    ),
    tag = "secrets"
)]
pub async fn list(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> Response {
    if current_user(&headers, &auth_state).await.is_none() {
        return Redirect::to("/login").into_response();
    }

    match auth_state.users().all_secrets().await {
        Ok(secrets) => Html(views::secrets(&secrets)).into_response(),
        Err(err) => {
            error!("Failed to list secrets: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/submit",
    responses(
        (status = 200, description = "Submission form", content_type = "text/html", body = String),
        (status = 303, description = "Not signed in, redirect to /login")
    ),
    tag = "secrets"
)]
pub async fn submit_form(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> Response {
    if current_user(&headers, &auth_state).await.is_none() {
        return Redirect::to("/login").into_response();
    }
    Html(views::submit()).into_response()
}

#[utoipa::path(
    post,
    path = "/submit",
    request_body(content = SecretForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Secret stored (to /secrets), malformed form (to /submit), or not signed in (to /login)"),
        (status = 500, description = "Store unavailable")
    ),
    tag = "secrets"
)]
pub async fn submit(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    form: Result<Form<SecretForm>, FormRejection>,
) -> Response {
    let Some(user) = current_user(&headers, &auth_state).await else {
        return Redirect::to("/login").into_response();
    };

    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            debug!(user_id = %user.id, "rejected secret form: {rejection}");
            return Redirect::to("/submit").into_response();
        }
    };

    match auth_state.users().append_secret(user.id, &form.secret).await {
        Ok(true) => Redirect::to("/secrets").into_response(),
        Ok(false) => {
            // The user vanished between session lookup and append.
            warn!(user_id = %user.id, "secret submitted for a missing user");
            Redirect::to("/login").into_response()
        }
        Err(err) => {
            error!(user_id = %user.id, "Failed to append secret: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
