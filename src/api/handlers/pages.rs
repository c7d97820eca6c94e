use axum::response::{Html, IntoResponse};

use super::views;

#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Landing page", content_type = "text/html", body = String)),
    tag = "pages"
)]
pub async fn home() -> impl IntoResponse {
    Html(views::home())
}

#[utoipa::path(
    get,
    path = "/register",
    responses((status = 200, description = "Registration form", content_type = "text/html", body = String)),
    tag = "pages"
)]
pub async fn register_form() -> impl IntoResponse {
    Html(views::register())
}

#[utoipa::path(
    get,
    path = "/login",
    responses((status = 200, description = "Login form", content_type = "text/html", body = String)),
    tag = "pages"
)]
pub async fn login_form() -> impl IntoResponse {
    Html(views::login())
}
