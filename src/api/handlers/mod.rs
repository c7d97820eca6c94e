//! Route handlers.
//!
//! Pages are rendered server-side. Protected routes resolve the session
//! cookie first and redirect anonymous visitors to `/login`.

pub mod auth;
pub mod health;
pub mod pages;
pub mod secrets;
mod views;
