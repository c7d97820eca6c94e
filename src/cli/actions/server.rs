use crate::{
    api::{
        self,
        handlers::auth::{AuthConfig, AuthState, OAuthClient, OAuthConfig, OAuthProviders},
    },
    cli::commands::oauth::ProviderOptions,
    store::{MemoryStore, PgStore, Provider, SessionStore, UserStore},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub base_url: String,
    pub session_secret: SecretString,
    pub session_ttl_seconds: u64,
    pub session_sweep_seconds: u64,
    pub google: Option<ProviderOptions>,
    pub twitter: Option<ProviderOptions>,
    pub incomplete_providers: Vec<Provider>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the store cannot be reached, a provider is misconfigured, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    for provider in &args.incomplete_providers {
        warn!(%provider, "client id or secret missing, {provider} sign-in disabled");
    }

    let (users, sessions) = open_store(args.dsn.as_deref()).await?;
    let oauth = oauth_providers(&args)?;

    let auth_config = AuthConfig::new(args.base_url, args.session_secret)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_session_sweep_seconds(args.session_sweep_seconds);

    let auth_state = Arc::new(AuthState::new(auth_config, users, sessions, oauth));

    api::new(args.port, auth_state).await
}

async fn open_store(dsn: Option<&str>) -> Result<(Arc<dyn UserStore>, Arc<dyn SessionStore>)> {
    if let Some(dsn) = dsn {
        let store = Arc::new(PgStore::connect(dsn).await?);
        store
            .ensure_schema()
            .await
            .context("Failed to apply database schema")?;
        let users: Arc<dyn UserStore> = store.clone();
        let sessions: Arc<dyn SessionStore> = store;
        Ok((users, sessions))
    } else {
        warn!("no DSN configured, using the in-memory store");
        let store = Arc::new(MemoryStore::new());
        let users: Arc<dyn UserStore> = store.clone();
        let sessions: Arc<dyn SessionStore> = store;
        Ok((users, sessions))
    }
}

fn oauth_providers(args: &Args) -> Result<OAuthProviders> {
    let mut providers = OAuthProviders::new();
    for (provider, options) in [
        (Provider::Google, args.google.as_ref()),
        (Provider::Twitter, args.twitter.as_ref()),
    ] {
        let Some(options) = options else {
            continue;
        };
        let config = match provider {
            Provider::Google => OAuthConfig::google(
                options.client_id.clone(),
                &options.client_secret,
                &options.callback_url,
                &options.userinfo_url,
            ),
            Provider::Twitter => OAuthConfig::twitter(
                options.client_id.clone(),
                &options.client_secret,
                &options.callback_url,
                &options.userinfo_url,
            ),
        }?;
        providers = providers.with_client(OAuthClient::new(config)?);
        info!(%provider, callback_url = %options.callback_url, "federated sign-in enabled");
    }
    Ok(providers)
}

fn log_startup_args(args: &Args) {
    let enabled = |options: &Option<ProviderOptions>| {
        if options.is_some() {
            "enabled".to_string()
        } else {
            "disabled".to_string()
        }
    };
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        (
            "dsn",
            args.dsn
                .as_deref()
                .map_or_else(|| "none (in-memory)".to_string(), redact_dsn),
        ),
        ("base_url", args.base_url.clone()),
        ("session_ttl_seconds", args.session_ttl_seconds.to_string()),
        (
            "session_sweep_seconds",
            args.session_sweep_seconds.to_string(),
        ),
        ("google", enabled(&args.google)),
        ("twitter", enabled(&args.twitter)),
    ];
    log_entries("Startup configuration", &entries);
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\n{title}:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}
