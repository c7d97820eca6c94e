//! Command-line argument dispatch.
//!
//! Maps validated CLI arguments to the action to run, such as starting the
//! server with its full configuration.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{oauth, session, ARG_DSN, ARG_PORT};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(3000);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .filter(|dsn| !dsn.trim().is_empty());

    let session_opts = session::Options::parse(matches)?;
    let oauth_opts = oauth::Options::parse(matches, &session_opts.base_url);

    Ok(Action::Server(Args {
        port,
        dsn,
        base_url: session_opts.base_url,
        session_secret: session_opts.session_secret,
        session_ttl_seconds: session_opts.session_ttl_seconds,
        session_sweep_seconds: session_opts.session_sweep_seconds,
        google: oauth_opts.google,
        twitter: oauth_opts.twitter,
        incomplete_providers: oauth_opts.incomplete,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_server_action_from_env() {
        temp_env::with_vars(
            [
                ("SECRETS_PORT", Some("8080")),
                ("SECRETS_DSN", Some("")),
                ("SECRETS_BASE_URL", Some("https://secrets.example")),
                ("SECRETS_SESSION_SECRET", Some("s3cr3t")),
                ("SECRETS_SESSION_TTL_SECONDS", None),
                ("SECRETS_SESSION_SWEEP_SECONDS", None),
                ("SECRETS_GOOGLE_CLIENT_ID", Some("gid")),
                ("SECRETS_GOOGLE_CLIENT_SECRET", Some("gsecret")),
                ("SECRETS_GOOGLE_CALLBACK_URL", None),
                ("SECRETS_TWITTER_CLIENT_ID", None),
                ("SECRETS_TWITTER_CLIENT_SECRET", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["secrets"]);
                let result = handler(&matches);
                assert!(result.is_ok());
                if let Ok(Action::Server(args)) = result {
                    assert_eq!(args.port, 8080);
                    // Blank DSN falls back to the in-memory store.
                    assert_eq!(args.dsn, None);
                    assert_eq!(args.base_url, "https://secrets.example");
                    assert_eq!(args.session_ttl_seconds, 43200);
                    assert_eq!(
                        args.google.map(|google| google.callback_url),
                        Some("https://secrets.example/auth/google/callback".to_string())
                    );
                    assert!(args.twitter.is_none());
                }
            },
        );
    }

    #[test]
    fn blank_session_secret_is_rejected() {
        temp_env::with_vars([("SECRETS_SESSION_SECRET", Some(" "))], || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["secrets"]);
            let result = handler(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err
                    .to_string()
                    .contains("missing required argument: --session-secret"));
            }
        });
    }
}
