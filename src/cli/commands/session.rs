use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_BASE_URL: &str = "base-url";
pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_SWEEP_SECONDS: &str = "session-sweep-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub base_url: String,
    pub session_secret: SecretString,
    pub session_ttl_seconds: u64,
    pub session_sweep_seconds: u64,
}

impl Options {
    /// Parse session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the session secret is missing or blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let session_secret = match matches.get_one::<String>(ARG_SESSION_SECRET) {
            Some(value) if !value.trim().is_empty() => SecretString::from(value.clone()),
            _ => anyhow::bail!("missing required argument: --{ARG_SESSION_SECRET}"),
        };

        let base_url = matches
            .get_one::<String>(ARG_BASE_URL)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "http://localhost:3000".to_string());
        url::Url::parse(&base_url)
            .map_err(|err| anyhow::anyhow!("invalid --{ARG_BASE_URL} {base_url}: {err}"))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session_secret,
            session_ttl_seconds: matches
                .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(crate::api::handlers::auth::DEFAULT_SESSION_TTL_SECONDS),
            session_sweep_seconds: matches
                .get_one::<u64>(ARG_SESSION_SWEEP_SECONDS)
                .copied()
                .unwrap_or(crate::api::handlers::auth::DEFAULT_SESSION_SWEEP_SECONDS),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BASE_URL)
                .long(ARG_BASE_URL)
                .help("Public base URL, used for OAuth callbacks and the Secure cookie flag")
                .env("SECRETS_BASE_URL")
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Key mixed into stored session token hashes")
                .long_help(
                    "Key mixed into stored session token hashes.\n\nRotating it invalidates every live session.",
                )
                .env("SECRETS_SESSION_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("SECRETS_SESSION_TTL_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_SESSION_SWEEP_SECONDS)
                .long(ARG_SESSION_SWEEP_SECONDS)
                .help("Interval between expired-session purges in seconds, 0 disables")
                .env("SECRETS_SESSION_SWEEP_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn command() -> Command {
        with_args(Command::new("secrets"))
    }

    #[test]
    fn defaults_apply() -> anyhow::Result<()> {
        temp_env::with_vars(
            [
                ("SECRETS_BASE_URL", None::<&str>),
                ("SECRETS_SESSION_SECRET", None),
                ("SECRETS_SESSION_TTL_SECONDS", None),
                ("SECRETS_SESSION_SWEEP_SECONDS", None),
            ],
            || {
                let matches =
                    command().try_get_matches_from(["secrets", "--session-secret", "s3cr3t"])?;
                let options = Options::parse(&matches)?;
                assert_eq!(options.base_url, "http://localhost:3000");
                assert_eq!(options.session_secret.expose_secret(), "s3cr3t");
                assert_eq!(options.session_ttl_seconds, 43200);
                assert_eq!(options.session_sweep_seconds, 300);
                Ok(())
            },
        )
    }

    #[test]
    fn env_overrides() -> anyhow::Result<()> {
        temp_env::with_vars(
            [
                ("SECRETS_BASE_URL", Some("https://secrets.example/")),
                ("SECRETS_SESSION_SECRET", Some("from-env")),
                ("SECRETS_SESSION_TTL_SECONDS", Some("60")),
                ("SECRETS_SESSION_SWEEP_SECONDS", Some("0")),
            ],
            || {
                let matches = command().try_get_matches_from(["secrets"])?;
                let options = Options::parse(&matches)?;
                assert_eq!(options.base_url, "https://secrets.example");
                assert_eq!(options.session_secret.expose_secret(), "from-env");
                assert_eq!(options.session_ttl_seconds, 60);
                assert_eq!(options.session_sweep_seconds, 0);
                Ok(())
            },
        )
    }

    #[test]
    fn blank_secret_is_rejected() -> anyhow::Result<()> {
        temp_env::with_vars([("SECRETS_SESSION_SECRET", Some("   "))], || {
            let matches = command().try_get_matches_from(["secrets"])?;
            let result = Options::parse(&matches);
            assert!(result.err().is_some_and(|err| err
                .to_string()
                .contains("missing required argument: --session-secret")));
            Ok(())
        })
    }

    #[test]
    fn invalid_base_url_is_rejected() -> anyhow::Result<()> {
        temp_env::with_vars([("SECRETS_SESSION_SECRET", Some("s"))], || {
            let matches =
                command().try_get_matches_from(["secrets", "--base-url", "not a url"])?;
            assert!(Options::parse(&matches).is_err());
            Ok(())
        })
    }

    #[test]
    fn missing_secret_fails_parsing() {
        temp_env::with_vars([("SECRETS_SESSION_SECRET", None::<&str>)], || {
            let result = command().try_get_matches_from(["secrets"]);
            assert_eq!(
                result.map(|_| ()).map_err(|e| e.kind()),
                Err(clap::error::ErrorKind::MissingRequiredArgument)
            );
        });
    }
}
