use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::{
    api::handlers::auth::{GOOGLE_USERINFO_URL, TWITTER_USERINFO_URL},
    store::Provider,
};

/// Credentials and endpoints for one federated provider.
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    pub client_id: String,
    pub client_secret: SecretString,
    pub callback_url: String,
    pub userinfo_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct Options {
    pub google: Option<ProviderOptions>,
    pub twitter: Option<ProviderOptions>,
    /// Providers with only one of id/secret set; these stay disabled.
    pub incomplete: Vec<Provider>,
}

/// Argument ids and env names for one provider.
struct ProviderArgs {
    client_id: (&'static str, &'static str),
    client_secret: (&'static str, &'static str),
    callback_url: (&'static str, &'static str),
    userinfo_url: (&'static str, &'static str),
}

const fn provider_args(provider: Provider) -> ProviderArgs {
    match provider {
        Provider::Google => ProviderArgs {
            client_id: ("google-client-id", "SECRETS_GOOGLE_CLIENT_ID"),
            client_secret: ("google-client-secret", "SECRETS_GOOGLE_CLIENT_SECRET"),
            callback_url: ("google-callback-url", "SECRETS_GOOGLE_CALLBACK_URL"),
            userinfo_url: ("google-userinfo-url", "SECRETS_GOOGLE_USERINFO_URL"),
        },
        Provider::Twitter => ProviderArgs {
            client_id: ("twitter-client-id", "SECRETS_TWITTER_CLIENT_ID"),
            client_secret: ("twitter-client-secret", "SECRETS_TWITTER_CLIENT_SECRET"),
            callback_url: ("twitter-callback-url", "SECRETS_TWITTER_CALLBACK_URL"),
            userinfo_url: ("twitter-userinfo-url", "SECRETS_TWITTER_USERINFO_URL"),
        },
    }
}

const fn default_userinfo_url(provider: Provider) -> &'static str {
    match provider {
        Provider::Google => GOOGLE_USERINFO_URL,
        Provider::Twitter => TWITTER_USERINFO_URL,
    }
}

impl Options {
    /// Parse provider arguments. Callback URLs default to
    /// `{base_url}/auth/{provider}/callback`.
    #[must_use]
    pub fn parse(matches: &ArgMatches, base_url: &str) -> Self {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let mut options = Self::default();
        for provider in Provider::ALL {
            let args = provider_args(provider);
            let client_id = get_non_empty(args.client_id.0);
            let client_secret = get_non_empty(args.client_secret.0);

            let parsed = match (client_id, client_secret) {
                (Some(client_id), Some(client_secret)) => Some(ProviderOptions {
                    client_id,
                    client_secret: SecretString::from(client_secret),
                    callback_url: get_non_empty(args.callback_url.0).unwrap_or_else(
                        || format!("{}/auth/{provider}/callback", base_url.trim_end_matches('/')),
                    ),
                    userinfo_url: get_non_empty(args.userinfo_url.0)
                        .unwrap_or_else(|| default_userinfo_url(provider).to_string()),
                }),
                (None, None) => None,
                _ => {
                    options.incomplete.push(provider);
                    None
                }
            };

            match provider {
                Provider::Google => options.google = parsed,
                Provider::Twitter => options.twitter = parsed,
            }
        }

        options
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    Provider::ALL.into_iter().fold(command, with_provider_args)
}

fn with_provider_args(command: Command, provider: Provider) -> Command {
    let args = provider_args(provider);
    let arg = |(id, env): (&'static str, &'static str), help: String| {
        Arg::new(id).long(id).help(help).env(env)
    };

    command
        .arg(arg(args.client_id, format!("{provider} OAuth2 client id")))
        .arg(
            arg(
                args.client_secret,
                format!("{provider} OAuth2 client secret"),
            )
            .hide_env_values(true),
        )
        .arg(arg(
            args.callback_url,
            format!("{provider} redirect URL (default: <base-url>/auth/{provider}/callback)"),
        ))
        .arg(arg(
            args.userinfo_url,
            format!("{provider} profile endpoint returning the user id"),
        ))
}
