use clap::{builder::ValueParser, Arg, ArgMatches, Command};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

/// Level names accepted by `SECRETS_LOG_LEVEL`, indexed by verbosity count.
const LEVEL_NAMES: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Accept either a verbosity count (`0..=5`) or a level name.
fn parse_log_level(level: &str) -> Result<u8, String> {
    if let Ok(count) = level.parse::<u8>() {
        return if count <= 5 {
            Ok(count)
        } else {
            Err(format!("log level out of range: {count}"))
        };
    }

    LEVEL_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(level.trim()))
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("invalid log level: {level}"))
}

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(parse_log_level)
}

/// Tracing level for the parsed verbosity; `None` keeps the ERROR default.
#[must_use]
pub fn verbosity_level(matches: &ArgMatches) -> Option<Level> {
    match matches.get_one::<u8>(ARG_VERBOSITY).copied().unwrap_or(0) {
        0 => None,
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("SECRETS_LOG_LEVEL")
            .global(true)
            .action(clap::ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_log_level_accepts_names_and_counts() {
        assert_eq!(parse_log_level("ERROR"), Ok(0));
        assert_eq!(parse_log_level("Debug"), Ok(3));
        assert_eq!(parse_log_level("trace"), Ok(4));
        assert_eq!(parse_log_level("5"), Ok(5));
        assert!(parse_log_level("6").is_err());
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn verbosity_above_range_is_a_parse_error() {
        temp_env::with_var_unset("SECRETS_LOG_LEVEL", || {
            let result =
                with_args(Command::new("secrets")).try_get_matches_from(["secrets", "-vvvvvv"]);
            assert_eq!(
                result.map(|_| ()).map_err(|err| err.kind()),
                Err(clap::error::ErrorKind::ValueValidation)
            );
        });
    }

    #[test]
    fn verbosity_maps_to_levels() {
        let expected = [
            (vec!["secrets"], None),
            (vec!["secrets", "-v"], Some(Level::WARN)),
            (vec!["secrets", "-vv"], Some(Level::INFO)),
            (vec!["secrets", "-vvv"], Some(Level::DEBUG)),
            (vec!["secrets", "-vvvv"], Some(Level::TRACE)),
            (vec!["secrets", "-vvvvv"], Some(Level::TRACE)),
        ];
        temp_env::with_var_unset("SECRETS_LOG_LEVEL", || {
            for (args, level) in expected {
                let matches = with_args(Command::new("secrets")).try_get_matches_from(args);
                assert!(matches.is_ok());
                assert_eq!(matches.as_ref().ok().and_then(verbosity_level), level);
            }
        });
    }
}
