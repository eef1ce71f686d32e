//! Diagnostic logging setup.
//!
//! The crate logs through [`tracing`] macros and never installs a subscriber
//! on its own. Applications that do not bring their own can call
//! [`install`], which reads its filter from [`LOG_ENV`] so verbosity is
//! chosen at run time.

use thiserror::Error;
use tracing_subscriber::{
    EnvFilter,
    filter::{Directive, FromEnvError, ParseError},
};

/// Environment variable holding the filter directives, e.g.
/// `PEERWIRE_LOG=peerwire=debug`.
pub const LOG_ENV: &str = "PEERWIRE_LOG";

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The fallback directive did not parse.
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),
    /// The contents of [`LOG_ENV`] did not parse.
    #[error("invalid PEERWIRE_LOG value: {0}")]
    Env(#[from] FromEnvError),
    /// A global subscriber was already installed.
    #[error("failed to install subscriber: {0}")]
    Install(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Build a filter from [`LOG_ENV`], falling back to `default` when the
/// variable is unset or empty.
///
/// # Errors
///
/// Returns [`LoggingError::Filter`] for a bad `default` and
/// [`LoggingError::Env`] for a bad environment value.
pub fn env_filter(default: &str) -> Result<EnvFilter, LoggingError> {
    let directive: Directive = default.parse()?;
    let filter = EnvFilter::builder()
        .with_default_directive(directive)
        .with_env_var(LOG_ENV)
        .from_env()?;
    Ok(filter)
}

/// Install a `fmt` subscriber filtered by [`env_filter`].
///
/// # Errors
///
/// Returns an error if the filter is invalid or a global subscriber is
/// already set.
pub fn install(default: &str) -> Result<(), LoggingError> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default)?)
        .with_target(true)
        .try_init()
        .map_err(LoggingError::Install)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("info")]
    #[case("peerwire=debug")]
    fn valid_defaults_parse(#[case] default: &str) {
        assert!(env_filter(default).is_ok());
    }

    #[rstest]
    fn invalid_default_is_rejected() {
        assert!(matches!(
            env_filter("peerwire=notalevel"),
            Err(LoggingError::Filter(_))
        ));
    }
}
