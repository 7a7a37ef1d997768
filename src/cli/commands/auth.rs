use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

use crate::auth::{AuthConfig, MAX_TOKEN_TTL_SECONDS, RotationPolicy};

pub const ARG_SIGNING_KEY: &str = "signing-key";
pub const ARG_PASSWORD_SALT: &str = "password-salt";
pub const ARG_ACCESS_TOKEN_TTL_SECONDS: &str = "access-token-ttl-seconds";
pub const ARG_REFRESH_TOKEN_TTL_SECONDS: &str = "refresh-token-ttl-seconds";
pub const ARG_VERIFICATION_CODE_LENGTH: &str = "verification-code-length";
pub const ARG_STRICT_ROTATION: &str = "strict-rotation";

#[derive(Debug)]
pub struct Options {
    pub signing_key: SecretString,
    pub password_salt: SecretString,
    pub config: AuthConfig,
}

impl Options {
    /// Parse token, hashing and rotation arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the signing key or password salt is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_secret = |id: &str| -> anyhow::Result<SecretString> {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from)
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        let mut config = AuthConfig::new();
        if let Some(seconds) = matches.get_one::<i64>(ARG_ACCESS_TOKEN_TTL_SECONDS) {
            config = config.with_access_token_ttl_seconds(*seconds);
        }
        if let Some(seconds) = matches.get_one::<i64>(ARG_REFRESH_TOKEN_TTL_SECONDS) {
            config = config.with_refresh_token_ttl_seconds(*seconds);
        }
        if let Some(length) = matches.get_one::<usize>(ARG_VERIFICATION_CODE_LENGTH) {
            config = config.with_verification_code_length(*length);
        }
        if matches.get_flag(ARG_STRICT_ROTATION) {
            config = config.with_rotation(RotationPolicy::CompareAndSwap);
        }

        Ok(Self {
            signing_key: read_secret(ARG_SIGNING_KEY)?,
            password_salt: read_secret(ARG_PASSWORD_SALT)?,
            config,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SIGNING_KEY)
                .long(ARG_SIGNING_KEY)
                .help("Secret used to sign access tokens")
                .env("CUSTODIA_SIGNING_KEY")
                .hide_env_values(true)
                .global(true),
        )
        .arg(
            Arg::new(ARG_PASSWORD_SALT)
                .long(ARG_PASSWORD_SALT)
                .help("Salt mixed into every password hash")
                .env("CUSTODIA_PASSWORD_SALT")
                .hide_env_values(true)
                .global(true),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .long(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .help("Access token TTL in seconds")
                .env("CUSTODIA_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("900")
                .global(true)
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TOKEN_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL_SECONDS)
                .long(ARG_REFRESH_TOKEN_TTL_SECONDS)
                .help("Refresh token (session) TTL in seconds")
                .env("CUSTODIA_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("2592000")
                .global(true)
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TOKEN_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_VERIFICATION_CODE_LENGTH)
                .long(ARG_VERIFICATION_CODE_LENGTH)
                .help("Length of generated email verification codes")
                .env("CUSTODIA_VERIFICATION_CODE_LENGTH")
                .default_value("8")
                .global(true)
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_STRICT_ROTATION)
                .long(ARG_STRICT_ROTATION)
                .help("Reject a refresh whose token was rotated concurrently")
                .env("CUSTODIA_STRICT_ROTATION")
                .global(true)
                .action(ArgAction::SetTrue),
        )
}
