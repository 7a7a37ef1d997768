pub mod auth;
pub mod email;
pub mod logging;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const ARG_DSN: &str = "dsn";
pub const ARG_NAME: &str = "name";
pub const ARG_EMAIL: &str = "email";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_TOKEN: &str = "token";
pub const ARG_CODE: &str = "code";
pub const ARG_ID: &str = "id";

fn arg_name() -> Arg {
    Arg::new(ARG_NAME)
        .long(ARG_NAME)
        .help("Display name")
        .required(true)
}

fn arg_email() -> Arg {
    Arg::new(ARG_EMAIL)
        .long(ARG_EMAIL)
        .help("Email address")
        .required(true)
}

fn arg_password() -> Arg {
    Arg::new(ARG_PASSWORD)
        .long(ARG_PASSWORD)
        .help("Plaintext password")
        .env("CUSTODIA_PASSWORD")
        .hide_env_values(true)
        .required(true)
}

fn arg_token() -> Arg {
    Arg::new(ARG_TOKEN)
        .long(ARG_TOKEN)
        .help("Refresh token from a previous sign-in or refresh")
        .required(true)
}

fn arg_id() -> Arg {
    Arg::new(ARG_ID)
        .long(ARG_ID)
        .help("Principal id")
        .required(true)
        .value_parser(clap::value_parser!(uuid::Uuid))
}

fn admin_command() -> Command {
    Command::new("admin")
        .about("Administrator accounts")
        .subcommand_required(true)
        .subcommand(
            Command::new("create")
                .about("Provision an administrator")
                .arg(arg_name())
                .arg(arg_email())
                .arg(arg_password()),
        )
        .subcommand(
            Command::new("signin")
                .about("Sign in and print a token pair")
                .arg(arg_email())
                .arg(arg_password()),
        )
        .subcommand(
            Command::new("refresh")
                .about("Rotate a refresh token")
                .arg(arg_token()),
        )
        .subcommand(
            Command::new("whoami")
                .about("Show an administrator profile")
                .arg(arg_id()),
        )
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("custodia")
        .about("User and admin sessions with email verification")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Database connection string")
                .env("CUSTODIA_DSN")
                .hide_env_values(true)
                .global(true),
        )
        .subcommand(Command::new("migrate").about("Create the credential store schema"))
        .subcommand(
            Command::new("signup")
                .about("Register a user and send the verification email")
                .arg(arg_name())
                .arg(arg_email())
                .arg(arg_password()),
        )
        .subcommand(
            Command::new("signin")
                .about("Sign in a verified user and print a token pair")
                .arg(arg_email())
                .arg(arg_password()),
        )
        .subcommand(
            Command::new("refresh")
                .about("Rotate a user refresh token")
                .arg(arg_token()),
        )
        .subcommand(
            Command::new("verify")
                .about("Consume an email verification code")
                .arg(
                    Arg::new(ARG_CODE)
                        .long(ARG_CODE)
                        .help("Verification code from the email link")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("whoami")
                .about("Show a verified user's profile")
                .arg(arg_id()),
        )
        .subcommand(admin_command());

    let command = auth::with_args(command);
    let command = email::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAR: [(&str, Option<&str>); 6] = [
        ("CUSTODIA_DSN", None),
        ("CUSTODIA_PASSWORD", None),
        ("CUSTODIA_SIGNING_KEY", None),
        ("CUSTODIA_PASSWORD_SALT", None),
        ("CUSTODIA_STRICT_ROTATION", None),
        ("CUSTODIA_LOG_LEVEL", None),
    ];

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "custodia");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("User and admin sessions with email verification".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn signup_reads_arguments_and_defaults() {
        temp_env::with_vars(CLEAR, || {
            let matches = new().get_matches_from(vec![
                "custodia",
                "--dsn",
                "postgres://localhost:5432/custodia",
                "signup",
                "--name",
                "Alice",
                "--email",
                "alice@example.com",
                "--password",
                "pw123",
            ]);

            assert_eq!(
                matches.get_one::<String>(ARG_DSN).cloned(),
                Some("postgres://localhost:5432/custodia".to_string())
            );
            assert_eq!(
                matches
                    .get_one::<i64>(auth::ARG_ACCESS_TOKEN_TTL_SECONDS)
                    .copied(),
                Some(900)
            );
            assert_eq!(
                matches
                    .get_one::<usize>(auth::ARG_VERIFICATION_CODE_LENGTH)
                    .copied(),
                Some(8)
            );
            let Some(("signup", sub)) = matches.subcommand() else {
                panic!("expected signup subcommand");
            };
            assert_eq!(
                sub.get_one::<String>(ARG_EMAIL).cloned(),
                Some("alice@example.com".to_string())
            );
            assert_eq!(
                sub.get_one::<String>(ARG_PASSWORD).cloned(),
                Some("pw123".to_string())
            );
        });
    }

    #[test]
    fn global_args_follow_subcommands() {
        temp_env::with_vars(CLEAR, || {
            let matches = new().get_matches_from(vec![
                "custodia",
                "admin",
                "refresh",
                "--token",
                "abc",
                "--strict-rotation",
                "--signing-key",
                "key",
            ]);
            assert!(matches.get_flag(auth::ARG_STRICT_ROTATION));
            assert_eq!(
                matches.get_one::<String>(auth::ARG_SIGNING_KEY).cloned(),
                Some("key".to_string())
            );
        });
    }

    #[test]
    fn password_from_env() {
        temp_env::with_vars(
            [
                ("CUSTODIA_PASSWORD", Some("from-env")),
                ("CUSTODIA_DSN", None),
            ],
            || {
                let matches = new().get_matches_from(vec![
                    "custodia",
                    "signin",
                    "--email",
                    "alice@example.com",
                ]);
                let password = matches
                    .subcommand_matches("signin")
                    .and_then(|sub| sub.get_one::<String>(ARG_PASSWORD).cloned());
                assert_eq!(password, Some("from-env".to_string()));
            },
        );
    }

    #[test]
    fn whoami_rejects_malformed_id() {
        temp_env::with_vars(CLEAR, || {
            let result = new().try_get_matches_from(vec!["custodia", "whoami", "--id", "nope"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn ttl_beyond_ten_years_is_rejected() {
        temp_env::with_vars(
            [
                ("CUSTODIA_REFRESH_TOKEN_TTL_SECONDS", Some("9000000000000")),
                ("CUSTODIA_ACCESS_TOKEN_TTL_SECONDS", None),
            ],
            || {
                let result = new().try_get_matches_from(vec!["custodia", "refresh", "--token", "t"]);
                assert!(result.is_err());

                let result = new().try_get_matches_from(vec![
                    "custodia",
                    "--access-token-ttl-seconds",
                    "315360000",
                    "refresh",
                    "--token",
                    "t",
                ]);
                assert!(result.is_ok());
            },
        );
    }
}
