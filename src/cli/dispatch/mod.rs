//! Map parsed CLI arguments to an action.

use crate::auth::PrincipalKind;
use crate::cli::actions::{
    Action,
    account::{self, Operation},
    migrate,
};
use crate::cli::commands::{
    ARG_CODE, ARG_DSN, ARG_EMAIL, ARG_ID, ARG_NAME, ARG_PASSWORD, ARG_TOKEN, auth, email,
};
use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use secrecy::SecretString;
use uuid::Uuid;

fn required(matches: &ArgMatches, id: &str) -> Result<String> {
    matches
        .get_one::<String>(id)
        .cloned()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("missing required argument: --{id}"))
}

fn required_secret(matches: &ArgMatches, id: &str) -> Result<SecretString> {
    required(matches, id).map(SecretString::from)
}

fn required_id(matches: &ArgMatches) -> Result<Uuid> {
    matches
        .get_one::<Uuid>(ARG_ID)
        .copied()
        .context("missing required argument: --id")
}

fn sign_in(kind: PrincipalKind, sub: &ArgMatches) -> Result<Operation> {
    Ok(Operation::SignIn {
        kind,
        email: required(sub, ARG_EMAIL)?,
        password: required_secret(sub, ARG_PASSWORD)?,
    })
}

fn refresh(kind: PrincipalKind, sub: &ArgMatches) -> Result<Operation> {
    Ok(Operation::Refresh {
        kind,
        token: required_secret(sub, ARG_TOKEN)?,
    })
}

fn operation(matches: &ArgMatches) -> Result<Operation> {
    match matches.subcommand() {
        Some(("signup", sub)) => Ok(Operation::SignUp {
            name: required(sub, ARG_NAME)?,
            email: required(sub, ARG_EMAIL)?,
            password: required_secret(sub, ARG_PASSWORD)?,
        }),
        Some(("signin", sub)) => sign_in(PrincipalKind::User, sub),
        Some(("refresh", sub)) => refresh(PrincipalKind::User, sub),
        Some(("verify", sub)) => Ok(Operation::Verify {
            code: required(sub, ARG_CODE)?,
        }),
        Some(("whoami", sub)) => Ok(Operation::WhoAmI {
            kind: PrincipalKind::User,
            id: required_id(sub)?,
        }),
        Some(("admin", admin)) => match admin.subcommand() {
            Some(("create", sub)) => Ok(Operation::CreateAdmin {
                name: required(sub, ARG_NAME)?,
                email: required(sub, ARG_EMAIL)?,
                password: required_secret(sub, ARG_PASSWORD)?,
            }),
            Some(("signin", sub)) => sign_in(PrincipalKind::Admin, sub),
            Some(("refresh", sub)) => refresh(PrincipalKind::Admin, sub),
            Some(("whoami", sub)) => Ok(Operation::WhoAmI {
                kind: PrincipalKind::Admin,
                id: required_id(sub)?,
            }),
            Some((name, _)) => Err(anyhow!("unknown admin command: {name}")),
            None => Err(anyhow!("missing admin command")),
        },
        Some((name, _)) => Err(anyhow!("unknown command: {name}")),
        None => Err(anyhow!("missing command")),
    }
}

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let dsn = required_secret(matches, ARG_DSN)?;

    if matches.subcommand_name() == Some("migrate") {
        return Ok(Action::Migrate(migrate::Args { dsn }));
    }

    let operation = operation(matches)?;
    let auth_opts = auth::Options::parse(matches)?;
    let email_opts = email::Options::parse(matches)?;

    Ok(Action::Account(account::Args {
        dsn,
        signing_key: auth_opts.signing_key,
        password_salt: auth_opts.password_salt,
        config: auth_opts.config,
        frontend_base_url: email_opts.frontend_base_url,
        email_relay_url: email_opts.relay_url,
        mailing_list_id: email_opts.mailing_list_id,
        registrar: email_opts.registrar,
        operation,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::RotationPolicy;
    use secrecy::ExposeSecret;

    const ENV: [(&str, Option<&str>); 7] = [
        ("CUSTODIA_DSN", Some("postgres://localhost:5432/custodia")),
        ("CUSTODIA_SIGNING_KEY", Some("signing-key")),
        ("CUSTODIA_PASSWORD_SALT", Some("salt")),
        ("CUSTODIA_PASSWORD", None),
        ("CUSTODIA_STRICT_ROTATION", None),
        ("CUSTODIA_EMAIL_RELAY_URL", None),
        ("CUSTODIA_REFRESH_TOKEN_TTL_SECONDS", None),
    ];

    fn dispatch(args: Vec<&str>) -> Result<Action> {
        let matches = crate::cli::commands::new().try_get_matches_from(args)?;
        handler(&matches)
    }

    #[test]
    fn dsn_required() {
        temp_env::with_vars(
            [
                ("CUSTODIA_DSN", None::<&str>),
                ("CUSTODIA_SIGNING_KEY", Some("signing-key")),
                ("CUSTODIA_PASSWORD_SALT", Some("salt")),
            ],
            || {
                let result = dispatch(vec!["custodia", "verify", "--code", "ABC123"]);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err.to_string().contains("missing required argument: --dsn"));
                }
            },
        );
    }

    #[test]
    fn signing_key_required_for_account_commands() {
        temp_env::with_vars(
            [
                ("CUSTODIA_DSN", Some("postgres://localhost:5432/custodia")),
                ("CUSTODIA_SIGNING_KEY", None),
                ("CUSTODIA_PASSWORD_SALT", Some("salt")),
            ],
            || {
                let result = dispatch(vec!["custodia", "verify", "--code", "ABC123"]);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(
                        err.to_string()
                            .contains("missing required argument: --signing-key")
                    );
                }
            },
        );
    }

    #[test]
    fn migrate_needs_only_dsn() {
        temp_env::with_vars(
            [
                ("CUSTODIA_DSN", Some("postgres://localhost:5432/custodia")),
                ("CUSTODIA_SIGNING_KEY", None),
                ("CUSTODIA_PASSWORD_SALT", None),
            ],
            || {
                let action = dispatch(vec!["custodia", "migrate"]);
                assert!(matches!(action, Ok(Action::Migrate(_))));
            },
        );
    }

    #[test]
    fn admin_refresh_with_strict_rotation() {
        temp_env::with_vars(ENV, || {
            let action = dispatch(vec![
                "custodia",
                "--strict-rotation",
                "--refresh-token-ttl-seconds",
                "60",
                "admin",
                "refresh",
                "--token",
                "opaque",
            ]);
            let Ok(Action::Account(args)) = action else {
                panic!("expected account action");
            };
            assert_eq!(args.config.rotation(), RotationPolicy::CompareAndSwap);
            assert_eq!(
                args.config.refresh_token_ttl().map(|ttl| ttl.num_seconds()),
                Some(60)
            );
            assert!(args.email_relay_url.is_none());
            assert_eq!(args.mailing_list_id, "default");
            let Operation::Refresh { kind, token } = args.operation else {
                panic!("expected refresh operation");
            };
            assert_eq!(kind, PrincipalKind::Admin);
            assert_eq!(token.expose_secret(), "opaque");
        });
    }

    #[test]
    fn whoami_parses_uuid() {
        temp_env::with_vars(ENV, || {
            let id = Uuid::now_v7();
            let id_arg = id.to_string();
            let action = dispatch(vec!["custodia", "whoami", "--id", &id_arg]);
            let Ok(Action::Account(args)) = action else {
                panic!("expected account action");
            };
            assert!(matches!(
                args.operation,
                Operation::WhoAmI { kind: PrincipalKind::User, id: parsed } if parsed == id
            ));
        });
    }
}
