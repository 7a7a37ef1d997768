use clap::{Arg, ArgMatches, Command};
use std::time::Duration;

use crate::auth::RegistrarConfig;

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_EMAIL_RELAY_URL: &str = "email-relay-url";
pub const ARG_MAILING_LIST_ID: &str = "mailing-list-id";
pub const ARG_LIST_QUEUE_CAPACITY: &str = "list-queue-capacity";
pub const ARG_LIST_MAX_ATTEMPTS: &str = "list-max-attempts";
pub const ARG_LIST_BACKOFF_BASE_SECONDS: &str = "list-backoff-base-seconds";
pub const ARG_LIST_BACKOFF_MAX_SECONDS: &str = "list-backoff-max-seconds";

#[derive(Debug)]
pub struct Options {
    pub frontend_base_url: String,
    pub relay_url: Option<String>,
    pub mailing_list_id: String,
    pub registrar: RegistrarConfig,
}

impl Options {
    /// Parse notification arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the mailing list id is empty.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let mailing_list_id = get_non_empty(ARG_MAILING_LIST_ID)
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_MAILING_LIST_ID}"))?;

        let mut registrar = RegistrarConfig::new();
        if let Some(capacity) = matches.get_one::<usize>(ARG_LIST_QUEUE_CAPACITY) {
            registrar = registrar.with_queue_capacity(*capacity);
        }
        if let Some(attempts) = matches.get_one::<u32>(ARG_LIST_MAX_ATTEMPTS) {
            registrar = registrar.with_max_attempts(*attempts);
        }
        if let Some(seconds) = matches.get_one::<u64>(ARG_LIST_BACKOFF_BASE_SECONDS) {
            registrar = registrar.with_backoff_base(Duration::from_secs(*seconds));
        }
        if let Some(seconds) = matches.get_one::<u64>(ARG_LIST_BACKOFF_MAX_SECONDS) {
            registrar = registrar.with_backoff_max(Duration::from_secs(*seconds));
        }

        Ok(Self {
            frontend_base_url: get_non_empty(ARG_FRONTEND_BASE_URL)
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            relay_url: get_non_empty(ARG_EMAIL_RELAY_URL),
            mailing_list_id,
            registrar,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL used for verification links")
                .env("CUSTODIA_FRONTEND_BASE_URL")
                .default_value("http://localhost:3000")
                .global(true),
        )
        .arg(
            Arg::new(ARG_EMAIL_RELAY_URL)
                .long(ARG_EMAIL_RELAY_URL)
                .help("Email relay base URL; emails are only logged when unset")
                .env("CUSTODIA_EMAIL_RELAY_URL")
                .global(true),
        )
        .arg(
            Arg::new(ARG_MAILING_LIST_ID)
                .long(ARG_MAILING_LIST_ID)
                .help("Mailing list new users are registered with")
                .env("CUSTODIA_MAILING_LIST_ID")
                .default_value("default")
                .global(true),
        );
    with_list_worker_args(command)
}

fn with_list_worker_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LIST_QUEUE_CAPACITY)
                .long(ARG_LIST_QUEUE_CAPACITY)
                .help("Pending mailing list registrations kept in memory")
                .env("CUSTODIA_LIST_QUEUE_CAPACITY")
                .default_value("64")
                .global(true)
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_LIST_MAX_ATTEMPTS)
                .long(ARG_LIST_MAX_ATTEMPTS)
                .help("Max attempts per mailing list registration")
                .env("CUSTODIA_LIST_MAX_ATTEMPTS")
                .default_value("3")
                .global(true)
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_LIST_BACKOFF_BASE_SECONDS)
                .long(ARG_LIST_BACKOFF_BASE_SECONDS)
                .help("Base delay for mailing list retry backoff")
                .env("CUSTODIA_LIST_BACKOFF_BASE_SECONDS")
                .default_value("1")
                .global(true)
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_LIST_BACKOFF_MAX_SECONDS)
                .long(ARG_LIST_BACKOFF_MAX_SECONDS)
                .help("Max delay for mailing list retry backoff")
                .env("CUSTODIA_LIST_BACKOFF_MAX_SECONDS")
                .default_value("30")
                .global(true)
                .value_parser(clap::value_parser!(u64)),
        )
}
