use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::{
    Admin, AdminProfile, Argon2Hasher, AuthConfig, Collaborators, HttpNotifier, JwtIssuer,
    ListRegistrar, LogNotifier, Notifier, PrincipalKind, RandomCodeGenerator, RegistrarConfig,
    SessionManager, UserProfile, UserStore,
    store::{PgAdminStore, PgUserStore, PrincipalStore},
};

const LIST_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub enum Operation {
    SignUp {
        name: String,
        email: String,
        password: SecretString,
    },
    SignIn {
        kind: PrincipalKind,
        email: String,
        password: SecretString,
    },
    Refresh {
        kind: PrincipalKind,
        token: SecretString,
    },
    Verify {
        code: String,
    },
    WhoAmI {
        kind: PrincipalKind,
        id: Uuid,
    },
    CreateAdmin {
        name: String,
        email: String,
        password: SecretString,
    },
}

#[derive(Debug)]
pub struct Args {
    pub dsn: SecretString,
    pub signing_key: SecretString,
    pub password_salt: SecretString,
    pub config: AuthConfig,
    pub frontend_base_url: String,
    pub email_relay_url: Option<String>,
    pub mailing_list_id: String,
    pub registrar: RegistrarConfig,
    pub operation: Operation,
}

/// Run one session-manager operation against Postgres and print its result
/// as JSON on stdout.
/// # Errors
/// Returns an error if setup fails or the operation is rejected.
pub async fn execute(args: Args) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(args.dsn.expose_secret())
        .await
        .context("failed to connect to database")?;

    let notifier: Arc<dyn Notifier> = match &args.email_relay_url {
        Some(url) => Arc::new(HttpNotifier::new(
            url,
            &args.mailing_list_id,
            &args.frontend_base_url,
        )?),
        None => Arc::new(LogNotifier::new(args.frontend_base_url.clone())),
    };

    let hasher = Argon2Hasher::new(&args.password_salt).context("invalid password salt")?;
    let tokens = JwtIssuer::new(args.signing_key).context("invalid signing key")?;
    let (registrar, worker) = ListRegistrar::spawn(Arc::clone(&notifier), args.registrar);

    let manager = SessionManager::new(
        Arc::new(PgUserStore::new(pool.clone())),
        Arc::new(PgAdminStore::new(pool.clone())),
        Collaborators {
            hasher: Arc::new(hasher),
            tokens: Arc::new(tokens),
            codes: Arc::new(RandomCodeGenerator),
            notifier,
            registrar,
        },
        &args.config,
    );

    let result = run(&manager, args.operation).await;

    // Dropping the manager closes the registration queue; wait for queued jobs.
    drop(manager);
    match timeout(LIST_DRAIN_TIMEOUT, worker).await {
        Ok(Ok(())) => debug!("mailing list worker drained"),
        Ok(Err(err)) => warn!("mailing list worker failed: {err}"),
        Err(_) => warn!("mailing list worker did not drain in time"),
    }
    pool.close().await;

    let output = result?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run<U, A>(manager: &SessionManager<U, A>, operation: Operation) -> Result<Value>
where
    U: UserStore,
    A: PrincipalStore<Principal = Admin>,
{
    let output = match operation {
        Operation::SignUp {
            name,
            email,
            password,
        } => {
            manager
                .users()
                .sign_up(&name, &email, password.expose_secret())
                .await?;
            json!({ "registered": true, "verification": "sent" })
        }
        Operation::SignIn {
            kind: PrincipalKind::User,
            email,
            password,
        } => serde_json::to_value(
            manager
                .users()
                .sign_in(&email, password.expose_secret())
                .await?,
        )?,
        Operation::SignIn {
            kind: PrincipalKind::Admin,
            email,
            password,
        } => serde_json::to_value(
            manager
                .admins()
                .sign_in(&email, password.expose_secret())
                .await?,
        )?,
        Operation::Refresh {
            kind: PrincipalKind::User,
            token,
        } => serde_json::to_value(
            manager
                .users()
                .refresh_tokens(token.expose_secret())
                .await?,
        )?,
        Operation::Refresh {
            kind: PrincipalKind::Admin,
            token,
        } => serde_json::to_value(
            manager
                .admins()
                .refresh_tokens(token.expose_secret())
                .await?,
        )?,
        Operation::Verify { code } => {
            manager.users().verify(&code).await?;
            json!({ "verified": true })
        }
        Operation::WhoAmI {
            kind: PrincipalKind::User,
            id,
        } => serde_json::to_value(UserProfile::from(&manager.users().get_by_id(id).await?))?,
        Operation::WhoAmI {
            kind: PrincipalKind::Admin,
            id,
        } => serde_json::to_value(AdminProfile::from(&manager.admins().get_by_id(id).await?))?,
        Operation::CreateAdmin {
            name,
            email,
            password,
        } => {
            let admin = manager
                .admins()
                .create(&name, &email, password.expose_secret())
                .await?;
            serde_json::to_value(AdminProfile::from(&admin))?
        }
    };
    Ok(output)
}
