//! Outbound notifications: mailing-list membership and verification emails.
//!
//! `LogNotifier` is the local-dev dispatcher and only logs what it would send.
//! `HttpNotifier` posts JSON to an email relay:
//!
//! - `POST {relay}/v1/lists/{list_id}/members` with `{ "name", "email" }`
//! - `POST {relay}/v1/messages/verification` with `{ "to", "name", "link" }`
//!
//! Any non-2xx response is an error carrying the status and the relay's
//! first reported error message, if any.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, error, info, instrument};
use url::Url;

use super::utils::verification_link;
use crate::APP_USER_AGENT;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Add the principal to the configured mailing list.
    async fn add_to_list(&self, name: &str, email: &str) -> Result<()>;

    /// Send the verification link carrying `code` to `email`.
    async fn send_verification_email(&self, email: &str, name: &str, code: &str) -> Result<()>;
}

/// Local dev notifier that logs instead of delivering.
#[derive(Clone, Debug)]
pub struct LogNotifier {
    frontend_base_url: String,
}

impl LogNotifier {
    #[must_use]
    pub fn new(frontend_base_url: impl Into<String>) -> Self {
        Self {
            frontend_base_url: frontend_base_url.into(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn add_to_list(&self, name: &str, email: &str) -> Result<()> {
        info!(name, email, "mailing list registration stub");
        Ok(())
    }

    async fn send_verification_email(&self, email: &str, name: &str, code: &str) -> Result<()> {
        let link = verification_link(&self.frontend_base_url, code);
        info!(to_email = email, name, link = %link, "verification email stub");
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct HttpNotifier {
    client: Client,
    relay_url: Url,
    list_id: String,
    frontend_base_url: String,
}

impl HttpNotifier {
    /// # Errors
    /// Returns an error if the relay URL is not an absolute http(s) URL or the
    /// HTTP client cannot be built.
    pub fn new(relay_url: &str, list_id: &str, frontend_base_url: &str) -> Result<Self> {
        let relay_url = Url::parse(relay_url).context("invalid email relay URL")?;
        match relay_url.scheme() {
            "http" | "https" => {}
            scheme => return Err(anyhow!("unsupported email relay scheme {scheme}")),
        }
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .context("failed to build email relay client")?;
        Ok(Self {
            client,
            relay_url,
            list_id: list_id.to_string(),
            frontend_base_url: frontend_base_url.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        // Keep any path prefix the relay URL already carries.
        let mut base = self.relay_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        let endpoint = base
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("failed to build relay endpoint {path}"))?;
        debug!("relay endpoint: {endpoint}");
        Ok(endpoint)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<()> {
        let endpoint = self.endpoint(path)?;
        let response = self
            .client
            .post(endpoint)
            .json(body)
            .send()
            .await
            .context("email relay request failed")?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let json_response: Value = response.json().await.unwrap_or(Value::Null);
        let error_message = json_response["errors"][0].as_str().unwrap_or_default();

        error!("email relay rejected request: {status} {error_message}");

        Err(anyhow!("{status}, {error_message}"))
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    #[instrument(skip(self))]
    async fn add_to_list(&self, name: &str, email: &str) -> Result<()> {
        let path = format!("v1/lists/{}/members", self.list_id);
        self.post(&path, &json!({ "name": name, "email": email }))
            .await
    }

    #[instrument(skip(self, code))]
    async fn send_verification_email(&self, email: &str, name: &str, code: &str) -> Result<()> {
        let link = verification_link(&self.frontend_base_url, code);
        self.post(
            "v1/messages/verification",
            &json!({ "to": email, "name": name, "link": link }),
        )
        .await
    }
}
