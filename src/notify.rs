// Yo push API client
//
// Two calls: Yo a single user with a link, and Yo all of the account's
// subscribers (as known to the Yo service) with a link. A call succeeds only
// on HTTP 200 with a body of `{"success": true}`. Callers log failures and
// never retry.

use crate::error::NotifyError;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use yo9gag_config::{YoConfig, YO_API_TOKEN_LENGTH};

/// Outbound notification seam; the Yo client in production, a recorder in tests
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Yo `username` with `link`
    async fn yo(&self, username: &str, link: &str) -> Result<(), NotifyError>;

    /// Yo every subscriber of the account with `link`
    async fn yo_all(&self, link: &str) -> Result<(), NotifyError>;
}

#[derive(Clone)]
pub struct YoClient {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

#[derive(Deserialize)]
struct YoResponse {
    #[serde(default)]
    success: bool,
}

impl YoClient {
    /// Create a client; fails when the token is not a valid Yo API token
    pub fn new(config: &YoConfig) -> anyhow::Result<Self> {
        let length = config.api_token.chars().count();
        if length != YO_API_TOKEN_LENGTH {
            return Err(NotifyError::InvalidToken {
                expected: YO_API_TOKEN_LENGTH,
                actual: length,
            }
            .into());
        }

        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    async fn post(&self, path: &str, form: &[(&str, &str)]) -> Result<(), NotifyError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Calling Yo API");

        let response = self
            .client
            .post(&url)
            .form(form)
            .send()
            .await
            .map_err(|source| NotifyError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|source| NotifyError::Transport { url, source })?;

        check_response(status, body)
    }
}

fn check_response(status: u16, body: String) -> Result<(), NotifyError> {
    if status != 200 {
        return Err(NotifyError::Status { status, body });
    }

    let success = serde_json::from_str::<YoResponse>(&body)
        .map(|parsed| parsed.success)
        .unwrap_or(false);
    if !success {
        return Err(NotifyError::Unsuccessful { body });
    }

    Ok(())
}

#[async_trait]
impl Notifier for YoClient {
    async fn yo(&self, username: &str, link: &str) -> Result<(), NotifyError> {
        self.post(
            "/yo/",
            &[
                ("api_token", self.api_token.as_str()),
                ("username", username),
                ("link", link),
            ],
        )
        .await
    }

    async fn yo_all(&self, link: &str) -> Result<(), NotifyError> {
        self.post(
            "/yoall/",
            &[("api_token", self.api_token.as_str()), ("link", link)],
        )
        .await
    }
}
