use eyre::Result;
use serde::{Deserialize, Serialize};

use crate::config::GitHubConfig;
use crate::error::OAuthError;

/// Trades an authorization code for an access/refresh token pair.
#[allow(async_fn_in_trait)]
pub trait ExchangeCode: Send + Sync {
    async fn exchange_code(&self, code: &str, state: &str) -> Result<TokenPair, OAuthError>;
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// GitHub reports some exchange failures as HTTP 200 with an `error` field
/// in the body, so every field here has to be optional.
#[derive(Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            token_url: format!(
                "{}/login/oauth/access_token",
                config.base_url.trim_end_matches('/')
            ),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }
}

impl ExchangeCode for GitHubClient {
    async fn exchange_code(&self, code: &str, state: &str) -> Result<TokenPair, OAuthError> {
        let response = self
            .http
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("state", state),
            ])
            .send()
            .await
            .map_err(|e| OAuthError::UpstreamExchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OAuthError::UpstreamExchange(format!(
                "GitHub returned {status}"
            )));
        }

        let body: AccessTokenResponse = response
            .json()
            .await
            .map_err(|e| OAuthError::UpstreamExchange(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(OAuthError::UpstreamExchange(
                body.error_description.unwrap_or(error),
            ));
        }

        match body.access_token {
            Some(access_token) => Ok(TokenPair {
                access_token,
                refresh_token: body.refresh_token.unwrap_or_default(),
            }),
            None => Err(OAuthError::UpstreamExchange(
                "no access token in response".to_string(),
            )),
        }
    }
}
