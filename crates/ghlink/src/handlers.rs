use crate::{error::OAuthError, github::TokenPair, oauth::RedirectUrl, AppState};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::info;

// GET /health
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectParams {
    pub host: String,
    pub ghe_uuid: Option<String>,
}

// GET /rest/oauth/redirectUrl
pub async fn get_redirect_url(
    State(state): State<AppState>,
    Query(params): Query<RedirectParams>,
) -> Result<Json<RedirectUrl>, OAuthError> {
    let redirect = state
        .oauth
        .redirect_url(&params.host, params.ghe_uuid.as_deref())
        .await?;

    info!(host = %params.host, "issued authorize redirect");

    Ok(Json(redirect))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackParams {
    pub host: String,
    pub ghe_uuid: Option<String>,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub state: String,
}

// GET /rest/app/cloud/github-callback
pub async fn github_callback(
    State(app): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<TokenPair>, OAuthError> {
    let tokens = app
        .oauth
        .exchange(
            &params.host,
            params.ghe_uuid.as_deref(),
            &params.code,
            &params.state,
            &app.github,
        )
        .await?;

    info!(host = %params.host, "completed token exchange");

    Ok(Json(tokens))
}
