mod config;
mod error;
mod github;
mod handlers;
mod oauth;
mod store;

use std::path::PathBuf;
use std::str::FromStr;

use crate::config::{Config, StoreProvider};
use crate::github::GitHubClient;
use crate::oauth::OAuthService;
use crate::store::Store;
use axum::{routing::get, Router};
use clap::{command, Parser};
use eyre::Result;
use ghlink_moka::{MokaConfig, MokaStore};
use ghlink_redis::RedisStore;
use handlers::{get_redirect_url, github_callback, health_check};
use tracing_subscriber::{filter::LevelFilter, FmtSubscriber};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Clone)]
struct AppState {
    oauth: OAuthService<Store>,
    github: GitHubClient,
}

fn setup_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/rest/oauth/redirectUrl", get(get_redirect_url))
        .route("/rest/app/cloud/github-callback", get(github_callback))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config)?;

    FmtSubscriber::builder()
        .with_max_level(LevelFilter::from_str(&config.logging.level)?)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_ansi(true)
        .init();

    let store = match config.store.provider.clone() {
        Some(StoreProvider::Redis(config)) => Store::Redis(RedisStore::new(config).await?),
        Some(StoreProvider::Moka(config)) => Store::Moka(MokaStore::new(config).await?),
        None => Store::Moka(
            MokaStore::new(MokaConfig {
                max_capacity: 10_000,
                ttl: oauth::STATE_TTL,
            })
            .await?,
        ),
    };

    let state = AppState {
        oauth: OAuthService::new(store, &config.github)?,
        github: GitHubClient::new(&config.github)?,
    };

    let address = format!("{}:{}", config.server.address, config.server.port);
    let listener = tokio::net::TcpListener::bind(address).await?;
    let app = setup_app(state);

    axum::serve(listener, app).await?;

    Ok(())
}
