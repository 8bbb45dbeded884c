use std::time::Duration;

use axum::extract::FromRef;

mod accounts;
mod app;
mod config;
mod db;
mod error;
mod extractors;
mod mailer;
mod memory;
mod movies;
mod permissions;
mod state;
#[cfg(test)]
mod testing;
mod tokens;
mod users;
mod validation;

use crate::{config::AppConfig, state::AppState, tokens::TokenService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "marquee=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let app_state = AppState::init(config).await?;

    let purge_every = app_state.config.tokens.purge_interval_secs;
    if purge_every > 0 {
        TokenService::from_ref(&app_state).spawn_purger(Duration::from_secs(purge_every));
    }

    let config = app_state.config.clone();
    let app = app::build_app(app_state);
    app::serve(app, &config).await
}
