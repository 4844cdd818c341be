use std::time::Duration;

mod admission;
mod app;
mod auth;
mod config;
mod coverletters;
mod errors;
mod extract;
mod llm;
mod render;
mod state;

const LIMITER_PURGE_EVERY: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "coverletter_api=debug,axum=info,tower_http=info".to_string());
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

    let app_state = state::AppState::init().await?;

    if let Err(e) = sqlx::migrate!("./migrations").run(&app_state.db).await {
        tracing::warn!(error = %e, "migration failed; continuing");
    }

    let admission = app_state.admission.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(LIMITER_PURGE_EVERY);
        loop {
            tick.tick().await;
            admission.purge_stale();
        }
    });

    app::serve(app::build_app(app_state)).await
}
