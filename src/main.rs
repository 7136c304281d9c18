use plantpal::{
    app::{build_app, serve},
    config::AppConfig,
    state::AppState,
};

fn init_tracing(config: &AppConfig) {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        format!(
            "plantpal={},axum=info,tower_http=info",
            config.log_level
        )
    });

    if config.json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(&config);

    if config.jwt.secret.is_empty() {
        tracing::warn!("JWT_SECRET is empty; tokens are signed with an empty key");
    }
    tracing::info!(environment = ?config.environment, "starting plantpal");

    let (host, port) = (config.host.clone(), config.port);
    let app_state = AppState::init(config).await?;
    serve(build_app(app_state), &host, port).await
}
