use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::auth::{
    password::Argon2Hasher,
    repo::{InMemoryUserStore, PgUserStore, UserStore},
    services::AuthService,
    token::JwtIssuer,
};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let store: Arc<dyn UserStore> = match &config.database_url {
            Some(url) => {
                let db = PgPoolOptions::new()
                    .max_connections(10)
                    .acquire_timeout(Duration::from_secs(5))
                    .connect(url)
                    .await
                    .context("connect to database")?;
                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;
                info!("database connected");
                Arc::new(PgUserStore::new(db))
            }
            None => {
                warn!("DATABASE_URL not set; users are kept in memory");
                Arc::new(InMemoryUserStore::new())
            }
        };

        let auth = Arc::new(AuthService::new(
            store,
            Arc::new(Argon2Hasher::new()),
            Arc::new(JwtIssuer::from_config(&config.jwt)),
        ));

        Ok(Self::from_parts(config, auth))
    }

    pub fn from_parts(config: Arc<AppConfig>, auth: Arc<AuthService>) -> Self {
        Self { config, auth }
    }
}
