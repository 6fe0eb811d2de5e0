use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::{
    auth::repo::{PgUserStore, UserStore},
    config::{AppConfig, StoreBackend},
    listings::repo::{ListingStore, PgListingStore},
    memory::MemoryStore,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub listings: Arc<dyn ListingStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        match config.store {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL must be set")?;
                let db = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;

                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;

                tracing::info!("using postgres store");
                Ok(Self {
                    users: Arc::new(PgUserStore::new(db.clone())),
                    listings: Arc::new(PgListingStore::new(db)),
                    config,
                })
            }
            StoreBackend::Memory => {
                tracing::warn!("using in-memory store; data is lost on restart");
                Ok(Self::in_memory(config))
            }
        }
    }

    pub fn in_memory(config: Arc<AppConfig>) -> Self {
        let store = Arc::new(MemoryStore::default());
        Self {
            config,
            users: store.clone() as Arc<dyn UserStore>,
            listings: store as Arc<dyn ListingStore>,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            store: StoreBackend::Memory,
            database_url: None,
            jwt: crate::config::JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60 * 24 * 7,
            },
            allowed_origins: crate::config::default_origins(),
            expose_error_details: true,
        });
        Self::in_memory(config)
    }
}
