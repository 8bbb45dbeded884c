use std::sync::Arc;

use crate::config::{AppConfig, StoreBackend};
use crate::db::PgStore;
use crate::mailer::{LogMailer, Mailer};
use crate::memory::MemoryStore;
use crate::movies::MovieStore;
use crate::permissions::PermissionStore;
use crate::tokens::TokenStore;
use crate::users::UserStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub permissions: Arc<dyn PermissionStore>,
    pub movies: Arc<dyn MovieStore>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let mailer = Arc::new(LogMailer) as Arc<dyn Mailer>;

        match config.store {
            StoreBackend::Postgres => {
                let store = PgStore::connect(&config).await?;
                if let Err(e) = store.migrate().await {
                    tracing::warn!(error = %e, "migrations failed; continuing");
                }
                Ok(Self::from_store(config, Arc::new(store), mailer))
            }
            StoreBackend::Memory => {
                tracing::warn!("using in-memory store; data is lost on restart");
                Ok(Self::from_store(config, Arc::new(MemoryStore::new()), mailer))
            }
        }
    }

    /// Wire one backend into every store slot.
    pub fn from_store<S>(config: Arc<AppConfig>, store: Arc<S>, mailer: Arc<dyn Mailer>) -> Self
    where
        S: UserStore + TokenStore + PermissionStore + MovieStore + 'static,
    {
        Self {
            config,
            users: store.clone(),
            tokens: store.clone(),
            permissions: store.clone(),
            movies: store,
            mailer,
        }
    }

    /// In-memory state with a recording mailer, for tests.
    #[cfg(test)]
    pub fn fake() -> (Self, Arc<crate::mailer::RecordingMailer>) {
        let config = Arc::new(AppConfig {
            env: "test".into(),
            host: "127.0.0.1".into(),
            port: 0,
            store: StoreBackend::Memory,
            database_url: None,
            db_max_connections: 1,
            tokens: crate::config::TokenConfig::default(),
        });
        let mailer = Arc::new(crate::mailer::RecordingMailer::default());
        let state = Self::from_store(config, Arc::new(MemoryStore::new()), mailer.clone());
        (state, mailer)
    }
}
