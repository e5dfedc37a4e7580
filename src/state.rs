use std::sync::Arc;

use crate::auth::repo::{PgUserStore, UserStore};
use crate::clock::{repo::PgSessionStore, ClockService};
use crate::config::AppConfig;
use crate::db;
use crate::time_utils::SystemClock;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub clock: ClockService,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let pool = db::connect(&config.store).await?;
        db::migrate(&pool).await?;

        let timeout = config.store.timeout;
        let users = Arc::new(PgUserStore::new(pool.clone(), timeout)) as Arc<dyn UserStore>;
        let clock = ClockService::new(
            Arc::new(PgSessionStore::new(pool, timeout)),
            Arc::new(SystemClock),
            config.clock.utc_offset,
        );

        Ok(Self::from_parts(config, users, clock))
    }

    pub fn from_parts(config: Arc<AppConfig>, users: Arc<dyn UserStore>, clock: ClockService) -> Self {
        Self {
            config,
            users,
            clock,
        }
    }
}
