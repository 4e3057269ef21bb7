mod inmemory;
mod postgres;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use sub67_shared::clients::db::DbPool;
use sub67_shared::AppResult;

use crate::models::{DeliveryRecord, UserMatchedJobRecord, UserProfile};

pub use inmemory::{InMemoryDeliveryRepo, InMemoryHistogramRepo, InMemoryMatchedJobRepo, InMemoryUserRepo};
pub use postgres::{PostgresDeliveryRepo, PostgresHistogramRepo, PostgresMatchedJobRepo, PostgresUserRepo};

#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    /// Users whose district set contains `district_id` and who have
    /// notifications switched on.
    async fn find_notifiable_in_district(&self, district_id: &str) -> AppResult<Vec<UserProfile>>;

    /// Remove `tokens` from the user's push tokens, leaving any others
    /// (including ones added concurrently) in place.
    async fn remove_push_tokens(&self, user_id: &str, tokens: &[String]) -> AppResult<()>;
}

#[async_trait::async_trait]
pub trait DeliveryRepo: Send + Sync {
    async fn exists(&self, event_id: &str, user_id: &str) -> AppResult<bool>;
    async fn insert(&self, record: &DeliveryRecord) -> AppResult<()>;
}

#[async_trait::async_trait]
pub trait MatchedJobRepo: Send + Sync {
    /// Create or replace the user's copy of the matched job.
    async fn save(&self, record: &UserMatchedJobRecord) -> AppResult<()>;
}

#[async_trait::async_trait]
pub trait HistogramRepo: Send + Sync {
    async fn increment(&self, scope_id: &str, bucket: u8, at: DateTime<Utc>) -> AppResult<()>;
}

#[derive(Clone)]
pub struct Repos {
    pub users: Arc<dyn UserRepo>,
    pub deliveries: Arc<dyn DeliveryRepo>,
    pub matched_jobs: Arc<dyn MatchedJobRepo>,
    pub histograms: Arc<dyn HistogramRepo>,
}

impl Repos {
    pub fn create_postgres(pool: DbPool) -> Self {
        Self {
            users: Arc::new(PostgresUserRepo::new(pool.clone())),
            deliveries: Arc::new(PostgresDeliveryRepo::new(pool.clone())),
            matched_jobs: Arc::new(PostgresMatchedJobRepo::new(pool.clone())),
            histograms: Arc::new(PostgresHistogramRepo::new(pool)),
        }
    }
}
