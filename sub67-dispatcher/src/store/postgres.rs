use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::{Array, Text};

use sub67_shared::clients::db::DbPool;
use sub67_shared::{AppError, AppResult};

use super::{DeliveryRepo, HistogramRepo, MatchedJobRepo, UserRepo};
use crate::models::{
    DeliveryRecord, NewDelivery, NewUserMatchedJob, UserMatchedJobRecord, UserProfile, UserRow,
};
use crate::schema::{job_event_deliveries, job_time_histograms, user_matched_jobs, users};

/// Run a blocking Diesel operation on the blocking thread pool.
async fn with_conn<T, F>(pool: &DbPool, op: F) -> AppResult<T>
where
    F: FnOnce(&mut PgConnection) -> QueryResult<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection");
            AppError::internal("database connection error")
        })?;
        op(&mut conn).map_err(AppError::from)
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("database task failed: {e}")))?
}

pub struct PostgresUserRepo {
    pool: DbPool,
}

impl PostgresUserRepo {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserRepo for PostgresUserRepo {
    async fn find_notifiable_in_district(&self, district_id: &str) -> AppResult<Vec<UserProfile>> {
        let district = vec![district_id.to_string()];
        let rows = with_conn(&self.pool, move |conn| {
            users::table
                .filter(users::district_ids.contains(district))
                .filter(users::notify_enabled.eq(true))
                .select(UserRow::as_select())
                .load::<UserRow>(conn)
        })
        .await?;

        Ok(rows.into_iter().map(UserProfile::from).collect())
    }

    async fn remove_push_tokens(&self, user_id: &str, tokens: &[String]) -> AppResult<()> {
        if tokens.is_empty() {
            return Ok(());
        }

        let user_id = user_id.to_string();
        let tokens = tokens.to_vec();
        with_conn(&self.pool, move |conn| {
            // Single statement so concurrent prunes of the same row compose.
            diesel::sql_query(
                "UPDATE users \
                 SET fcm_tokens = ARRAY(SELECT t FROM unnest(fcm_tokens) AS t WHERE NOT (t = ANY($1))) \
                 WHERE id = $2",
            )
            .bind::<Array<Text>, _>(tokens)
            .bind::<Text, _>(user_id)
            .execute(conn)
        })
        .await?;

        Ok(())
    }
}

pub struct PostgresDeliveryRepo {
    pool: DbPool,
}

impl PostgresDeliveryRepo {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DeliveryRepo for PostgresDeliveryRepo {
    async fn exists(&self, event_id: &str, user_id: &str) -> AppResult<bool> {
        let event_id = event_id.to_string();
        let user_id = user_id.to_string();
        with_conn(&self.pool, move |conn| {
            diesel::select(diesel::dsl::exists(
                job_event_deliveries::table
                    .filter(job_event_deliveries::event_id.eq(event_id))
                    .filter(job_event_deliveries::user_id.eq(user_id)),
            ))
            .get_result::<bool>(conn)
        })
        .await
    }

    async fn insert(&self, record: &DeliveryRecord) -> AppResult<()> {
        let record = record.clone();
        with_conn(&self.pool, move |conn| {
            diesel::insert_into(job_event_deliveries::table)
                .values(NewDelivery::from(&record))
                .on_conflict_do_nothing()
                .execute(conn)
        })
        .await?;

        Ok(())
    }
}

pub struct PostgresMatchedJobRepo {
    pool: DbPool,
}

impl PostgresMatchedJobRepo {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MatchedJobRepo for PostgresMatchedJobRepo {
    async fn save(&self, record: &UserMatchedJobRecord) -> AppResult<()> {
        let row = NewUserMatchedJob::try_from(record).map_err(|e| AppError::Internal(e.into()))?;
        with_conn(&self.pool, move |conn| {
            diesel::insert_into(user_matched_jobs::table)
                .values(&row)
                .on_conflict((user_matched_jobs::user_id, user_matched_jobs::event_id))
                .do_update()
                .set(&row)
                .execute(conn)
        })
        .await?;

        Ok(())
    }
}

pub struct PostgresHistogramRepo {
    pool: DbPool,
}

impl PostgresHistogramRepo {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl HistogramRepo for PostgresHistogramRepo {
    async fn increment(&self, scope_id: &str, bucket: u8, at: DateTime<Utc>) -> AppResult<()> {
        let scope_id = scope_id.to_string();
        with_conn(&self.pool, move |conn| {
            diesel::insert_into(job_time_histograms::table)
                .values((
                    job_time_histograms::scope_id.eq(scope_id),
                    job_time_histograms::bucket.eq(i32::from(bucket)),
                    job_time_histograms::hits.eq(1i64),
                    job_time_histograms::updated_at.eq(at),
                ))
                .on_conflict((job_time_histograms::scope_id, job_time_histograms::bucket))
                .do_update()
                .set((
                    job_time_histograms::hits.eq(job_time_histograms::hits + 1i64),
                    job_time_histograms::updated_at.eq(at),
                ))
                .execute(conn)
        })
        .await?;

        Ok(())
    }
}
