use chrono::{DateTime, Utc};

use sub67_shared::{AppResult, JobEvent};

use crate::matching::time::parse_time_to_minutes;
use crate::store::HistogramRepo;

pub const BUCKET_MINUTES: i64 = 15;
pub const BUCKETS_PER_DAY: i64 = 24 * 60 / BUCKET_MINUTES;

pub const GLOBAL_SCOPE: &str = "global";

pub fn district_scope(district_id: &str) -> String {
    format!("district_{district_id}")
}

/// 15-minute bucket of the day a start time falls into, if it is on the clock.
pub fn bucket_index(start_minutes: i64) -> Option<u8> {
    if start_minutes < 0 {
        return None;
    }
    let bucket = start_minutes / BUCKET_MINUTES;
    if bucket >= BUCKETS_PER_DAY {
        return None;
    }
    u8::try_from(bucket).ok()
}

/// Count the event's start time in the global and per-district histograms.
///
/// Returns the bucket recorded, or `None` when the start time is unknown.
pub async fn record_start_time(
    histograms: &dyn HistogramRepo,
    event: &JobEvent,
    now: DateTime<Utc>,
) -> AppResult<Option<u8>> {
    let Some(bucket) = parse_time_to_minutes(event.start()).and_then(bucket_index) else {
        tracing::debug!(job_id = %event.job_id, "no usable start time, histogram not updated");
        return Ok(None);
    };

    histograms.increment(GLOBAL_SCOPE, bucket, now).await?;
    if !event.district_id.trim().is_empty() {
        histograms
            .increment(&district_scope(&event.district_id), bucket, now)
            .await?;
    }

    Ok(Some(bucket))
}
