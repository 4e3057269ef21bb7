pub mod composer;
pub mod dispatch_service;
pub mod histogram;
pub mod user_query;

use std::future::Future;

use sub67_shared::AppResult;

/// Run a non-critical operation. A failure is logged and discarded so it
/// can never change the outcome of the surrounding dispatch.
pub async fn best_effort<T, F>(operation: &'static str, fut: F) -> Option<T>
where
    F: Future<Output = AppResult<T>>,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(operation, error = %e, code = e.code(), "non-critical operation failed");
            None
        }
    }
}
