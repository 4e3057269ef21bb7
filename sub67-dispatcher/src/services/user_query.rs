use sub67_shared::{AppError, AppResult, ErrorCode};

use crate::matching::filters::JobMatcher;
use crate::models::UserProfile;
use crate::store::UserRepo;

/// Candidates for the matcher's event: users in its district with
/// notifications and automation on, who also pass their own filters.
///
/// Failing to read the candidate set is the one error that aborts a dispatch.
pub async fn find_matching_users(
    users: &dyn UserRepo,
    matcher: &JobMatcher<'_>,
) -> AppResult<Vec<UserProfile>> {
    let district_id = &matcher.event().district_id;

    let candidates = users
        .find_notifiable_in_district(district_id)
        .await
        .map_err(|e| {
            tracing::error!(district_id = %district_id, error = %e, "candidate query failed");
            AppError::with_details(
                ErrorCode::CandidateQueryFailed,
                "failed to load candidate users",
                serde_json::json!({ "district_id": district_id, "cause": e.to_string() }),
            )
        })?;

    let total = candidates.len();
    let matched: Vec<UserProfile> = candidates
        .into_iter()
        .filter(|user| user.automation_active)
        .filter(|user| {
            let decision = matcher.evaluate(user);
            if !decision.is_accepted() {
                tracing::debug!(user_id = %user.id, ?decision, "user filtered out");
            }
            decision.is_accepted()
        })
        .collect();

    tracing::info!(
        district_id = %district_id,
        candidates = total,
        matched = matched.len(),
        "matched users for job event"
    );

    Ok(matched)
}
