use std::sync::Arc;

use chrono::{DateTime, Utc};
use handlebars::Handlebars;

use sub67_shared::{AppError, AppResult, ErrorCode, JobEvent};

use crate::matching::filters::JobMatcher;
use crate::matching::keywords::organize_keywords;
use crate::models::{DeliveryRecord, DispatchOutcome, UserMatchedJobRecord, UserProfile};
use crate::services::composer::{compose_email, compose_push, JobNotification, Links};
use crate::services::{best_effort, histogram, user_query};
use crate::store::Repos;
use crate::transport::{EmailTransport, PushTransport};

/// What happened to one matched user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserOutcome {
    Delivered,
    Failed,
    /// A delivery was already recorded for this user and event.
    Skipped,
}

impl UserOutcome {
    fn label(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

pub struct Dispatcher {
    repos: Repos,
    push: Arc<dyn PushTransport>,
    email: Option<Arc<dyn EmailTransport>>,
    links: Links,
    templates: Handlebars<'static>,
}

impl Dispatcher {
    pub fn new(
        repos: Repos,
        push: Arc<dyn PushTransport>,
        email: Option<Arc<dyn EmailTransport>>,
        links: Links,
        templates: Handlebars<'static>,
    ) -> Self {
        Self {
            repos,
            push,
            email,
            links,
            templates,
        }
    }

    pub async fn dispatch(&self, event_id: &str, event: &JobEvent) -> AppResult<DispatchOutcome> {
        self.dispatch_at(event_id, event, Utc::now()).await
    }

    /// Notify every matching user of `event` at most once.
    ///
    /// Per-user problems are counted in the outcome and never returned as
    /// errors. Only a failure to load the candidate users aborts.
    pub async fn dispatch_at(
        &self,
        event_id: &str,
        event: &JobEvent,
        now: DateTime<Utc>,
    ) -> AppResult<DispatchOutcome> {
        tracing::info!(
            event_id = %event_id,
            district_id = %event.district_id,
            job_id = %event.job_id,
            "processing job event"
        );
        metrics::counter!("dispatch_events_total").increment(1);

        best_effort(
            "histogram_increment",
            histogram::record_start_time(self.repos.histograms.as_ref(), event, now),
        )
        .await;

        let matcher = JobMatcher::new(event, now);
        let users = user_query::find_matching_users(self.repos.users.as_ref(), &matcher).await?;

        let mut outcome = DispatchOutcome {
            matched: users.len(),
            ..Default::default()
        };

        for user in &users {
            let result = self.process_user(event_id, &matcher, user).await;
            metrics::counter!("dispatch_users_total", "outcome" => result.label()).increment(1);
            match result {
                UserOutcome::Delivered => outcome.delivered += 1,
                UserOutcome::Failed => outcome.failed += 1,
                UserOutcome::Skipped => outcome.skipped += 1,
            }
        }

        tracing::info!(
            event_id = %event_id,
            matched = outcome.matched,
            delivered = outcome.delivered,
            failed = outcome.failed,
            skipped = outcome.skipped,
            "job event dispatched"
        );

        Ok(outcome)
    }

    async fn process_user(&self, event_id: &str, matcher: &JobMatcher<'_>, user: &UserProfile) -> UserOutcome {
        match self.repos.deliveries.exists(event_id, &user.id).await {
            Ok(true) => {
                tracing::debug!(event_id = %event_id, user_id = %user.id, "already delivered, skipping");
                return UserOutcome::Skipped;
            }
            Ok(false) => {}
            Err(e) => {
                // Without the marker we cannot tell whether a send would be a duplicate.
                let e = AppError::with_details(
                    ErrorCode::DeliveryLookupFailed,
                    "delivery lookup failed",
                    serde_json::json!({ "cause": e.to_string() }),
                );
                tracing::error!(event_id = %event_id, user_id = %user.id, error = %e, code = e.code(), "skipping user");
                return UserOutcome::Failed;
            }
        }

        let event = matcher.event();
        let now = matcher.now();
        let filtering_active = matcher.filtering_active(user);
        let matched_keywords = matcher.matched_keywords(user);
        let organized_keywords = organize_keywords(&event.keywords, &matched_keywords);

        let record = UserMatchedJobRecord::new(
            &user.id,
            event_id,
            event,
            matched_keywords.clone(),
            organized_keywords.clone(),
            now,
        );
        best_effort("save_matched_job", self.repos.matched_jobs.save(&record)).await;

        let notification = JobNotification {
            event,
            event_id,
            matched_keywords: &matched_keywords,
            organized_keywords: &organized_keywords,
            filtering_active,
        };

        let outcome = match self.send_push(&notification, user).await {
            Ok(()) => {
                let delivery = DeliveryRecord {
                    event_id: event_id.to_string(),
                    user_id: user.id.clone(),
                    delivered_at: now,
                };
                if let Err(e) = self.repos.deliveries.insert(&delivery).await {
                    tracing::error!(
                        event_id = %event_id,
                        user_id = %user.id,
                        error = %e,
                        "push sent but delivery marker not written"
                    );
                }
                tracing::info!(event_id = %event_id, user_id = %user.id, "notification delivered");
                UserOutcome::Delivered
            }
            Err(e) => {
                tracing::warn!(event_id = %event_id, user_id = %user.id, error = %e, code = e.code(), "push failed");
                UserOutcome::Failed
            }
        };

        if let (Some(transport), Some(address)) = (&self.email, user.email_address()) {
            let sent = best_effort("send_email", async {
                let content = compose_email(&self.templates, &notification, &self.links)?;
                transport.send_email(address, &content.subject, &content.html).await
            })
            .await;
            if sent.is_some() {
                tracing::info!(event_id = %event_id, user_id = %user.id, "email notification sent");
            }
        }

        outcome
    }

    /// Send to all of the user's tokens. Succeeds if at least one token
    /// accepted the message, or if the user has no tokens at all.
    async fn send_push(&self, notification: &JobNotification<'_>, user: &UserProfile) -> AppResult<()> {
        if user.push_tokens.is_empty() {
            tracing::info!(user_id = %user.id, "user has no push tokens, nothing to send");
            return Ok(());
        }

        let message = compose_push(notification, &self.links)?;
        let response = self.push.send_multicast(&message, &user.push_tokens).await?;

        tracing::info!(
            user_id = %user.id,
            sent = response.success_count(),
            tokens = user.push_tokens.len(),
            "push batch sent"
        );

        let invalid = response.invalid_tokens();
        if !invalid.is_empty() {
            let pruned = best_effort(
                "prune_push_tokens",
                self.repos.users.remove_push_tokens(&user.id, &invalid),
            )
            .await;
            if pruned.is_some() {
                metrics::counter!("push_tokens_pruned_total").increment(invalid.len() as u64);
                tracing::info!(user_id = %user.id, count = invalid.len(), "removed invalid push tokens");
            }
        }

        if response.success_count() == 0 {
            return Err(AppError::with_details(
                ErrorCode::PushRejected,
                "no push token accepted the message",
                serde_json::json!({ "failures": response.failure_count() }),
            ));
        }

        Ok(())
    }
}
