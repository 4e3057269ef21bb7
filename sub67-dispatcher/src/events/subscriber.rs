use std::sync::Arc;

use futures_lite::StreamExt;
use lapin::options::{BasicAckOptions, BasicNackOptions, BasicRejectOptions};

use sub67_shared::types::event::{payloads, routing_keys, Event};
use sub67_shared::{AppError, AppResult, ErrorCode, JobEvent};

use crate::models::DispatchOutcome;
use crate::services::dispatch_service::Dispatcher;
use crate::AppState;

pub const JOB_EVENT_QUEUE: &str = "sub67-dispatcher.job_event.created";

/// What to tell the broker about a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    /// Redeliver later; the dispatch could not start.
    Requeue,
    /// Drop; the message can never be processed.
    Reject,
}

/// Decode a `job_event.created` message into its event id and job event.
pub fn decode_job_event(body: &[u8]) -> AppResult<(String, JobEvent)> {
    let event: Event<payloads::JobEventCreated> = serde_json::from_slice(body).map_err(|e| {
        AppError::new(ErrorCode::InvalidJobEvent, format!("malformed job event message: {e}"))
    })?;

    let job_event = &event.data.job_event;
    if job_event.district_id.trim().is_empty() || job_event.job_id.trim().is_empty() {
        return Err(AppError::new(
            ErrorCode::InvalidJobEvent,
            "job event is missing districtId or jobId",
        ));
    }

    let event_id = event.data.resolved_event_id();
    Ok((event_id, event.data.job_event))
}

pub async fn handle_job_event(dispatcher: &Dispatcher, body: &[u8]) -> (Disposition, Option<DispatchOutcome>) {
    let (event_id, job_event) = match decode_job_event(body) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::error!(error = %e, code = e.code(), "rejecting undecodable job event");
            return (Disposition::Reject, None);
        }
    };

    match dispatcher.dispatch(&event_id, &job_event).await {
        Ok(outcome) => (Disposition::Ack, Some(outcome)),
        Err(e) => {
            tracing::error!(event_id = %event_id, error = %e, code = e.code(), "dispatch failed, requeueing");
            (Disposition::Requeue, None)
        }
    }
}

/// Listen for job event creations and dispatch each one in turn.
pub async fn listen_job_events(state: Arc<AppState>) -> anyhow::Result<()> {
    let mut consumer = state.rabbitmq.subscribe(
        JOB_EVENT_QUEUE,
        &[routing_keys::SCRAPER_JOB_EVENT_CREATED],
        state.config.prefetch,
    ).await?;

    tracing::info!("listening for job events");

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                let (disposition, _) = handle_job_event(&state.dispatcher, &delivery.data).await;

                let result = match disposition {
                    Disposition::Ack => delivery.ack(BasicAckOptions::default()).await,
                    Disposition::Requeue => {
                        delivery
                            .nack(BasicNackOptions {
                                requeue: true,
                                ..Default::default()
                            })
                            .await
                    }
                    Disposition::Reject => delivery.reject(BasicRejectOptions { requeue: false }).await,
                };

                if let Err(e) = result {
                    tracing::error!(error = %e, ?disposition, "failed to settle delivery");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "job event consumer error");
            }
        }
    }

    Ok(())
}
