use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message bus envelope wrapping all domain events.
///
/// Routing key format: `sub67.{domain}.{entity}.{action}`
/// Example: `sub67.scraper.job_event.created`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub user_id: Option<String>,
    pub data: T,
}

/// Message bus routing keys
pub mod routing_keys {
    // Scraper events
    pub const SCRAPER_JOB_EVENT_CREATED: &str = "sub67.scraper.job_event.created";
}

/// Event data payloads
pub mod payloads {
    use serde::{Deserialize, Serialize};

    use crate::types::job::JobEvent;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct JobEventCreated {
        /// Document id of the job event. Derived from the job content when absent.
        #[serde(default)]
        pub event_id: Option<String>,
        pub job_event: JobEvent,
    }

    impl JobEventCreated {
        pub fn resolved_event_id(&self) -> String {
            match &self.event_id {
                Some(id) if !id.trim().is_empty() => id.clone(),
                _ => self.job_event.content_id(),
            }
        }
    }
}
