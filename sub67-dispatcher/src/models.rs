use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use sub67_shared::{JobData, JobEvent};

use crate::matching::keywords::OrganizedKeywords;
use crate::schema::{job_event_deliveries, user_matched_jobs, users};

/// A time range on one date during which the user cannot work.
/// Either bound may be missing when the app saved an incomplete window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_minutes: Option<i64>,
    pub end_minutes: Option<i64>,
}

impl TimeWindow {
    pub fn new(start_minutes: i64, end_minutes: i64) -> Self {
        Self {
            start_minutes: Some(start_minutes),
            end_minutes: Some(end_minutes),
        }
    }
}

/// Calendar availability as maintained by the app. Dates are `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Availability {
    pub blocked_dates: BTreeSet<String>,
    pub scheduled_dates: BTreeSet<String>,
    pub partial_windows: BTreeMap<String, TimeWindow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordFilters {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl KeywordFilters {
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// The dispatcher's view of one app user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProfile {
    pub id: String,
    pub email: Option<String>,
    pub district_ids: Vec<String>,
    pub notify_enabled: bool,
    pub automation_active: bool,
    pub email_notifications: bool,
    pub push_tokens: Vec<String>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub apply_filter_enabled: bool,
    pub keyword_filters: KeywordFilters,
    pub availability: Availability,
}

impl UserProfile {
    pub fn is_subscription_active(&self, now: DateTime<Utc>) -> bool {
        self.subscription_ends_at.is_some_and(|ends_at| ends_at > now)
    }

    /// Keyword filters only apply to subscribers who switched them on.
    pub fn keyword_filtering_active(&self, now: DateTime<Utc>) -> bool {
        self.apply_filter_enabled && self.is_subscription_active(now)
    }

    pub fn email_address(&self) -> Option<&str> {
        if !self.email_notifications {
            return None;
        }
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRecord {
    pub event_id: String,
    pub user_id: String,
    pub delivered_at: DateTime<Utc>,
}

/// Per-user copy of a matched job, shown in the app's job list.
#[derive(Debug, Clone, PartialEq)]
pub struct UserMatchedJobRecord {
    pub user_id: String,
    pub event_id: String,
    pub job_id: String,
    pub job_url: Option<String>,
    pub district_id: String,
    pub controller_id: Option<String>,
    pub snapshot_text: Option<String>,
    pub job_data: JobData,
    pub matched_keywords: Vec<String>,
    pub organized_keywords: OrganizedKeywords,
    pub all_keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub notified_at: DateTime<Utc>,
}

impl UserMatchedJobRecord {
    pub fn new(
        user_id: &str,
        event_id: &str,
        event: &JobEvent,
        matched_keywords: Vec<String>,
        organized_keywords: OrganizedKeywords,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            event_id: event_id.to_string(),
            job_id: event.job_id.clone(),
            job_url: event.job_url.clone(),
            district_id: event.district_id.clone(),
            controller_id: event.controller_id.clone(),
            snapshot_text: event.snapshot_text.clone(),
            job_data: event.job_data.clone(),
            matched_keywords,
            organized_keywords,
            all_keywords: event.keywords.clone(),
            created_at: now,
            notified_at: now,
        }
    }
}

// -- Database rows --

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = users)]
pub struct UserRow {
    pub id: String,
    pub email: Option<String>,
    pub district_ids: Vec<String>,
    pub notify_enabled: bool,
    pub automation_active: bool,
    pub email_notifications: bool,
    pub fcm_tokens: Vec<String>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub apply_filter_enabled: bool,
    pub included_ls: Option<Vec<String>>,
    pub exclude_ls: Option<Vec<String>>,
    pub automation_config: Option<serde_json::Value>,
    pub excluded_dates: Vec<String>,
    pub scheduled_job_dates: Vec<String>,
    pub partial_availability_by_date: Option<serde_json::Value>,
}

/// Filter lists saved by the older Filters screen.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyAutomationConfig {
    #[serde(default)]
    included_words: Option<Vec<String>>,
    #[serde(default)]
    excluded_words: Option<Vec<String>>,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        let legacy = row
            .automation_config
            .and_then(|v| match serde_json::from_value::<LegacyAutomationConfig>(v) {
                Ok(cfg) => Some(cfg),
                Err(e) => {
                    tracing::warn!(user_id = %row.id, error = %e, "ignoring malformed automation_config");
                    None
                }
            })
            .unwrap_or_default();

        // The newer fields win whenever they are present, even if empty.
        let keyword_filters = KeywordFilters {
            include: row.included_ls.or(legacy.included_words).unwrap_or_default(),
            exclude: row.exclude_ls.or(legacy.excluded_words).unwrap_or_default(),
        };

        let partial_windows = row
            .partial_availability_by_date
            .map(parse_partial_windows)
            .unwrap_or_default();

        Self {
            id: row.id,
            email: row.email,
            district_ids: row.district_ids,
            notify_enabled: row.notify_enabled,
            automation_active: row.automation_active,
            email_notifications: row.email_notifications,
            push_tokens: row.fcm_tokens,
            subscription_ends_at: row.subscription_ends_at,
            apply_filter_enabled: row.apply_filter_enabled,
            keyword_filters,
            availability: Availability {
                blocked_dates: row.excluded_dates.into_iter().collect(),
                scheduled_dates: row.scheduled_job_dates.into_iter().collect(),
                partial_windows,
            },
        }
    }
}

/// `{"2026-01-06": {"startMinutes": 480, "endMinutes": 720}, ...}`
///
/// Non-integer bounds are dropped rather than failing the whole map.
fn parse_partial_windows(value: serde_json::Value) -> BTreeMap<String, TimeWindow> {
    let serde_json::Value::Object(entries) = value else {
        return BTreeMap::new();
    };

    entries
        .into_iter()
        .filter_map(|(date, window)| {
            let window = window.as_object()?;
            Some((
                date,
                TimeWindow {
                    start_minutes: window.get("startMinutes").and_then(serde_json::Value::as_i64),
                    end_minutes: window.get("endMinutes").and_then(serde_json::Value::as_i64),
                },
            ))
        })
        .collect()
}

#[derive(Debug, Insertable)]
#[diesel(table_name = job_event_deliveries)]
pub struct NewDelivery<'a> {
    pub event_id: &'a str,
    pub user_id: &'a str,
    pub delivered_at: DateTime<Utc>,
}

impl<'a> From<&'a DeliveryRecord> for NewDelivery<'a> {
    fn from(record: &'a DeliveryRecord) -> Self {
        Self {
            event_id: &record.event_id,
            user_id: &record.user_id,
            delivered_at: record.delivered_at,
        }
    }
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = user_matched_jobs)]
pub struct NewUserMatchedJob {
    pub user_id: String,
    pub event_id: String,
    pub job_id: String,
    pub job_url: Option<String>,
    pub district_id: String,
    pub controller_id: Option<String>,
    pub snapshot_text: Option<String>,
    pub job_data: serde_json::Value,
    pub matched_keywords: Vec<String>,
    pub organized_keywords: serde_json::Value,
    pub all_keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub notified_at: DateTime<Utc>,
}

impl TryFrom<&UserMatchedJobRecord> for NewUserMatchedJob {
    type Error = serde_json::Error;

    fn try_from(record: &UserMatchedJobRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: record.user_id.clone(),
            event_id: record.event_id.clone(),
            job_id: record.job_id.clone(),
            job_url: record.job_url.clone(),
            district_id: record.district_id.clone(),
            controller_id: record.controller_id.clone(),
            snapshot_text: record.snapshot_text.clone(),
            job_data: serde_json::to_value(&record.job_data)?,
            matched_keywords: record.matched_keywords.clone(),
            organized_keywords: serde_json::to_value(&record.organized_keywords)?,
            all_keywords: record.all_keywords.clone(),
            created_at: record.created_at,
            notified_at: record.notified_at,
        })
    }
}

/// Aggregate result of dispatching one job event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub matched: usize,
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn row() -> UserRow {
        UserRow {
            id: "u1".into(),
            email: Some("sub@example.com".into()),
            district_ids: vec!["D1".into()],
            notify_enabled: true,
            automation_active: true,
            email_notifications: false,
            fcm_tokens: vec!["tok".into()],
            subscription_ends_at: None,
            apply_filter_enabled: false,
            included_ls: None,
            exclude_ls: None,
            automation_config: None,
            excluded_dates: vec!["2026-01-06".into()],
            scheduled_job_dates: vec![],
            partial_availability_by_date: None,
        }
    }

    #[test]
    fn newer_filter_fields_take_precedence() {
        let mut r = row();
        r.included_ls = Some(vec!["pe".into()]);
        r.automation_config = Some(serde_json::json!({
            "includedWords": ["math"],
            "excludedWords": ["half"],
        }));

        let profile = UserProfile::from(r);
        assert_eq!(profile.keyword_filters.include, vec!["pe"]);
        // exclude_ls absent, so the legacy list is used
        assert_eq!(profile.keyword_filters.exclude, vec!["half"]);
    }

    #[test]
    fn present_but_empty_new_field_still_wins() {
        let mut r = row();
        r.included_ls = Some(vec![]);
        r.automation_config = Some(serde_json::json!({ "includedWords": ["math"] }));

        let profile = UserProfile::from(r);
        assert!(profile.keyword_filters.include.is_empty());
    }

    #[test]
    fn malformed_legacy_config_is_ignored() {
        let mut r = row();
        r.automation_config = Some(serde_json::json!({ "includedWords": "math" }));
        assert!(UserProfile::from(r).keyword_filters.is_empty());
    }

    #[test]
    fn partial_windows_keep_integer_bounds_only() {
        let mut r = row();
        r.partial_availability_by_date = Some(serde_json::json!({
            "2026-01-06": { "startMinutes": 480, "endMinutes": 720 },
            "2026-01-07": { "startMinutes": 480.5, "endMinutes": 720 },
            "2026-01-08": "garbage",
        }));

        let windows = UserProfile::from(r).availability.partial_windows;
        assert_eq!(windows.get("2026-01-06"), Some(&TimeWindow::new(480, 720)));
        assert_eq!(
            windows.get("2026-01-07"),
            Some(&TimeWindow { start_minutes: None, end_minutes: Some(720) })
        );
        assert!(!windows.contains_key("2026-01-08"));
    }

    #[test]
    fn subscription_must_end_in_the_future() {
        let now = Utc::now();
        let mut profile = UserProfile::from(row());
        assert!(!profile.is_subscription_active(now));

        profile.subscription_ends_at = Some(now - Duration::minutes(1));
        assert!(!profile.is_subscription_active(now));

        profile.subscription_ends_at = Some(now + Duration::days(30));
        assert!(profile.is_subscription_active(now));
        assert!(!profile.keyword_filtering_active(now));

        profile.apply_filter_enabled = true;
        assert!(profile.keyword_filtering_active(now));
    }

    #[test]
    fn email_requires_opt_in_and_address() {
        let mut profile = UserProfile::from(row());
        assert_eq!(profile.email_address(), None);

        profile.email_notifications = true;
        assert_eq!(profile.email_address(), Some("sub@example.com"));

        profile.email = Some("  ".into());
        assert_eq!(profile.email_address(), None);
    }
}
