use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A time of day as published by the scraper: either a free-form string
/// (`"08:00 AM"`, `"14:30"`) or an already-computed minute count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeValue {
    Minutes(i64),
    Text(String),
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minutes(m) => write!(f, "{m}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for TimeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Structured fields parsed out of a job posting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// `YYYY-MM-DD` when the scraper could normalize it, otherwise the raw text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<TimeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<TimeValue>,
    /// Older scrapers publish `start`/`end` next to a blank `startTime`/`endTime`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<TimeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<TimeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_keyword: Option<String>,
}

/// One posted substitution job. Immutable once published.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_id: Option<String>,
    pub district_id: String,
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_text: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub job_data: JobData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<TimeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<TimeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl JobEvent {
    /// Stable content hash used as the job event's document id, so that
    /// re-scraping the same posting yields the same id.
    pub fn content_id(&self) -> String {
        let start = self.start().map(|t| t.to_string()).unwrap_or_default();
        let combined = format!(
            "{}|{}|{}|{}|{}",
            self.district_id,
            self.job_id,
            self.job_data.date.as_deref().unwrap_or_default(),
            start,
            self.job_data.location.as_deref().unwrap_or_default(),
        );
        hex::encode(Sha256::digest(combined.as_bytes()))
    }

    /// First non-blank of `jobData.startTime`, `jobData.start`, then the
    /// top-level `startTime`.
    pub fn start(&self) -> Option<&TimeValue> {
        first_present([
            self.job_data.start_time.as_ref(),
            self.job_data.start.as_ref(),
            self.start_time.as_ref(),
        ])
    }

    pub fn end(&self) -> Option<&TimeValue> {
        first_present([
            self.job_data.end_time.as_ref(),
            self.job_data.end.as_ref(),
            self.end_time.as_ref(),
        ])
    }

    pub fn title(&self) -> Option<&str> {
        non_empty(self.job_data.title.as_deref())
    }

    pub fn location(&self) -> Option<&str> {
        non_empty(self.job_data.location.as_deref())
    }

    pub fn teacher(&self) -> Option<&str> {
        non_empty(self.job_data.teacher.as_deref())
    }

    pub fn date(&self) -> Option<&str> {
        non_empty(self.job_data.date.as_deref())
    }
}

fn first_present<const N: usize>(candidates: [Option<&TimeValue>; N]) -> Option<&TimeValue> {
    candidates
        .into_iter()
        .flatten()
        .find(|t| !matches!(t, TimeValue::Text(s) if s.trim().is_empty()))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> JobEvent {
        serde_json::from_value(serde_json::json!({
            "source": "frontline",
            "controllerId": "controller_1",
            "districtId": "alpine_school_district",
            "jobId": "TEST123",
            "jobUrl": "https://example.com/job/TEST123",
            "snapshotText": "TITLE: Math Teacher\nDATE: 2026-01-06",
            "keywords": ["math", "teacher"],
            "jobData": {
                "title": "Math Teacher",
                "date": "2026-01-06",
                "startTime": "08:00 AM",
                "end": "03:00 PM",
                "location": "Test School",
                "teacher": "Test Teacher",
                "confirmationNumber": "TEST123"
            }
        }))
        .unwrap()
    }

    #[test]
    fn decodes_scraper_payload() {
        let event = sample();
        assert_eq!(event.district_id, "alpine_school_district");
        assert_eq!(event.start(), Some(&TimeValue::from("08:00 AM")));
        // `end` is read when `endTime` is absent
        assert_eq!(event.end(), Some(&TimeValue::from("03:00 PM")));
        assert_eq!(event.location(), Some("Test School"));
    }

    #[test]
    fn numeric_times_decode_as_minutes() {
        let data: JobData = serde_json::from_str(r#"{"startTime": 480}"#).unwrap();
        assert_eq!(data.start_time, Some(TimeValue::Minutes(480)));
    }

    #[test]
    fn top_level_start_time_is_a_fallback() {
        let mut event = sample();
        event.job_data.start_time = None;
        event.start_time = Some(TimeValue::Minutes(600));
        assert_eq!(event.start(), Some(&TimeValue::Minutes(600)));
    }

    #[test]
    fn blank_start_time_falls_back_to_start() {
        let data = serde_json::json!({
            "districtId": "D1",
            "jobId": "J1",
            "jobData": { "startTime": "", "start": "08:00 AM", "endTime": " ", "end": "03:00 PM" }
        });
        let event: JobEvent = serde_json::from_value(data).unwrap();
        assert_eq!(event.start(), Some(&TimeValue::from("08:00 AM")));
        assert_eq!(event.end(), Some(&TimeValue::from("03:00 PM")));
    }

    #[test]
    fn blank_job_data_times_fall_back_to_top_level() {
        let mut event = sample();
        event.job_data.start_time = Some(TimeValue::from(""));
        event.start_time = Some(TimeValue::from("09:15 AM"));
        assert_eq!(event.start(), Some(&TimeValue::from("09:15 AM")));

        event.start_time = None;
        assert_eq!(event.start(), None);
    }

    #[test]
    fn content_id_is_the_hash_of_identifying_fields() {
        let event = sample();
        let expected = hex::encode(Sha256::digest(
            b"alpine_school_district|TEST123|2026-01-06|08:00 AM|Test School",
        ));
        assert_eq!(event.content_id(), expected);

        let mut rescraped = sample();
        rescraped.snapshot_text = Some("different snapshot".into());
        assert_eq!(rescraped.content_id(), expected);
    }

    #[test]
    fn blank_fields_are_treated_as_missing() {
        let mut event = sample();
        event.job_data.teacher = Some("   ".into());
        assert_eq!(event.teacher(), None);
    }
}
