use sub67_shared::JobEvent;

use crate::matching::time::{normalize_job_date, parse_time_to_minutes, ranges_overlap};
use crate::models::Availability;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityDecision {
    Available,
    /// The user marked the whole day unavailable.
    DateBlocked,
    /// The user already has a job that day.
    AlreadyScheduled,
    /// The job's hours overlap the user's unavailable window for that day.
    PartiallyUnavailable,
}

impl AvailabilityDecision {
    pub fn is_available(self) -> bool {
        self == Self::Available
    }
}

/// Date/time exclusion rules, checked in order; the first hit rejects.
///
/// Missing information never rejects: an unparseable job date, an unknown
/// start or end time, or a half-specified window all pass.
pub fn check_availability(event: &JobEvent, availability: &Availability) -> AvailabilityDecision {
    let Some(job_date) = normalize_job_date(event.job_data.date.as_deref()) else {
        return AvailabilityDecision::Available;
    };

    if availability.blocked_dates.contains(&job_date) {
        return AvailabilityDecision::DateBlocked;
    }

    if availability.scheduled_dates.contains(&job_date) {
        return AvailabilityDecision::AlreadyScheduled;
    }

    if let Some(window) = availability.partial_windows.get(&job_date) {
        if let (Some(window_start), Some(window_end)) = (window.start_minutes, window.end_minutes) {
            let job_start = parse_time_to_minutes(event.start());
            let job_end = parse_time_to_minutes(event.end());
            if let (Some(job_start), Some(job_end)) = (job_start, job_end) {
                if ranges_overlap(job_start, job_end, window_start, window_end) {
                    return AvailabilityDecision::PartiallyUnavailable;
                }
            }
        }
    }

    AvailabilityDecision::Available
}
