use chrono::{DateTime, Utc};

use sub67_shared::JobEvent;

use crate::matching::availability::{check_availability, AvailabilityDecision};
use crate::matching::keywords::EventText;
use crate::models::UserProfile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Unavailable(AvailabilityDecision),
    NoIncludeMatch,
    Excluded { term: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Accepted,
    Rejected(RejectReason),
}

impl FilterDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Decides relevance of one job event for any number of users.
///
/// Availability is an absolute gate. Keyword filters only run for users
/// who opted in and hold an active subscription; include terms are an
/// allow-list (any one suffices) and exclude terms then veto.
pub struct JobMatcher<'a> {
    event: &'a JobEvent,
    text: EventText,
    now: DateTime<Utc>,
}

impl<'a> JobMatcher<'a> {
    pub fn new(event: &'a JobEvent, now: DateTime<Utc>) -> Self {
        Self {
            event,
            text: EventText::new(event.snapshot_text.as_deref(), &event.keywords),
            now,
        }
    }

    pub fn evaluate(&self, user: &UserProfile) -> FilterDecision {
        let availability = check_availability(self.event, &user.availability);
        if !availability.is_available() {
            return FilterDecision::Rejected(RejectReason::Unavailable(availability));
        }

        if !user.keyword_filtering_active(self.now) {
            return FilterDecision::Accepted;
        }

        // Blank terms are not filter entries: they neither match nor count.
        let include: Vec<&String> = non_blank(&user.keyword_filters.include).collect();
        let exclude: Vec<&String> = non_blank(&user.keyword_filters.exclude).collect();
        if include.is_empty() && exclude.is_empty() {
            return FilterDecision::Accepted;
        }

        if !include.is_empty() && !include.iter().any(|term| self.text.matches(term)) {
            return FilterDecision::Rejected(RejectReason::NoIncludeMatch);
        }

        if let Some(term) = exclude.into_iter().find(|term| self.text.matches(term)) {
            return FilterDecision::Rejected(RejectReason::Excluded { term: term.clone() });
        }

        FilterDecision::Accepted
    }

    pub fn matches_user_filters(&self, user: &UserProfile) -> bool {
        self.evaluate(user).is_accepted()
    }

    /// The user's include terms that this event satisfies, in the user's
    /// order. Empty unless keyword filtering is active for the user.
    pub fn matched_keywords(&self, user: &UserProfile) -> Vec<String> {
        if !user.keyword_filtering_active(self.now) {
            return Vec::new();
        }

        user.keyword_filters
            .include
            .iter()
            .filter(|term| self.text.matches(term))
            .cloned()
            .collect()
    }

    pub fn filtering_active(&self, user: &UserProfile) -> bool {
        user.keyword_filtering_active(self.now)
    }

    pub fn event(&self) -> &JobEvent {
        self.event
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

fn non_blank(terms: &[String]) -> impl Iterator<Item = &String> {
    terms.iter().filter(|term| !term.trim().is_empty())
}
