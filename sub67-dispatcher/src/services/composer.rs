use std::collections::BTreeMap;
use std::sync::LazyLock;

use handlebars::Handlebars;
use regex::Regex;
use serde_json::json;

use sub67_shared::clients::fcm::PushMessage;
use sub67_shared::{AppError, AppResult, JobEvent};

use crate::matching::keywords::OrganizedKeywords;
use crate::templates::JOB_MATCH_EMAIL;

pub const DEFAULT_TITLE: &str = "New Job Available";
pub const DEFAULT_BODY: &str = "Tap to view the job details";
pub const NOTIFICATION_KIND: &str = "job_match";

const MAX_BODY_TITLE_CHARS: usize = 100;
const MAX_BODY_KEYWORDS: usize = 3;

static SNAPSHOT_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*TITLE:\s*(.+?)\s*$").expect("valid regex"));

/// Grade patterns, most specific first.
static GRADE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bpre-?k\b",
        r"(?i)\bkindergarten\b",
        r"(?i)\bgrade\s*\d{1,2}\b",
        r"(?i)\b\d{1,2}(?:st|nd|rd|th)\s+grade\b",
        r"\bK\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static REPEATED_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*([,/|-])(?:\s*[,/|-])+\s*").expect("valid regex"));

const SEPARATORS: &[char] = &[' ', ',', '-', '/', '|', ':', ';'];

/// Where links in notifications point.
#[derive(Debug, Clone)]
pub struct Links {
    pub deep_link_scheme: String,
    pub app_link_base: String,
}

impl Default for Links {
    fn default() -> Self {
        Self {
            deep_link_scheme: "sub67".to_string(),
            app_link_base: "https://sub67.app".to_string(),
        }
    }
}

impl Links {
    pub fn deep_link(&self, event_id: &str, job_url: Option<&str>) -> String {
        format!(
            "{}://job/{}?url={}",
            self.deep_link_scheme,
            event_id,
            encode_component(job_url.unwrap_or_default())
        )
    }

    pub fn web_link(&self, event_id: &str, job_url: Option<&str>) -> String {
        format!(
            "{}/job/{}?url={}",
            self.app_link_base.trim_end_matches('/'),
            event_id,
            encode_component(job_url.unwrap_or_default())
        )
    }
}

/// Percent-encode a query value; spaces become `%20`, never `+`.
fn encode_component(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Job title from the structured data, else from a `TITLE:` line of the snapshot.
pub fn extract_job_title(event: &JobEvent) -> Option<String> {
    if let Some(title) = event.title() {
        return Some(title.to_string());
    }

    let snapshot = event.snapshot_text.as_deref()?;
    SNAPSHOT_TITLE
        .captures(snapshot)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Split a free-text title into a grade label and the remaining subject.
///
/// "3rd Grade - Math" gives `(Some("3rd Grade"), Some("Math"))`.
pub fn split_grade_subject(title: &str) -> (Option<String>, Option<String>) {
    let title = title.trim();

    for pattern in GRADE_PATTERNS.iter() {
        if let Some(m) = pattern.find(title) {
            let grade = m.as_str().to_string();
            let rest = format!("{} {}", &title[..m.start()], &title[m.end()..]);
            let rest = REPEATED_SEPARATORS.replace_all(&rest, " $1 ");
            let subject = rest
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .trim_matches(SEPARATORS)
                .to_string();
            let subject = (!subject.is_empty()).then_some(subject);
            return (Some(grade), subject);
        }
    }

    (None, (!title.is_empty()).then(|| title.to_string()))
}

/// `"<school>: <grade>, <subject>, <teacher>"`, omitting missing parts.
pub fn notification_title(event: &JobEvent) -> String {
    let Some(school) = event.location() else {
        return DEFAULT_TITLE.to_string();
    };

    let (grade, subject) = extract_job_title(event)
        .map(|t| split_grade_subject(&t))
        .unwrap_or_default();

    let details: Vec<String> = [grade, subject, event.teacher().map(str::to_string)]
        .into_iter()
        .flatten()
        .collect();

    if details.is_empty() {
        school.to_string()
    } else {
        format!("{school}: {}", details.join(", "))
    }
}

fn schedule_line(event: &JobEvent) -> Option<String> {
    let date = event.date();
    let start = event.start().map(|t| t.to_string());
    let end = event.end().map(|t| t.to_string());

    let hours = match (start, end) {
        (Some(s), Some(e)) => Some(format!("{s}-{e}")),
        (Some(s), None) => Some(s),
        _ => None,
    };

    match (date, hours) {
        (Some(d), Some(h)) => Some(format!("{d} • {h}")),
        (Some(d), None) => Some(d.to_string()),
        (None, Some(h)) => Some(h),
        (None, None) => None,
    }
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() > MAX_BODY_TITLE_CHARS {
        let cut: String = title.chars().take(MAX_BODY_TITLE_CHARS).collect();
        format!("{cut}...")
    } else {
        title.to_string()
    }
}

pub fn notification_body(event: &JobEvent, matched_keywords: &[String], filtering_active: bool) -> String {
    let mut body = schedule_line(event)
        .or_else(|| extract_job_title(event).map(|t| truncate_title(&t)))
        .unwrap_or_else(|| DEFAULT_BODY.to_string());

    if filtering_active && !matched_keywords.is_empty() {
        let shown: Vec<&str> = matched_keywords
            .iter()
            .take(MAX_BODY_KEYWORDS)
            .map(String::as_str)
            .collect();
        body.push_str("\nKeywords: ");
        body.push_str(&shown.join(", "));
    }

    body
}

/// Everything one user's push notification is built from.
pub struct JobNotification<'a> {
    pub event: &'a JobEvent,
    pub event_id: &'a str,
    pub matched_keywords: &'a [String],
    pub organized_keywords: &'a OrganizedKeywords,
    pub filtering_active: bool,
}

pub fn compose_push(notification: &JobNotification<'_>, links: &Links) -> AppResult<PushMessage> {
    let event = notification.event;
    let to_json = |value: serde_json::Result<String>| value.map_err(|e| AppError::Internal(e.into()));

    let mut data = BTreeMap::new();
    data.insert("jobUrl".to_string(), event.job_url.clone().unwrap_or_default());
    data.insert("jobId".to_string(), event.job_id.clone());
    data.insert("eventId".to_string(), notification.event_id.to_string());
    data.insert("districtId".to_string(), event.district_id.clone());
    data.insert(
        "deepLink".to_string(),
        links.deep_link(notification.event_id, event.job_url.as_deref()),
    );
    data.insert(
        "matchedKeywords".to_string(),
        to_json(serde_json::to_string(notification.matched_keywords))?,
    );
    data.insert(
        "organizedKeywords".to_string(),
        to_json(serde_json::to_string(notification.organized_keywords))?,
    );
    data.insert("type".to_string(), NOTIFICATION_KIND.to_string());

    Ok(PushMessage {
        title: notification_title(event),
        body: notification_body(event, notification.matched_keywords, notification.filtering_active),
        data,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
}

/// Render the job-match email. Values are HTML-escaped by the template engine.
pub fn compose_email(
    templates: &Handlebars<'_>,
    notification: &JobNotification<'_>,
    links: &Links,
) -> AppResult<EmailContent> {
    let event = notification.event;
    let title = extract_job_title(event).unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let html = templates
        .render(
            JOB_MATCH_EMAIL,
            &json!({
                "title": title,
                "date": event.date().unwrap_or("Date TBD"),
                "location": event.location().unwrap_or("Location TBD"),
                "matched_keywords": notification.matched_keywords,
                "link": links.web_link(notification.event_id, event.job_url.as_deref()),
            }),
        )
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok(EmailContent {
        subject: format!("New Job Match: {title}"),
        html,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sub67_shared::{JobData, TimeValue};

    use crate::templates::create_templates;

    fn event() -> JobEvent {
        JobEvent {
            district_id: "D1".into(),
            job_id: "J1".into(),
            job_url: Some("https://jobs.example.com/view?id=J1&x=1".into()),
            snapshot_text: Some("Substitute needed\nTITLE: 3rd Grade - Math\nCONF: 123".into()),
            keywords: vec!["math".into(), "school".into()],
            job_data: JobData {
                date: Some("Tue, 1/6/2026".into()),
                start_time: Some(TimeValue::from("08:00 AM")),
                end_time: Some(TimeValue::from("03:00 PM")),
                location: Some("Lincoln Elementary".into()),
                teacher: Some("Smith, Jane".into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn title_falls_back_to_snapshot_label() {
        assert_eq!(extract_job_title(&event()).as_deref(), Some("3rd Grade - Math"));

        let mut e = event();
        e.job_data.title = Some("  Kindergarten Aide ".into());
        assert_eq!(extract_job_title(&e).as_deref(), Some("Kindergarten Aide"));

        e.job_data.title = None;
        e.snapshot_text = Some("nothing useful".into());
        assert_eq!(extract_job_title(&e), None);
    }

    #[test]
    fn grade_patterns() {
        let cases = [
            ("3rd Grade - Math", Some("3rd Grade"), Some("Math")),
            ("Science, Grade 5", Some("Grade 5"), Some("Science")),
            ("Pre-K Assistant", Some("Pre-K"), Some("Assistant")),
            ("PreK", Some("PreK"), None),
            ("Kindergarten / Music", Some("Kindergarten"), Some("Music")),
            ("K - Reading", Some("K"), Some("Reading")),
            ("Biology", None, Some("Biology")),
        ];

        for (title, grade, subject) in cases {
            let (g, s) = split_grade_subject(title);
            assert_eq!(g.as_deref(), grade, "{title}");
            assert_eq!(s.as_deref(), subject, "{title}");
        }
    }

    #[test]
    fn separators_left_in_the_middle_are_collapsed() {
        let (grade, subject) = split_grade_subject("Math - Grade 4 - Room 12");
        assert_eq!(grade.as_deref(), Some("Grade 4"));
        assert_eq!(subject.as_deref(), Some("Math - Room 12"));
    }

    #[test]
    fn title_joins_present_parts() {
        assert_eq!(
            notification_title(&event()),
            "Lincoln Elementary: 3rd Grade, Math, Smith, Jane"
        );

        let mut e = event();
        e.job_data.teacher = None;
        e.snapshot_text = None;
        assert_eq!(notification_title(&e), "Lincoln Elementary");

        e.job_data.location = None;
        assert_eq!(notification_title(&e), DEFAULT_TITLE);
    }

    #[test]
    fn body_prefers_schedule_then_title() {
        let e = event();
        assert_eq!(notification_body(&e, &[], false), "Tue, 1/6/2026 • 08:00 AM-03:00 PM");

        let mut e = event();
        e.job_data.date = None;
        e.job_data.start_time = None;
        e.job_data.end_time = None;
        e.job_data.title = Some("x".repeat(120));
        let body = notification_body(&e, &[], false);
        assert_eq!(body, format!("{}...", "x".repeat(100)));

        e.job_data.title = None;
        e.snapshot_text = None;
        assert_eq!(notification_body(&e, &[], false), DEFAULT_BODY);
    }

    #[test]
    fn body_lists_at_most_three_keywords_when_filtering() {
        let keywords: Vec<String> = ["math", "pe", "art", "sped"].iter().map(|s| s.to_string()).collect();
        let e = event();

        let body = notification_body(&e, &keywords, true);
        assert!(body.ends_with("\nKeywords: math, pe, art"), "{body}");

        let body = notification_body(&e, &keywords, false);
        assert!(!body.contains("Keywords"));
    }

    #[test]
    fn push_payload_carries_links_and_keywords() {
        let e = event();
        let matched = vec!["math".to_string()];
        let organized = OrganizedKeywords {
            matched: matched.clone(),
            other: vec!["school".into()],
            ..Default::default()
        };
        let notification = JobNotification {
            event: &e,
            event_id: "evt-1",
            matched_keywords: &matched,
            organized_keywords: &organized,
            filtering_active: true,
        };

        let message = compose_push(&notification, &Links::default()).unwrap();
        assert_eq!(message.data["type"], NOTIFICATION_KIND);
        assert_eq!(message.data["eventId"], "evt-1");
        assert_eq!(message.data["districtId"], "D1");
        assert_eq!(message.data["matchedKeywords"], r#"["math"]"#);
        assert_eq!(
            message.data["deepLink"],
            "sub67://job/evt-1?url=https%3A%2F%2Fjobs.example.com%2Fview%3Fid%3DJ1%26x%3D1"
        );

        let organized_back: OrganizedKeywords =
            serde_json::from_str(&message.data["organizedKeywords"]).unwrap();
        assert_eq!(organized_back, organized);
    }

    #[test]
    fn email_escapes_values_and_uses_placeholders() {
        let mut e = event();
        e.job_data.title = Some("Art <script>".into());
        e.job_data.date = None;
        e.job_data.location = None;
        let matched = vec!["a&b".to_string()];
        let organized = OrganizedKeywords::default();
        let notification = JobNotification {
            event: &e,
            event_id: "evt-1",
            matched_keywords: &matched,
            organized_keywords: &organized,
            filtering_active: true,
        };

        let templates = create_templates().unwrap();
        let email = compose_email(&templates, &notification, &Links::default()).unwrap();
        assert_eq!(email.subject, "New Job Match: Art <script>");
        assert!(email.html.contains("Art &lt;script&gt;"), "{}", email.html);
        assert!(!email.html.contains("<script>"));
        assert!(email.html.contains("Date TBD"));
        assert!(email.html.contains("Location TBD"));
        assert!(email.html.contains("<li>a&amp;b</li>"));
        // `=` is entity-encoded inside the attribute
        assert!(email.html.contains("https://sub67.app/job/evt-1?url&#x3D;https%3A%2F%2F"), "{}", email.html);
    }

    #[test]
    fn email_without_matched_keywords_has_no_keyword_list() {
        let e = event();
        let organized = OrganizedKeywords::default();
        let notification = JobNotification {
            event: &e,
            event_id: "evt-1",
            matched_keywords: &[],
            organized_keywords: &organized,
            filtering_active: false,
        };

        let templates = create_templates().unwrap();
        let email = compose_email(&templates, &notification, &Links::default()).unwrap();
        assert_eq!(email.subject, "New Job Match: 3rd Grade - Math");
        assert!(email.html.contains("<strong>Location:</strong> Lincoln Elementary"));
        assert!(!email.html.contains("Matched Keywords"));
    }

    #[test]
    fn links_encode_spaces_as_percent_twenty() {
        let links = Links::default();
        let url = Some("https://jobs.example.com/view?q=art class&a=b+c");
        assert_eq!(
            links.deep_link("evt-1", url),
            "sub67://job/evt-1?url=https%3A%2F%2Fjobs.example.com%2Fview%3Fq%3Dart%20class%26a%3Db%2Bc"
        );
        assert!(!links.web_link("evt-1", url).contains('+'));
        assert_eq!(links.web_link("evt-1", None), "https://sub67.app/job/evt-1?url=");
    }
}
