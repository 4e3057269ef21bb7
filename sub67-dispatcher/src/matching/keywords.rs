use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Short codes and the longer phrasings that mean the same thing.
const KEYWORD_SYNONYMS: &[(&str, &[&str])] = &[
    ("pe", &["physical education", "p.e.", "p. e."]),
    ("sped", &["special ed", "special ed.", "special edu", "special education"]),
    ("esl", &["english sign language"]),
    ("ell", &["english language learning", "english language learner"]),
    ("art", &["arts"]),
    ("half", &["half day"]),
    ("full", &["full day"]),
];

/// Duration keywords (`HHMM`) the scraper emits; anything up to four hours is a half day.
pub const HALF_DAY_DURATIONS: &[&str] = &[
    "0100", "0115", "0130", "0145",
    "0200", "0215", "0230", "0245",
    "0300", "0315", "0330", "0345",
    "0400",
];

pub const FULL_DAY_DURATIONS: &[&str] = &[
    "0415", "0430", "0445",
    "0500", "0515", "0530", "0545",
    "0600", "0615", "0630", "0645",
    "0700", "0715", "0730", "0745",
    "0800", "0815", "0830", "0845",
    "0900", "0915",
];

const DURATION_CATEGORY: &[&str] = &["half", "full", "full day", "half day"];
const SUBJECT_CATEGORY: &[&str] = &["math", "science", "english", "history", "art", "pe", "sped", "esl", "ell"];

static DATE_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}_\d{1,2}_\d{4}$").expect("valid date keyword pattern"));

/// The full set of interchangeable spellings for `term`.
///
/// Includes the term itself, its mapped variants when it is a short code,
/// and, when it is a variant of some code, that code plus all of its variants.
pub fn synonym_closure(term: &str) -> BTreeSet<String> {
    let term = term.trim().to_lowercase();
    let mut closure = BTreeSet::new();

    for (code, variants) in KEYWORD_SYNONYMS {
        if *code == term || variants.contains(&term.as_str()) {
            closure.insert(code.to_string());
            closure.extend(variants.iter().map(|v| v.to_string()));
        }
    }

    closure.insert(term);
    closure
}

/// Searchable view of a job event: its lowercased snapshot text and tag set.
#[derive(Debug, Clone, Default)]
pub struct EventText {
    pub text: String,
    pub keywords: HashSet<String>,
}

impl EventText {
    pub fn new(snapshot_text: Option<&str>, keywords: &[String]) -> Self {
        Self {
            text: snapshot_text.unwrap_or_default().to_lowercase(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    pub fn matches(&self, term: &str) -> bool {
        matches_keyword(&self.text, &self.keywords, term)
    }
}

/// True when `term`, or any synonym of it, occurs in `text` or is one of `keywords`.
///
/// `half` and `full` additionally match the duration codes of their bucket.
pub fn matches_keyword(text: &str, keywords: &HashSet<String>, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return false;
    }

    let found = synonym_closure(&term)
        .iter()
        .any(|candidate| text.contains(candidate.as_str()) || keywords.contains(candidate));
    if found {
        return true;
    }

    let durations = match term.as_str() {
        "half" => HALF_DAY_DURATIONS,
        "full" => FULL_DAY_DURATIONS,
        _ => return false,
    };
    durations.iter().any(|code| keywords.contains(*code))
}

/// Event keywords grouped for display next to a matched job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizedKeywords {
    pub matched: Vec<String>,
    pub subject: Vec<String>,
    pub duration: Vec<String>,
    pub location: Vec<String>,
    pub date: Vec<String>,
    pub other: Vec<String>,
}

pub fn organize_keywords(all_keywords: &[String], matched_keywords: &[String]) -> OrganizedKeywords {
    let mut organized = OrganizedKeywords {
        matched: matched_keywords.to_vec(),
        ..Default::default()
    };

    for keyword in all_keywords {
        let kw = keyword.to_lowercase();
        if matched_keywords.iter().any(|m| *m == kw) {
            continue;
        }

        if DURATION_CATEGORY.iter().any(|d| kw.contains(d)) {
            organized.duration.push(keyword.clone());
        } else if SUBJECT_CATEGORY.iter().any(|s| kw.contains(s)) {
            organized.subject.push(keyword.clone());
        } else if DATE_KEYWORD.is_match(&kw) {
            organized.date.push(keyword.clone());
        } else if kw.chars().count() > 3 {
            organized.other.push(keyword.clone());
        }
    }

    organized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn closure_of_a_code_includes_its_variants() {
        let closure = synonym_closure("PE");
        for expected in ["pe", "physical education", "p.e.", "p. e."] {
            assert!(closure.contains(expected), "{expected}");
        }
    }

    #[test]
    fn closure_of_a_variant_includes_code_and_siblings() {
        let closure = synonym_closure("special ed");
        for expected in ["sped", "special ed", "special ed.", "special edu", "special education"] {
            assert!(closure.contains(expected), "{expected}");
        }
    }

    #[test]
    fn unknown_terms_map_to_themselves() {
        assert_eq!(synonym_closure("  Math "), BTreeSet::from(["math".to_string()]));
    }

    #[test]
    fn synonym_matching_is_symmetric() {
        for (code, variants) in KEYWORD_SYNONYMS {
            for variant in *variants {
                let text = format!("job notes: {variant} coverage");
                assert!(matches_keyword(&text, &HashSet::new(), code), "{code} ~ {variant}");

                let text = format!("job notes: {code} coverage");
                assert!(matches_keyword(&text, &HashSet::new(), variant), "{variant} ~ {code}");
            }
        }
    }

    #[test]
    fn matches_against_keyword_set_exactly() {
        let keywords = set(&["physical education", "school"]);
        assert!(matches_keyword("", &keywords, "pe"));
        assert!(!matches_keyword("", &keywords, "schoo"));
    }

    #[test]
    fn matches_against_text_by_substring() {
        assert!(matches_keyword("title: 5th grade mathematics", &HashSet::new(), "math"));
        assert!(!matches_keyword("title: 5th grade science", &HashSet::new(), "math"));
    }

    #[test]
    fn half_and_full_match_duration_codes() {
        assert!(matches_keyword("", &set(&["0330"]), "half"));
        assert!(!matches_keyword("", &set(&["0330"]), "full"));
        assert!(matches_keyword("", &set(&["0700"]), "Full"));
        assert!(!matches_keyword("", &set(&["0700"]), "half"));
    }

    #[test]
    fn duration_buckets_do_not_overlap() {
        for code in HALF_DAY_DURATIONS {
            assert!(!FULL_DAY_DURATIONS.contains(code));
        }
    }

    #[test]
    fn blank_terms_never_match() {
        assert!(!matches_keyword("anything", &set(&["anything"]), "   "));
    }

    #[test]
    fn event_text_lowercases_inputs() {
        let event = EventText::new(Some("TITLE: ART Teacher"), &["Science".to_string()]);
        assert!(event.matches("arts"));
        assert!(event.matches("science"));
    }

    #[test]
    fn organizes_keywords_by_category() {
        let all: Vec<String> = ["math", "half", "1_6_2026", "teacher", "k12", "Science"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let organized = organize_keywords(&all, &["math".to_string()]);

        assert_eq!(organized.matched, vec!["math"]);
        assert_eq!(organized.duration, vec!["half"]);
        assert_eq!(organized.subject, vec!["Science"]);
        assert_eq!(organized.date, vec!["1_6_2026"]);
        assert_eq!(organized.other, vec!["teacher"]);
        assert!(organized.location.is_empty());
    }
}
