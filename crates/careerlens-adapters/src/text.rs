//! Text processing helpers.
//!
//! Lightweight, stateless utilities used around profile analysis.  Entity
//! extraction here is plain pattern matching over fixed vocabularies, not a
//! language model.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

static SKILL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:Python|Java|JavaScript|TypeScript|SQL|React|Angular|Vue|Node\.js|AWS|Azure|GCP|Docker|Kubernetes|git|REST|GraphQL|HTML|CSS|TensorFlow|PyTorch|scikit-learn|pandas|numpy)\b|\bC\+\+",
    )
    .expect("skill pattern is valid")
});

static JOB_TITLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:Software Engineer|Developer|Data Scientist|Product Manager|DevOps Engineer|SRE|QA Engineer|Tech Lead|CTO|CEO|Manager|Director|VP|Engineer|Architect)\b",
    )
    .expect("job title pattern is valid")
});

static COMPANY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:Google|Microsoft|Amazon|Apple|Facebook|Meta|Netflix|Uber|Airbnb|LinkedIn|Twitter|IBM|Intel|Oracle|Salesforce|Adobe)\b",
    )
    .expect("company pattern is valid")
});

static EDUCATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:Bachelor|Master|PhD|BS|MS|BA|MBA|Diploma|Certificate|Degree|University|College)\b",
    )
    .expect("education pattern is valid")
});

/// Collapse whitespace runs to a single space, trim, and lowercase.
pub fn normalize_text(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_lowercase()
}

fn plural(n: i64) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// Render a duration given in (fractional) years for humans.
///
/// Durations under a month are shown in days, under a year in months, and
/// otherwise in years with any remaining whole months.
pub fn format_duration(years: f64) -> String {
    if years < 0.0 || !years.is_finite() {
        return "Invalid duration".to_owned();
    }

    if years < 1.0 / 12.0 {
        let days = (years * 365.0) as i64;
        return format!("{days} day{}", plural(days));
    }

    if years < 1.0 {
        let months = (years * 12.0) as i64;
        return format!("{months} month{}", plural(months));
    }

    let whole_years = years as i64;
    let months = ((years - whole_years as f64) * 12.0) as i64;

    if months == 0 {
        return format!("{whole_years} year{}", plural(whole_years));
    }

    format!(
        "{whole_years} year{} and {months} month{}",
        plural(whole_years),
        plural(months)
    )
}

/// Jaccard similarity of the normalised word sets of two texts.
///
/// Returns a score in `0.0..=1.0`; empty input scores 0.0.
pub fn calculate_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let a = normalize_text(a);
    let b = normalize_text(b);
    let left: HashSet<&str> = a.split_whitespace().collect();
    let right: HashSet<&str> = b.split_whitespace().collect();

    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

/// Categories recognised by [`extract_entities`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Skills,
    JobTitles,
    Companies,
    Education,
}

impl EntityKind {
    /// Every kind, in reporting order.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Skills,
        EntityKind::JobTitles,
        EntityKind::Companies,
        EntityKind::Education,
    ];

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skills => "skills",
            Self::JobTitles => "job_titles",
            Self::Companies => "companies",
            Self::Education => "education",
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            Self::Skills => &SKILL_PATTERN,
            Self::JobTitles => &JOB_TITLE_PATTERN,
            Self::Companies => &COMPANY_PATTERN,
            Self::Education => &EDUCATION_PATTERN,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Find known skills, job titles, companies and education terms in `text`.
///
/// Matching is case-insensitive.  Each list keeps the first spelling seen
/// and drops later case-insensitive duplicates.  `kinds = None` extracts
/// every kind.
pub fn extract_entities(
    text: &str,
    kinds: Option<&[EntityKind]>,
) -> BTreeMap<EntityKind, Vec<String>> {
    let kinds = kinds.unwrap_or(EntityKind::ALL.as_slice());

    kinds
        .iter()
        .map(|&kind| {
            let mut seen = HashSet::new();
            let matches: Vec<String> = kind
                .pattern()
                .find_iter(text)
                .map(|m| m.as_str())
                .filter(|m| seen.insert(m.to_lowercase()))
                .map(str::to_owned)
                .collect();
            (kind, matches)
        })
        .collect()
}
