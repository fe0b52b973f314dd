//! Profile analysis: skills plus a holistic career assessment.
//!
//! [`ProfileAnalyzer`] makes two generation calls per profile.  The first
//! extracts a list of [`Skill`]s; the second produces a
//! [`CareerAssessment`] with the extracted skills as context.  Either call
//! may fail or return junk without failing the analysis: skills fall back
//! to an empty list and the assessment to [`CareerAssessment::fallback`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::agent::{Agent, AgentCore, format_prompt};
use crate::error::{AgentError, Result};
use crate::extract::{
    FieldRepairer, FromItem, Repair, Validated, ValidationError, extract_list, extract_object,
};
use crate::llm::GenerationOptions;

/// Placeholder for assessment text fields the model left out.
pub const MISSING_FIELD_TEXT: &str = "Not enough information to analyze";

/// How long a cached analysis is served without calling the model.
pub const DEFAULT_CACHE_MAX_AGE: Duration = Duration::from_secs(3600);

const SKILL_TEMPERATURE: f32 = 0.3;
const ANALYSIS_TEMPERATURE: f32 = 0.5;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Broad kind of a skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillCategory {
    Technical,
    Soft,
    Domain,
}

impl SkillCategory {
    /// Case-insensitive parse; surrounding whitespace is ignored.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "technical" => Some(Self::Technical),
            "soft" => Some(Self::Soft),
            "domain" => Some(Self::Domain),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Soft => "soft",
            Self::Domain => "domain",
        }
    }
}

/// Proficiency in a skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl SkillLevel {
    /// Case-insensitive parse; surrounding whitespace is ignored.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Some(Self::Beginner),
            "intermediate" => Some(Self::Intermediate),
            "advanced" => Some(Self::Advanced),
            "expert" => Some(Self::Expert),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Expert => "expert",
        }
    }
}

/// Overall seniority of a profile.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Entry,
    Junior,
    #[default]
    Mid,
    Senior,
    Lead,
    Executive,
}

impl ExperienceLevel {
    /// Case-insensitive parse; surrounding whitespace is ignored.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entry" => Some(Self::Entry),
            "junior" => Some(Self::Junior),
            "mid" => Some(Self::Mid),
            "senior" => Some(Self::Senior),
            "lead" => Some(Self::Lead),
            "executive" => Some(Self::Executive),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Junior => "junior",
            Self::Mid => "mid",
            Self::Senior => "senior",
            Self::Lead => "lead",
            Self::Executive => "executive",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    )*};
}

display_as_str!(SkillCategory, SkillLevel, ExperienceLevel);

// ---------------------------------------------------------------------------
// Skill
// ---------------------------------------------------------------------------

/// A professional skill found in a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub category: SkillCategory,
    pub level: SkillLevel,
    pub years_experience: f64,
}

fn years_from(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

impl FromItem for Skill {
    fn from_item(value: &Value) -> std::result::Result<Self, ValidationError> {
        let fields = value
            .as_object()
            .ok_or_else(|| ValidationError::new("skill", "expected an object"))?;

        let name = fields
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ValidationError::new("name", "missing or blank"))?;

        let category = fields
            .get("category")
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationError::new("category", "missing"))?;
        let category = SkillCategory::parse(category).ok_or_else(|| {
            ValidationError::new(
                "category",
                format!("`{category}` is not one of technical, soft, domain"),
            )
        })?;

        let level = fields
            .get("level")
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationError::new("level", "missing"))?;
        let level = SkillLevel::parse(level).ok_or_else(|| {
            ValidationError::new(
                "level",
                format!("`{level}` is not one of beginner, intermediate, advanced, expert"),
            )
        })?;

        let years_experience = fields
            .get("years_experience")
            .and_then(years_from)
            .ok_or_else(|| ValidationError::new("years_experience", "missing or not a number"))?;
        if !years_experience.is_finite() || years_experience < 0.0 {
            return Err(ValidationError::new(
                "years_experience",
                format!("{years_experience} is not a non-negative number"),
            ));
        }

        Ok(Skill {
            name: name.to_owned(),
            category,
            level,
            years_experience,
        })
    }
}

// ---------------------------------------------------------------------------
// Assessment
// ---------------------------------------------------------------------------

/// Holistic judgement of a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerAssessment {
    pub experience_level: ExperienceLevel,
    pub career_progression: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub career_trajectory: String,
    pub education_relevance: String,
}

impl CareerAssessment {
    /// Assessment used when the model produced nothing usable.
    pub fn fallback() -> Self {
        Self {
            experience_level: ExperienceLevel::Mid,
            career_progression: "Unable to analyze career progression".into(),
            strengths: vec!["Unable to identify strengths".into()],
            weaknesses: vec!["Unable to identify areas for improvement".into()],
            career_trajectory: "Unable to analyze career trajectory".into(),
            education_relevance: "Unable to analyze education relevance".into(),
        }
    }
}

impl Repair for CareerAssessment {
    fn repair(fields: &Map<String, Value>) -> Validated<Self> {
        let mut r = FieldRepairer::new(fields);
        let assessment = CareerAssessment {
            experience_level: r.parsed(
                "experience_level",
                ExperienceLevel::parse,
                ExperienceLevel::default(),
            ),
            career_progression: r.text("career_progression", MISSING_FIELD_TEXT),
            strengths: r.string_list("strengths"),
            weaknesses: r.string_list("weaknesses"),
            career_trajectory: r.text("career_trajectory", MISSING_FIELD_TEXT),
            education_relevance: r.text("education_relevance", MISSING_FIELD_TEXT),
        };
        r.finish(assessment)
    }
}

/// Complete result of analysing one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileAnalysis {
    pub skills: Vec<Skill>,
    #[serde(flatten)]
    pub assessment: CareerAssessment,
}

/// Input to [`ProfileAnalyzer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileInput {
    pub profile_text: String,
}

impl ProfileInput {
    pub fn new(profile_text: impl Into<String>) -> Self {
        Self {
            profile_text: profile_text.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

const SKILL_EXTRACTION_PROMPT: &str = r#"Analyze the following professional profile and extract every skill it mentions.
For each skill, determine:
1. The skill name
2. The category (technical, soft, domain)
3. The estimated proficiency level (beginner, intermediate, advanced, expert)
4. The estimated years of experience with the skill

Return the results as a JSON array of objects with this structure:
[
    {{
        "name": "skill name",
        "category": "skill category",
        "level": "proficiency level",
        "years_experience": years as a number
    }}
]

Respond with ONLY the JSON array and nothing else.

Profile to analyze:
{profile_text}
"#;

const PROFILE_ANALYSIS_PROMPT: &str = r#"Perform a comprehensive analysis of the following professional profile.
Consider the skills, experience, education and career history, and provide:

1. An overall experience level (entry, junior, mid, senior, lead, executive)
2. An analysis of career progression
3. A list of 3-5 key strengths
4. A list of 2-4 weaknesses or areas for improvement
5. An analysis of career trajectory and likely future paths
6. An assessment of how relevant their education is to their career

Return the results as a JSON object with this structure:
{{
    "experience_level": "level",
    "career_progression": "analysis",
    "strengths": ["strength1", "strength2"],
    "weaknesses": ["weakness1", "weakness2"],
    "career_trajectory": "analysis",
    "education_relevance": "analysis"
}}

Respond with ONLY the JSON object and nothing else.

Profile to analyze:
{profile_text}

Skills already identified:
{skills_json}
"#;

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Agent that turns profile text into a [`ProfileAnalysis`].
#[derive(Debug)]
pub struct ProfileAnalyzer {
    core: AgentCore,
    cache_max_age: Duration,
}

/// Result of one model-backed step, and whether it is a stand-in for a
/// failed call.
#[derive(Debug)]
struct Step<T> {
    value: T,
    fell_back: bool,
}

impl<T> Step<T> {
    fn answered(value: T) -> Self {
        Self {
            value,
            fell_back: false,
        }
    }

    fn fallback(value: T) -> Self {
        Self {
            value,
            fell_back: true,
        }
    }
}

impl ProfileAnalyzer {
    pub fn new(core: AgentCore) -> Self {
        Self {
            core,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
        }
    }

    /// How long a cached analysis is reused.
    pub fn with_cache_max_age(mut self, max_age: Duration) -> Self {
        self.cache_max_age = max_age;
        self
    }

    /// Cache key for `profile_text`, stable across processes.
    pub fn cache_key(profile_text: &str) -> String {
        let digest = ring::digest::digest(&ring::digest::SHA256, profile_text.as_bytes());
        format!("profile_analysis_{}", URL_SAFE_NO_PAD.encode(digest.as_ref()))
    }

    async fn extract_skills(&self, profile_text: &str) -> Result<Step<Vec<Skill>>> {
        let prompt = format_prompt(SKILL_EXTRACTION_PROMPT, &[("profile_text", profile_text)])?;
        let options = GenerationOptions::with_temperature(SKILL_TEMPERATURE);

        let response = match self.core.llm().get_completion(prompt, &options).await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "skill extraction failed");
                return Ok(Step::fallback(Vec::new()));
            }
        };

        Ok(Step::answered(extract_list::<Skill>(&response)))
    }

    async fn assess(
        &self,
        profile_text: &str,
        skills: &[Skill],
    ) -> Result<Step<CareerAssessment>> {
        let skills_json = serde_json::to_string(skills)?;
        let prompt = format_prompt(
            PROFILE_ANALYSIS_PROMPT,
            &[("profile_text", profile_text), ("skills_json", &skills_json)],
        )?;
        let options = GenerationOptions::with_temperature(ANALYSIS_TEMPERATURE);

        let response = match self.core.llm().get_completion(prompt, &options).await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "profile analysis failed, using fallback");
                return Ok(Step::fallback(CareerAssessment::fallback()));
            }
        };

        match extract_object::<CareerAssessment>(&response) {
            Some(validated) => {
                if !validated.is_complete() {
                    warn!(
                        defaulted = ?validated.defaulted(),
                        "profile analysis was incomplete"
                    );
                }
                Ok(Step::answered(validated.into_inner()))
            }
            None => {
                error!("profile analysis response was unusable, using fallback");
                Ok(Step::fallback(CareerAssessment::fallback()))
            }
        }
    }
}

#[async_trait]
impl Agent for ProfileAnalyzer {
    type Input = ProfileInput;
    type Output = ProfileAnalysis;

    fn name(&self) -> &str {
        "profile_analyzer"
    }

    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn run(&self, input: ProfileInput) -> Result<ProfileAnalysis> {
        let profile_text = input.profile_text;
        if profile_text.trim().is_empty() {
            return Err(AgentError::InvalidInput {
                reason: "profile text is required for analysis".into(),
            });
        }

        let key = Self::cache_key(&profile_text);
        if let Some(cached) = self.core.cached_result(&key, self.cache_max_age) {
            match serde_json::from_value::<ProfileAnalysis>(cached) {
                Ok(analysis) => {
                    debug!(key = %key, "returning cached profile analysis");
                    return Ok(analysis);
                }
                Err(e) => warn!(key = %key, error = %e, "ignoring unreadable cached analysis"),
            }
        }

        let skills = self.extract_skills(&profile_text).await?;
        info!(count = skills.value.len(), "extracted skills from profile");

        let assessment = self.assess(&profile_text, &skills.value).await?;
        let degraded = skills.fell_back || assessment.fell_back;

        let analysis = ProfileAnalysis {
            skills: skills.value,
            assessment: assessment.value,
        };
        if degraded {
            warn!(key = %key, "analysis used a fallback, not caching");
        } else {
            self.core.cache_result(key, serde_json::to_value(&analysis)?);
        }
        Ok(analysis)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
