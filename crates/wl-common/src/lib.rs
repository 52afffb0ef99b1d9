pub mod commission;
pub mod db;
pub mod escrow;
pub mod gateway;
pub mod logging;
pub mod matching;

use serde::{Deserialize, Serialize};

/// Ordinal proficiency scale used for skill requirements. A profile meets a
/// requirement when its declared level is equal or higher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl Default for SkillLevel {
    fn default() -> Self {
        SkillLevel::Beginner
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub level: SkillLevel,
}

impl Skill {
    pub fn new(name: impl Into<String>, level: SkillLevel) -> Self {
        Self {
            name: name.into(),
            level,
        }
    }
}

/// Known problematic contract patterns flagged on a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskFlag {
    UnpaidTest,
    ScopeCreep,
    ExtremeNda,
}

// Commonly used data models for matching functions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FreelancerProfile {
    pub id: i64,
    #[serde(default)]
    pub skills: Vec<Skill>,
    pub hourly_rate_cents: Option<i64>,
    #[serde(default)]
    pub preferred_job_types: Vec<String>,
    #[serde(default)]
    pub preferred_industries: Vec<String>,
    pub location: Option<String>,
    pub timezone: Option<String>,
    #[serde(default)]
    pub prefers_remote: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    pub job_type: Option<String>,
    pub industry: Option<String>,
    #[serde(default)]
    pub required_skills: Vec<Skill>,
    pub budget_min_cents: Option<i64>,
    pub budget_max_cents: Option<i64>,
    pub hourly_min_cents: Option<i64>,
    pub hourly_max_cents: Option<i64>,
    pub client_rating: Option<f64>,
    pub client_hire_rate: Option<i32>,
    #[serde(default)]
    pub client_verified: bool,
    pub client_spend_tier: Option<String>,
    #[serde(default)]
    pub is_remote: bool,
    pub location: Option<String>,
    pub timezone: Option<String>,
    #[serde(default)]
    pub risk_flags: Vec<RiskFlag>,
    pub project_type: Option<String>,
    pub estimated_duration: Option<String>,
}
