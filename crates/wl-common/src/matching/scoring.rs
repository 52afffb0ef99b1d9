use serde::Serialize;

use super::skills::check_required_skills;
use super::weights::{
    Weights, HIRE_RATE_THRESHOLD, MATCH_WEIGHTS, RATING_THRESHOLD, RISK_FLAG_PENALTY,
};
use crate::{FreelancerProfile, JobPosting};

/// Partial credit for a timezone-only match when neither side is remote.
const TIMEZONE_PARTIAL_CREDIT: f64 = 10.0;

/// Client-quality point split. Sums to the client weight.
const CLIENT_VERIFIED_POINTS: f64 = 10.0;
const CLIENT_HIRE_RATE_POINTS: f64 = 8.0;
const CLIENT_RATING_POINTS: f64 = 7.0;

#[derive(Debug, Clone)]
pub struct MatchConfig {
    pub weights: Weights,
    pub risk_flag_penalty: f64,
    pub hire_rate_threshold: i32,
    pub rating_threshold: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            weights: MATCH_WEIGHTS,
            risk_flag_penalty: RISK_FLAG_PENALTY,
            hire_rate_threshold: HIRE_RATE_THRESHOLD,
            rating_threshold: RATING_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoringResult {
    pub score: f64,
    pub max_score: f64,
    pub status: &'static str,
    pub details: String,
}

impl ScoringResult {
    fn neutral(max_score: f64, details: impl Into<String>) -> Self {
        Self {
            score: 0.0,
            max_score,
            status: "UNKNOWN",
            details: details.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchScore {
    /// Sum of sub-scores minus the risk penalty, clamped to [0, 100].
    pub total: f64,
    pub skills: ScoringResult,
    pub rate: ScoringResult,
    pub location: ScoringResult,
    pub client: ScoringResult,
    pub risk_penalty: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedJob {
    pub job: JobPosting,
    pub score: MatchScore,
}

/// Rank a pool of open jobs against a freelancer profile, best first.
/// Stable: jobs with equal totals keep their input order. Pure function of
/// its inputs, safe to call from any number of tasks.
pub fn rank_jobs(profile: &FreelancerProfile, jobs: &[JobPosting]) -> Vec<RankedJob> {
    let engine = MatchEngine::new(MatchConfig::default());
    let mut ranked: Vec<RankedJob> = jobs
        .iter()
        .map(|job| RankedJob {
            job: job.clone(),
            score: engine.score(profile, job),
        })
        .collect();

    // Vec::sort_by is stable, which is what keeps ties in input order.
    ranked.sort_by(|a, b| b.score.total.total_cmp(&a.score.total));
    ranked
}

pub struct MatchEngine {
    config: MatchConfig,
}

impl MatchEngine {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, profile: &FreelancerProfile, job: &JobPosting) -> MatchScore {
        let skills = self.score_skills(profile, job);
        let rate = self.score_rate(profile, job);
        let location = self.score_location(profile, job);
        let client = self.score_client(job);
        let risk_penalty = self.risk_penalty(job);

        let raw = skills.score + rate.score + location.score + client.score - risk_penalty;

        MatchScore {
            total: raw.clamp(0.0, 100.0),
            skills,
            rate,
            location,
            client,
            risk_penalty,
        }
    }

    fn score_skills(&self, profile: &FreelancerProfile, job: &JobPosting) -> ScoringResult {
        let max = self.config.weights.skills;
        let coverage = check_required_skills(&job.required_skills, &profile.skills);

        if coverage.is_neutral() {
            return ScoringResult::neutral(max, "no required skills declared");
        }

        let score = coverage.fraction * max;
        let status = if coverage.fraction >= 1.0 {
            "PERFECT_MATCH"
        } else if coverage.fraction >= 0.6 {
            "MATCH"
        } else if coverage.fraction > 0.0 {
            "PARTIAL_MATCH"
        } else {
            "MISS"
        };

        ScoringResult {
            score,
            max_score: max,
            status,
            details: format!(
                "{}/{} required skills met{}",
                coverage.met,
                coverage.required,
                if coverage.missing.is_empty() {
                    String::new()
                } else {
                    format!(" (missing: {})", coverage.missing.join(", "))
                }
            ),
        }
    }

    fn score_rate(&self, profile: &FreelancerProfile, job: &JobPosting) -> ScoringResult {
        let max = self.config.weights.rate;

        let rate = match profile.hourly_rate_cents {
            Some(r) if r > 0 => r as f64,
            _ => return ScoringResult::neutral(max, "profile declares no hourly rate"),
        };

        let (low, high) = match (job.hourly_min_cents, job.hourly_max_cents) {
            (Some(low), Some(high)) => (low as f64, high as f64),
            (Some(low), None) => (low as f64, low as f64),
            (None, Some(high)) => (high as f64, high as f64),
            (None, None) => {
                return ScoringResult::neutral(max, "job declares no hourly range");
            }
        };

        if rate >= low && rate <= high {
            return ScoringResult {
                score: max,
                max_score: max,
                status: "PERFECT_MATCH",
                details: "rate within posted range".into(),
            };
        }

        // Linear decay with relative distance past the nearer bound; no
        // credit once the rate is a full bound-width away.
        let (bound, distance) = if rate < low {
            (low, low - rate)
        } else {
            (high, rate - high)
        };
        let ratio = if bound > 0.0 { distance / bound } else { 1.0 };
        let score = (max * (1.0 - ratio)).max(0.0);

        ScoringResult {
            score,
            max_score: max,
            status: if score > 0.0 { "PARTIAL_MATCH" } else { "MISS" },
            details: format!("rate outside posted range by {:.0}%", ratio * 100.0),
        }
    }

    fn score_location(&self, profile: &FreelancerProfile, job: &JobPosting) -> ScoringResult {
        let max = self.config.weights.location;

        if job.is_remote || profile.prefers_remote {
            return ScoringResult {
                score: max,
                max_score: max,
                status: "PERFECT_MATCH",
                details: if job.is_remote {
                    "remote job".into()
                } else {
                    "profile prefers remote".into()
                },
            };
        }

        let location_match = match (job.location.as_deref(), profile.location.as_deref()) {
            (Some(a), Some(b)) => Some(a.trim().eq_ignore_ascii_case(b.trim())),
            _ => None,
        };
        if location_match == Some(true) {
            return ScoringResult {
                score: max,
                max_score: max,
                status: "PERFECT_MATCH",
                details: "same location".into(),
            };
        }

        let timezone_match = match (job.timezone.as_deref(), profile.timezone.as_deref()) {
            (Some(a), Some(b)) => Some(a.trim().eq_ignore_ascii_case(b.trim())),
            _ => None,
        };
        if timezone_match == Some(true) {
            return ScoringResult {
                score: TIMEZONE_PARTIAL_CREDIT.min(max),
                max_score: max,
                status: "PARTIAL_MATCH",
                details: "same timezone".into(),
            };
        }

        if location_match == Some(false) || timezone_match == Some(false) {
            return ScoringResult {
                score: 0.0,
                max_score: max,
                status: "MISS",
                details: "onsite job in a different location".into(),
            };
        }

        ScoringResult::neutral(max, "location unknown on one side")
    }

    fn score_client(&self, job: &JobPosting) -> ScoringResult {
        let max = self.config.weights.client;
        let mut score = 0.0;
        let mut details: Vec<&'static str> = Vec::new();

        if job.client_verified {
            score += CLIENT_VERIFIED_POINTS;
            details.push("verified");
        }
        if job
            .client_hire_rate
            .is_some_and(|rate| rate >= self.config.hire_rate_threshold)
        {
            score += CLIENT_HIRE_RATE_POINTS;
            details.push("high hire rate");
        }
        if job
            .client_rating
            .is_some_and(|rating| rating >= self.config.rating_threshold)
        {
            score += CLIENT_RATING_POINTS;
            details.push("highly rated");
        }

        ScoringResult {
            score,
            max_score: max,
            status: if score >= max {
                "PERFECT_MATCH"
            } else if score > 0.0 {
                "PARTIAL_MATCH"
            } else {
                "UNKNOWN"
            },
            details: if details.is_empty() {
                "no client signals".into()
            } else {
                details.join(" / ")
            },
        }
    }

    fn risk_penalty(&self, job: &JobPosting) -> f64 {
        let mut seen = Vec::with_capacity(3);
        for flag in &job.risk_flags {
            if !seen.contains(flag) {
                seen.push(*flag);
            }
        }
        seen.len() as f64 * self.config.risk_flag_penalty
    }
}
