use serde::Serialize;

use super::weights::{HIRE_RATE_THRESHOLD, RATING_THRESHOLD};
use crate::{JobPosting, RiskFlag};

/// Client-fit bucket points. Deliberately small integers so a breakdown can
/// be verified by hand against a posting.
const VERIFIED_POINTS: f64 = 8.0;
const SPEND_TIER_POINTS: f64 = 7.0;
const HIRE_RATE_POINTS: f64 = 5.0;
const RATING_POINTS: f64 = 5.0;
const BUDGET_TYPE_POINTS: f64 = 10.0;
const HOURLY_RANGE_POINTS: f64 = 10.0;
const SPEND_HISTORY_POINTS: f64 = 10.0;
const INDUSTRY_POINTS: f64 = 5.0;
const PROJECT_TYPE_POINTS: f64 = 5.0;
const RISK_PENALTY: f64 = 10.0;

const MAX_FIT_REASONS: usize = 3;
const MAX_RISK_FACTORS: usize = 2;

/// How well a job's *poster* fits, independent of skill match. Reason and
/// risk lists are capped and order-fixed so repeated calls over the same
/// posting render identically.
#[derive(Debug, Clone, Serialize)]
pub struct ClientFitScore {
    pub score: f64,
    pub reasons: Vec<String>,
    pub risks: Vec<String>,
}

pub fn score_client_fit(job: &JobPosting) -> ClientFitScore {
    let mut score = 0.0;

    // Client reliability
    if job.client_verified {
        score += VERIFIED_POINTS;
    }
    if job.client_spend_tier.is_some() {
        score += SPEND_TIER_POINTS;
    }
    if job
        .client_hire_rate
        .is_some_and(|rate| rate >= HIRE_RATE_THRESHOLD)
    {
        score += HIRE_RATE_POINTS;
    }
    if job
        .client_rating
        .is_some_and(|rating| rating >= RATING_THRESHOLD)
    {
        score += RATING_POINTS;
    }

    // Budget realism
    if job.project_type.is_some() {
        score += BUDGET_TYPE_POINTS;
    }
    if job.hourly_min_cents.is_some() || job.hourly_max_cents.is_some() {
        score += HOURLY_RANGE_POINTS;
    }
    if job.client_spend_tier.is_some() {
        score += SPEND_HISTORY_POINTS;
    }

    // Scope / industry fit
    if job.industry.is_some() {
        score += INDUSTRY_POINTS;
    }
    if job.project_type.is_some() {
        score += PROJECT_TYPE_POINTS;
    }

    // Penalty counts each distinct flag, independent of the capped display
    // list below.
    let mut flags: Vec<RiskFlag> = Vec::with_capacity(3);
    for flag in &job.risk_flags {
        if !flags.contains(flag) {
            flags.push(*flag);
        }
    }
    score -= flags.len() as f64 * RISK_PENALTY;

    ClientFitScore {
        score: score.clamp(0.0, 100.0),
        reasons: fit_reasons(job),
        risks: risk_factors(job),
    }
}

/// Up to three reasons, in fixed priority order: verified payment, spend
/// tier, hire rate, rating, industry, project type.
pub fn fit_reasons(job: &JobPosting) -> Vec<String> {
    let mut reasons = Vec::with_capacity(MAX_FIT_REASONS);

    if job.client_verified {
        reasons.push("Verified payment method".to_string());
    }
    if reasons.len() < MAX_FIT_REASONS {
        if let Some(tier) = &job.client_spend_tier {
            reasons.push(format!("Strong spend history ({tier})"));
        }
    }
    if reasons.len() < MAX_FIT_REASONS
        && job
            .client_hire_rate
            .is_some_and(|rate| rate >= HIRE_RATE_THRESHOLD)
    {
        reasons.push("High hire rate".to_string());
    }
    if reasons.len() < MAX_FIT_REASONS
        && job
            .client_rating
            .is_some_and(|rating| rating >= RATING_THRESHOLD)
    {
        reasons.push("Highly rated by freelancers".to_string());
    }
    if reasons.len() < MAX_FIT_REASONS {
        if let Some(industry) = &job.industry {
            reasons.push(format!("Clear industry focus ({industry})"));
        }
    }
    if reasons.len() < MAX_FIT_REASONS {
        if let Some(project_type) = &job.project_type {
            reasons.push(format!("Defined project type ({project_type})"));
        }
    }

    reasons.truncate(MAX_FIT_REASONS);
    reasons
}

/// Up to two risk factors in fixed order: unpaid test, scope creep, NDA.
pub fn risk_factors(job: &JobPosting) -> Vec<String> {
    let mut risks = Vec::with_capacity(MAX_RISK_FACTORS);

    if job.risk_flags.contains(&RiskFlag::UnpaidTest) {
        risks.push("Requires unpaid test work".to_string());
    }
    if risks.len() < MAX_RISK_FACTORS && job.risk_flags.contains(&RiskFlag::ScopeCreep) {
        risks.push("History of scope creep".to_string());
    }
    if risks.len() < MAX_RISK_FACTORS && job.risk_flags.contains(&RiskFlag::ExtremeNda) {
        risks.push("Extreme NDA terms".to_string());
    }

    risks.truncate(MAX_RISK_FACTORS);
    risks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strong_client_job() -> JobPosting {
        JobPosting {
            id: 42,
            client_verified: true,
            client_spend_tier: Some("50k+".into()),
            client_hire_rate: Some(40),
            client_rating: Some(4.8),
            industry: Some("AI".into()),
            project_type: Some("fixed".into()),
            risk_flags: vec![RiskFlag::UnpaidTest, RiskFlag::ScopeCreep],
            ..JobPosting::default()
        }
    }

    #[test]
    fn scores_reference_posting_at_thirty_five() {
        // 8+7+5+5 reliability, 10+10 budget realism, 5+5 scope, -20 risk.
        let fit = score_client_fit(&strong_client_job());
        assert_eq!(fit.score, 35.0);
    }

    #[test]
    fn reference_posting_reasons_and_risks() {
        let fit = score_client_fit(&strong_client_job());
        assert_eq!(fit.reasons.len(), 3);
        assert_eq!(fit.reasons[0], "Verified payment method");
        assert_eq!(
            fit.risks,
            vec![
                "Requires unpaid test work".to_string(),
                "History of scope creep".to_string()
            ]
        );
    }

    #[test]
    fn reason_list_never_exceeds_three() {
        let job = strong_client_job();
        let reasons = fit_reasons(&job);
        assert!(reasons.len() <= 3);
    }

    #[test]
    fn risk_list_never_exceeds_two() {
        let mut job = strong_client_job();
        job.risk_flags = vec![
            RiskFlag::UnpaidTest,
            RiskFlag::ScopeCreep,
            RiskFlag::ExtremeNda,
        ];
        let risks = risk_factors(&job);
        assert_eq!(risks.len(), 2);
        assert_eq!(risks[0], "Requires unpaid test work");
    }

    #[test]
    fn output_is_deterministic_across_calls() {
        let job = strong_client_job();
        let first = score_client_fit(&job);
        let second = score_client_fit(&job);
        assert_eq!(first.score, second.score);
        assert_eq!(first.reasons, second.reasons);
        assert_eq!(first.risks, second.risks);
    }

    #[test]
    fn bare_posting_scores_zero_with_no_reasons() {
        let fit = score_client_fit(&JobPosting::default());
        assert_eq!(fit.score, 0.0);
        assert!(fit.reasons.is_empty());
        assert!(fit.risks.is_empty());
    }

    #[test]
    fn score_is_clamped_at_zero() {
        let job = JobPosting {
            risk_flags: vec![
                RiskFlag::UnpaidTest,
                RiskFlag::ScopeCreep,
                RiskFlag::ExtremeNda,
            ],
            ..JobPosting::default()
        };
        // Three flags penalize 30 points even though only two surface as
        // risk factors.
        let fit = score_client_fit(&job);
        assert_eq!(fit.score, 0.0);
        assert_eq!(fit.risks.len(), 2);
    }
}
