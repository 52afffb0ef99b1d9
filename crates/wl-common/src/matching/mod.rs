pub mod client_fit;
pub mod scoring;
pub mod skills;
pub mod weights;

pub use client_fit::{fit_reasons, risk_factors, score_client_fit, ClientFitScore};
pub use scoring::{rank_jobs, MatchConfig, MatchEngine, MatchScore, RankedJob, ScoringResult};
pub use skills::{check_required_skills, SkillCoverage};
pub use weights::{Weights, MATCH_WEIGHTS};
