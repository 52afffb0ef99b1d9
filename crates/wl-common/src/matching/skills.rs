use std::collections::HashMap;

use crate::{Skill, SkillLevel};

/// Outcome of comparing a posting's required skills against a profile.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillCoverage {
    pub required: usize,
    pub met: usize,
    /// Fraction of required skills met at equal-or-higher level. 0.0 when the
    /// posting declares no requirements (neutral, never negative).
    pub fraction: f64,
    pub matched: Vec<String>,
    pub missing: Vec<String>,
}

impl SkillCoverage {
    /// No requirements declared. Contributes nothing either way.
    pub fn neutral() -> Self {
        Self {
            required: 0,
            met: 0,
            fraction: 0.0,
            matched: vec![],
            missing: vec![],
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.required == 0
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Check each required skill for a profile skill with the same name at an
/// equal-or-higher ordinal level. Duplicate requirement names collapse to the
/// highest required level.
pub fn check_required_skills(required: &[Skill], possessed: &[Skill]) -> SkillCoverage {
    let mut requirements: HashMap<String, SkillLevel> = HashMap::new();
    for skill in required {
        let name = normalize_name(&skill.name);
        if name.is_empty() {
            continue;
        }
        requirements
            .entry(name)
            .and_modify(|level| *level = (*level).max(skill.level))
            .or_insert(skill.level);
    }

    if requirements.is_empty() {
        return SkillCoverage::neutral();
    }

    let mut levels: HashMap<String, SkillLevel> = HashMap::new();
    for skill in possessed {
        let name = normalize_name(&skill.name);
        if name.is_empty() {
            continue;
        }
        levels
            .entry(name)
            .and_modify(|level| *level = (*level).max(skill.level))
            .or_insert(skill.level);
    }

    let mut matched = Vec::new();
    let mut missing = Vec::new();
    for (name, required_level) in &requirements {
        match levels.get(name) {
            Some(level) if *level >= *required_level => matched.push(name.clone()),
            _ => missing.push(name.clone()),
        }
    }
    matched.sort();
    missing.sort();

    let required_count = requirements.len();
    let met = matched.len();

    SkillCoverage {
        required: required_count,
        met,
        fraction: met as f64 / required_count as f64,
        matched,
        missing,
    }
}
