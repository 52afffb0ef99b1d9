/// Ranking weights. Sum to 100 before the risk penalty, which is strictly
/// subtractive so a flagged job can never outrank its unflagged twin.
pub const MATCH_WEIGHTS: Weights = Weights {
    skills: 40.0,
    rate: 20.0,
    location: 15.0,
    client: 25.0,
};

/// Points subtracted per risk flag present on a posting.
pub const RISK_FLAG_PENALTY: f64 = 10.0;

/// Hire-rate percentage above which a client earns the threshold bonus.
/// Shared with the client-fit scorer so both surfaces agree on what a
/// "reliable" client looks like.
pub const HIRE_RATE_THRESHOLD: i32 = 30;

/// Rating above which a client earns the threshold bonus.
pub const RATING_THRESHOLD: f64 = 4.5;

#[derive(Debug, Clone, Copy)]
pub struct Weights {
    pub skills: f64,
    pub rate: f64,
    pub location: f64,
    pub client: f64,
}

impl Weights {
    pub fn sum(&self) -> f64 {
        self.skills + self.rate + self.location + self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one_hundred() {
        assert!((MATCH_WEIGHTS.sum() - 100.0).abs() < 1e-9);
    }
}
