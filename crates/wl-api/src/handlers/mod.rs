pub mod commission;
pub mod escrow;
pub mod health;
pub mod jobs;
pub mod matches;
