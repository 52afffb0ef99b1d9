use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

/// Platform cut at the undiscounted rate, in basis points.
pub const BASE_RATE_BPS: i64 = 500;
/// Loyalty discount, in basis points, applied from `DISCOUNT_LEVEL` up.
pub const LEVEL_DISCOUNT_BPS: i64 = 100;
pub const DISCOUNT_LEVEL: i32 = 30;

/// Commission split for one gross amount. All monetary fields are integer
/// minor-currency units; `net_cents + final_commission_cents == gross_cents`
/// holds exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionBreakdown {
    pub gross_cents: i64,
    pub base_rate: f64,
    pub level_discount: f64,
    pub effective_rate: f64,
    /// Cut at the undiscounted base rate. Kept for audit even when a
    /// discount applies; it is never what gets charged.
    pub commission_cents: i64,
    pub final_commission_cents: i64,
    pub net_cents: i64,
}

/// Round-half-up `amount * bps / 10_000` in integer arithmetic.
fn apply_bps(amount_cents: i64, bps: i64) -> i64 {
    let scaled = amount_cents as i128 * bps as i128;
    ((scaled + 5_000) / 10_000) as i64
}

/// Split a gross amount into platform commission and freelancer net.
///
/// Pure and total: negative gross is treated as zero, levels below one as
/// one. Each rounded quantity is computed independently from the gross
/// rather than derived from another rounded value; the net alone is exact
/// by construction.
pub fn compute_commission(gross_cents: i64, user_level: i32) -> CommissionBreakdown {
    let gross = gross_cents.max(0);
    let level = user_level.max(1);

    let discount_bps = if level >= DISCOUNT_LEVEL {
        LEVEL_DISCOUNT_BPS
    } else {
        0
    };
    let effective_bps = (BASE_RATE_BPS - discount_bps).max(0);

    let commission_cents = apply_bps(gross, BASE_RATE_BPS);
    let final_commission_cents = apply_bps(gross, effective_bps);

    CommissionBreakdown {
        gross_cents: gross,
        base_rate: BASE_RATE_BPS as f64 / 10_000.0,
        level_discount: discount_bps as f64 / 10_000.0,
        effective_rate: effective_bps as f64 / 10_000.0,
        commission_cents,
        final_commission_cents,
        net_cents: gross - final_commission_cents,
    }
}

/// Rolling aggregation window for commission summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryWindow {
    Month,
    Year,
}

impl SummaryWindow {
    pub fn start_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let months = match self {
            SummaryWindow::Month => 1,
            SummaryWindow::Year => 12,
        };
        now.checked_sub_months(Months::new(months)).unwrap_or(now)
    }
}

/// One persisted commission log row, as read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommissionEntry {
    pub gross_cents: i64,
    pub final_commission_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommissionSummary {
    pub window: SummaryWindow,
    pub total_volume_cents: i64,
    pub total_commission_cents: i64,
    /// total commission / total volume; zero when there was no volume.
    pub average_rate: f64,
    pub entry_count: usize,
}

/// Sum a user's outgoing commission entries over a rolling window ending at
/// `now`. Storage hands us the rows; the arithmetic stays testable on its
/// own.
pub fn summarize(
    entries: &[CommissionEntry],
    window: SummaryWindow,
    now: DateTime<Utc>,
) -> CommissionSummary {
    let since = window.start_from(now);

    let mut total_volume_cents: i64 = 0;
    let mut total_commission_cents: i64 = 0;
    let mut entry_count = 0;

    for entry in entries {
        if entry.created_at < since || entry.created_at > now {
            continue;
        }
        total_volume_cents += entry.gross_cents;
        total_commission_cents += entry.final_commission_cents;
        entry_count += 1;
    }

    let average_rate = if total_volume_cents > 0 {
        total_commission_cents as f64 / total_volume_cents as f64
    } else {
        0.0
    };

    CommissionSummary {
        window,
        total_volume_cents,
        total_commission_cents,
        average_rate,
        entry_count,
    }
}
