//! Tiered commission calculator.
//!
//! A payout is computed in a single pass over the structure:
//!
//! 1. **Rate** - the first tier, in configured order, whose `[min, max]`
//!    range contains the deal value. A tier without `max` is unbounded above.
//!    No matching tier means a rate of zero.
//! 2. **Commission** - `deal_value * rate`.
//! 3. **Performance bonus** - the *last* bonus, in configured order, whose
//!    threshold is at or below the deal value.
//! 4. **Total** - `weekly_base + commission + bonus`.
//!
//! Monetary outputs are rounded to cents.

use serde::{Deserialize, Serialize};

/// One commission bracket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionTier {
    pub min: f64,
    #[serde(default)]
    pub max: Option<f64>,
    pub rate: f64,
}

impl CommissionTier {
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && self.max.is_none_or(|max| value <= max)
    }
}

/// Flat bonus unlocked at a deal-value threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceBonus {
    pub threshold: f64,
    pub bonus: f64,
}

/// Inputs the calculator needs from a stored structure.
#[derive(Debug, Clone, Default)]
pub struct CommissionPlan<'a> {
    pub weekly_base: f64,
    pub tiers: &'a [CommissionTier],
    pub bonuses: &'a [PerformanceBonus],
}

/// Result of a calculation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommissionBreakdown {
    pub deal_value: f64,
    pub commission_rate: f64,
    pub commission_amount: f64,
    pub weekly_base: f64,
    pub performance_bonus: f64,
    pub total_amount: f64,
}

/// Rate of the first tier containing `deal_value`.
#[must_use]
pub fn tier_rate(tiers: &[CommissionTier], deal_value: f64) -> f64 {
    tiers
        .iter()
        .find(|tier| tier.contains(deal_value))
        .map_or(0.0, |tier| tier.rate)
}

/// Bonus of the last entry whose threshold is reached.
#[must_use]
pub fn performance_bonus(bonuses: &[PerformanceBonus], deal_value: f64) -> f64 {
    bonuses
        .iter()
        .rev()
        .find(|b| deal_value >= b.threshold)
        .map_or(0.0, |b| b.bonus)
}

/// Compute the payout for a single deal.
#[must_use]
pub fn calculate(plan: &CommissionPlan<'_>, deal_value: f64) -> CommissionBreakdown {
    let rate = tier_rate(plan.tiers, deal_value);
    let commission = round_cents(deal_value * rate);
    let bonus = round_cents(performance_bonus(plan.bonuses, deal_value));
    let weekly_base = round_cents(plan.weekly_base);

    CommissionBreakdown {
        deal_value,
        commission_rate: rate,
        commission_amount: commission,
        weekly_base,
        performance_bonus: bonus,
        total_amount: round_cents(weekly_base + commission + bonus),
    }
}

/// Round to two decimal places.
#[must_use]
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
