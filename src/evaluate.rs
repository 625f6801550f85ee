//! Comparative statistics over outcome counts.
//!
//! These are the exact formulas the reporting surface has always shown:
//! conversion rate, relative improvement over the control, and the
//! Low/Medium/High/VeryHigh confidence ladder. The ladder is a heuristic
//! proxy combining sample size and effect size — it is not a
//! significance test, and its thresholds must not drift.

use serde::{Deserialize, Serialize};

use crate::counters::ArmCounts;

/// Coarse confidence in an observed difference.
///
/// Ordered: `Low < Medium < High < VeryHigh`.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "camelCase")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
    VeryHigh,
}

/// Conversions per access, `0.0` for a variant nobody has clicked —
/// regardless of any conversions recorded ahead of their access.
pub fn conversion_rate(counts: &ArmCounts) -> f64 {
    if counts.accesses == 0 {
        return 0.0;
    }
    counts.conversions as f64 / counts.accesses as f64
}

/// Relative improvement of `variant` over `control`, in percent.
/// `0.0` when the control has no conversion rate to compare against.
pub fn improvement(variant: &ArmCounts, control: &ArmCounts) -> f64 {
    let control_rate = conversion_rate(control);
    if control_rate == 0.0 {
        return 0.0;
    }
    (conversion_rate(variant) - control_rate) / control_rate * 100.0
}

/// The confidence ladder: combined sample size buys a tier, a large
/// enough effect size buys one more. Evaluated strictly in order.
pub fn confidence_tier(variant: &ArmCounts, control: &ArmCounts) -> ConfidenceTier {
    let total = variant.accesses + control.accesses;
    let delta = improvement(variant, control).abs();

    if total < 30 {
        return ConfidenceTier::Low;
    }
    if total < 100 {
        return if delta > 20.0 {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        };
    }
    if total < 500 {
        return if delta > 10.0 {
            ConfidenceTier::High
        } else {
            ConfidenceTier::Medium
        };
    }
    if delta > 5.0 {
        ConfidenceTier::VeryHigh
    } else {
        ConfidenceTier::High
    }
}

/// Index of the variant with the highest conversion rate, or `None`
/// when the control (index 0) is itself the leader or ties it.
///
/// First-wins on equal rates, so a challenger that merely matches the
/// leader never displaces it.
pub fn winner(counts: &[ArmCounts]) -> Option<usize> {
    let control = counts.first()?;
    let mut best = 0;
    for (index, candidate) in counts.iter().enumerate().skip(1) {
        if conversion_rate(candidate) > conversion_rate(&counts[best]) {
            best = index;
        }
    }
    if best == 0 || conversion_rate(&counts[best]) <= conversion_rate(control) {
        return None;
    }
    Some(best)
}
