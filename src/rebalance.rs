//! Weight redistribution: add, remove, and edit variants while keeping
//! the sum-100 invariant exact.
//!
//! All three operations are pure — they build and validate a new
//! [`VariantSet`] and leave the input untouched on any error. The
//! floor-then-remainder arithmetic is a compatibility contract: the
//! numbers it produces are consumed by existing reporting and must not
//! be "improved" silently.

use tracing::debug;

use crate::error::{Result, SplitError};
use crate::variant::{
    Variant, VariantSet, MAX_VARIANTS, MAX_WEIGHT, MIN_VARIANTS, MIN_WEIGHT, TOTAL_WEIGHT,
};

impl VariantSet {
    /// Appends a variant, shrinking every existing weight to make room.
    ///
    /// The new variant takes `floor(100 / (n + 1))`; existing weights
    /// shrink by `floor(w * (100 - new) / 100)`, clamped up to 1; any
    /// rounding remainder settles on the control, so a 50/50 pair grows
    /// to exactly `{34, 33, 33}`.
    pub fn add_variant(
        &self,
        name: impl Into<String>,
        destination_url: impl Into<String>,
    ) -> Result<VariantSet> {
        let name = name.into();
        let destination_url = destination_url.into();
        if self.variants().iter().any(|v| v.name == name) {
            return Err(SplitError::DuplicateName(name));
        }
        if self.len() >= MAX_VARIANTS {
            return Err(SplitError::SetFull(self.len()));
        }

        let new_weight = (TOTAL_WEIGHT / (self.len() as u32 + 1)).max(MIN_WEIGHT);
        let mut variants: Vec<Variant> = self
            .variants()
            .iter()
            .map(|v| {
                let shrunk = v.weight * (TOTAL_WEIGHT - new_weight) / TOTAL_WEIGHT;
                Variant {
                    weight: shrunk.max(MIN_WEIGHT),
                    ..v.clone()
                }
            })
            .collect();
        variants.push(Variant::new(name, destination_url, new_weight));

        settle_remainder_on_control(&mut variants)?;
        let next = VariantSet::new(variants)?;
        debug!(
            "[split] added variant '{}' at weight {}, set now {:?}",
            next.variants()[next.len() - 1].name,
            new_weight,
            next.weights()
        );
        Ok(next)
    }

    /// Removes the variant at `index`, redistributing its weight across
    /// the survivors proportionally to their existing weights:
    /// `floor(w + w / total_remaining * removed)` each, with the rounding
    /// remainder going to the largest fractional parts (ties to the
    /// earliest variant). Removing 30 from `{40, 30, 30}` yields exactly
    /// `{57, 43}`.
    pub fn remove_variant(&self, index: usize) -> Result<VariantSet> {
        if index >= self.len() {
            return Err(SplitError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        if self.len() - 1 < MIN_VARIANTS {
            return Err(SplitError::TooFewVariants(self.len() - 1));
        }

        let removed = self.variants()[index].weight;
        let mut remaining: Vec<Variant> = self
            .variants()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, v)| v.clone())
            .collect();

        let total_remaining: u32 = remaining.iter().map(|v| v.weight).sum();
        if total_remaining == 0 {
            // Degenerate rule kept for compatibility; unreachable through
            // the public API since every weight is at least 1.
            let share = TOTAL_WEIGHT / remaining.len() as u32;
            for v in &mut remaining {
                v.weight = share;
            }
            remaining[0].weight += TOTAL_WEIGHT - share * remaining.len() as u32;
        } else {
            let mut fractions: Vec<(usize, f64)> = Vec::with_capacity(remaining.len());
            for (i, v) in remaining.iter_mut().enumerate() {
                let exact = v.weight as f64
                    + v.weight as f64 / total_remaining as f64 * removed as f64;
                v.weight = exact.floor() as u32;
                fractions.push((i, exact - exact.floor()));
            }
            let floored: u32 = remaining.iter().map(|v| v.weight).sum();
            let leftover = TOTAL_WEIGHT.saturating_sub(floored) as usize;
            // Stable sort: equal fractions keep index order, so ties go
            // to the earliest variant.
            fractions.sort_by(|a, b| {
                b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
            });
            for (i, _) in fractions.iter().take(leftover) {
                remaining[*i].weight += 1;
            }
        }

        let next = VariantSet::new(remaining)?;
        debug!(
            "[split] removed variant {} (weight {}), set now {:?}",
            index,
            removed,
            next.weights()
        );
        Ok(next)
    }

    /// Sets the weight of the variant at `index`, adjusting the others so
    /// the total stays exactly 100.
    ///
    /// `value` clamps into `[1, 99]` and then down to whatever the other
    /// variants' combined weight leaves room for. A shortfall is pushed to
    /// the next variant in cyclic order, cascading forward past variants
    /// already at the 99 cap until absorbed.
    pub fn set_weight(&self, index: usize, value: u32) -> Result<VariantSet> {
        if index >= self.len() {
            return Err(SplitError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }

        let mut variants = self.variants().to_vec();
        let others_sum: u32 = variants
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, v)| v.weight)
            .sum();
        let value = value
            .clamp(MIN_WEIGHT, MAX_WEIGHT)
            .min(TOTAL_WEIGHT - others_sum);
        variants[index].weight = value;

        let mut shortfall = TOTAL_WEIGHT - others_sum - value;
        let mut cursor = (index + 1) % variants.len();
        let mut steps = 0;
        while shortfall > 0 && steps <= 2 * variants.len() {
            if cursor != index {
                let room = MAX_WEIGHT - variants[cursor].weight;
                let take = shortfall.min(room);
                variants[cursor].weight += take;
                shortfall -= take;
            }
            cursor = (cursor + 1) % variants.len();
            steps += 1;
        }
        if shortfall > 0 {
            return Err(SplitError::Unbalanced(format!(
                "shortfall of {} not absorbed after editing index {}",
                shortfall, index
            )));
        }

        let next = VariantSet::new(variants)?;
        debug!(
            "[split] set weight of variant {} to {}, set now {:?}",
            index,
            value,
            next.weights()
        );
        Ok(next)
    }
}

/// Forces the running sum back to exactly 100 by adjusting the control.
/// Fails whole if the control would leave `[1, 99]`.
fn settle_remainder_on_control(variants: &mut [Variant]) -> Result<()> {
    let sum: i64 = variants.iter().map(|v| i64::from(v.weight)).sum();
    let remainder = i64::from(TOTAL_WEIGHT) - sum;
    let control = i64::from(variants[0].weight) + remainder;
    if control < i64::from(MIN_WEIGHT) || control > i64::from(MAX_WEIGHT) {
        return Err(SplitError::Unbalanced(format!(
            "control weight would become {}",
            control
        )));
    }
    variants[0].weight = control as u32;
    Ok(())
}
