use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SplitError};

/// Weights are integer percentages; every valid set sums to exactly this.
pub const TOTAL_WEIGHT: u32 = 100;
/// Lower bound on any single variant weight.
pub const MIN_WEIGHT: u32 = 1;
/// Upper bound on any single variant weight.
pub const MAX_WEIGHT: u32 = 99;
/// A split needs something to compare against.
pub const MIN_VARIANTS: usize = 2;
/// With every weight at least 1, a set can never hold more than 100 variants.
pub const MAX_VARIANTS: usize = TOTAL_WEIGHT as usize;

/// One candidate destination in a split test.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub name: String,
    pub destination_url: String,
    pub weight: u32,
}

impl Variant {
    pub fn new(
        name: impl Into<String>,
        destination_url: impl Into<String>,
        weight: u32,
    ) -> Self {
        Self {
            name: name.into(),
            destination_url: destination_url.into(),
            weight,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SplitError::EmptyName);
        }
        if self.destination_url.trim().is_empty() {
            return Err(SplitError::MissingDestination(self.name.clone()));
        }
        if self.weight < MIN_WEIGHT || self.weight > MAX_WEIGHT {
            return Err(SplitError::WeightOutOfRange {
                name: self.name.clone(),
                weight: self.weight,
            });
        }
        Ok(())
    }
}

/// An ordered set of variants. Element 0 is the control.
///
/// The set is an immutable value: weight edits and membership changes
/// (see the `rebalance` module) produce a *new* set, so a reader holding
/// one never observes a half-applied change. Any `VariantSet` reachable
/// through the public API satisfies:
///
/// - weights sum to exactly [`TOTAL_WEIGHT`]
/// - every weight lies in `[MIN_WEIGHT, MAX_WEIGHT]`
/// - at least [`MIN_VARIANTS`] variants, each with a unique non-empty
///   name and a non-empty destination URL
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(transparent)]
pub struct VariantSet {
    variants: Vec<Variant>,
}

impl VariantSet {
    /// Validates `variants` and builds a set. The caller supplies the
    /// full membership including weights (the create/enable path); use
    /// the `rebalance` operations afterwards to grow or edit it.
    pub fn new(variants: Vec<Variant>) -> Result<Self> {
        let set = Self { variants };
        set.validate()?;
        Ok(set)
    }

    pub fn validate(&self) -> Result<()> {
        if self.variants.len() < MIN_VARIANTS {
            return Err(SplitError::TooFewVariants(self.variants.len()));
        }
        if self.variants.len() > MAX_VARIANTS {
            return Err(SplitError::SetFull(self.variants.len()));
        }
        let mut names = HashSet::with_capacity(self.variants.len());
        for variant in &self.variants {
            variant.validate()?;
            if !names.insert(variant.name.as_str()) {
                return Err(SplitError::DuplicateName(variant.name.clone()));
            }
        }
        let sum: u32 = self.variants.iter().map(|v| v.weight).sum();
        if sum != TOTAL_WEIGHT {
            return Err(SplitError::WeightSumMismatch(sum));
        }
        Ok(())
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// A valid set is never empty; kept for API completeness.
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Variant> {
        self.variants.get(index)
    }

    /// The baseline variant every comparison is made against.
    pub fn control(&self) -> &Variant {
        &self.variants[0]
    }

    pub fn weights(&self) -> Vec<u32> {
        self.variants.iter().map(|v| v.weight).collect()
    }
}
