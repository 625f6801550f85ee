//! Concurrent registry of live split tests.
//!
//! The redirect-serving layer calls [`SplitStore::redirect`] once per
//! request; the link-management layer enables, edits, and reports. Each
//! test is stored as an immutable [`SplitTest`] snapshot behind the map
//! entry: admin operations build a fresh snapshot and swap it in whole,
//! so routing never observes a partially rebalanced set. Counters ride
//! along by `Arc`, which is what keeps increments from being lost
//! across a swap.

use std::sync::Arc;

use dashmap::DashMap;
use rand::Rng;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::counters::{ArmCounters, ArmCounts};
use crate::error::{Result, SplitError};
use crate::evaluate::{self, ConfidenceTier};
use crate::router;
use crate::variant::{Variant, VariantSet};

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// One live split test: a validated variant set plus its outcome
/// counters, index-aligned.
#[derive(Debug, Clone)]
pub struct SplitTest {
    pub id: Uuid,
    pub created_at: i64,
    set: VariantSet,
    counters: Vec<Arc<ArmCounters>>,
}

impl SplitTest {
    fn new(id: Uuid, set: VariantSet) -> Self {
        let counters = (0..set.len()).map(|_| Arc::new(ArmCounters::new())).collect();
        Self {
            id,
            created_at: now_ms(),
            set,
            counters,
        }
    }

    pub fn variant_set(&self) -> &VariantSet {
        &self.set
    }

    /// Snapshot of every variant's counts, index-aligned with the set.
    pub fn counts(&self) -> Vec<ArmCounts> {
        self.counters.iter().map(|c| c.snapshot()).collect()
    }

    fn counter(&self, index: usize) -> Result<&Arc<ArmCounters>> {
        self.counters.get(index).ok_or(SplitError::IndexOutOfRange {
            index,
            len: self.counters.len(),
        })
    }

    fn decision(&self, index: usize) -> RoutingDecision {
        RoutingDecision {
            variant_index: index,
            destination_url: self.set.variants()[index].destination_url.clone(),
        }
    }
}

/// The outcome of routing one redirect request. The caller performs the
/// actual HTTP redirect (and owns any sticky-session cookie).
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    pub variant_index: usize,
    pub destination_url: String,
}

/// One row of the analytics view.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VariantReport {
    pub name: String,
    pub destination_url: String,
    pub weight: u32,
    pub accesses: u64,
    pub conversions: u64,
    pub conversion_rate: f64,
    /// Relative to the control; `0.0` for the control itself.
    pub improvement: f64,
    /// `None` for the control — it has nothing to be confident against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<ConfidenceTier>,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WinnerSummary {
    pub variant_index: usize,
    pub name: String,
    pub improvement: f64,
    pub confidence: ConfidenceTier,
}

/// The read-only analytics view for one split test.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SplitReport {
    pub id: Uuid,
    pub variants: Vec<VariantReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<WinnerSummary>,
}

/// Registry of every link's live split test, keyed by test id.
#[derive(Debug, Default)]
pub struct SplitStore {
    tests: DashMap<Uuid, Arc<SplitTest>>,
}

impl SplitStore {
    pub fn new() -> Self {
        Self {
            tests: DashMap::new(),
        }
    }

    /// Validates the supplied variants (at least two, weights 1..=99
    /// summing to exactly 100, unique names) and registers a new test.
    pub fn enable(&self, variants: Vec<Variant>) -> Result<Uuid> {
        let set = VariantSet::new(variants)?;
        let id = Uuid::new_v4();
        let count = set.len();
        self.tests.insert(id, Arc::new(SplitTest::new(id, set)));
        info!("[split] enabled test {} with {} variants", id, count);
        Ok(id)
    }

    /// Tears a test down; the parent link falls back to its single
    /// destination.
    pub fn disable(&self, id: &Uuid) -> Result<()> {
        self.tests
            .remove(id)
            .map(|_| ())
            .ok_or(SplitError::TestNotFound(*id))?;
        info!("[split] disabled test {}", id);
        Ok(())
    }

    pub fn get(&self, id: &Uuid) -> Result<Arc<SplitTest>> {
        self.tests
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(SplitError::TestNotFound(*id))
    }

    /// Pure routing decision — no counters touched.
    pub fn select<R: Rng + ?Sized>(&self, id: &Uuid, rng: &mut R) -> Result<RoutingDecision> {
        let test = self.get(id)?;
        Ok(test.decision(router::route(test.variant_set(), rng)))
    }

    /// Sticky selection for a stable visitor key — no counters touched.
    pub fn select_by_key(&self, id: &Uuid, key: &str) -> Result<RoutingDecision> {
        let test = self.get(id)?;
        Ok(test.decision(router::route_by_key(test.variant_set(), id, key)))
    }

    /// The per-request hot path: select a variant and record the click.
    pub fn redirect<R: Rng + ?Sized>(&self, id: &Uuid, rng: &mut R) -> Result<RoutingDecision> {
        let test = self.get(id)?;
        let index = router::route(test.variant_set(), rng);
        test.counter(index)?.record_access();
        Ok(test.decision(index))
    }

    pub fn record_access(&self, id: &Uuid, index: usize) -> Result<()> {
        let test = self.get(id)?;
        test.counter(index)?.record_access();
        Ok(())
    }

    /// Out-of-band goal event (tracking pixel, webhook) attributed to a
    /// variant. Never fails for a valid index.
    pub fn record_conversion(&self, id: &Uuid, index: usize) -> Result<()> {
        let test = self.get(id)?;
        test.counter(index)?.record_conversion();
        Ok(())
    }

    /// Admin: append a variant (weights rebalance, see `rebalance`).
    /// The new variant starts with fresh counters; existing counters
    /// carry over untouched.
    pub fn add_variant(&self, id: &Uuid, name: &str, destination_url: &str) -> Result<()> {
        self.mutate(id, |test| {
            let set = test.variant_set().add_variant(name, destination_url)?;
            let mut counters = test.counters.clone();
            counters.push(Arc::new(ArmCounters::new()));
            Ok(SplitTest {
                id: test.id,
                created_at: test.created_at,
                set,
                counters,
            })
        })
    }

    /// Admin: drop a variant; its traffic history goes with it.
    pub fn remove_variant(&self, id: &Uuid, index: usize) -> Result<()> {
        self.mutate(id, |test| {
            let set = test.variant_set().remove_variant(index)?;
            let mut counters = test.counters.clone();
            counters.remove(index);
            Ok(SplitTest {
                id: test.id,
                created_at: test.created_at,
                set,
                counters,
            })
        })
    }

    /// Admin: edit one weight; counts are untouched by weight edits.
    pub fn set_weight(&self, id: &Uuid, index: usize, weight: u32) -> Result<()> {
        self.mutate(id, |test| {
            let set = test.variant_set().set_weight(index, weight)?;
            Ok(SplitTest {
                id: test.id,
                created_at: test.created_at,
                set,
                counters: test.counters.clone(),
            })
        })
    }

    /// Applies an admin operation under the entry's write guard:
    /// concurrent admin calls serialize here, while routing holds only
    /// a short read guard to clone the current snapshot. On error the
    /// registered test is left exactly as it was.
    fn mutate<F>(&self, id: &Uuid, op: F) -> Result<()>
    where
        F: FnOnce(&SplitTest) -> Result<SplitTest>,
    {
        let mut entry = self
            .tests
            .get_mut(id)
            .ok_or(SplitError::TestNotFound(*id))?;
        let next = op(entry.value().as_ref())?;
        *entry.value_mut() = Arc::new(next);
        Ok(())
    }

    /// The analytics view: per-variant counts and comparisons plus the
    /// winner, if any variant beats the control. Counter reads are
    /// unlocked; rows may lag one another by an increment or two.
    pub fn report(&self, id: &Uuid) -> Result<SplitReport> {
        let test = self.get(id)?;
        let counts = test.counts();
        let control = counts[0];

        let variants = test
            .variant_set()
            .variants()
            .iter()
            .zip(&counts)
            .enumerate()
            .map(|(index, (variant, arm))| VariantReport {
                name: variant.name.clone(),
                destination_url: variant.destination_url.clone(),
                weight: variant.weight,
                accesses: arm.accesses,
                conversions: arm.conversions,
                conversion_rate: evaluate::conversion_rate(arm),
                improvement: if index == 0 {
                    0.0
                } else {
                    evaluate::improvement(arm, &control)
                },
                confidence: if index == 0 {
                    None
                } else {
                    Some(evaluate::confidence_tier(arm, &control))
                },
            })
            .collect();

        let winner = evaluate::winner(&counts).map(|index| WinnerSummary {
            variant_index: index,
            name: test.variant_set().variants()[index].name.clone(),
            improvement: evaluate::improvement(&counts[index], &control),
            confidence: evaluate::confidence_tier(&counts[index], &control),
        });

        Ok(SplitReport {
            id: *id,
            variants,
            winner,
        })
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn two_variants() -> Vec<Variant> {
        vec![
            Variant::new("Variant A", "https://example.com/a", 50),
            Variant::new("Variant B", "https://example.com/b", 50),
        ]
    }

    #[test]
    fn enable_validates_and_registers() {
        let store = SplitStore::new();
        let id = store.enable(two_variants()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&id).unwrap().variant_set().len(), 2);
    }

    #[test]
    fn enable_rejects_bad_weights() {
        let store = SplitStore::new();
        let err = store
            .enable(vec![
                Variant::new("A", "https://example.com/a", 60),
                Variant::new("B", "https://example.com/b", 50),
            ])
            .unwrap_err();
        assert_eq!(err, SplitError::WeightSumMismatch(110));
        assert!(store.is_empty());
    }

    #[test]
    fn disable_removes_the_test() {
        let store = SplitStore::new();
        let id = store.enable(two_variants()).unwrap();
        store.disable(&id).unwrap();
        assert_eq!(store.get(&id).unwrap_err(), SplitError::TestNotFound(id));
    }

    #[test]
    fn disable_unknown_id_fails() {
        let store = SplitStore::new();
        let id = Uuid::new_v4();
        assert_eq!(store.disable(&id).unwrap_err(), SplitError::TestNotFound(id));
    }

    #[test]
    fn redirect_records_the_access() {
        let store = SplitStore::new();
        let id = store.enable(two_variants()).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let decision = store.redirect(&id, &mut rng).unwrap();
        assert!(decision.variant_index < 2);

        let counts = store.get(&id).unwrap().counts();
        let total: u64 = counts.iter().map(|c| c.accesses).sum();
        assert_eq!(total, 1);
        assert_eq!(counts[decision.variant_index].accesses, 1);
    }

    #[test]
    fn select_leaves_counters_alone() {
        let store = SplitStore::new();
        let id = store.enable(two_variants()).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        store.select(&id, &mut rng).unwrap();
        let counts = store.get(&id).unwrap().counts();
        assert!(counts.iter().all(|c| c.accesses == 0));
    }

    #[test]
    fn select_by_key_is_stable() {
        let store = SplitStore::new();
        let id = store.enable(two_variants()).unwrap();
        let first = store.select_by_key(&id, "visitor-9").unwrap();
        for _ in 0..10 {
            assert_eq!(store.select_by_key(&id, "visitor-9").unwrap(), first);
        }
    }

    #[test]
    fn record_conversion_with_bad_index_fails_fast() {
        let store = SplitStore::new();
        let id = store.enable(two_variants()).unwrap();
        let err = store.record_conversion(&id, 5).unwrap_err();
        assert_eq!(err, SplitError::IndexOutOfRange { index: 5, len: 2 });
    }

    #[test]
    fn add_variant_carries_existing_counts() {
        let store = SplitStore::new();
        let id = store.enable(two_variants()).unwrap();
        store.record_access(&id, 0).unwrap();
        store.record_access(&id, 0).unwrap();

        store
            .add_variant(&id, "Variant C", "https://example.com/c")
            .unwrap();

        let test = store.get(&id).unwrap();
        assert_eq!(test.variant_set().weights(), vec![34, 33, 33]);
        let counts = test.counts();
        assert_eq!(counts[0].accesses, 2);
        assert_eq!(counts[2].accesses, 0);
    }

    #[test]
    fn remove_variant_drops_its_history() {
        let store = SplitStore::new();
        let id = store.enable(vec![
            Variant::new("A", "https://example.com/a", 40),
            Variant::new("B", "https://example.com/b", 30),
            Variant::new("C", "https://example.com/c", 30),
        ])
        .unwrap();
        store.record_access(&id, 1).unwrap();
        store.record_access(&id, 2).unwrap();

        store.remove_variant(&id, 1).unwrap();

        let test = store.get(&id).unwrap();
        assert_eq!(test.variant_set().weights(), vec![57, 43]);
        let counts = test.counts();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[1].accesses, 1, "C kept its count");
    }

    #[test]
    fn set_weight_keeps_counts() {
        let store = SplitStore::new();
        let id = store.enable(two_variants()).unwrap();
        store.record_access(&id, 1).unwrap();

        store.set_weight(&id, 0, 30).unwrap();

        let test = store.get(&id).unwrap();
        assert_eq!(test.variant_set().weights(), vec![30, 70]);
        assert_eq!(test.counts()[1].accesses, 1);
    }

    #[test]
    fn failed_admin_op_leaves_test_unchanged() {
        let store = SplitStore::new();
        let id = store.enable(two_variants()).unwrap();
        let err = store.remove_variant(&id, 1).unwrap_err();
        assert_eq!(err, SplitError::TooFewVariants(1));
        assert_eq!(store.get(&id).unwrap().variant_set().weights(), vec![50, 50]);
    }

    #[test]
    fn report_flags_the_winner() {
        let store = SplitStore::new();
        let id = store.enable(two_variants()).unwrap();
        for _ in 0..200 {
            store.record_access(&id, 0).unwrap();
        }
        for _ in 0..10 {
            store.record_conversion(&id, 0).unwrap();
        }
        for _ in 0..210 {
            store.record_access(&id, 1).unwrap();
        }
        for _ in 0..21 {
            store.record_conversion(&id, 1).unwrap();
        }

        let report = store.report(&id).unwrap();
        let winner = report.winner.expect("variant should win");
        assert_eq!(winner.variant_index, 1);
        assert_eq!(winner.name, "Variant B");
        assert_eq!(winner.improvement, 100.0);
        assert_eq!(winner.confidence, ConfidenceTier::High);

        assert_eq!(report.variants[0].improvement, 0.0);
        assert!(report.variants[0].confidence.is_none());
        assert_eq!(report.variants[1].conversion_rate, 0.1);
    }

    #[test]
    fn report_has_no_winner_when_control_leads() {
        let store = SplitStore::new();
        let id = store.enable(two_variants()).unwrap();
        for _ in 0..100 {
            store.record_access(&id, 0).unwrap();
            store.record_access(&id, 1).unwrap();
        }
        for _ in 0..20 {
            store.record_conversion(&id, 0).unwrap();
        }
        for _ in 0..10 {
            store.record_conversion(&id, 1).unwrap();
        }
        assert!(store.report(&id).unwrap().winner.is_none());
    }

    #[test]
    fn report_serializes_to_camel_case() {
        let store = SplitStore::new();
        let id = store.enable(two_variants()).unwrap();
        let json = serde_json::to_string(&store.report(&id).unwrap()).unwrap();
        assert!(json.contains("destinationUrl"));
        assert!(json.contains("conversionRate"));
        assert!(!json.contains("\"winner\""), "no winner key without one");
    }
}
