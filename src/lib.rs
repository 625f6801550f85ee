//! Traffic-split allocation and evaluation engine for short-link
//! redirects.
//!
//! A link with split testing enabled carries a [`VariantSet`]: 2..=100
//! destination variants whose integer weights always sum to exactly
//! 100, with element 0 acting as the control. This crate is the pure,
//! testable core behind that feature:
//!
//! - [`variant`] — the validated data model
//! - [`rebalance`] — add/remove/edit weights while keeping the sum-100
//!   invariant exact (floor-then-remainder arithmetic, reproducible)
//! - [`router`] — per-request selection from an injected RNG, plus
//!   deterministic key-hash assignment for sticky routing
//! - [`counters`] — lock-free per-variant access/conversion tallies
//! - [`evaluate`] — conversion rates, improvement over the control, the
//!   Low/Medium/High/VeryHigh confidence ladder, winner selection
//! - [`store`] — a concurrent registry tying the pieces together for
//!   the redirect-serving and link-management layers
//!
//! The surrounding application owns persistence, HTTP, slugs, and
//! sticky-session cookies. Everything here is synchronous and completes
//! in O(variant count).
//!
//! ```
//! use divvy::{SplitStore, Variant};
//!
//! let store = SplitStore::new();
//! let id = store
//!     .enable(vec![
//!         Variant::new("Original", "https://example.com/landing", 50),
//!         Variant::new("Variant B", "https://example.com/landing-b", 50),
//!     ])
//!     .unwrap();
//!
//! let mut rng = rand::thread_rng();
//! let decision = store.redirect(&id, &mut rng).unwrap();
//! assert!(decision.variant_index < 2);
//!
//! store.record_conversion(&id, decision.variant_index).unwrap();
//! let report = store.report(&id).unwrap();
//! assert_eq!(report.variants.len(), 2);
//! ```

pub mod counters;
pub mod error;
pub mod evaluate;
pub mod rebalance;
pub mod router;
pub mod store;
pub mod variant;

pub use counters::{ArmCounters, ArmCounts};
pub use error::{ErrorKind, Result, SplitError};
pub use evaluate::{confidence_tier, conversion_rate, improvement, winner, ConfidenceTier};
pub use router::{route, route_by_key};
pub use store::{
    RoutingDecision, SplitReport, SplitStore, SplitTest, VariantReport, WinnerSummary,
};
pub use variant::{Variant, VariantSet};
