//! Per-variant outcome counters.
//!
//! A redirect and its eventual conversion arrive on different requests,
//! potentially thousands per second across threads. Each variant gets
//! its own pair of atomics so concurrent events never serialize on a
//! set-wide lock; reporting takes unlocked snapshots and tolerates the
//! counters moving between reads.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Lock-free access/conversion tallies for one variant.
///
/// Shared by `Arc` so counts survive copy-on-write replacement of the
/// surrounding variant set.
#[derive(Debug, Default)]
pub struct ArmCounters {
    accesses: AtomicU64,
    conversions: AtomicU64,
}

impl ArmCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// One click: the redirect was served for this variant.
    pub fn record_access(&self) {
        self.accesses.fetch_add(1, Ordering::Relaxed);
    }

    /// One goal event attributed to this variant. Conversions arrive
    /// out-of-band and may transiently outnumber accesses under
    /// concurrent skew; the recorder never rejects one.
    pub fn record_conversion(&self) {
        self.conversions.fetch_add(1, Ordering::Relaxed);
    }

    /// Unlocked point-in-time read of both tallies. The two loads are
    /// not a consistent pair and don't need to be.
    pub fn snapshot(&self) -> ArmCounts {
        ArmCounts {
            accesses: self.accesses.load(Ordering::Relaxed),
            conversions: self.conversions.load(Ordering::Relaxed),
        }
    }
}

/// Plain counts for one variant, as read at some instant.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArmCounts {
    pub accesses: u64,
    pub conversions: u64,
}

impl ArmCounts {
    pub fn new(accesses: u64, conversions: u64) -> Self {
        Self {
            accesses,
            conversions,
        }
    }
}
