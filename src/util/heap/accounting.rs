use enum_map::{enum_map, EnumMap};

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::policy::Tier;

/// Tracks how many pages currently live on each tier.
///
/// The sum over all tiers is invariant: pages move between tiers but are never
/// created or destroyed after init. The configured capacities bound the
/// initial placement; migrations may later pack more pages onto a tier than
/// its region holds, because a migrated page keeps its virtual backing and
/// only its physical placement moves.
pub struct TierAccounting {
    counts: EnumMap<Tier, AtomicUsize>,
    capacities: EnumMap<Tier, usize>,
}

impl TierAccounting {
    pub fn new(capacities: EnumMap<Tier, usize>) -> Self {
        Self {
            counts: enum_map! { _ => AtomicUsize::new(0) },
            capacities,
        }
    }

    /// Inform of a page placed on `tier` during page-table init. Initial
    /// placement must stay within the tier's configured capacity.
    pub fn place_initial(&self, tier: Tier) {
        let prev = self.counts[tier].fetch_add(1, Ordering::Relaxed);
        debug_assert!(
            prev < self.capacities[tier],
            "initial placement overflows {} capacity {}",
            tier,
            self.capacities[tier]
        );
    }

    /// Inform of a page moving from `from` to `to`. Called with the page
    /// table's tier update serialized, so the two adjustments cannot interleave
    /// with another transfer.
    pub fn transfer(&self, from: Tier, to: Tier) {
        debug_assert!(from != to);
        self.counts[to].fetch_add(1, Ordering::Relaxed);
        let _prev = self.counts[from].fetch_sub(1, Ordering::Relaxed);
        debug_assert!(_prev >= 1);
    }

    pub fn count(&self, tier: Tier) -> usize {
        self.counts[tier].load(Ordering::Relaxed)
    }

    pub fn capacity(&self, tier: Tier) -> usize {
        self.capacities[tier]
    }

    /// Pages across all tiers. Always equals the page-table size after init.
    pub fn total(&self) -> usize {
        self.counts.values().map(|c| c.load(Ordering::Relaxed)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_conserves_total() {
        let accounting = TierAccounting::new(enum_map! {
            Tier::Local => 1,
            Tier::Remote => 1,
            Tier::Pmem => 2,
        });
        accounting.place_initial(Tier::Local);
        accounting.place_initial(Tier::Pmem);
        accounting.place_initial(Tier::Pmem);
        assert_eq!(accounting.total(), 3);

        accounting.transfer(Tier::Pmem, Tier::Remote);
        assert_eq!(accounting.count(Tier::Pmem), 1);
        assert_eq!(accounting.count(Tier::Remote), 1);
        assert_eq!(accounting.total(), 3);
        assert_eq!(accounting.capacity(Tier::Pmem), 2);
    }
}
