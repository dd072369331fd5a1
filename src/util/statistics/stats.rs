use enum_map::{enum_map, EnumMap};

use crate::policy::{Tier, Transition};
use crate::util::statistics::counter::{EventCounter, LatencyCounter};

/// The metrics of one TierMem instance: accesses and access latency per tier,
/// and migrations per transition. Held by the instance and handed to the
/// workers as an injected collaborator; there is no process-wide singleton.
pub struct Stats {
    accesses: EnumMap<Tier, EventCounter>,
    latency: EnumMap<Tier, LatencyCounter>,
    migrations: EnumMap<Transition, EventCounter>,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            accesses: enum_map! { _ => EventCounter::new() },
            latency: enum_map! { _ => LatencyCounter::new() },
            migrations: enum_map! { _ => EventCounter::new() },
        }
    }

    /// Record one access served from `tier`, with its measured latency.
    pub fn record_access(&self, tier: Tier, latency_ns: u64) {
        self.accesses[tier].inc();
        self.latency[tier].record(latency_ns);
    }

    /// Record one completed migration. Pairs outside the policy's four
    /// transitions are not counted.
    pub fn record_migration(&self, from: Tier, to: Tier) {
        if let Some(transition) = Transition::between(from, to) {
            self.migrations[transition].inc();
        }
    }

    pub fn access_count(&self, tier: Tier) -> u64 {
        self.accesses[tier].value()
    }

    pub fn total_accesses(&self) -> u64 {
        self.accesses.values().map(|c| c.value()).sum()
    }

    pub fn migration_count(&self, transition: Transition) -> u64 {
        self.migrations[transition].value()
    }

    pub fn total_migrations(&self) -> u64 {
        self.migrations.values().map(|c| c.value()).sum()
    }

    pub fn latency(&self, tier: Tier) -> &LatencyCounter {
        &self.latency[tier]
    }

    /// Print the totals in a fixed format. Called once, as the last step of a
    /// shutdown.
    pub fn print_stats(&self) {
        println!(
            "============================ TierMem Statistics Totals ============================"
        );
        println!("tier\taccesses\tavg.ns\tmin.ns\tmax.ns");
        for (tier, counter) in self.accesses.iter() {
            let lat = &self.latency[tier];
            println!(
                "{}\t{}\t{:.0}\t{}\t{}",
                tier,
                counter.value(),
                lat.mean_ns(),
                lat.min_ns().unwrap_or(0),
                lat.max_ns()
            );
        }
        println!("migrations:");
        for (transition, counter) in self.migrations.iter() {
            println!("{}\t{}", transition, counter.value());
        }
        println!(
            "------------------------------ End TierMem Statistics -----------------------------"
        );
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_tier_and_per_transition_counters() {
        let stats = Stats::new();
        stats.record_access(Tier::Local, 100);
        stats.record_access(Tier::Local, 200);
        stats.record_access(Tier::Pmem, 900);
        stats.record_migration(Tier::Pmem, Tier::Remote);
        // Not a policy transition; ignored.
        stats.record_migration(Tier::Pmem, Tier::Pmem);

        assert_eq!(stats.access_count(Tier::Local), 2);
        assert_eq!(stats.access_count(Tier::Remote), 0);
        assert_eq!(stats.access_count(Tier::Pmem), 1);
        assert_eq!(stats.total_accesses(), 3);
        assert_eq!(stats.migration_count(Transition::PmemToRemote), 1);
        assert_eq!(stats.total_migrations(), 1);
        assert_eq!(stats.latency(Tier::Local).max_ns(), 200);
    }
}
