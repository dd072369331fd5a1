//! The concurrent page table: per-page metadata plus the rotating scan cursor.

use atomic::{Atomic, Ordering};
use enum_map::EnumMap;

use std::sync::atomic::{AtomicU64, AtomicUsize};
use std::sync::Mutex;
use std::time::Instant;

use crate::policy::Tier;
use crate::util::address::Address;
use crate::util::heap::{TierAccounting, TierRegions};

/// Metadata of one logical page.
///
/// The backing address is fixed at init and never changes again, migrations
/// included; only the physical placement behind it moves. The remaining fields
/// are per-entry atomics, so readers never block writers: accesses bump the
/// statistics wait-free, and the snapshot discipline of the scanner tolerates
/// reading the fields without a common critical section. Tier changes are the
/// exception: they are serialized by the table so the per-tier accounting
/// stays consistent.
struct PageMeta {
    backing: Address,
    tier: Atomic<Tier>,
    access_count: AtomicUsize,
    last_access_ns: AtomicU64,
}

/// A copy of one page's metadata, taken at one point in time. Carries the
/// page id so callers can refer back to the same entry.
#[derive(Copy, Clone, Debug)]
pub struct PageSnapshot {
    pub page_id: usize,
    pub backing: Address,
    pub tier: Tier,
    pub access_count: usize,
    /// Nanoseconds since the table epoch of the most recent access.
    pub last_access_ns: u64,
}

/// The table of all logical pages, indexed by page id `[0, len)`.
///
/// Entries are created once, at construction, and live until the table drops.
/// Initial placement is sequential: page ids `[0, local)` go to LOCAL, the
/// next chunk to REMOTE, and the rest to PMEM, matching the configured
/// capacities exactly.
pub struct PageTable {
    entries: Box<[PageMeta]>,
    /// The index `scan_next` hands out next. A dedicated atomic, so a scan
    /// step is one fetch-add and cannot starve accesses (nor be starved).
    cursor: AtomicUsize,
    accounting: TierAccounting,
    /// Serializes `update_tier` so the tier field and the accounting move
    /// together. Never held across a syscall.
    tier_lock: Mutex<()>,
    epoch: Instant,
}

impl PageTable {
    /// Build the table over the freshly allocated tier regions. The tier
    /// capacities must sum to `total_pages`; a mismatch is a configuration
    /// fault and fatal.
    pub fn new(
        total_pages: usize,
        capacities: EnumMap<Tier, usize>,
        regions: &TierRegions,
    ) -> Self {
        assert!(total_pages > 0, "cannot build an empty page table");
        let capacity_sum: usize = capacities.values().sum();
        assert_eq!(
            capacity_sum, total_pages,
            "tier capacities ({}) must cover the logical address space ({})",
            capacity_sum, total_pages
        );

        let accounting = TierAccounting::new(capacities);
        let mut entries = Vec::with_capacity(total_pages);
        for tier in [Tier::Local, Tier::Remote, Tier::Pmem] {
            let region = regions.get(tier);
            for index in 0..capacities[tier] {
                entries.push(PageMeta {
                    backing: region.page_address(index),
                    tier: Atomic::new(tier),
                    access_count: AtomicUsize::new(0),
                    last_access_ns: AtomicU64::new(0),
                });
                accounting.place_initial(tier);
            }
        }

        Self {
            entries: entries.into_boxed_slice(),
            cursor: AtomicUsize::new(0),
            accounting,
            tier_lock: Mutex::new(()),
            epoch: Instant::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Nanoseconds since the table epoch, on the monotonic clock. The scale
    /// `last_access_ns` is expressed in.
    pub fn now_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    /// A copy of the entry's current metadata.
    pub fn get(&self, page_id: usize) -> PageSnapshot {
        let entry = &self.entries[page_id];
        PageSnapshot {
            page_id,
            backing: entry.backing,
            tier: entry.tier.load(Ordering::SeqCst),
            access_count: entry.access_count.load(Ordering::SeqCst),
            last_access_ns: entry.last_access_ns.load(Ordering::SeqCst),
        }
    }

    /// Record one access: bump the count and refresh the access time.
    pub fn update_access(&self, page_id: usize) {
        let entry = &self.entries[page_id];
        entry.access_count.fetch_add(1, Ordering::SeqCst);
        entry.last_access_ns.store(self.now_ns(), Ordering::SeqCst);
    }

    /// Move the entry to `new_tier`, returning the tier it was on. The
    /// migration worker is the only caller during a run; the table still
    /// serializes, so the accounting transfer cannot interleave.
    pub fn update_tier(&self, page_id: usize, new_tier: Tier) -> Tier {
        let _guard = self.tier_lock.lock().unwrap();
        let entry = &self.entries[page_id];
        let old_tier = entry.tier.load(Ordering::SeqCst);
        if old_tier != new_tier {
            entry.tier.store(new_tier, Ordering::SeqCst);
            self.accounting.transfer(old_tier, new_tier);
        }
        old_tier
    }

    /// Read the entry under the cursor and advance it, wrapping modulo the
    /// table size. Any window of `len` steps visits every page exactly once.
    pub fn scan_next(&self) -> PageSnapshot {
        debug_assert!(!self.is_empty());
        let index = self.cursor.fetch_add(1, Ordering::SeqCst) % self.entries.len();
        self.get(index)
    }

    /// Zero every access count. An epoch boundary; exposed for policies that
    /// want periodic decay. The default scanner policy never calls it.
    pub fn reset_access_counts(&self) {
        for entry in self.entries.iter() {
            entry.access_count.store(0, Ordering::SeqCst);
        }
    }

    /// Pages currently on `tier`.
    pub fn tier_count(&self, tier: Tier) -> usize {
        self.accounting.count(tier)
    }

    /// The configured capacity of `tier`.
    pub fn tier_capacity(&self, tier: Tier) -> usize {
        self.accounting.capacity(tier)
    }

    /// Pages across all tiers; always equals `len()`.
    pub fn tier_total(&self) -> usize {
        self.accounting.total()
    }
}

#[cfg(test)]
mod tests {
    extern crate crossbeam;

    use super::*;
    use crate::util::heap::TierRegion;
    use crate::util::numa::MockNuma;
    use enum_map::enum_map;
    use std::thread;
    use std::time::Duration;

    fn build_table(local: usize, remote: usize, pmem: usize) -> (PageTable, TierRegions) {
        let numa = MockNuma::new();
        let regions = TierRegions::new(
            TierRegion::allocate(Tier::Local, local, 0, &numa).unwrap(),
            TierRegion::allocate(Tier::Remote, remote, 1, &numa).unwrap(),
            TierRegion::allocate(Tier::Pmem, pmem, 2, &numa).unwrap(),
        );
        let capacities = enum_map! {
            Tier::Local => local,
            Tier::Remote => remote,
            Tier::Pmem => pmem,
        };
        let table = PageTable::new(local + remote + pmem, capacities, &regions);
        (table, regions)
    }

    #[test]
    fn sequential_initial_placement() {
        let (table, regions) = build_table(2, 3, 4);
        assert_eq!(table.len(), 9);
        for pid in 0..2 {
            let snapshot = table.get(pid);
            assert_eq!(snapshot.tier, Tier::Local);
            assert_eq!(snapshot.backing, regions.get(Tier::Local).page_address(pid));
        }
        for pid in 2..5 {
            assert_eq!(table.get(pid).tier, Tier::Remote);
        }
        for pid in 5..9 {
            assert_eq!(table.get(pid).tier, Tier::Pmem);
        }
        assert_eq!(table.tier_count(Tier::Local), 2);
        assert_eq!(table.tier_count(Tier::Remote), 3);
        assert_eq!(table.tier_count(Tier::Pmem), 4);
        assert_eq!(table.tier_total(), 9);
    }

    #[test]
    #[should_panic]
    fn capacity_mismatch_is_fatal() {
        let numa = MockNuma::new();
        let regions = TierRegions::new(
            TierRegion::allocate(Tier::Local, 1, 0, &numa).unwrap(),
            TierRegion::allocate(Tier::Remote, 0, 1, &numa).unwrap(),
            TierRegion::allocate(Tier::Pmem, 0, 2, &numa).unwrap(),
        );
        let capacities = enum_map! {
            Tier::Local => 1,
            Tier::Remote => 0,
            Tier::Pmem => 0,
        };
        // Two logical pages, one backed page.
        PageTable::new(2, capacities, &regions);
    }

    #[test]
    fn scan_window_visits_every_page_once() {
        let (table, _regions) = build_table(2, 2, 1);
        for _window in 0..3 {
            let mut visited = [0usize; 5];
            for _ in 0..table.len() {
                visited[table.scan_next().page_id] += 1;
            }
            assert_eq!(visited, [1, 1, 1, 1, 1]);
        }
    }

    #[test]
    fn access_count_is_monotone() {
        let (table, _regions) = build_table(1, 0, 0);
        let mut last = 0;
        for _ in 0..10 {
            table.update_access(0);
            let count = table.get(0).access_count;
            assert!(count > last);
            last = count;
        }
        assert_eq!(last, 10);

        table.reset_access_counts();
        assert_eq!(table.get(0).access_count, 0);
    }

    #[test]
    fn update_access_refreshes_time() {
        let (table, _regions) = build_table(1, 0, 0);
        assert_eq!(table.get(0).last_access_ns, 0);
        thread::sleep(Duration::from_millis(5));
        table.update_access(0);
        let first = table.get(0).last_access_ns;
        assert!(first > 0);
        thread::sleep(Duration::from_millis(5));
        table.update_access(0);
        assert!(table.get(0).last_access_ns > first);
    }

    #[test]
    fn tier_update_moves_accounting() {
        let (table, _regions) = build_table(1, 1, 1);
        let before = table.get(2).backing;
        let old = table.update_tier(2, Tier::Remote);
        assert_eq!(old, Tier::Pmem);
        assert_eq!(table.get(2).tier, Tier::Remote);
        // The backing address survives the tier change.
        assert_eq!(table.get(2).backing, before);
        assert_eq!(table.tier_count(Tier::Remote), 2);
        assert_eq!(table.tier_count(Tier::Pmem), 0);
        assert_eq!(table.tier_total(), 3);

        // Same-tier update is a no-op.
        let old = table.update_tier(2, Tier::Remote);
        assert_eq!(old, Tier::Remote);
        assert_eq!(table.tier_count(Tier::Remote), 2);
    }

    #[test]
    fn concurrent_accesses_and_scans() {
        let (table, _regions) = build_table(4, 0, 4);
        crossbeam::scope(|scope| {
            let accessors: Vec<_> = (0..4)
                .map(|pid| {
                    let table = &table;
                    scope.spawn(move |_| {
                        for _ in 0..1000 {
                            table.update_access(pid);
                        }
                    })
                })
                .collect();
            // Scan concurrently; the cursor must keep making progress.
            for _ in 0..1000 {
                let _ = table.scan_next();
            }
            for handle in accessors {
                handle.join().unwrap();
            }
        })
        .unwrap();

        for pid in 0..4 {
            assert_eq!(table.get(pid).access_count, 1000);
        }
    }
}
