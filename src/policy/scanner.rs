use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::page_table::{PageSnapshot, PageTable};
use crate::policy::Tier;
use crate::server::MigrationMsg;
use crate::util::constants::PUSH_BACKOFF_NANOS;
use crate::util::queue::RingBuffer;

/// The policy engine. Walks the page table round-robin, classifies each page
/// against the hot and cold thresholds, and asks the migration worker to move
/// pages whose classification warrants a tier change.
///
/// The scanner only ever reads snapshots; mutating `tier` is the migration
/// worker's exclusive right. A snapshot can go stale between classification
/// and execution, which at worst produces one spurious request that the
/// migration worker filters idempotently.
pub struct Scanner {
    page_table: Arc<PageTable>,
    running: AtomicBool,
    hot_access_cnt: usize,
    cold_interval_ns: u64,
    scan_interval: Duration,
}

impl Scanner {
    pub fn new(
        page_table: Arc<PageTable>,
        hot_access_cnt: usize,
        cold_interval: Duration,
        scan_interval: Duration,
    ) -> Self {
        Self {
            page_table,
            running: AtomicBool::new(false),
            hot_access_cnt,
            cold_interval_ns: cold_interval.as_nanos() as u64,
            scan_interval,
        }
    }

    /// Is the page hot: accessed at least `hot_access_cnt` times this epoch?
    pub fn is_hot(&self, page: &PageSnapshot) -> bool {
        page.access_count >= self.hot_access_cnt
    }

    /// Is the page cold: untouched for at least the cold interval?
    pub fn is_cold(&self, page: &PageSnapshot) -> bool {
        self.page_table.now_ns().saturating_sub(page.last_access_ns) >= self.cold_interval_ns
    }

    /// The tier the page should move to, if any.
    ///
    /// On REMOTE the cold check runs first; a page that is both cold and hot
    /// demotes. The hot predicate is not consulted on the same step.
    pub fn classify(&self, page: &PageSnapshot) -> Option<Tier> {
        match page.tier {
            Tier::Local => {
                if self.is_cold(page) {
                    debug!("cold page detected in LOCAL: page {}", page.page_id);
                    Some(Tier::Remote)
                } else {
                    None
                }
            }
            Tier::Remote => {
                if self.is_cold(page) {
                    debug!("cold page detected in REMOTE: page {}", page.page_id);
                    Some(Tier::Pmem)
                } else if self.is_hot(page) {
                    debug!("hot page detected in REMOTE: page {}", page.page_id);
                    Some(Tier::Local)
                } else {
                    None
                }
            }
            Tier::Pmem => {
                if self.is_hot(page) {
                    debug!("hot page detected in PMEM: page {}", page.page_id);
                    Some(Tier::Remote)
                } else {
                    None
                }
            }
        }
    }

    /// One scanner step: advance the cursor, classify, and hand any resulting
    /// request to the migration queue. The push spins with a short back-off
    /// until the queue accepts; requests are never dropped while the scanner
    /// is meant to keep running.
    pub fn scan_step(&self, queue: &RingBuffer<MigrationMsg>) {
        let page = self.page_table.scan_next();
        if let Some(target) = self.classify(&page) {
            let mut msg = MigrationMsg {
                page_id: page.page_id,
                target,
            };
            while let Err(rejected) = queue.try_push(msg) {
                if !self.is_running() {
                    return;
                }
                msg = rejected;
                thread::sleep(Duration::from_nanos(PUSH_BACKOFF_NANOS));
            }
        }
    }

    /// The scanner loop. Runs until [`stop`](Self::stop), pausing for the
    /// scan interval between steps to avoid busy-spinning the table.
    pub fn run(&self, queue: &RingBuffer<MigrationMsg>) {
        self.running.store(true, Ordering::SeqCst);
        info!(
            "scanner running: hot at {} accesses, cold after {} ms",
            self.hot_access_cnt,
            self.cold_interval_ns / 1_000_000
        );
        while self.is_running() {
            self.scan_step(queue);
            thread::sleep(self.scan_interval);
        }
        info!("scanner stopped");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
