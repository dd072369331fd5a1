use std::thread;
use std::time::{Duration, Instant};

use crate::server::{AccessMsg, OpKind, Server};
use crate::util::address::Address;
use crate::util::constants::POLL_INTERVAL_MICROS;
use crate::util::memory;

/// The value a WRITE touch stores.
const WRITE_PATTERN: u64 = 44;

/// Perform one cache-line-flushed touch at `addr` and measure it on the
/// monotonic clock. The flush keeps the CPU cache out of the measurement, so
/// the latency reflects the page's current tier.
fn timed_touch(addr: Address, op: OpKind) -> u64 {
    let start = Instant::now();
    memory::flush_cache_line(addr);
    match op {
        OpKind::Read => {
            let _ = unsafe { addr.load_volatile::<u64>() };
        }
        OpKind::Write => unsafe { addr.store_volatile::<u64>(WRITE_PATTERN) },
    }
    start.elapsed().as_nanos() as u64
}

impl Server {
    /// Execute one client access: resolve the page, update its metadata, and
    /// touch the backing memory.
    ///
    /// A concurrent migration of the same page is tolerated; the OS primitive
    /// is safe against concurrent access, and at worst the measured latency
    /// includes the page movement.
    pub fn handle_access(&self, msg: AccessMsg) {
        debug!("server received: {}", msg);
        let page_id = self.resolve_page_id(msg.client_id, msg.offset);
        let snapshot = self.page_table.get(page_id);
        self.page_table.update_access(page_id);

        let latency_ns = timed_touch(snapshot.backing, msg.op);
        self.stats.record_access(snapshot.tier, latency_ns);
        debug!(
            "{} on page {} ({}) took {} ns",
            msg.op, page_id, snapshot.tier, latency_ns
        );
    }

    /// The access worker loop: drain the client queue until shutdown is
    /// requested and the queue is empty.
    pub fn run_access_worker(&self) {
        info!("access worker running");
        loop {
            match self.access_queue.try_pop() {
                Some(msg) => self.handle_access(msg),
                None => {
                    if self.state.shutdown_requested() {
                        break;
                    }
                    thread::sleep(Duration::from_micros(POLL_INTERVAL_MICROS));
                }
            }
        }
        info!("access worker stopped");
    }
}
