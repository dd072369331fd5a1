//! Synthetic workload clients.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::server::{AccessMsg, OpKind};
use crate::util::constants::PUSH_BACKOFF_NANOS;
use crate::util::options::AccessPattern;
use crate::util::queue::RingBuffer;

/// One synthetic client. Produces a fixed number of access messages against
/// its own `[0, addr_space_pages)` offset range, drawing offsets from its
/// configured distribution and alternating reads and writes.
pub struct Client {
    id: usize,
    queue: Arc<RingBuffer<AccessMsg>>,
    message_count: usize,
    addr_space_pages: usize,
    pattern: AccessPattern,
}

impl Client {
    pub fn new(
        id: usize,
        queue: Arc<RingBuffer<AccessMsg>>,
        message_count: usize,
        addr_space_pages: usize,
        pattern: AccessPattern,
    ) -> Self {
        assert!(addr_space_pages > 0, "client {} has an empty address space", id);
        Self {
            id,
            queue,
            message_count,
            addr_space_pages,
            pattern,
        }
    }

    fn offset(&self, rng: &mut StdRng, sequence: usize) -> usize {
        match self.pattern {
            AccessPattern::Uniform => rng.gen_range(0..self.addr_space_pages),
            AccessPattern::Sequential => sequence % self.addr_space_pages,
            AccessPattern::Hotspot => {
                // Nine in ten accesses land in the first tenth of the space.
                let hot_pages = (self.addr_space_pages / 10).max(1);
                if rng.gen_ratio(9, 10) {
                    rng.gen_range(0..hot_pages)
                } else {
                    rng.gen_range(0..self.addr_space_pages)
                }
            }
        }
    }

    /// Produce all messages, spinning with a short back-off whenever the
    /// queue is full. Offsets are drawn from a generator seeded by the client
    /// id, so a run is reproducible.
    pub fn run(self) {
        let mut rng = StdRng::seed_from_u64(self.id as u64);
        info!(
            "client {} producing {} {} messages over {} pages",
            self.id, self.message_count, self.pattern, self.addr_space_pages
        );
        for sequence in 0..self.message_count {
            let op = if sequence % 2 == 0 {
                OpKind::Read
            } else {
                OpKind::Write
            };
            let mut msg = AccessMsg {
                client_id: self.id,
                offset: self.offset(&mut rng, sequence),
                op,
            };
            while let Err(rejected) = self.queue.try_push(msg) {
                msg = rejected;
                thread::sleep(Duration::from_nanos(PUSH_BACKOFF_NANOS));
            }
            trace!("client sent: {}", msg);
        }
        debug!("client {} finished", self.id);
    }
}
