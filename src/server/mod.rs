//! The server: the access worker and the migration worker.

mod access;
mod messages;
mod migration;

pub use self::messages::{AccessMsg, MigrationMsg, OpKind};

use enum_map::EnumMap;

use std::sync::Arc;

use crate::global_state::GlobalState;
use crate::page_table::PageTable;
use crate::policy::Tier;
use crate::util::numa::NumaOps;
use crate::util::queue::RingBuffer;
use crate::util::statistics::Stats;

/// Executes client accesses and migration requests against the page table and
/// the backing memory. Two workers share this state: the access worker drains
/// the client queue, the migration worker drains the scanner queue. The
/// handlers are exposed individually so the two loops, and tests, can drive
/// them directly.
pub struct Server {
    page_table: Arc<PageTable>,
    access_queue: Arc<RingBuffer<AccessMsg>>,
    migration_queue: Arc<RingBuffer<MigrationMsg>>,
    stats: Arc<Stats>,
    state: Arc<GlobalState>,
    numa: Arc<dyn NumaOps>,
    /// The NUMA node backing each tier.
    node_of: EnumMap<Tier, usize>,
    /// The first logical page id of each client's range.
    base_page_id: Vec<usize>,
    /// The size, in pages, of each client's range.
    addr_space_pages: Vec<usize>,
}

impl Server {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        page_table: Arc<PageTable>,
        access_queue: Arc<RingBuffer<AccessMsg>>,
        migration_queue: Arc<RingBuffer<MigrationMsg>>,
        stats: Arc<Stats>,
        state: Arc<GlobalState>,
        numa: Arc<dyn NumaOps>,
        node_of: EnumMap<Tier, usize>,
        client_sizes: &[usize],
    ) -> Self {
        // Each client owns a contiguous range of page ids, in client order.
        let mut base_page_id = Vec::with_capacity(client_sizes.len());
        let mut current_base = 0;
        for &size in client_sizes {
            base_page_id.push(current_base);
            current_base += size;
        }
        debug_assert_eq!(current_base, page_table.len());

        Self {
            page_table,
            access_queue,
            migration_queue,
            stats,
            state,
            numa,
            node_of,
            base_page_id,
            addr_space_pages: client_sizes.to_vec(),
        }
    }

    /// The logical page id behind a client-relative offset. An offset outside
    /// the client's space violates the workload contract and is fatal.
    pub fn resolve_page_id(&self, client_id: usize, offset: usize) -> usize {
        assert!(
            client_id < self.base_page_id.len(),
            "unknown client {}",
            client_id
        );
        assert!(
            offset < self.addr_space_pages[client_id],
            "client {} offset {} outside its address space of {} pages",
            client_id,
            offset,
            self.addr_space_pages[client_id]
        );
        self.base_page_id[client_id] + offset
    }
}
