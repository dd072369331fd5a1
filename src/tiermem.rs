//! TierMem instance.

use enum_map::enum_map;

use std::io::Result;
use std::sync::{Arc, Mutex};
use std::thread;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::global_state::GlobalState;
use crate::page_table::PageTable;
use crate::policy::{Scanner, Tier};
use crate::server::{AccessMsg, MigrationMsg, Server};
use crate::util::heap::{TierRegion, TierRegions};
use crate::util::numa::NumaOps;
use crate::util::options::Options;
use crate::util::queue::RingBuffer;
use crate::util::statistics::Stats;

/// TierMem builder. Used to set options before creating an instance.
pub struct TierMemBuilder {
    /// The options for this instance.
    pub options: Options,
}

impl TierMemBuilder {
    /// Create a builder with options read from `TIERMEM_*` environment
    /// variables, or the built-in defaults where not overridden.
    pub fn new() -> Self {
        let mut builder = Self::new_no_env_vars();
        builder.options.read_env_var_settings();
        builder
    }

    /// Create a builder with the built-in defaults, ignoring the environment.
    pub fn new_no_env_vars() -> Self {
        TierMemBuilder {
            options: Options::default(),
        }
    }

    /// Set an option.
    pub fn set_option(&mut self, name: &str, val: &str) -> bool {
        self.options.set_from_command_line(name, val)
    }

    /// Set multiple options from a string of whitespace-separated key-value
    /// pairs, such as `buffer_size=4 message_count=1000`.
    pub fn set_options_bulk_by_str(&mut self, options: &str) -> bool {
        self.options.set_bulk_from_command_line(options)
    }

    /// Build a TierMem instance against the given NUMA collaborator.
    pub fn build(&self, numa: Arc<dyn NumaOps>) -> Result<TierMem> {
        TierMem::new(Arc::new(self.options.clone()), numa)
    }
}

impl Default for TierMemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A TierMem instance: the tier regions, the page table, the two queues, the
/// scanner, and the server the workers run on.
pub struct TierMem {
    options: Arc<Options>,
    state: Arc<GlobalState>,
    stats: Arc<Stats>,
    page_table: Arc<PageTable>,
    access_queue: Arc<RingBuffer<AccessMsg>>,
    migration_queue: Arc<RingBuffer<MigrationMsg>>,
    scanner: Arc<Scanner>,
    server: Arc<Server>,
    scanner_thread: Mutex<Option<JoinHandle<()>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// Kept for ownership: the regions must outlive every backing address in
    /// the page table, and unmap when the instance drops.
    _regions: TierRegions,
}

impl TierMem {
    /// Create an instance: allocate the tier regions, fill them with content,
    /// and build the page table and workers over them. This is not public;
    /// use [`TierMemBuilder::build`].
    ///
    /// Tier capacities that do not cover the clients' combined address space
    /// are a configuration fault and fatal. Region allocation failure is
    /// fatal to startup; nothing is leaked.
    pub(crate) fn new(options: Arc<Options>, numa: Arc<dyn NumaOps>) -> Result<TierMem> {
        let client_sizes: Vec<usize> = options
            .clients
            .specs
            .iter()
            .map(|c| c.addr_space_pages)
            .collect();
        let total_pages: usize = client_sizes.iter().sum();
        let capacities = enum_map! {
            Tier::Local => *options.local_pages,
            Tier::Remote => *options.remote_pages,
            Tier::Pmem => *options.pmem_pages,
        };
        let node_of = enum_map! {
            Tier::Local => *options.local_node,
            Tier::Remote => *options.remote_node,
            Tier::Pmem => *options.pmem_node,
        };
        let capacity_sum: usize = capacities.values().sum();
        assert_eq!(
            capacity_sum, total_pages,
            "tier sizes sum to {} pages but the clients address {}",
            capacity_sum, total_pages
        );

        info!(
            "allocating tier regions: {} local, {} remote, {} pmem pages",
            capacities[Tier::Local],
            capacities[Tier::Remote],
            capacities[Tier::Pmem]
        );
        let regions = TierRegions::new(
            TierRegion::allocate(
                Tier::Local,
                capacities[Tier::Local],
                node_of[Tier::Local],
                numa.as_ref(),
            )?,
            TierRegion::allocate(
                Tier::Remote,
                capacities[Tier::Remote],
                node_of[Tier::Remote],
                numa.as_ref(),
            )?,
            TierRegion::allocate(
                Tier::Pmem,
                capacities[Tier::Pmem],
                node_of[Tier::Pmem],
                numa.as_ref(),
            )?,
        );
        for (seed, tier) in [Tier::Local, Tier::Remote, Tier::Pmem].into_iter().enumerate() {
            regions.get(tier).fill_pseudo_random(seed as u64);
        }

        let page_table = Arc::new(PageTable::new(total_pages, capacities, &regions));
        let state = Arc::new(GlobalState::default());
        let stats = Arc::new(Stats::new());
        let access_queue = Arc::new(RingBuffer::new(*options.buffer_size));
        let migration_queue = Arc::new(RingBuffer::new(*options.buffer_size));

        let scanner = Arc::new(Scanner::new(
            page_table.clone(),
            *options.hot_access_cnt,
            Duration::from_millis(*options.cold_interval_ms),
            Duration::from_millis(*options.scan_interval_ms),
        ));
        let server = Arc::new(Server::new(
            page_table.clone(),
            access_queue.clone(),
            migration_queue.clone(),
            stats.clone(),
            state.clone(),
            numa,
            node_of,
            &client_sizes,
        ));

        Ok(TierMem {
            options,
            state,
            stats,
            page_table,
            access_queue,
            migration_queue,
            scanner,
            server,
            scanner_thread: Mutex::new(None),
            workers: Mutex::new(Vec::new()),
            _regions: regions,
        })
    }

    /// Spawn the scanner and the two server workers. A mandatory call before
    /// clients start producing.
    pub fn initialize(&self) {
        assert!(
            !self.state.is_initialized(),
            "TierMem has already been initialized (was initialize() called before?)"
        );
        *self.state.run_start.borrow_mut() = Some(Instant::now());

        let scanner = self.scanner.clone();
        let queue = self.migration_queue.clone();
        let handle = thread::Builder::new()
            .name("tiermem-scanner".to_string())
            .spawn(move || scanner.run(&queue))
            .expect("failed to spawn the scanner thread");
        *self.scanner_thread.lock().unwrap() = Some(handle);

        let mut workers = self.workers.lock().unwrap();
        let server = self.server.clone();
        workers.push(
            thread::Builder::new()
                .name("tiermem-access".to_string())
                .spawn(move || server.run_access_worker())
                .expect("failed to spawn the access worker"),
        );
        let server = self.server.clone();
        workers.push(
            thread::Builder::new()
                .name("tiermem-migration".to_string())
                .spawn(move || server.run_migration_worker())
                .expect("failed to spawn the migration worker"),
        );

        self.state.initialized.store(true, std::sync::atomic::Ordering::SeqCst);
        info!(
            "tiermem initialized: {} pages across three tiers",
            self.page_table.len()
        );
    }

    /// Stop the scanner, drain both queues, join the workers, and print the
    /// metrics. Producers must have finished: messages pushed after shutdown
    /// are dropped unprocessed when the instance drops.
    pub fn shutdown(&self) {
        assert!(
            self.state.is_initialized(),
            "TierMem has not been initialized, yet"
        );
        self.scanner.stop();
        if let Some(handle) = self.scanner_thread.lock().unwrap().take() {
            handle.join().expect("the scanner thread panicked");
        }

        self.state.request_shutdown();
        for handle in self.workers.lock().unwrap().drain(..) {
            handle.join().expect("a server worker panicked");
        }

        if let Some(uptime) = self.state.uptime_secs() {
            info!("run finished after {:.3} s", uptime);
        }
        self.stats.print_stats();
    }

    /// Get the run time options.
    pub fn get_options(&self) -> &Options {
        &self.options
    }

    pub fn state(&self) -> &GlobalState {
        &self.state
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn page_table(&self) -> &PageTable {
        &self.page_table
    }

    /// The client queue. Clients clone the `Arc` and produce into it.
    pub fn access_queue(&self) -> &Arc<RingBuffer<AccessMsg>> {
        &self.access_queue
    }

    /// The scanner queue. Only the scanner should produce into it; tests
    /// inject requests directly.
    pub fn migration_queue(&self) -> &Arc<RingBuffer<MigrationMsg>> {
        &self.migration_queue
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn server(&self) -> &Server {
        &self.server
    }
}
