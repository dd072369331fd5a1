//! A full threaded run: clients, workers and scanner all live, down to a
//! clean shutdown with nothing lost.

use std::sync::Arc;
use std::thread;

use tiermem::client::Client;
use tiermem::policy::Tier;
use tiermem::util::numa::MockNuma;
use tiermem::util::test_util::panic_after;
use tiermem::TierMemBuilder;

#[test]
fn every_message_is_served_through_a_tiny_queue() {
    panic_after(120_000, || {
        // A one-slot queue forces backpressure on every push; two clients
        // race for it. Aggressive policy thresholds keep migrations flowing
        // at the same time.
        let mut builder = TierMemBuilder::new_no_env_vars();
        assert!(builder.set_options_bulk_by_str(
            "clients=8,uniform;8,sequential local_pages=4 remote_pages=4 pmem_pages=8 \
             message_count=500 buffer_size=1 hot_access_cnt=3 cold_interval_ms=50 \
             scan_interval_ms=1"
        ));
        let tiermem = Arc::new(builder.build(Arc::new(MockNuma::new())).unwrap());
        tiermem.initialize();

        let specs = tiermem.get_options().clients.specs.clone();
        let message_count = *tiermem.get_options().message_count;
        let handles: Vec<_> = specs
            .iter()
            .enumerate()
            .map(|(id, spec)| {
                let client = Client::new(
                    id,
                    tiermem.access_queue().clone(),
                    message_count,
                    spec.addr_space_pages,
                    spec.pattern,
                );
                thread::spawn(move || client.run())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        tiermem.shutdown();

        // No message was lost: every produced access was served and timed.
        assert_eq!(tiermem.stats().total_accesses(), 1000);
        let timed: u64 = [Tier::Local, Tier::Remote, Tier::Pmem]
            .into_iter()
            .map(|t| tiermem.stats().latency(t).events())
            .sum();
        assert_eq!(timed, 1000);

        // No page was lost either, however the policy shuffled the tiers.
        let table = tiermem.page_table();
        assert_eq!(table.tier_total(), table.len());
    });
}
