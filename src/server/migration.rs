use std::thread;
use std::time::Duration;

use crate::server::{MigrationMsg, Server};
use crate::util::constants::POLL_INTERVAL_MICROS;

impl Server {
    /// Execute one migration request: move the page's physical backing to the
    /// target tier's node and update the page table.
    ///
    /// A request whose page already sits on the target tier is dropped
    /// without an OS call; the scanner may race a migration it requested
    /// earlier and re-request it. A failed OS migration leaves the tier
    /// unchanged, so the scanner retries on a later pass if the page still
    /// classifies the same way.
    pub fn handle_migration(&self, msg: MigrationMsg) {
        debug!("server received: {}", msg);
        let snapshot = self.page_table.get(msg.page_id);
        if snapshot.tier == msg.target {
            debug!("page {} is already on {}", msg.page_id, msg.target);
            return;
        }

        let node = self.node_of[msg.target];
        #[cfg(feature = "migration_timing")]
        let migrate_start = std::time::Instant::now();
        match self.numa.move_page_to_node(snapshot.backing, node) {
            Ok(()) => {
                #[cfg(feature = "migration_timing")]
                debug!(
                    "moving page {} took {} ns",
                    msg.page_id,
                    migrate_start.elapsed().as_nanos()
                );
                // The backing address is intentionally left alone: migration
                // changes the physical placement only.
                let from = self.page_table.update_tier(msg.page_id, msg.target);
                self.stats.record_migration(from, msg.target);
                debug!("page {} now on {}", msg.page_id, msg.target);
            }
            Err(e) => {
                warn!(
                    "failed to migrate page {} to {} (node {}): {}",
                    msg.page_id, msg.target, node, e
                );
            }
        }
    }

    /// The migration worker loop: drain the scanner queue until shutdown is
    /// requested and the queue is empty.
    pub fn run_migration_worker(&self) {
        info!("migration worker running");
        loop {
            match self.migration_queue.try_pop() {
                Some(msg) => self.handle_migration(msg),
                None => {
                    if self.state.shutdown_requested() {
                        break;
                    }
                    thread::sleep(Duration::from_micros(POLL_INTERVAL_MICROS));
                }
            }
        }
        info!("migration worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::build_server;
    use super::*;
    use crate::policy::{Tier, Transition};

    #[test]
    fn migration_moves_backing_and_tier() {
        let (server, _regions, numa) = build_server(1, 1, 1, &[3]);
        let backing = server.page_table.get(2).backing;

        server.handle_migration(MigrationMsg {
            page_id: 2,
            target: Tier::Remote,
        });

        assert_eq!(numa.moves(), vec![(backing, 1)]);
        let after = server.page_table.get(2);
        assert_eq!(after.tier, Tier::Remote);
        assert_eq!(after.backing, backing);
        assert_eq!(server.stats.migration_count(Transition::PmemToRemote), 1);
    }

    #[test]
    fn same_tier_request_is_dropped_without_os_call() {
        let (server, _regions, numa) = build_server(1, 1, 1, &[3]);
        server.handle_migration(MigrationMsg {
            page_id: 0,
            target: Tier::Local,
        });
        assert!(numa.moves().is_empty());
        assert_eq!(server.stats.total_migrations(), 0);
        assert_eq!(server.page_table.tier_count(Tier::Local), 1);
    }

    #[test]
    fn failed_migration_keeps_tier() {
        let (server, _regions, numa) = build_server(1, 1, 1, &[3]);
        numa.fail_moves(true);
        server.handle_migration(MigrationMsg {
            page_id: 2,
            target: Tier::Remote,
        });

        // The OS call was attempted, but the table did not change.
        assert_eq!(numa.moves().len(), 1);
        assert_eq!(server.page_table.get(2).tier, Tier::Pmem);
        assert_eq!(server.stats.total_migrations(), 0);

        // The retry on the scanner's next pass succeeds.
        numa.fail_moves(false);
        server.handle_migration(MigrationMsg {
            page_id: 2,
            target: Tier::Remote,
        });
        assert_eq!(server.page_table.get(2).tier, Tier::Remote);
    }
}
