//! Command line front end: build an instance from `TIERMEM_*` environment
//! variables, run the configured clients against it, and print the metrics.

use std::sync::Arc;
use std::thread;

use tiermem::client::Client;
use tiermem::util::logger;
use tiermem::util::numa::SysNuma;
use tiermem::TierMemBuilder;

fn main() {
    logger::try_init().expect("failed to install the logger");

    let builder = TierMemBuilder::new();
    let tiermem = match builder.build(Arc::new(SysNuma)) {
        Ok(tiermem) => tiermem,
        Err(e) => {
            eprintln!("tiermem-sim: startup failed: {}", e);
            std::process::exit(1);
        }
    };
    tiermem.initialize();

    let message_count = *tiermem.get_options().message_count;
    let handles: Vec<_> = tiermem
        .get_options()
        .clients
        .specs
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
            thread::Builder::new()
                .name(format!("tiermem-client-{}", id))
                .spawn(move || client.run())
                .expect("failed to spawn a client thread")
        })
        .collect();

    for handle in handles {
        handle.join().expect("a client thread panicked");
    }

    tiermem.shutdown();
}
