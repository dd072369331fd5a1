//! Tiered-memory management simulator.
//!
//! `tiermem` models a heterogeneous memory machine with three tiers: a fast
//! local NUMA node, a slower remote NUMA node, and persistent memory. Synthetic
//! clients issue reads and writes against a flat logical address space. A
//! server executes each access against the backing page for its logical page
//! id, while a scanner continuously classifies pages as hot or cold and asks a
//! migration worker to move them between tiers with the OS page-migration
//! primitive.
//!
//! The crate is organized around a [`TierMem`] instance, created through
//! [`TierMemBuilder`]. The instance owns the tier regions, the page table, the
//! two lock-free queues, the scanner, and the server workers. Clients and the
//! command line front end are thin adapters around it.

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

mod global_state;
mod tiermem;

pub mod client;
pub mod page_table;
pub mod policy;
pub mod server;
pub mod util;

pub use crate::global_state::GlobalState;
pub use crate::tiermem::{TierMem, TierMemBuilder};
