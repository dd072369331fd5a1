//! Utilities used by all the other parts of the crate.

/// Virtual addresses and arithmetic over them.
pub mod address;
/// Size and timing constants.
pub mod constants;
/// Page/byte conversions.
pub mod conversions;
/// Tier regions and per-tier page accounting.
pub mod heap;
/// The crate's logger implementation.
pub mod logger;
/// Wrappers over raw memory system calls.
pub mod memory;
/// The OS NUMA surface (bind, move) and its test double.
pub mod numa;
/// Runtime options.
pub mod options;
/// The bounded lock-free message queue.
pub mod queue;
/// Access and migration metrics.
pub mod statistics;
/// Test helpers.
pub mod test_util;

pub use self::address::Address;
