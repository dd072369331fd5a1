mod counter;
mod stats;

pub use self::counter::{EventCounter, LatencyCounter};
pub use self::stats::Stats;
