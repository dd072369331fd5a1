//! Tier-bound memory regions and per-tier page accounting.

mod accounting;
mod tier_region;

pub use self::accounting::TierAccounting;
pub use self::tier_region::{TierRegion, TierRegions};
