use rand::{RngCore, SeedableRng};

use std::io::Result;

use crate::policy::Tier;
use crate::util::address::Address;
use crate::util::conversions;
use crate::util::memory;
use crate::util::numa::NumaOps;

/// A contiguous, page-aligned, writable mapping whose pages are resident on
/// one tier's physical backing. Owned for the lifetime of the server; the
/// mapping is released when the region drops.
pub struct TierRegion {
    tier: Tier,
    start: Address,
    pages: usize,
}

// The region hands out raw page addresses that workers touch concurrently;
// the OS keeps page-level access safe.
unsafe impl Send for TierRegion {}
unsafe impl Sync for TierRegion {}

impl TierRegion {
    /// Allocate `pages` pages for `tier`, bound to NUMA node `node` for the
    /// remote and PMEM tiers. The local tier takes any node-local placement,
    /// faulted in eagerly; bound tiers are faulted in by zeroing after the
    /// bind so every page lands on its node.
    ///
    /// Failure leaves nothing mapped; no partial region escapes.
    pub fn allocate(tier: Tier, pages: usize, node: usize, numa: &dyn NumaOps) -> Result<Self> {
        if pages == 0 {
            return Ok(Self {
                tier,
                start: Address::ZERO,
                pages: 0,
            });
        }
        let bytes = conversions::pages_to_bytes(pages);
        let region = match tier {
            Tier::Local => {
                let start = memory::map_pages(pages, true)?;
                Self { tier, start, pages }
            }
            Tier::Remote | Tier::Pmem => {
                let start = memory::map_pages(pages, false)?;
                // Construct before binding so an error path unmaps via Drop.
                let region = Self { tier, start, pages };
                numa.bind_region_to_node(start, bytes, node)?;
                memory::zero(start, bytes);
                region
            }
        };
        debug!(
            "allocated {} region: {} pages at {}",
            tier, pages, region.start
        );
        Ok(region)
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn start(&self) -> Address {
        self.start
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn bytes(&self) -> usize {
        conversions::pages_to_bytes(self.pages)
    }

    pub fn is_empty(&self) -> bool {
        self.pages == 0
    }

    /// The address of the `index`th page of the region.
    pub fn page_address(&self, index: usize) -> Address {
        debug_assert!(index < self.pages, "page {} outside region", index);
        self.start + conversions::pages_to_bytes(index)
    }

    /// Fill the whole region with deterministic pseudo-random content, so
    /// accesses touch real data rather than zero pages.
    pub fn fill_pseudo_random(&self, seed: u64) {
        if self.is_empty() {
            return;
        }
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let slice =
            unsafe { std::slice::from_raw_parts_mut(self.start.to_mut_ptr::<u8>(), self.bytes()) };
        rng.fill_bytes(slice);
    }
}

impl Drop for TierRegion {
    fn drop(&mut self) {
        if self.pages > 0 {
            if let Err(e) = memory::munmap(self.start, self.bytes()) {
                warn!("failed to unmap {} region at {}: {}", self.tier, self.start, e);
            }
        }
    }
}

/// The three tier regions of a server.
///
/// Fields are declared slowest tier first: Rust drops fields in declaration
/// order, which releases the regions in reverse allocation order.
pub struct TierRegions {
    pmem: TierRegion,
    remote: TierRegion,
    local: TierRegion,
}

impl TierRegions {
    pub fn new(local: TierRegion, remote: TierRegion, pmem: TierRegion) -> Self {
        debug_assert_eq!(local.tier(), Tier::Local);
        debug_assert_eq!(remote.tier(), Tier::Remote);
        debug_assert_eq!(pmem.tier(), Tier::Pmem);
        Self { pmem, remote, local }
    }

    pub fn get(&self, tier: Tier) -> &TierRegion {
        match tier {
            Tier::Local => &self.local,
            Tier::Remote => &self.remote,
            Tier::Pmem => &self.pmem,
        }
    }

    pub fn total_pages(&self) -> usize {
        self.local.pages() + self.remote.pages() + self.pmem.pages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::constants::BYTES_IN_PAGE;
    use crate::util::numa::MockNuma;

    #[test]
    fn local_region_layout() {
        let numa = MockNuma::new();
        let region = TierRegion::allocate(Tier::Local, 4, 0, &numa).unwrap();
        assert_eq!(region.pages(), 4);
        assert!(region.start().is_page_aligned());
        assert_eq!(
            region.page_address(3) - region.start(),
            3 * BYTES_IN_PAGE
        );
        // The local tier is never bound.
        assert!(numa.binds().is_empty());
    }

    #[test]
    fn bound_region_binds_whole_mapping() {
        let numa = MockNuma::new();
        let region = TierRegion::allocate(Tier::Pmem, 2, 2, &numa).unwrap();
        assert_eq!(
            numa.binds(),
            vec![(region.start(), 2 * BYTES_IN_PAGE, 2)]
        );
    }

    #[test]
    fn empty_region_is_inert() {
        let numa = MockNuma::new();
        let region = TierRegion::allocate(Tier::Remote, 0, 1, &numa).unwrap();
        assert!(region.is_empty());
        assert!(numa.binds().is_empty());
        // Dropping must not attempt an unmap.
        drop(region);
    }

    #[test]
    fn fill_is_deterministic() {
        let numa = MockNuma::new();
        let a = TierRegion::allocate(Tier::Local, 1, 0, &numa).unwrap();
        let b = TierRegion::allocate(Tier::Local, 1, 0, &numa).unwrap();
        a.fill_pseudo_random(7);
        b.fill_pseudo_random(7);
        let first = |r: &TierRegion| unsafe { r.start().load_volatile::<u64>() };
        assert_eq!(first(&a), first(&b));
        b.fill_pseudo_random(8);
        assert_ne!(first(&a), first(&b));
    }
}
