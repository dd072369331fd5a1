//! The NUMA surface of the operating system.
//!
//! The simulator only needs two primitives: binding a freshly mapped region to
//! a node, and moving a single page to a node. Both are behind the [`NumaOps`]
//! trait so the policy machinery can be exercised on machines without multiple
//! NUMA nodes, and so tests can observe and fail migrations deterministically.

use std::io::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::util::address::Address;

/// The narrow OS contract the server depends on.
pub trait NumaOps: Send + Sync {
    /// Bind every page of `[start, start + bytes)` to `node`. Applied once per
    /// tier region at allocation time.
    fn bind_region_to_node(&self, start: Address, bytes: usize, node: usize) -> Result<()>;

    /// Move the physical backing of the page at `page` to `node`. The virtual
    /// address stays valid throughout; concurrent access is safe.
    fn move_page_to_node(&self, page: Address, node: usize) -> Result<()>;
}

/// [`NumaOps`] backed by the `mbind` and `move_pages` system calls.
pub struct SysNuma;

// Not exposed by the `libc` crate; values are fixed by the kernel's
// `linux/mempolicy.h` ABI.
#[cfg(target_os = "linux")]
const MPOL_MF_STRICT: libc::c_int = 1 << 0;
#[cfg(target_os = "linux")]
const MPOL_MF_MOVE: libc::c_int = 1 << 1;

#[cfg(target_os = "linux")]
impl NumaOps for SysNuma {
    fn bind_region_to_node(&self, start: Address, bytes: usize, node: usize) -> Result<()> {
        let nodemask: libc::c_ulong = 1 << node;
        // maxnode counts bits in the mask, plus the terminating bit the kernel
        // insists on.
        let maxnode = 8 * std::mem::size_of::<libc::c_ulong>() as libc::c_ulong;
        crate::util::memory::wrap_libc_call(
            &|| unsafe {
                libc::syscall(
                    libc::SYS_mbind,
                    start.to_mut_ptr::<libc::c_void>(),
                    bytes as libc::c_ulong,
                    libc::MPOL_BIND,
                    &nodemask as *const libc::c_ulong,
                    maxnode,
                    (MPOL_MF_MOVE | MPOL_MF_STRICT) as libc::c_uint,
                )
            },
            0,
        )
    }

    fn move_page_to_node(&self, page: Address, node: usize) -> Result<()> {
        let pages: [*mut libc::c_void; 1] = [page.to_mut_ptr()];
        let nodes: [libc::c_int; 1] = [node as libc::c_int];
        let mut status: [libc::c_int; 1] = [0];
        let pages_ptr = pages.as_ptr();
        let nodes_ptr = nodes.as_ptr();
        let status_ptr = status.as_mut_ptr();
        crate::util::memory::wrap_libc_call(
            &|| unsafe {
                libc::syscall(
                    libc::SYS_move_pages,
                    0, // self
                    1 as libc::c_ulong,
                    pages_ptr,
                    nodes_ptr,
                    status_ptr,
                    MPOL_MF_MOVE,
                )
            },
            0,
        )?;
        // move_pages can succeed as a whole while reporting a per-page error
        // through the status word.
        if status[0] < 0 {
            return Err(std::io::Error::from_raw_os_error(-status[0]));
        }
        Ok(())
    }
}

// Without a NUMA-aware kernel interface every allocation is node-local and a
// migration has nothing to move. Accepting the calls keeps the simulator
// runnable for policy experiments on such hosts.
#[cfg(not(target_os = "linux"))]
impl NumaOps for SysNuma {
    fn bind_region_to_node(&self, _start: Address, _bytes: usize, node: usize) -> Result<()> {
        debug!("no NUMA binding on this platform, node {} request ignored", node);
        Ok(())
    }

    fn move_page_to_node(&self, _page: Address, node: usize) -> Result<()> {
        debug!("no NUMA migration on this platform, node {} request ignored", node);
        Ok(())
    }
}

/// A recording [`NumaOps`] double. Tests use it to validate placement and
/// migration behavior on hosts without the three-tier topology, and to inject
/// migration failures.
#[derive(Default)]
pub struct MockNuma {
    binds: Mutex<Vec<(Address, usize, usize)>>,
    moves: Mutex<Vec<(Address, usize)>>,
    fail_moves: AtomicBool,
}

impl MockNuma {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `move_page_to_node` fail with `EBUSY`.
    pub fn fail_moves(&self, fail: bool) {
        self.fail_moves.store(fail, Ordering::SeqCst);
    }

    /// Every `(start, bytes, node)` bind observed so far.
    pub fn binds(&self) -> Vec<(Address, usize, usize)> {
        self.binds.lock().unwrap().clone()
    }

    /// Every `(page, node)` move observed so far, including failed ones.
    pub fn moves(&self) -> Vec<(Address, usize)> {
        self.moves.lock().unwrap().clone()
    }
}

impl NumaOps for MockNuma {
    fn bind_region_to_node(&self, start: Address, bytes: usize, node: usize) -> Result<()> {
        self.binds.lock().unwrap().push((start, bytes, node));
        Ok(())
    }

    fn move_page_to_node(&self, page: Address, node: usize) -> Result<()> {
        self.moves.lock().unwrap().push((page, node));
        if self.fail_moves.load(Ordering::SeqCst) {
            return Err(std::io::Error::from_raw_os_error(libc::EBUSY));
        }
        Ok(())
    }
}
