//! Wrappers around the raw memory system calls the simulator relies on.

use std::io::Result;

use crate::util::address::Address;
use crate::util::conversions;

/// Run a libc call and turn its C-style status into an `io::Result`, reading
/// `errno` on mismatch.
pub fn wrap_libc_call<T: PartialEq>(f: &dyn Fn() -> T, expect: T) -> Result<()> {
    let ret = f();
    if ret == expect {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

/// Map `pages` anonymous, page-aligned, read-write pages. With `populate` the
/// kernel is asked to fault the pages in eagerly so a later touch does not pay
/// the first-fault cost.
pub fn map_pages(pages: usize, populate: bool) -> Result<Address> {
    let size = conversions::pages_to_bytes(pages);
    let prot = libc::PROT_READ | libc::PROT_WRITE;
    let mut flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
    #[cfg(target_os = "linux")]
    if populate {
        flags |= libc::MAP_POPULATE;
    }
    #[cfg(not(target_os = "linux"))]
    let _ = populate;

    let ptr = unsafe { libc::mmap(std::ptr::null_mut(), size, prot, flags, -1, 0) };
    if ptr == libc::MAP_FAILED {
        return Err(std::io::Error::last_os_error());
    }
    Ok(Address::from_mut_ptr(ptr))
}

pub fn munmap(start: Address, size: usize) -> Result<()> {
    wrap_libc_call(&|| unsafe { libc::munmap(start.to_mut_ptr(), size) }, 0)
}

/// Set a memory region to the given byte value.
pub fn set(start: Address, val: u8, len: usize) {
    unsafe {
        std::ptr::write_bytes::<u8>(start.to_mut_ptr(), val, len);
    }
}

/// Zero a memory region.
pub fn zero(start: Address, len: usize) {
    set(start, 0, len);
}

/// Flush the cache line containing `addr` so the next touch is served from
/// memory instead of the CPU cache. A no-op on architectures without an
/// unprivileged line flush.
#[cfg(target_arch = "x86_64")]
pub fn flush_cache_line(addr: Address) {
    debug_assert!(!addr.is_zero());
    unsafe {
        std::arch::x86_64::_mm_clflush(addr.to_ptr::<u8>());
    }
}

#[cfg(not(target_arch = "x86_64"))]
pub fn flush_cache_line(_addr: Address) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::constants::BYTES_IN_PAGE;

    #[test]
    fn map_and_touch() {
        let start = map_pages(2, false).unwrap();
        assert!(start.is_page_aligned());
        zero(start, 2 * BYTES_IN_PAGE);
        unsafe {
            start.store_volatile::<u64>(0xfeed);
            assert_eq!(start.load_volatile::<u64>(), 0xfeed);
        }
        flush_cache_line(start);
        unsafe {
            assert_eq!(start.load_volatile::<u64>(), 0xfeed);
        }
        munmap(start, 2 * BYTES_IN_PAGE).unwrap();
    }

    #[test]
    fn map_failure_is_reported() {
        // A length of usize::MAX cannot be mapped.
        assert!(map_pages(usize::MAX >> 12, false).is_err());
    }
}
