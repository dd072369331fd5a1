use crate::util::address::Address;
use crate::util::constants::*;

pub fn pages_to_bytes(pages: usize) -> usize {
    pages << LOG_BYTES_IN_PAGE
}

pub fn bytes_to_pages_up(bytes: usize) -> usize {
    (bytes + BYTES_IN_PAGE - 1) >> LOG_BYTES_IN_PAGE
}

pub fn page_align_down(address: Address) -> Address {
    unsafe { Address::from_usize((address.as_usize() >> LOG_BYTES_IN_PAGE) << LOG_BYTES_IN_PAGE) }
}
