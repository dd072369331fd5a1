/// log2 of the number of bytes in a page
pub const LOG_BYTES_IN_PAGE: u8 = 12;
/// The number of bytes in a page
pub const BYTES_IN_PAGE: usize = 1 << LOG_BYTES_IN_PAGE;

/// log2 of the number of bytes in a word
#[cfg(target_pointer_width = "64")]
pub const LOG_BYTES_IN_WORD: u8 = 3;
#[cfg(target_pointer_width = "32")]
pub const LOG_BYTES_IN_WORD: u8 = 2;
/// The number of bytes in a word
pub const BYTES_IN_WORD: usize = 1 << LOG_BYTES_IN_WORD;

/// The number of bytes in a cache line. All timed touches flush one line.
pub const BYTES_IN_CACHE_LINE: usize = 64;

/// How long a producer naps before retrying a push against a full queue.
pub const PUSH_BACKOFF_NANOS: u64 = 100;

/// How long a server worker naps when its input queue is empty.
pub const POLL_INTERVAL_MICROS: u64 = 50;

/// The default delay between two scanner steps.
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 10;
