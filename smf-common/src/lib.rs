pub mod codec;
pub mod config;
pub mod crc16;
pub mod error;
pub mod logger;
pub mod thread_pool;

/// Monotonic per-key generation counter shared by the replicated store and
/// the cluster bus wire format: every mutation of a key bumps it by one, and
/// a listener or satellite can tell a stale copy from a fresh one by
/// comparing generations alone.
pub type Generation = u64;
