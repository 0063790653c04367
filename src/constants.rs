//! Global constants for FlashFS
//!
//! This module centralizes the compile-time configuration of the storage
//! accelerator so every layer agrees on drive count, block geometry and
//! timing without threading values through constructors.

use std::time::Duration;

/// Number of simulated drives in the bank
pub const NUM_DRIVES: usize = 16;

/// Seed string for the hash placer
///
/// Changing the seed reshuffles the primary drive of every path and block,
/// so it must stay fixed for the lifetime of a mounted namespace.
pub const HASH_SEED: &str = "default_seed";

/// Block size for data fan-out (4 KiB)
///
/// Reads and writes are split into blocks of this size before drive
/// selection; each block is placed independently.
pub const BLOCK_SIZE: usize = 4096;

/// Capacity of each drive's request queue
///
/// Submissions beyond this bound fail fast with a busy error. The bound is
/// also the saturation threshold the load balancer redirects at.
pub const DRIVE_QUEUE_CAPACITY: usize = 1000;

/// How long a submitter waits on a completion handle before giving up
pub const OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Operations slower than this are logged as high-latency
pub const HIGH_LATENCY_THRESHOLD_MS: f64 = 100.0;

/// Interval between monitor reports
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(5);

/// Simulated latency for metadata-class drive operations
/// (create, delete, mkdir, rmdir, chmod, chown, utimens)
pub const LATENCY_METADATA: Duration = Duration::from_millis(1);

/// Simulated latency for a block read
pub const LATENCY_READ: Duration = Duration::from_millis(2);

/// Simulated latency for a block write
pub const LATENCY_WRITE: Duration = Duration::from_millis(3);

/// Simulated latency for a truncate
pub const LATENCY_TRUNCATE: Duration = Duration::from_millis(2);

/// Simulated latency for a rename
pub const LATENCY_RENAME: Duration = Duration::from_millis(2);
