//! FlashFS - a FUSE-mounted storage accelerator over simulated SSD drives
//!
//! FlashFS presents a POSIX-style hierarchical namespace whose file data is
//! fanned out across a bank of independent drive simulators. It features:
//!
//! - **Hash Placement**: paths and 4 KiB blocks are sharded onto drives with
//!   a seeded xxHash64 placer, stable across runs for a fixed seed
//! - **Simulated Drives**: each drive owns an in-memory blob store, a bounded
//!   request queue and a dedicated worker thread that models per-operation
//!   latency and reports results through one-shot completion handles
//! - **Load Balancing**: per-drive pending/bytes/latency counters redirect a
//!   block to a less loaded drive when its primary is saturated
//! - **Metadata Catalog**: a mutex-protected path-to-record map holding mode,
//!   ownership, size and timestamps, with prefix-walk directory listing
//! - **FUSE Bridge**: a thin `fuser` adapter that maps kernel callbacks onto
//!   the accelerator and translates errors to negative POSIX codes
//!
//! # Architecture
//!
//! FlashFS consists of several key components:
//!
//! - **Placement** ([`placement`]): seeded xxHash64 key-to-drive mapping
//! - **Drive Layer** ([`drive`]): bounded FIFO queue, single worker per
//!   drive, shared/exclusive store locking, latency simulation
//! - **Accelerator** ([`accelerator`]): the public file-system verbs, block
//!   fan-out for reads and writes, cross-drive migration on rename, and the
//!   load balancer
//! - **Metadata** ([`metadata`]): the authoritative path catalog
//! - **FUSE Layer** ([`fuse`]): kernel bridge built on `fuser`
//!
//! # Example
//!
//! ```rust,no_run
//! use flashfs::accelerator::StorageAccelerator;
//!
//! let accel = StorageAccelerator::new(4, "example_seed");
//! accel.create_file("/hello.txt", 0o644)?;
//! accel.write_file("/hello.txt", b"Hello, FlashFS!", 0)?;
//!
//! let mut buf = [0u8; 15];
//! let n = accel.read_file("/hello.txt", &mut buf, 0)?;
//! assert_eq!(&buf[..n], b"Hello, FlashFS!");
//! # Ok::<(), flashfs::accelerator::AccelError>(())
//! ```

pub mod accelerator;
pub mod constants;
pub mod drive;
pub mod fuse;
pub mod logging;
pub mod metadata;
pub mod monitor;
pub mod placement;
pub mod signals;
