//! Monitoring loop for FlashFS
//!
//! A background thread that periodically logs per-drive load snapshots
//! (pending operations, cumulative bytes, average latency) while the
//! filesystem is mounted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::accelerator::StorageAccelerator;
use crate::constants::MONITOR_INTERVAL;

/// Background monitor over a shared accelerator handle
pub struct Monitor {
    accel: Arc<StorageAccelerator>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Monitor {
    pub fn new(accel: Arc<StorageAccelerator>) -> Self {
        Self {
            accel,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Start the monitor thread
    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }

        self.running.store(true, Ordering::Relaxed);
        let accel = Arc::clone(&self.accel);
        let running = Arc::clone(&self.running);

        self.handle = Some(
            thread::Builder::new()
                .name("flashfs-monitor".to_string())
                .spawn(move || monitor_loop(accel, running))
                .expect("failed to spawn monitor thread"),
        );
    }

    /// Stop the monitor thread and join it
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn monitor_loop(accel: Arc<StorageAccelerator>, running: Arc<AtomicBool>) {
    tracing::info!("Monitor started");

    let mut last_report = Instant::now();
    while running.load(Ordering::Relaxed) {
        // Sleep in short slices so stop() is responsive
        thread::sleep(Duration::from_millis(100));

        if last_report.elapsed() < MONITOR_INTERVAL {
            continue;
        }
        last_report = Instant::now();

        let snapshot = accel.drive_load();
        let total_pending: usize = snapshot.iter().map(|s| s.pending_ops).sum();
        let total_bytes: u64 = snapshot.iter().map(|s| s.total_bytes).sum();
        tracing::info!(
            "Drive bank: {} drives, {} pending ops, {} bytes transferred",
            snapshot.len(),
            total_pending,
            total_bytes
        );

        for stats in snapshot {
            if stats.pending_ops > 0 || stats.total_bytes > 0 {
                tracing::info!(
                    "Drive {}: pending={} bytes={} avg_latency={:.2}ms",
                    stats.drive_id,
                    stats.pending_ops,
                    stats.total_bytes,
                    stats.avg_latency_ms
                );
            }
        }
    }

    tracing::info!("Monitor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_stop_joins_cleanly() {
        let accel = Arc::new(StorageAccelerator::new(2, "test_seed"));
        let mut monitor = Monitor::new(accel);

        monitor.start();
        thread::sleep(Duration::from_millis(50));
        monitor.stop();
        assert!(monitor.handle.is_none());
    }

    #[test]
    fn test_start_is_idempotent() {
        let accel = Arc::new(StorageAccelerator::new(2, "test_seed"));
        let mut monitor = Monitor::new(accel);

        monitor.start();
        monitor.start();
        monitor.stop();
    }
}
