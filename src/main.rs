//! FlashFS launcher
//!
//! Mounts the storage accelerator at the given directory through the FUSE
//! bridge, starts the monitor, and runs until a shutdown signal arrives.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use fuser::MountOption;

use flashfs::accelerator::StorageAccelerator;
use flashfs::fuse::FlashFuse;
use flashfs::monitor::Monitor;
use flashfs::{logging, signals};

/// FUSE-mounted storage accelerator over simulated SSD drives
#[derive(Parser)]
#[command(name = "flashfs")]
#[command(about = "Mount a simulated SSD bank as a FUSE filesystem")]
struct Args {
    /// Mount point (must be an existing directory)
    mountpoint: PathBuf,

    /// Stay attached to the terminal (flashfs never daemonizes)
    #[arg(short, long)]
    foreground: bool,

    /// Enable debug logging, including placement decisions
    #[arg(short, long)]
    debug: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();

    let level = if args.debug {
        "debug"
    } else {
        args.log_level.as_str()
    };
    logging::init(level);

    if !args.mountpoint.is_dir() {
        tracing::error!(
            "Mount point {} is not an existing directory",
            args.mountpoint.display()
        );
        std::process::exit(1);
    }

    if !args.foreground {
        tracing::info!("Daemonizing is not supported; continuing in the foreground");
    }

    let accel = Arc::new(StorageAccelerator::with_defaults());

    let running = Arc::new(AtomicBool::new(true));
    signals::setup_signal_handlers(running.clone());

    let mut monitor = Monitor::new(Arc::clone(&accel));
    monitor.start();

    let options = vec![MountOption::FSName("flashfs".to_string())];
    let session = match fuser::spawn_mount2(FlashFuse::new(Arc::clone(&accel)), &args.mountpoint, &options)
    {
        Ok(session) => session,
        Err(error) => {
            tracing::error!(
                "Failed to mount at {}: {}",
                args.mountpoint.display(),
                error
            );
            monitor.stop();
            std::process::exit(1);
        }
    };

    tracing::info!("Mounted at {} (Press Ctrl+C to stop)", args.mountpoint.display());

    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));
    }

    tracing::info!("Shutdown signal received, unmounting");
    drop(session);
    monitor.stop();

    tracing::info!("FlashFS stopped");
}
