//! Cooperative shutdown flag shared by signal handlers and pool workers.
//!
//! Workers check the flag before claiming new work; files already in flight
//! drain to completion.

use std::sync::atomic::{AtomicBool, Ordering};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Raw flag, for signal handlers that need swap semantics.
pub fn shutdown_flag() -> &'static AtomicBool {
    &SHUTDOWN
}

pub fn is_shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

pub fn request_shutdown() {
    SHUTDOWN.store(true, Ordering::Relaxed);
}
