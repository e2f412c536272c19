//! Cooperative shutdown latch.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

/// Process-wide shutdown flag: once set it never resets.
///
/// Any thread may request shutdown at any time, including before the first
/// capture. The capture loop observes the flag once per iteration and
/// closes the hardware within one capture interval; together with the
/// source's idempotent `close`, the device is released exactly once no
/// matter which path gets there first.
#[derive(Default)]
pub struct Shutdown {
    requested: AtomicBool,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Idempotent.
    pub fn request(&self) {
        if !self.requested.swap(true, Ordering::AcqRel) {
            info!("Shutdown requested");
        }
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unset_and_latches() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_requested());

        shutdown.request();
        assert!(shutdown.is_requested());

        // Never resets
        shutdown.request();
        assert!(shutdown.is_requested());
    }
}
