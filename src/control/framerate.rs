//! Runtime framerate switching between two configured presets.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tracing::debug;

/// Pending-switch protocol between the signal side and the capture loop.
///
/// `current` is always one of the two presets. One producer-side entry
/// point (`request_switch`) and one consumer-side entry point (`consume`);
/// a request issued before the previous one is consumed overwrites the
/// target, it never queues a second reconfiguration.
pub struct FramerateSwitch {
    high: u32,
    low: u32,
    current: AtomicU32,
    pending: AtomicBool,
}

impl FramerateSwitch {
    /// Starts on the high preset, nothing pending.
    pub fn new(high: u32, low: u32) -> Self {
        Self {
            high,
            low,
            current: AtomicU32::new(high),
            pending: AtomicBool::new(false),
        }
    }

    /// Request a switch to the given preset. A request for the preset that
    /// is already current is a no-op, so repeated identical signals cause
    /// no reconfiguration storm.
    pub fn request_switch(&self, to_high: bool) {
        let target = if to_high { self.high } else { self.low };
        if self.current.load(Ordering::Acquire) == target {
            return;
        }
        self.current.store(target, Ordering::Release);
        self.pending.store(true, Ordering::Release);
        debug!("Framerate switch requested: {} fps", target);
    }

    /// Atomically take the pending switch, if any. Returns the target
    /// framerate exactly once per raised request.
    pub fn consume(&self) -> Option<u32> {
        if self.pending.swap(false, Ordering::AcqRel) {
            Some(self.current.load(Ordering::Acquire))
        } else {
            None
        }
    }

    /// The framerate most recently requested or applied.
    pub fn current(&self) -> u32 {
        self.current.load(Ordering::Acquire)
    }
}
