//! Best-effort frame fan-out.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use flume::{Receiver, Sender, TrySendError};
use tracing::{info, trace};

use crate::capture::Frame;

/// Delivers each frame to every current subscriber, fire-and-forget.
///
/// Subscribers each get a bounded single-slot channel; a subscriber that
/// has not drained its slot by the next frame simply misses that frame.
/// Publishing never blocks and never acknowledges.
pub struct Publisher {
    subscribers: Mutex<Vec<Sender<Frame>>>,
    has_published: AtomicBool,
    stats: Stats,
}

#[derive(Default)]
struct Stats {
    frames_published: AtomicUsize,
    frames_dropped: AtomicUsize,
}

impl Publisher {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            has_published: AtomicBool::new(false),
            stats: Stats::default(),
        }
    }

    /// Register a new subscriber. Callable at any time from any thread.
    pub fn subscribe(&self) -> Receiver<Frame> {
        let (tx, rx) = flume::bounded(1);
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Deliver `frame` to all current subscribers, dropping per-subscriber
    /// when a slot is still full. Disconnected subscribers are pruned.
    pub fn publish(&self, frame: Frame) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| match tx.try_send(frame.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
        drop(subscribers);

        self.stats.frames_published.fetch_add(1, Ordering::Relaxed);
        trace!(sequence = frame.sequence, "published frame");

        if !self.has_published.swap(true, Ordering::Relaxed) {
            info!("Published the first frame");
        }
    }

    /// Whether at least one frame has ever been handed out.
    pub fn has_published(&self) -> bool {
        self.has_published.load(Ordering::Relaxed)
    }

    /// (published, dropped) counters.
    pub fn stats(&self) -> (usize, usize) {
        (
            self.stats.frames_published.load(Ordering::Relaxed),
            self.stats.frames_dropped.load(Ordering::Relaxed),
        )
    }
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn frame(sequence: u64) -> Frame {
        Frame::new(Bytes::from_static(b"\xff\xd8test\xff\xd9"), "cam".into(), sequence)
    }

    #[test]
    fn delivers_to_all_subscribers_in_order() {
        let publisher = Publisher::new();
        let rx_a = publisher.subscribe();
        let rx_b = publisher.subscribe();

        publisher.publish(frame(1));
        assert_eq!(rx_a.recv().unwrap().sequence, 1);
        assert_eq!(rx_b.recv().unwrap().sequence, 1);

        publisher.publish(frame(2));
        assert_eq!(rx_a.recv().unwrap().sequence, 2);
        assert_eq!(rx_b.recv().unwrap().sequence, 2);
    }

    #[test]
    fn slow_subscriber_misses_frames_without_blocking() {
        let publisher = Publisher::new();
        let rx = publisher.subscribe();

        publisher.publish(frame(1));
        publisher.publish(frame(2)); // slot still full, dropped for rx

        assert_eq!(rx.recv().unwrap().sequence, 1);
        assert!(rx.try_recv().is_err());

        let (published, dropped) = publisher.stats();
        assert_eq!(published, 2);
        assert_eq!(dropped, 1);
    }

    #[test]
    fn disconnected_subscribers_are_pruned() {
        let publisher = Publisher::new();
        let rx = publisher.subscribe();
        drop(rx);

        publisher.publish(frame(1));
        assert_eq!(publisher.subscribers.lock().unwrap().len(), 0);
    }

    #[test]
    fn first_publish_latch_fires_once() {
        let publisher = Publisher::new();
        assert!(!publisher.has_published());

        publisher.publish(frame(1));
        assert!(publisher.has_published());

        publisher.publish(frame(2));
        assert!(publisher.has_published());
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let publisher = Publisher::new();
        publisher.publish(frame(1));
        assert_eq!(publisher.stats(), (1, 0));
    }
}
