//! The capture-publish loop.
//!
//! One dedicated OS thread owns the hardware handle and runs this state
//! machine from process start until shutdown. Other threads never touch
//! the source directly; they only raise flags the loop observes once per
//! iteration, so there is no concurrent hardware access to reason about.

use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use tracing::{error, info};

use crate::capture::source::{CaptureError, FrameSource};
use crate::capture::Frame;
use crate::control::{FramerateSwitch, Shutdown};
use crate::publish::Publisher;

enum LoopState {
    Capturing,
    Reconfiguring(u32),
    Stopped,
}

/// Drives a [`FrameSource`] in a tight capture sequence, stamping each
/// frame and handing it to the publisher. Framerate switches and shutdown
/// are checked before every capture, so both take effect within one frame
/// interval and never abort an in-flight capture.
pub struct CaptureWorker {
    source: Box<dyn FrameSource>,
    publisher: Arc<Publisher>,
    framerate: Arc<FramerateSwitch>,
    shutdown: Arc<Shutdown>,
    frame_id: String,
}

impl CaptureWorker {
    pub fn new(
        source: Box<dyn FrameSource>,
        publisher: Arc<Publisher>,
        framerate: Arc<FramerateSwitch>,
        shutdown: Arc<Shutdown>,
        frame_id: String,
    ) -> Self {
        Self {
            source,
            publisher,
            framerate,
            shutdown,
            frame_id,
        }
    }

    /// Run the loop on a named background thread.
    pub fn spawn(self) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("capture-loop".into())
            .spawn(move || self.run())
    }

    /// Run to completion. Returns once the loop reached its terminal state
    /// and the hardware handle has been released.
    pub fn run(mut self) {
        info!("Start capturing");
        let mut sink = Vec::new();
        let mut sequence = 0u64;
        let mut state = LoopState::Capturing;

        loop {
            state = match state {
                LoopState::Capturing => {
                    if self.shutdown.is_requested() {
                        LoopState::Stopped
                    } else if let Some(fps) = self.framerate.consume() {
                        LoopState::Reconfiguring(fps)
                    } else {
                        match self.source.capture_next(&mut sink) {
                            Ok(()) => {
                                sequence += 1;
                                let frame = Frame::new(
                                    Bytes::copy_from_slice(&sink),
                                    self.frame_id.clone(),
                                    sequence,
                                );
                                self.publisher.publish(frame);
                                LoopState::Capturing
                            }
                            Err(e) => {
                                error!("Fatal capture error: {e}");
                                LoopState::Stopped
                            }
                        }
                    }
                }
                LoopState::Reconfiguring(fps) => {
                    // The sequence must be fully drained before a framerate
                    // change is legal.
                    self.source.end_sequence();
                    match self.source.set_framerate(fps) {
                        Ok(()) => LoopState::Capturing,
                        Err(e @ CaptureError::InvalidState(_)) => {
                            error!("Invariant violation during reconfiguration: {e}");
                            LoopState::Stopped
                        }
                        Err(e) => {
                            error!("Fatal reconfiguration error: {e}");
                            LoopState::Stopped
                        }
                    }
                }
                LoopState::Stopped => {
                    self.source.close();
                    info!("Capture ended after {} frames", sequence);
                    return;
                }
            };
        }
    }
}
