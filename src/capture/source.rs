//! Camera frame sources.
//!
//! A [`FrameSource`] hands out one compressed frame per call, using the
//! driver's continuous/video capture mode under the hood: the first
//! `capture_next` enters streaming mode and later calls reuse it. Changing
//! the framerate is only legal once the sequence has been explicitly ended
//! with `end_sequence`, so no capture is ever in flight during a
//! reconfiguration.

use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::info;
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::CaptureConfig;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// The hardware cannot be claimed or died mid-stream. Fatal to the loop.
    #[error("camera device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Contract violation, e.g. a framerate change while a capture sequence
    /// is still active. Indicates a bug in the caller, not a runtime fault.
    #[error("invalid capture state: {0}")]
    InvalidState(&'static str),
}

/// One open camera device.
///
/// Opening is per-implementation; the device comes up configured
/// (resolution, initial framerate) but idle.
pub trait FrameSource: Send {
    /// Apply a new framerate. Only legal while no capture sequence is
    /// active; end the sequence first.
    fn set_framerate(&mut self, fps: u32) -> Result<(), CaptureError>;

    /// Block until the next compressed frame is available and write its
    /// bytes into `sink` (cleared first). Enters the driver's streaming
    /// mode on first call.
    fn capture_next(&mut self, sink: &mut Vec<u8>) -> Result<(), CaptureError>;

    /// Leave streaming mode, draining the in-flight sequence. No-op when idle.
    fn end_sequence(&mut self);

    /// Release the device handle. Idempotent: closing a closed source is a
    /// no-op, never an error.
    fn close(&mut self);
}

/// Open the source named by the config, dispatching on the path scheme.
pub fn open_source(config: &CaptureConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
    if config.device.starts_with("stub://") {
        Ok(Box::new(SynthSource::open(config)))
    } else {
        Ok(Box::new(V4l2Source::open(config)?))
    }
}

/// V4L2-backed source using memory-mapped streaming I/O
pub struct V4l2Source {
    device: Option<Box<Device>>,
    stream: Option<MmapStream<'static>>,
    buffer_count: u32,
}

impl V4l2Source {
    /// Claim the device and configure resolution and the initial framerate
    pub fn open(config: &CaptureConfig) -> Result<Self, CaptureError> {
        info!("Opening V4L2 device: {}", config.device);

        let device = Device::with_path(&config.device)
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        let caps = device
            .query_caps()
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
        info!("Device: {} ({})", caps.card, caps.driver);

        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(CaptureError::DeviceUnavailable(format!(
                "{} does not support video capture",
                config.device
            )));
        }

        let mut fmt = device
            .format()
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
        fmt.width = config.width;
        fmt.height = config.height;
        fmt.fourcc = FourCC::new(b"MJPG");
        device
            .set_format(&fmt)
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        let mut source = Self {
            device: Some(Box::new(device)),
            stream: None,
            buffer_count: config.buffer_count,
        };
        source.set_framerate(config.fps_high)?;
        Ok(source)
    }
}

impl FrameSource for V4l2Source {
    fn set_framerate(&mut self, fps: u32) -> Result<(), CaptureError> {
        if self.stream.is_some() {
            return Err(CaptureError::InvalidState(
                "framerate change while capture sequence active",
            ));
        }
        let device = self
            .device
            .as_ref()
            .ok_or(CaptureError::InvalidState("source closed"))?;

        let params = v4l::video::capture::Parameters::with_fps(fps);
        device
            .set_params(&params)
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
        info!("Framerate set to {} fps", fps);
        Ok(())
    }

    fn capture_next(&mut self, sink: &mut Vec<u8>) -> Result<(), CaptureError> {
        let device = self
            .device
            .as_ref()
            .ok_or(CaptureError::InvalidState("source closed"))?;

        if self.stream.is_none() {
            let stream = MmapStream::with_buffers(device, Type::VideoCapture, self.buffer_count)
                .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
            self.stream = Some(stream);
            info!("Capture stream started with {} buffers", self.buffer_count);
        }

        // Invariant: stream was just created if absent
        let stream = self
            .stream
            .as_mut()
            .ok_or(CaptureError::InvalidState("stream not started"))?;

        let (buf, _meta) = stream
            .next()
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        sink.clear();
        sink.extend_from_slice(buf);
        Ok(())
    }

    fn end_sequence(&mut self) {
        self.stream = None;
    }

    fn close(&mut self) {
        if self.device.is_some() {
            self.stream = None;
            self.device = None;
            info!("V4L2 device released");
        }
    }
}

/// Hardware-free source for `stub://` paths.
///
/// Produces deterministic JPEG-wrapped payloads at the configured rate so
/// the node can run on machines without a camera.
pub struct SynthSource {
    width: u32,
    height: u32,
    fps: u32,
    streaming: bool,
    closed: bool,
    counter: u64,
}

impl SynthSource {
    pub fn open(config: &CaptureConfig) -> Self {
        info!("Opening synthetic source: {}", config.device);
        Self {
            width: config.width,
            height: config.height,
            fps: config.fps_high,
            streaming: false,
            closed: false,
            counter: 0,
        }
    }
}

impl FrameSource for SynthSource {
    fn set_framerate(&mut self, fps: u32) -> Result<(), CaptureError> {
        if self.streaming {
            return Err(CaptureError::InvalidState(
                "framerate change while capture sequence active",
            ));
        }
        if self.closed {
            return Err(CaptureError::InvalidState("source closed"));
        }
        self.fps = fps;
        Ok(())
    }

    fn capture_next(&mut self, sink: &mut Vec<u8>) -> Result<(), CaptureError> {
        if self.closed {
            return Err(CaptureError::InvalidState("source closed"));
        }
        self.streaming = true;
        self.counter += 1;

        if self.fps > 0 {
            thread::sleep(Duration::from_secs_f64(1.0 / self.fps as f64));
        }

        sink.clear();
        // JPEG SOI marker, a payload pattern seeded by the frame counter, EOI
        sink.extend_from_slice(&[0xFF, 0xD8]);
        let body_len = (self.width * self.height / 64) as usize;
        sink.extend((0..body_len).map(|i| (i as u64 + self.counter) as u8));
        sink.extend_from_slice(&[0xFF, 0xD9]);
        Ok(())
    }

    fn end_sequence(&mut self) {
        self.streaming = false;
    }

    fn close(&mut self) {
        self.streaming = false;
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> CaptureConfig {
        CaptureConfig {
            device: "stub://test".into(),
            width: 64,
            height: 64,
            fps_high: 0, // no pacing in tests
            fps_low: 0,
            buffer_count: 4,
            frame_id: "test/camera_optical_frame".into(),
        }
    }

    #[test]
    fn synth_source_produces_jpeg_payloads() {
        let mut source = SynthSource::open(&stub_config());
        let mut sink = Vec::new();

        source.capture_next(&mut sink).unwrap();
        assert_eq!(&sink[..2], &[0xFF, 0xD8]);
        assert_eq!(&sink[sink.len() - 2..], &[0xFF, 0xD9]);

        let first = sink.clone();
        source.capture_next(&mut sink).unwrap();
        assert_ne!(first, sink, "consecutive frames must differ");
    }

    #[test]
    fn framerate_change_requires_drained_sequence() {
        let mut source = SynthSource::open(&stub_config());
        let mut sink = Vec::new();
        source.capture_next(&mut sink).unwrap();

        assert!(matches!(
            source.set_framerate(15),
            Err(CaptureError::InvalidState(_))
        ));

        source.end_sequence();
        source.set_framerate(15).unwrap();
    }

    #[test]
    fn close_is_idempotent() {
        let mut source = SynthSource::open(&stub_config());
        source.close();
        source.close();

        let mut sink = Vec::new();
        assert!(source.capture_next(&mut sink).is_err());
    }

    #[test]
    fn stub_scheme_selects_synthetic_source() {
        let source = open_source(&stub_config());
        assert!(source.is_ok());
    }
}
