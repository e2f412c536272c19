pub mod frame;
pub mod source;
pub mod worker;

pub use frame::Frame;
pub use source::{open_source, CaptureError, FrameSource, SynthSource, V4l2Source};
pub use worker::CaptureWorker;
