use bytes::Bytes;
use std::time::SystemTime;

/// The single compressed encoding the hardware produces.
pub const FRAME_FORMAT: &str = "jpeg";

/// One captured frame with zero-copy payload semantics
#[derive(Clone, Debug)]
pub struct Frame {
    /// Immutable compressed payload - can be shared across threads without copying
    pub payload: Bytes,

    /// Encoding tag, always [`FRAME_FORMAT`]
    pub format: &'static str,

    /// Wall-clock stamp taken right after capture
    pub timestamp: SystemTime,

    /// Logical sensor identifier
    pub frame_id: String,

    /// Monotonic capture counter for the lifetime of the loop
    pub sequence: u64,
}

impl Frame {
    pub fn new(payload: Bytes, frame_id: String, sequence: u64) -> Self {
        Self {
            payload,
            format: FRAME_FORMAT,
            timestamp: SystemTime::now(),
            frame_id,
            sequence,
        }
    }
}
