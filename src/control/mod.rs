pub mod framerate;
pub mod shutdown;

pub use framerate::FramerateSwitch;
pub use shutdown::Shutdown;
