/// Errors that can occur during framing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    /// The receive buffer grew past its limit without a terminator.
    #[error("receive buffer overflow ({size} bytes, max {max})")]
    BufferOverflow { size: usize, max: usize },

    /// Commands travel as ASCII text.
    #[error("command contains non-ASCII byte at offset {offset}")]
    NonAscii { offset: usize },

    /// The protocol configuration is unusable.
    #[error("invalid protocol config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, FrameError>;
