/// Errors surfaced to callers of a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The link is not in the connected state.
    #[error("not connected")]
    NotConnected,

    /// No response within the budget across all attempts.
    #[error("command {command:?} timed out after {attempts} attempts")]
    Timeout { command: String, attempts: u32 },

    /// The device answered but flagged the command as invalid.
    #[error("command {command:?} not supported by device")]
    UnsupportedCommand { command: String },

    /// Write, flush or drain failure on the link.
    #[error("link error: {0}")]
    Io(#[from] promptlink_transport::TransportError),

    /// Command encoding or protocol configuration error.
    #[error("frame error: {0}")]
    Frame(#[from] promptlink_frame::FrameError),

    /// The session has been shut down.
    #[error("session shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_command_and_attempts() {
        let err = SessionError::Timeout {
            command: "*pow=?#".to_string(),
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "command \"*pow=?#\" timed out after 3 attempts"
        );
    }

    #[test]
    fn transport_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged");
        let err: SessionError = promptlink_transport::TransportError::Io(io).into();
        assert!(matches!(err, SessionError::Io(_)));
    }
}
