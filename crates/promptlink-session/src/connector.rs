use promptlink_transport::{SerialConfig, SerialConnector};

use crate::config::SessionConfig;
use crate::error::Result;
use crate::session::Session;

/// Start a session on a serial port with default settings.
pub fn connect(port: impl Into<String>) -> Result<Session> {
    let serial = SerialConfig {
        port: port.into(),
        ..SerialConfig::default()
    };
    connect_with_config(serial, SessionConfig::default())
}

/// Start a session on a serial port with explicit configuration.
pub fn connect_with_config(serial: SerialConfig, config: SessionConfig) -> Result<Session> {
    Session::spawn(SerialConnector::new(serial), config)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::SessionError;
    use crate::events::ConnectionState;

    #[tokio::test]
    async fn missing_port_keeps_retrying() {
        let session = connect("/dev/promptlink-test-missing").unwrap();
        assert_eq!(session.name(), "/dev/promptlink-test-missing@115200");

        let err = session
            .wait_connected(Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotConnected));
        assert_ne!(session.state(), ConnectionState::Connected);
        session.shutdown().await;
    }
}
