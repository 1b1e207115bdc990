use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use promptlink_session::SessionConfig;
use promptlink_transport::SerialConfig;
use serde::Deserialize;

use crate::exit::{io_error, CliError, CliResult, DATA_INVALID};

/// Link selection shared by every device command.
#[derive(Args, Debug, Clone, Default)]
pub struct LinkArgs {
    /// Serial device path.
    #[arg(long, env = "PROMPTLINK_PORT", global = true)]
    pub port: Option<String>,

    /// Baud rate (8N1, no flow control).
    #[arg(long, env = "PROMPTLINK_BAUD", global = true)]
    pub baud: Option<u32>,

    /// JSON configuration file; flags override its values.
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,
}

/// Layout of the `--config` file.
///
/// ```json
/// {
///   "serial": { "port": "/dev/ttyUSB0", "baud_rate": 115200 },
///   "session": { "executor": { "max_attempts": 3 } }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub serial: SerialConfig,
    pub session: SessionConfig,
}

impl FileConfig {
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        Self::parse(&text)
            .map_err(|err| CliError::new(DATA_INVALID, format!("{}: {err}", path.display())))
    }

    fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

impl LinkArgs {
    /// Merge the config file (if any) with flag and env overrides.
    pub fn resolve(&self) -> CliResult<(SerialConfig, SessionConfig)> {
        let file = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Ok(self.apply(file))
    }

    fn apply(&self, file: FileConfig) -> (SerialConfig, SessionConfig) {
        let mut serial = file.serial;
        if let Some(port) = &self.port {
            serial.port = port.clone();
        }
        if let Some(baud) = self.baud {
            serial.baud_rate = baud;
        }
        (serial, file.session)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn flags_override_file_values() {
        let file = FileConfig::parse(
            r#"{"serial":{"port":"/dev/ttyS0","baud_rate":9600},
                "session":{"executor":{"default_timeout_ms":500}}}"#,
        )
        .unwrap();
        let args = LinkArgs {
            port: Some("/dev/ttyUSB1".to_string()),
            ..LinkArgs::default()
        };

        let (serial, session) = args.apply(file);
        assert_eq!(serial.port, "/dev/ttyUSB1");
        assert_eq!(serial.baud_rate, 9600);
        assert_eq!(session.executor.default_timeout, Duration::from_millis(500));
        assert_eq!(session.executor.max_attempts, 3);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let (serial, session) = LinkArgs::default().apply(FileConfig::parse("{}").unwrap());
        assert_eq!(serial, SerialConfig::default());
        assert_eq!(session, SessionConfig::default());
    }

    #[test]
    fn malformed_file_is_data_invalid() {
        let path = std::env::temp_dir().join(format!(
            "promptlink-bad-config-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, "{ not json").unwrap();

        let err = FileConfig::load(&path).unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
        let _ = std::fs::remove_file(&path);
    }
}
