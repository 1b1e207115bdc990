use bytes::BytesMut;
use promptlink_frame::encode_command;
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};
use crate::executor::{lock_framer, Executor};

impl Executor {
    /// Bring the link back to a known-idle state.
    ///
    /// Each round drops buffered input and pending reads, discards unsent
    /// output, then sends an empty command and waits for the prompt. Returns
    /// `true` on the first round that sees it. A failed pass leaves no
    /// pending reads behind.
    pub(crate) async fn synchronize(&mut self) -> bool {
        if self.sink.is_none() {
            return false;
        }

        let mut probe = BytesMut::new();
        if let Err(err) = encode_command("", &self.protocol.line_ending, &mut probe) {
            warn!(error = %err, "cannot encode synchronization probe");
            return false;
        }

        let rounds = self.sync.attempts.max(1);
        for round in 1..=rounds {
            if self.link_lost() {
                debug!(round, "link lost, abandoning synchronization");
                break;
            }
            debug!(round, "synchronizing with device");
            match self.drain_link().await {
                Ok(()) => {
                    if self.probe(&probe).await {
                        info!(round, "synchronized with device");
                        return true;
                    }
                }
                Err(err) => warn!(round, error = %err, "failed to drain link"),
            }

            if round < rounds {
                tokio::time::sleep(self.sync.retry_delay).await;
            }
        }

        lock_framer(&self.framer).drain();
        warn!(rounds, "failed to synchronize with device");
        false
    }

    async fn drain_link(&mut self) -> Result<()> {
        let dropped = lock_framer(&self.framer).drain();
        if dropped > 0 {
            debug!(dropped, "cancelled pending reads");
        }
        let sink = self.sink.as_mut().ok_or(SessionError::NotConnected)?;
        sink.flush_and_drain().await?;
        Ok(())
    }

    async fn probe(&mut self, probe: &[u8]) -> bool {
        match self.attempt(probe, self.sync.probe_timeout).await {
            Ok(Some(response)) => {
                let ready = self.protocol.is_ready(&response);
                debug!(response = %response.escape_debug(), ready, "probe answered");
                ready
            }
            Ok(None) => {
                debug!("probe timed out");
                false
            }
            Err(err) => {
                debug!(error = %err, "probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use promptlink_frame::{Framer, ProtocolConfig, SyncCheck};
    use promptlink_transport::{memory_link, pump, Connector, LinkEvent};
    use tokio::sync::watch;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::config::{ExecutorConfig, SyncConfig};
    use crate::events::ConnectionState;
    use crate::sim::{spawn_device, Device};

    async fn attached<F>(protocol: ProtocolConfig, respond: F) -> (Executor, Device)
    where
        F: FnMut(&str) -> Option<String> + Send + 'static,
    {
        let (connector, mut devices) = memory_link("projector");
        let (reader, sink) = connector.open().unwrap().into_split();
        let device = spawn_device(devices.accept().await.unwrap(), respond, Duration::ZERO);

        let framer = Arc::new(Mutex::new(Framer::new(&protocol)));
        let pump_framer = Arc::clone(&framer);
        tokio::spawn(pump(reader, CancellationToken::new(), move |event| {
            if let LinkEvent::Data(data) = event {
                let _ = lock_framer(&pump_framer).on_bytes(&data);
            }
        }));

        let (_, state) = watch::channel(ConnectionState::Connected);
        let sync = SyncConfig {
            attempts: 3,
            probe_timeout: Duration::from_millis(500),
            retry_delay: Duration::from_secs(2),
        };
        let mut executor = Executor::new(framer, protocol, ExecutorConfig::default(), sync, state);
        executor.sink = Some(sink);
        (executor, device)
    }

    #[tokio::test(start_paused = true)]
    async fn prompt_synchronizes_on_first_round() {
        let (mut executor, device) =
            attached(ProtocolConfig::default(), |_| Some(">".to_string())).await;

        assert!(executor.synchronize().await);
        assert_eq!(device.received(), vec![""]);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_device_exhausts_rounds_with_delay() {
        let (mut executor, device) = attached(ProtocolConfig::default(), |_| None).await;
        let started = Instant::now();

        assert!(!executor.synchronize().await);

        // Three probe timeouts plus two retry delays.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(5500), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(5600), "{elapsed:?}");
        assert_eq!(device.received(), vec!["", "", ""]);
        assert_eq!(lock_framer(&executor.framer).pending_reads(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unterminated_noise_is_dropped_between_rounds() {
        // First probe gets a partial line; the next round drains it and sees the prompt.
        let mut probes = 0;
        let (mut executor, device) = attached(ProtocolConfig::default(), move |cmd| {
            if !cmd.is_empty() {
                return None;
            }
            probes += 1;
            Some(if probes == 1 { "*POW=ON#" } else { ">" }.to_string())
        })
        .await;

        assert!(executor.synchronize().await);
        assert_eq!(device.received(), vec!["", ""]);
    }

    #[tokio::test(start_paused = true)]
    async fn last_check_accepts_trailing_prompt() {
        let protocol = ProtocolConfig {
            sync_check: SyncCheck::Last,
            ..ProtocolConfig::default()
        };
        let (mut executor, _device) = attached(protocol, |_| Some("*>".to_string())).await;
        assert!(executor.synchronize().await);
    }

    #[tokio::test(start_paused = true)]
    async fn detached_executor_does_not_synchronize() {
        let (mut executor, _device) =
            attached(ProtocolConfig::default(), |_| Some(">".to_string())).await;
        executor.detach().await;
        assert!(!executor.synchronize().await);
    }
}
