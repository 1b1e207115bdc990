use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::BytesMut;
use promptlink_frame::{encode_command, Framer, ProtocolConfig};
use promptlink_transport::LinkSink;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ExecutorConfig, SyncConfig};
use crate::error::{Result, SessionError};
use crate::events::ConnectionState;

/// Framer shared between the link pump and the executor.
pub(crate) type SharedFramer = Arc<Mutex<Framer>>;

/// Lock the framer. Never hold the guard across an await.
pub(crate) fn lock_framer(framer: &Mutex<Framer>) -> MutexGuard<'_, Framer> {
    framer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An outbound instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Sequence id for log correlation.
    pub id: u64,
    /// Opaque command text, without line ending.
    pub text: String,
    /// Response timeout per attempt.
    pub timeout: Duration,
}

/// Work item for the executor queue.
pub(crate) enum Job {
    /// Run a command through the full attempt cycle.
    Execute {
        command: Command,
        reply: oneshot::Sender<Result<String>>,
    },
    /// Take ownership of a freshly opened link and synchronize it.
    Attach {
        sink: LinkSink,
        reply: oneshot::Sender<bool>,
    },
    /// Run a synchronization pass on the current link.
    Synchronize { reply: oneshot::Sender<Result<bool>> },
    /// Drop the current link.
    Detach,
}

/// Runs jobs one at a time against the current link.
///
/// Everything that writes to the link goes through here, so no two command
/// attempts can overlap.
pub(crate) struct Executor {
    pub(crate) framer: SharedFramer,
    pub(crate) protocol: ProtocolConfig,
    pub(crate) config: ExecutorConfig,
    pub(crate) sync: SyncConfig,
    pub(crate) sink: Option<LinkSink>,
    attaching: bool,
    state: watch::Receiver<ConnectionState>,
}

impl Executor {
    pub(crate) fn new(
        framer: SharedFramer,
        protocol: ProtocolConfig,
        config: ExecutorConfig,
        sync: SyncConfig,
        state: watch::Receiver<ConnectionState>,
    ) -> Self {
        Self {
            framer,
            protocol,
            config,
            sync,
            sink: None,
            attaching: false,
            state,
        }
    }

    /// Process jobs until the queue closes or `cancel` fires.
    pub(crate) async fn run(mut self, mut jobs: mpsc::Receiver<Job>, cancel: CancellationToken) {
        loop {
            let job = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                job = jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.handle(job) => {}
            }
        }

        self.detach().await;
        debug!("executor stopped");
    }

    async fn handle(&mut self, job: Job) {
        match job {
            Job::Execute { command, reply } => {
                let result = self.execute(&command).await;
                let _ = reply.send(result);
            }
            Job::Attach { sink, reply } => {
                debug!(link = sink.name(), "link attached");
                self.sink = Some(sink);
                self.attaching = true;
                let synchronized = self.synchronize().await;
                self.attaching = false;
                if !synchronized {
                    self.detach().await;
                }
                let _ = reply.send(synchronized);
            }
            Job::Synchronize { reply } => {
                let result = if self.sink.is_some() {
                    Ok(self.synchronize().await)
                } else {
                    Err(SessionError::NotConnected)
                };
                let _ = reply.send(result);
            }
            Job::Detach => self.detach().await,
        }
    }

    /// The link being worked on is no longer the one the supervisor serves.
    ///
    /// While a new link is attached the state is `Connecting`; afterwards
    /// anything but `Connected` means the link was dropped.
    pub(crate) fn link_lost(&self) -> bool {
        match *self.state.borrow() {
            ConnectionState::Disconnected => true,
            ConnectionState::Connecting => !self.attaching,
            ConnectionState::Connected => false,
        }
    }

    pub(crate) async fn detach(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(err) = sink.close().await {
                debug!(link = sink.name(), error = %err, "link close failed");
            }
        }
        lock_framer(&self.framer).drain();
    }

    /// Execute one command with retries.
    pub(crate) async fn execute(&mut self, command: &Command) -> Result<String> {
        if !self.state.borrow().is_connected() || self.sink.is_none() {
            return Err(SessionError::NotConnected);
        }

        let mut wire = BytesMut::new();
        encode_command(&command.text, &self.protocol.line_ending, &mut wire)?;

        let attempts = self.config.max_attempts.max(1);
        let mut response = None;
        let mut last_error = None;
        for attempt in 1..=attempts {
            if attempt > 1 && self.link_lost() {
                return Err(SessionError::NotConnected);
            }
            debug!(command_id = command.id, attempt, "begin processing command");
            match self.attempt(&wire, command.timeout).await {
                Ok(Some(frame)) => {
                    response = Some(frame);
                    break;
                }
                Ok(None) => {
                    debug!(
                        command_id = command.id,
                        attempt,
                        timeout_ms = command.timeout.as_millis() as u64,
                        "command execution timed out"
                    );
                    last_error = None;
                }
                Err(SessionError::NotConnected) => return Err(SessionError::NotConnected),
                Err(err) => {
                    warn!(command_id = command.id, attempt, error = %err, "command attempt failed");
                    last_error = Some(err);
                }
            }
            self.synchronize().await;
        }

        debug!(command_id = command.id, response = ?response, "done processing command");
        let Some(response) = response else {
            return Err(last_error.unwrap_or_else(|| SessionError::Timeout {
                command: command.text.clone(),
                attempts,
            }));
        };

        if self.protocol.is_rejection(&response) {
            return Err(SessionError::UnsupportedCommand {
                command: command.text.clone(),
            });
        }
        if self.protocol.is_busy(&response) {
            info!(command_id = command.id, "device busy, command may not have been applied");
        }
        Ok(response)
    }

    /// One write raced against a timer.
    ///
    /// The read is registered before the write so a fast device cannot answer
    /// before anyone listens. `Ok(None)` means the timer won or the read was
    /// cancelled.
    pub(crate) async fn attempt(&mut self, wire: &[u8], timeout: Duration) -> Result<Option<String>> {
        let sink = self.sink.as_mut().ok_or(SessionError::NotConnected)?;
        let timer = tokio::time::sleep(timeout);
        tokio::pin!(timer);
        let read = lock_framer(&self.framer).schedule_read();

        tokio::select! {
            written = sink.write(wire) => written?,
            _ = &mut timer => return Ok(None),
        }

        tokio::select! {
            frame = read => Ok(frame),
            _ = &mut timer => Ok(None),
        }
    }
}
