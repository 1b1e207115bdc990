use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use promptlink_frame::Framer;
use promptlink_transport::Connector;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backoff::Backoff;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::events::{ConnectionState, SessionEvent};
use crate::executor::{Command, Executor, Job};
use crate::reconnect::Reconnector;

const EVENT_CAPACITY: usize = 64;

/// A self-healing command session over one device link.
///
/// The session owns two background tasks: a reconnector that keeps the link
/// open and synchronized, and an executor that runs commands one at a time.
/// Dropping the session stops both.
pub struct Session {
    name: String,
    jobs: mpsc::Sender<Job>,
    state: watch::Receiver<ConnectionState>,
    events: broadcast::Sender<SessionEvent>,
    next_command: AtomicU64,
    default_timeout: Duration,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Start a session on `connector`. Must be called inside a tokio runtime.
    ///
    /// Returns immediately; the first connection attempt runs in the
    /// background. Use [`Session::wait_connected`] to wait for it.
    pub fn spawn<C: Connector>(connector: C, config: SessionConfig) -> Result<Self> {
        config.protocol.validate()?;

        let name = connector.describe();
        let framer = Arc::new(Mutex::new(Framer::new(&config.protocol)));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (jobs_tx, jobs_rx) = mpsc::channel(config.executor.queue_depth.max(1));
        let cancel = CancellationToken::new();

        let executor = Executor::new(
            Arc::clone(&framer),
            config.protocol.clone(),
            config.executor.clone(),
            config.sync.clone(),
            state_rx.clone(),
        );
        let reconnector = Reconnector::new(
            connector,
            framer,
            jobs_tx.clone(),
            state_tx,
            events.clone(),
            Backoff::new(config.backoff.clone()),
            cancel.clone(),
        );

        let tasks = vec![
            tokio::spawn(executor.run(jobs_rx, cancel.clone())),
            tokio::spawn(reconnector.run()),
        ];
        info!(link = %name, "session started");

        Ok(Self {
            name,
            jobs: jobs_tx,
            state: state_rx,
            events,
            next_command: AtomicU64::new(1),
            default_timeout: config.executor.default_timeout,
            cancel,
            tasks,
        })
    }

    /// Description of the underlying link.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// A receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Subscribe to lifecycle events. Only events after this call are seen.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Wait until the link is synchronized, or fail with `NotConnected`.
    pub async fn wait_connected(&self, timeout: Duration) -> Result<()> {
        let mut state = self.state.clone();
        let result = tokio::time::timeout(timeout, state.wait_for(|s| s.is_connected()))
            .await
            .map(|changed| changed.map(|_| ()));
        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(SessionError::Shutdown),
            Err(_) => Err(SessionError::NotConnected),
        }
    }

    /// Send `command` and return the device's response, terminator included.
    ///
    /// Commands queue and run strictly one at a time. `timeout` bounds each
    /// attempt; `None` uses the configured default.
    pub async fn execute(&self, command: &str, timeout: Option<Duration>) -> Result<String> {
        if !self.state().is_connected() {
            return Err(SessionError::NotConnected);
        }

        let command = Command {
            id: self.next_command.fetch_add(1, Ordering::Relaxed),
            text: command.to_string(),
            timeout: timeout.unwrap_or(self.default_timeout),
        };
        debug!(command_id = command.id, command = %command.text, "queueing command");

        let (reply, rx) = oneshot::channel();
        self.jobs
            .send(Job::Execute { command, reply })
            .await
            .map_err(|_| SessionError::Shutdown)?;
        rx.await.map_err(|_| SessionError::Shutdown)?
    }

    /// Run a synchronization pass between queued commands.
    pub async fn synchronize(&self) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.jobs
            .send(Job::Synchronize { reply })
            .await
            .map_err(|_| SessionError::Shutdown)?;
        rx.await.map_err(|_| SessionError::Shutdown)?
    }

    /// Stop the background tasks and close the link.
    ///
    /// Queued and in-flight commands fail with `Shutdown`.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.tasks) {
            let _ = task.await;
        }
        info!(link = %self.name, "session shut down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
