use std::sync::Arc;

use promptlink_transport::{pump, Connector, Link, LinkEvent};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::events::{ConnectionState, SessionEvent};
use crate::executor::{lock_framer, Job, SharedFramer};

/// Keeps a link open: open, synchronize, wait for close, back off, repeat.
pub(crate) struct Reconnector<C> {
    connector: C,
    framer: SharedFramer,
    jobs: mpsc::Sender<Job>,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<SessionEvent>,
    backoff: Backoff,
    cancel: CancellationToken,
}

enum Outcome {
    Synchronized,
    Failed,
    Closed(String),
    Cancelled,
}

impl<C: Connector> Reconnector<C> {
    pub(crate) fn new(
        connector: C,
        framer: SharedFramer,
        jobs: mpsc::Sender<Job>,
        state: watch::Sender<ConnectionState>,
        events: broadcast::Sender<SessionEvent>,
        backoff: Backoff,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            connector,
            framer,
            jobs,
            state,
            events,
            backoff,
            cancel,
        }
    }

    pub(crate) async fn run(mut self) {
        let target = self.connector.describe();
        while !self.cancel.is_cancelled() {
            match self.connector.open() {
                Ok(link) => {
                    self.set_state(ConnectionState::Connecting);
                    self.serve(link).await;
                }
                Err(err) => {
                    warn!(link = %target, error = %err, "failed to open link");
                    self.publish_error(err.to_string());
                }
            }
            self.set_state(ConnectionState::Disconnected);

            let delay = self.backoff.next_delay();
            info!(
                link = %target,
                delay_ms = delay.as_millis() as u64,
                failures = self.backoff.failures(),
                "reconnecting after delay"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        self.set_state(ConnectionState::Disconnected);
        debug!(link = %target, "reconnector stopped");
    }

    /// Drive one opened link until it closes or fails to synchronize.
    async fn serve(&mut self, link: Link) {
        let name = link.name().to_string();
        let (reader, sink) = link.into_split();

        let pump_cancel = self.cancel.child_token();
        let (closed_tx, mut closed_rx) = oneshot::channel();
        let mut closed_tx = Some(closed_tx);
        let framer = Arc::clone(&self.framer);
        let events = self.events.clone();
        let pump_name = name.clone();
        let pump_task = tokio::spawn(pump(reader, pump_cancel.clone(), move |event| match event {
            LinkEvent::Data(data) => {
                if let Err(err) = lock_framer(&framer).on_bytes(&data) {
                    warn!(link = %pump_name, error = %err, "receive buffer discarded");
                    let _ = events.send(SessionEvent::Error {
                        message: err.to_string(),
                    });
                }
            }
            LinkEvent::Error(message) => {
                warn!(link = %pump_name, error = %message, "link error");
                let _ = events.send(SessionEvent::Error { message });
            }
            LinkEvent::Closed(reason) => {
                if let Some(tx) = closed_tx.take() {
                    let _ = tx.send(reason);
                }
            }
        }));

        let (reply, synced) = oneshot::channel();
        let outcome = if self.jobs.send(Job::Attach { sink, reply }).await.is_err() {
            Outcome::Cancelled
        } else {
            tokio::select! {
                _ = self.cancel.cancelled() => Outcome::Cancelled,
                reason = &mut closed_rx => Outcome::Closed(closed_reason(reason)),
                synced = synced => match synced {
                    Ok(true) => Outcome::Synchronized,
                    _ => Outcome::Failed,
                },
            }
        };

        let outcome = match outcome {
            Outcome::Synchronized => {
                self.backoff.reset();
                self.set_state(ConnectionState::Connected);
                info!(link = %name, "link synchronized");
                tokio::select! {
                    _ = self.cancel.cancelled() => Outcome::Cancelled,
                    reason = &mut closed_rx => Outcome::Closed(closed_reason(reason)),
                }
            }
            other => other,
        };

        match &outcome {
            Outcome::Closed(reason) => warn!(link = %name, reason = %reason, "link closed"),
            Outcome::Failed => warn!(link = %name, "could not synchronize, dropping link"),
            Outcome::Synchronized | Outcome::Cancelled => {}
        }

        // Queued commands must see the link as gone before it is detached.
        self.set_state(ConnectionState::Disconnected);
        pump_cancel.cancel();
        let _ = pump_task.await;
        if !matches!(outcome, Outcome::Cancelled) {
            let _ = self.jobs.send(Job::Detach).await;
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "connection state changed");
            let _ = self.events.send(SessionEvent::StateChanged { state });
        }
    }

    fn publish_error(&self, message: String) {
        let _ = self.events.send(SessionEvent::Error { message });
    }
}

fn closed_reason(reason: Result<String, oneshot::error::RecvError>) -> String {
    reason.unwrap_or_else(|_| "link pump stopped".to_string())
}
