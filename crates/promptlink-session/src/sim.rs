//! Scripted device for tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One observed line of traffic, in device order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Entry {
    Rx { command: String },
    Tx { response: String },
}

pub(crate) struct Device {
    log: Arc<Mutex<Vec<Entry>>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Device {
    pub(crate) fn log(&self) -> Vec<Entry> {
        self.log.lock().unwrap().clone()
    }

    /// Commands received so far, without line endings.
    pub(crate) fn received(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|entry| match entry {
                Entry::Rx { command } => Some(command),
                Entry::Tx { .. } => None,
            })
            .collect()
    }

    /// Drop the device end, closing the link.
    pub(crate) fn unplug(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

/// Serve `stream` as a device. Each `\r`-terminated command is logged on
/// arrival and passed to `respond`; a `Some` reply is written after
/// `reply_delay`.
pub(crate) fn spawn_device<F>(stream: DuplexStream, mut respond: F, reply_delay: Duration) -> Device
where
    F: FnMut(&str) -> Option<String> + Send + 'static,
{
    let log = Arc::new(Mutex::new(Vec::new()));
    let (mut reader, mut writer) = tokio::io::split(stream);
    let (replies_tx, mut replies_rx) = mpsc::unbounded_channel::<String>();

    let rx_log = Arc::clone(&log);
    let rx_task = tokio::spawn(async move {
        let mut pending = Vec::new();
        let mut chunk = [0u8; 256];
        loop {
            let n = match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            pending.extend_from_slice(&chunk[..n]);
            while let Some(pos) = pending.iter().position(|&b| b == b'\r') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                let command = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
                rx_log.lock().unwrap().push(Entry::Rx {
                    command: command.clone(),
                });
                if let Some(reply) = respond(&command) {
                    if replies_tx.send(reply).is_err() {
                        return;
                    }
                }
            }
        }
    });

    let tx_log = Arc::clone(&log);
    let tx_task = tokio::spawn(async move {
        while let Some(reply) = replies_rx.recv().await {
            if !reply_delay.is_zero() {
                tokio::time::sleep(reply_delay).await;
            }
            tx_log.lock().unwrap().push(Entry::Tx {
                response: reply.clone(),
            });
            if writer.write_all(reply.as_bytes()).await.is_err() {
                return;
            }
        }
    });

    Device {
        log,
        tasks: vec![rx_task, tx_task],
    }
}
