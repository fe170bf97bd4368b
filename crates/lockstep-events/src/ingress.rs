//! Bounded producer queue in front of the event log.
//!
//! Producers submit concurrently through cloned [`Ingress`] handles and
//! never wait for a tick to finish. The single writer drains the queue into
//! the [`EventLog`] between ticks.

use lockstep_types::{EventKey, InputEvent};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tracing::warn;

use crate::error::{EventLogError, SubmitError};
use crate::log::EventLog;

/// Create a connected ingress pair. A capacity of zero is raised to one.
pub fn ingress(capacity: usize) -> (Ingress, IngressReceiver) {
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    (Ingress { tx, capacity }, IngressReceiver { rx })
}

/// Producer handle. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Ingress {
    tx: mpsc::Sender<InputEvent>,
    capacity: usize,
}

impl Ingress {
    /// Enqueue without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Backpressure`] when the queue is full and
    /// [`SubmitError::Closed`] when the kernel has shut down.
    pub fn submit(&self, event: InputEvent) -> Result<(), SubmitError> {
        self.tx.try_send(event).map_err(|err| match err {
            TrySendError::Full(event) => {
                warn!(key = %event.key(), capacity = self.capacity, "ingress backpressure");
                SubmitError::Backpressure {
                    capacity: self.capacity,
                }
            }
            TrySendError::Closed(_) => SubmitError::Closed,
        })
    }

    /// Enqueue, waiting for space.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Closed`] when the kernel has shut down.
    pub async fn submit_wait(&self, event: InputEvent) -> Result<(), SubmitError> {
        self.tx.send(event).await.map_err(|_err| SubmitError::Closed)
    }

    /// Configured queue capacity.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Outcome of one drain.
#[derive(Debug, Default)]
pub struct DrainReport {
    /// Events appended to the log.
    pub accepted: usize,
    /// Events the log refused, with the reason.
    pub refused: Vec<(EventKey, EventLogError)>,
    /// Every producer handle has been dropped and the queue is empty.
    pub closed: bool,
}

/// The writer's end of the queue.
#[derive(Debug)]
pub struct IngressReceiver {
    rx: mpsc::Receiver<InputEvent>,
}

impl IngressReceiver {
    /// Move every queued event into `log` without waiting.
    pub fn drain_into(&mut self, log: &mut EventLog) -> DrainReport {
        let mut report = DrainReport::default();
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    let key = event.key();
                    match log.append(event) {
                        Ok(_) => report.accepted = report.accepted.saturating_add(1),
                        Err(err) => {
                            warn!(%key, error = %err, "event refused by log");
                            report.refused.push((key, err));
                        }
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    report.closed = true;
                    break;
                }
            }
        }
        report
    }

    /// Stop accepting new submissions. Queued events can still be drained.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
