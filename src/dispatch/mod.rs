//! Background execution of device operations. Each dispatched operation runs
//! on its own task; its result comes back exactly once through a
//! `CompletionQueue`, which the owner drains from a single context.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("operation panicked: {0}")]
    Panicked(String),

    #[error("operation was cancelled")]
    Cancelled,
}

/// Result of one dispatched operation
#[derive(Debug)]
pub struct Completion<T> {
    pub id: u64,
    pub label: String,
    pub result: Result<T, DispatchError>,
}

/// Spawns operations and routes their results to the paired queue
pub struct CommandDispatcher<T> {
    tx: mpsc::UnboundedSender<Completion<T>>,
    next_id: AtomicU64,
    pending: Arc<AtomicUsize>,
}

/// Receiving side of a dispatcher
pub struct CompletionQueue<T> {
    rx: mpsc::UnboundedReceiver<Completion<T>>,
    pending: Arc<AtomicUsize>,
}

impl<T: Send + 'static> CommandDispatcher<T> {
    pub fn new() -> (Self, CompletionQueue<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));

        let dispatcher = Self {
            tx,
            next_id: AtomicU64::new(1),
            pending: pending.clone(),
        };
        (dispatcher, CompletionQueue { rx, pending })
    }

    /// Run `operation` in the background; returns the id its completion will carry
    pub fn dispatch<F>(&self, label: impl Into<String>, operation: F) -> u64
    where
        F: Future<Output = T> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let label = label.into();
        let tx = self.tx.clone();
        self.pending.fetch_add(1, Ordering::SeqCst);
        debug!("Dispatching #{} {}", id, label);

        tokio::spawn(async move {
            // Inner task so a panicking operation still yields a completion
            let result = match tokio::spawn(operation).await {
                Ok(value) => Ok(value),
                Err(e) if e.is_panic() => {
                    let message = panic_message(e.into_panic());
                    error!("Operation #{} {} panicked: {}", id, label, message);
                    Err(DispatchError::Panicked(message))
                }
                Err(_) => Err(DispatchError::Cancelled),
            };

            if tx.send(Completion { id, label, result }).is_err() {
                debug!("Completion #{} dropped; queue is gone", id);
            }
        });

        id
    }
}

impl<T> CompletionQueue<T> {
    /// Wait for the next completion. Returns `None` once the dispatcher is
    /// dropped and every outstanding completion has been received.
    pub async fn next(&mut self) -> Option<Completion<T>> {
        let completion = self.rx.recv().await?;
        self.pending.fetch_sub(1, Ordering::SeqCst);
        Some(completion)
    }

    pub fn try_next(&mut self) -> Option<Completion<T>> {
        let completion = self.rx.try_recv().ok()?;
        self.pending.fetch_sub(1, Ordering::SeqCst);
        Some(completion)
    }

    /// Dispatched operations whose completion has not been received yet
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
