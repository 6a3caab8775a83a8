//! Command history notifications. The engine reports every action here and
//! never reads anything back.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::info;

use crate::network::device_control::CommandOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HistoryStatus {
    Started,
    Success,
    Failed,
    Error,
    Received,
    Unrecognized,
    Stopped,
}

impl fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HistoryStatus::Started => "Started",
            HistoryStatus::Success => "Success",
            HistoryStatus::Failed => "Failed",
            HistoryStatus::Error => "Error",
            HistoryStatus::Received => "Received",
            HistoryStatus::Unrecognized => "Unrecognized",
            HistoryStatus::Stopped => "Stopped",
        };
        f.write_str(s)
    }
}

impl From<&CommandOutcome> for HistoryStatus {
    fn from(outcome: &CommandOutcome) -> Self {
        match outcome {
            CommandOutcome::Success => HistoryStatus::Success,
            CommandOutcome::Failed => HistoryStatus::Failed,
            CommandOutcome::Error(_) => HistoryStatus::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub action: String,
    pub status: HistoryStatus,
    pub details: String,
    pub timestamp: DateTime<Local>,
}

impl HistoryEntry {
    pub fn new(
        action: impl Into<String>,
        status: HistoryStatus,
        details: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            status,
            details: details.into(),
            timestamp: Local::now(),
        }
    }
}

/// Fire-and-forget receiver of history entries
pub trait HistorySink: Send + Sync {
    fn record(&self, entry: HistoryEntry);
}

/// Emits each entry as a tracing event
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHistory;

impl HistorySink for LogHistory {
    fn record(&self, entry: HistoryEntry) {
        info!(
            action = %entry.action,
            status = %entry.status,
            timestamp = %entry.timestamp.format("%m-%d-%Y %I:%M:%S %p"),
            "{}",
            entry.details
        );
    }
}

/// Keeps entries in memory, in the order they were recorded
#[derive(Debug, Default, Clone)]
pub struct MemoryHistory {
    entries: Arc<Mutex<Vec<HistoryEntry>>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl HistorySink for MemoryHistory {
    fn record(&self, entry: HistoryEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}

/// Sends every entry to each inner sink
pub struct FanoutHistory(pub Vec<Arc<dyn HistorySink>>);

impl HistorySink for FanoutHistory {
    fn record(&self, entry: HistoryEntry) {
        for sink in &self.0 {
            sink.record(entry.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_history_keeps_order() {
        let history = MemoryHistory::new();
        history.record(HistoryEntry::new("Send Key", HistoryStatus::Started, "Sending Up command"));
        history.record(HistoryEntry::new("Send Key", HistoryStatus::Success, "Sent Up command"));

        let entries = history.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, HistoryStatus::Started);
        assert_eq!(entries[1].details, "Sent Up command");

        history.clear();
        assert!(history.entries().is_empty());
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = MemoryHistory::new();
        let b = MemoryHistory::new();
        let fanout = FanoutHistory(vec![
            Arc::new(a.clone()),
            Arc::new(b.clone()),
            Arc::new(LogHistory),
        ]);

        fanout.record(HistoryEntry::new(
            "Connect",
            HistoryStatus::Failed,
            "No IP address provided",
        ));
        assert_eq!(a.entries().len(), 1);
        assert_eq!(b.entries().len(), 1);
    }

    #[test]
    fn test_status_from_outcome() {
        assert_eq!(HistoryStatus::from(&CommandOutcome::Success), HistoryStatus::Success);
        assert_eq!(HistoryStatus::from(&CommandOutcome::Failed), HistoryStatus::Failed);
        assert_eq!(
            HistoryStatus::from(&CommandOutcome::Error("timeout".into())),
            HistoryStatus::Error
        );
    }
}
