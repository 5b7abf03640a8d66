//! Step-status events for run observers.
//!
//! The engine reports each step-status transition over a [`flume`] channel.
//! Sends never block and ignore a hung-up receiver, so a slow or absent
//! observer cannot stall a run. Callers that do not care simply pass no
//! sender.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Observable status of a single step within a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Payload of one step-status transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepStatusUpdate {
    pub status: StepStatus,
    /// Coarse progress indication: 0 on start, 100 on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepStatusUpdate {
    #[must_use]
    pub fn running(start_time: DateTime<Utc>) -> Self {
        Self {
            status: StepStatus::Running,
            progress: Some(0),
            start_time: Some(start_time),
            error: None,
        }
    }

    #[must_use]
    pub fn completed(start_time: DateTime<Utc>) -> Self {
        Self {
            status: StepStatus::Completed,
            progress: Some(100),
            start_time: Some(start_time),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(start_time: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Failed,
            progress: None,
            start_time: Some(start_time),
            error: Some(error.into()),
        }
    }
}

/// A step-status transition tagged with the step it belongs to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepStatusEvent {
    pub step_id: String,
    pub update: StepStatusUpdate,
}

/// Fire-and-forget sender for step-status events.
///
/// Cloneable; every clone feeds the same receiver.
///
/// # Examples
///
/// ```rust
/// use taskloom::events::{StatusSender, StepStatus, StepStatusUpdate};
///
/// let (sender, receiver) = StatusSender::channel();
/// sender.emit("step_1", StepStatusUpdate::running(chrono::Utc::now()));
///
/// let event = receiver.recv().unwrap();
/// assert_eq!(event.step_id, "step_1");
/// assert_eq!(event.update.status, StepStatus::Running);
/// ```
#[derive(Clone, Debug)]
pub struct StatusSender {
    tx: flume::Sender<StepStatusEvent>,
}

impl StatusSender {
    /// Create a sender/receiver pair backed by an unbounded channel.
    #[must_use]
    pub fn channel() -> (Self, flume::Receiver<StepStatusEvent>) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, rx)
    }

    /// Emit one transition. A disconnected receiver is silently ignored.
    pub fn emit(&self, step_id: impl Into<String>, update: StepStatusUpdate) {
        let _ = self.tx.send(StepStatusEvent {
            step_id: step_id.into(),
            update,
        });
    }
}
