//! Execution events and notifiers for observability.
//!
//! Events are emitted while a turn runs so consumers can follow a call's
//! progress, audit bookmarks, stream to dashboards, etc.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted while a call flow executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// A turn has started, either fresh or resumed from persisted state.
  TurnStarted {
    execution_id: String,
    flow_id: String,
    turn: u64,
  },

  /// An activity instance has started executing.
  ActivityStarted {
    execution_id: String,
    activity_id: String,
  },

  /// An activity instance has closed successfully.
  ActivityClosed {
    execution_id: String,
    activity_id: String,
    output: Option<serde_json::Value>,
  },

  /// An activity instance has faulted.
  ActivityFaulted {
    execution_id: String,
    activity_id: String,
    error: String,
  },

  /// An activity instance was canceled by an ancestor.
  ActivityCanceled {
    execution_id: String,
    activity_id: String,
  },

  /// A bookmark was registered.
  BookmarkCreated {
    execution_id: String,
    bookmark: String,
  },

  /// A bookmark was consumed by a resume.
  BookmarkResumed {
    execution_id: String,
    bookmark: String,
  },

  /// The turn ran out of work and is waiting on bookmarks.
  WorkflowIdle {
    execution_id: String,
    pending_bookmarks: usize,
  },

  /// The root activity has closed.
  WorkflowCompleted { execution_id: String },

  /// A fault reached the root activity.
  WorkflowAborted { execution_id: String, error: String },
}

/// Trait for receiving execution events.
///
/// The runtime calls `notify` for each event - implementations decide
/// what to do with them (persist, broadcast, log, ignore, etc.).
pub trait ExecutionNotifier: Send + Sync {
  /// Called when an execution event occurs.
  fn notify(&self, event: ExecutionEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// A notifier that sends events to an unbounded channel.
///
/// Use this when events are consumed asynchronously. A turn emits a handful
/// of events per activity, so the channel stays small.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  /// Create a new channel notifier.
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
