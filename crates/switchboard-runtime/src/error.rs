//! Runtime error types.

use switchboard_workflow::WorkflowError;

/// A fault raised by an activity while it executes or handles a callback.
///
/// Faults travel up the activity tree to the nearest ancestor that
/// registered a fault callback for the failing child.
#[derive(Debug, thiserror::Error)]
pub enum ActivityError {
  /// A template field could not be rendered.
  #[error("failed to render '{field}' for activity '{activity_id}': {message}")]
  Template {
    activity_id: String,
    field: String,
    message: String,
  },

  /// Event data from the platform carried a value the activity cannot use.
  #[error("malformed event field '{field}': '{value}'")]
  MalformedEvent { field: String, value: String },

  /// A url in the flow or in event data could not be resolved.
  #[error("invalid url '{url}': {message}")]
  InvalidUrl { url: String, message: String },

  /// An activity was resumed through a callback it does not handle.
  #[error("activity '{activity_id}' has no handler for callback '{callback}'")]
  UnexpectedCallback {
    activity_id: String,
    callback: String,
  },

  /// A bookmark with the same name is already registered.
  #[error("bookmark already exists: {0}")]
  DuplicateBookmark(String),

  /// An activity result could not be converted to a template value.
  #[error("failed to serialize activity output: {0}")]
  Output(#[from] serde_json::Error),
}

/// Errors that fail a whole turn. Nothing from the turn is committed.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
  /// Execution was cancelled.
  #[error("execution cancelled")]
  Cancelled,

  /// Resume requested for a bookmark that is not registered.
  #[error("unknown bookmark: {0}")]
  UnknownBookmark(String),

  /// No persisted state exists for the execution.
  #[error("unknown execution: {0}")]
  UnknownExecution(String),

  /// The execution already reached a terminal state.
  #[error("execution '{execution_id}' is not running")]
  NotRunning { execution_id: String },

  /// A fault reached the root activity without being handled.
  #[error("unhandled fault in activity '{activity_id}': {source}")]
  Unhandled {
    activity_id: String,
    #[source]
    source: ActivityError,
  },

  /// The flow cannot be served.
  #[error("invalid flow: {message}")]
  InvalidFlow { message: String },

  #[error(transparent)]
  Workflow(#[from] WorkflowError),

  /// The persisted state belongs to a different flow definition.
  #[error("state was saved for flow digest '{expected}', current flow has '{actual}'")]
  FlowMismatch { expected: String, actual: String },

  /// Inbound call metadata could not be parsed.
  #[error("invalid call context: {message}")]
  InvalidCallContext { message: String },

  /// Persisted state could not be encoded or decoded.
  #[error("invalid snapshot: {message}")]
  Snapshot { message: String },

  #[error("store error: {0}")]
  Store(#[from] switchboard_store::Error),
}
