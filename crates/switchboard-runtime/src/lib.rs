//! Switchboard Runtime
//!
//! This crate runs call flows as durable, resumable programs. A call is a
//! series of turns: each inbound request runs the flow until it needs input
//! from the telephony platform, returns the response document built so far,
//! and persists everything needed to continue when the platform posts back.
//!
//! The lowest-level primitive is [`WorkflowInstance`], which owns the
//! activity instance tree, the [`BookmarkRegistry`] and the response
//! [`Document`](switchboard_document::Document) for one execution. Activities
//! interact with it only through [`ActivityContext`]. [`CallHandler`] wraps a
//! workflow instance with persistence and the per-turn conventions
//! (redirects, idle pauses, hangup on completion).

mod activities;
mod bookmark;
mod call;
mod context;
mod error;
mod event;
mod events;
mod handler;
mod input;
mod instance;
mod results;
mod snapshot;
mod urls;
mod workflow;

pub use bookmark::{Bookmark, BookmarkRegistry};
pub use call::{CallContext, CallDirection, Endpoint};
pub use context::ActivityContext;
pub use error::{ActivityError, RuntimeError};
pub use event::EventData;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use handler::{CallHandler, RuntimeConfig, TurnResponse, TurnStatus};
pub use instance::{ActivityInstance, ActivityState, Callback, InstanceId};
pub use results::{
  CallStatus, DialResult, EnqueueResult, EnqueueStatus, GatherResult, QueueResult, RecordResult,
};
pub use snapshot::{Snapshot, WorkflowStatus};
pub use urls::{ARGUMENT_PREFIX, BOOKMARK_KEY, CallbackUrls, INSTANCE_KEY};
pub use workflow::{ChildFault, ChildOutcome, FaultReason, RunStatus, TurnEnv, WorkflowInstance};
