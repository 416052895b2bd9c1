//! Switchboard Workflow
//!
//! This crate provides the "locked" flow representation for Switchboard.
//! A locked flow is a validated form of a flow configuration that is ready
//! for execution.
//!
//! Key differences from `switchboard-config`:
//! - Structural rules are checked once (Dial needs a noun, no nested call
//!   scopes, Leave only inside Enqueue, ...)
//! - Activities are flattened into a table keyed by stable ids
//!   (`"1"`, `"1.1"`, `"1.2.1"`) that persisted executions refer to
//! - The flow carries a digest so executions can detect a changed definition

mod activity;
mod error;
mod flow;
mod validate;

pub use activity::{
  Activity, ActivityKind, CallScope, Dial, Enqueue, Gather, Hangup, Leave, Number, Pause, Play,
  Queue, Record, Say, Sequence, Sip, Switch,
};
pub use error::{ValidationError, WorkflowError};
pub use flow::Flow;
pub use validate::validate;
