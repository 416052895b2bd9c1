//! The activity catalog.
//!
//! Every activity kind implements [`Behavior`]. Dispatch is a closed match
//! over [`ActivityKind`]; continuations arrive as a [`Callback`] value that
//! each behavior matches on.

mod control;
mod dial;
mod enqueue;
mod gather;
mod record;
mod verbs;

use switchboard_workflow::ActivityKind;

use crate::context::ActivityContext;
use crate::error::ActivityError;
use crate::event::EventData;
use crate::instance::Callback;
use crate::workflow::{ChildFault, ChildOutcome, FaultReason};

pub(crate) trait Behavior {
  /// Run the activity for the first time.
  fn execute(&self, ctx: &mut ActivityContext<'_, '_>) -> Result<(), ActivityError>;

  /// A bookmark owned by the activity was resumed.
  fn on_resume(
    &self,
    ctx: &mut ActivityContext<'_, '_>,
    callback: Callback,
    _data: &EventData,
  ) -> Result<(), ActivityError> {
    Err(unexpected(ctx, callback))
  }

  /// A child scheduled with a completion callback closed.
  fn on_child_completed(
    &self,
    _ctx: &mut ActivityContext<'_, '_>,
    _callback: Callback,
    _child: &ChildOutcome,
  ) -> Result<(), ActivityError> {
    Ok(())
  }

  /// A child scheduled with a fault callback faulted or was canceled.
  ///
  /// Faults are rethrown unless the behavior handles them; cancellations
  /// are ignored.
  fn on_child_faulted(
    &self,
    _ctx: &mut ActivityContext<'_, '_>,
    _callback: Callback,
    fault: ChildFault,
  ) -> Result<(), ActivityError> {
    match fault.reason {
      FaultReason::Error(error) => Err(error),
      FaultReason::Canceled => Ok(()),
    }
  }
}

pub(crate) fn behavior(kind: &ActivityKind) -> &dyn Behavior {
  match kind {
    ActivityKind::CallScope(a) => a,
    ActivityKind::Sequence(a) => a,
    ActivityKind::Switch(a) => a,
    ActivityKind::Say(a) => a,
    ActivityKind::Play(a) => a,
    ActivityKind::Pause(a) => a,
    ActivityKind::Hangup(a) => a,
    ActivityKind::Leave(a) => a,
    ActivityKind::Gather(a) => a,
    ActivityKind::Record(a) => a,
    ActivityKind::Dial(a) => a,
    ActivityKind::Number(a) => a,
    ActivityKind::Sip(a) => a,
    ActivityKind::Queue(a) => a,
    ActivityKind::Enqueue(a) => a,
  }
}

pub(crate) fn unexpected(ctx: &ActivityContext<'_, '_>, callback: Callback) -> ActivityError {
  ActivityError::UnexpectedCallback {
    activity_id: ctx.activity_id().to_string(),
    callback: callback.name().to_string(),
  }
}
