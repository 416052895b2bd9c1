//! Enqueue places the call in a queue.
//!
//! While the call waits, the platform repeatedly posts to the wait url. Each
//! post runs the wait body at the root of that turn's response and re-arms a
//! fresh wait bookmark, which the response redirects to so the platform
//! loops back once the body finishes. The final outcome arrives through the
//! action bookmark.

use switchboard_document::Element;
use switchboard_workflow::Enqueue;
use tracing::{debug, warn};

use super::{Behavior, unexpected};
use crate::context::ActivityContext;
use crate::error::ActivityError;
use crate::event::{EventData, field, number, string};
use crate::instance::Callback;
use crate::results::{EnqueueResult, EnqueueStatus, QueueResult};
use crate::workflow::{ChildFault, ChildOutcome, FaultReason};

const ACTION_BOOKMARK: &str = "action_bookmark";
const WAIT_BOOKMARK: &str = "wait_bookmark";

/// Append a redirect to the outstanding wait bookmark, if any.
fn redirect_to_wait(ctx: &mut ActivityContext<'_, '_>) {
  let Some(name) = ctx.local_str(WAIT_BOOKMARK).map(str::to_string) else {
    return;
  };
  if ctx.has_bookmark(&name) {
    let url = ctx.bookmark_url(&name);
    ctx.append_to_root(Element::new("Redirect").text(url.as_str()));
  }
}

impl Behavior for Enqueue {
  fn execute(&self, ctx: &mut ActivityContext<'_, '_>) -> Result<(), ActivityError> {
    let queue = ctx.render("queue", &self.queue)?;

    let action = ctx.create_bookmark(Callback::QueueFinished)?;
    let mut element = Element::new("Enqueue").attr("action", ctx.bookmark_url(&action).as_str());
    ctx.set_local(ACTION_BOOKMARK, action);

    if self.wait.is_some() {
      let wait = ctx.create_bookmark(Callback::QueueWait)?;
      element = element.attr("waitUrl", ctx.bookmark_url(&wait).as_str());
      ctx.set_local(WAIT_BOOKMARK, wait);
    }

    ctx.append(element.text(queue.trim()));
    Ok(())
  }

  fn on_resume(
    &self,
    ctx: &mut ActivityContext<'_, '_>,
    callback: Callback,
    data: &EventData,
  ) -> Result<(), ActivityError> {
    match callback {
      Callback::QueueWait => on_wait(self.wait.as_deref(), ctx, data),
      Callback::QueueFinished => on_finished(self.result.as_deref(), ctx, data),
      other => Err(unexpected(ctx, other)),
    }
  }

  fn on_child_completed(
    &self,
    ctx: &mut ActivityContext<'_, '_>,
    callback: Callback,
    _child: &ChildOutcome,
  ) -> Result<(), ActivityError> {
    if callback != Callback::WaitCompleted {
      return Err(unexpected(ctx, callback));
    }
    ctx.clear_current_element();
    redirect_to_wait(ctx);
    Ok(())
  }

  /// A failing wait body keeps the caller waiting.
  fn on_child_faulted(
    &self,
    ctx: &mut ActivityContext<'_, '_>,
    callback: Callback,
    fault: ChildFault,
  ) -> Result<(), ActivityError> {
    if callback != Callback::WaitFaulted {
      return Err(unexpected(ctx, callback));
    }
    match fault.reason {
      FaultReason::Canceled => Ok(()),
      FaultReason::Error(error) => {
        warn!(
          activity_id = %ctx.activity_id(),
          wait = %fault.activity_id,
          error = %error,
          "enqueue_wait_faulted"
        );
        ctx.clear_current_element();
        redirect_to_wait(ctx);
        Ok(())
      }
    }
  }
}

fn on_wait(
  wait: Option<&str>,
  ctx: &mut ActivityContext<'_, '_>,
  data: &EventData,
) -> Result<(), ActivityError> {
  let status = EnqueueStatus::from_event(data)?;
  // A wait body still suspended from an earlier wait is superseded.
  ctx.cancel_children();
  ctx.set_frame_value("queue", &status)?;

  let bookmark = ctx.create_bookmark(Callback::QueueWait)?;
  ctx.set_local(WAIT_BOOKMARK, bookmark);

  match wait {
    Some(body) => {
      let root = ctx.root_element();
      ctx.set_current_element(root);
      ctx.schedule_child(body, Some(Callback::WaitCompleted), Some(Callback::WaitFaulted));
    }
    None => redirect_to_wait(ctx),
  }
  Ok(())
}

fn on_finished(
  result_var: Option<&str>,
  ctx: &mut ActivityContext<'_, '_>,
  data: &EventData,
) -> Result<(), ActivityError> {
  let Some(outcome) = field(data, "QueueResult") else {
    let name = ctx.local_str(ACTION_BOOKMARK).map(str::to_string);
    let Some(name) = name else {
      return Err(ActivityError::MalformedEvent {
        field: "QueueResult".to_string(),
        value: String::new(),
      });
    };
    debug!(activity_id = %ctx.activity_id(), bookmark = %name, "enqueue_rearmed");
    ctx.create_named_bookmark(name, Callback::QueueFinished, false)?;
    ctx.append_to_root(Element::new("Pause").attr("length", 0));
    return Ok(());
  };

  let outcome = QueueResult::parse(outcome).ok_or_else(|| ActivityError::MalformedEvent {
    field: "QueueResult".to_string(),
    value: outcome.to_string(),
  })?;
  let result = EnqueueResult {
    result: outcome,
    sid: string(data, "QueueSid"),
    time_secs: number(data, "QueueTime")?,
  };

  ctx.remove_all_bookmarks();
  ctx.cancel_children();
  ctx.clear_current_element();
  ctx.finish(result_var, &result)
}
