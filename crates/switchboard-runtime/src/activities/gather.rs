use switchboard_document::Element;
use switchboard_workflow::Gather;
use tracing::warn;

use super::{Behavior, unexpected};
use crate::context::ActivityContext;
use crate::error::ActivityError;
use crate::event::{EventData, string};
use crate::instance::Callback;
use crate::results::GatherResult;
use crate::workflow::{ChildFault, ChildOutcome, FaultReason};

impl Behavior for Gather {
  fn execute(&self, ctx: &mut ActivityContext<'_, '_>) -> Result<(), ActivityError> {
    let bookmark = ctx.create_bookmark(Callback::DigitsReceived)?;
    let action = ctx.bookmark_url(&bookmark);

    let node = ctx.append(
      Element::new("Gather")
        .attr("action", action.as_str())
        .attr_opt("timeout", self.timeout_secs)
        .attr_opt("finishOnKey", self.finish_on_key)
        .attr_opt("numDigits", self.num_digits),
    );
    // Reached only when the caller enters nothing before the timeout.
    ctx.append(Element::new("Redirect").text(action.as_str()));

    if let Some(body) = &self.body {
      ctx.set_current_element(node);
      ctx.schedule_child(
        body,
        Some(Callback::BodyCompleted),
        Some(Callback::BodyFaulted),
      );
    }
    Ok(())
  }

  fn on_resume(
    &self,
    ctx: &mut ActivityContext<'_, '_>,
    callback: Callback,
    data: &EventData,
  ) -> Result<(), ActivityError> {
    if callback != Callback::DigitsReceived {
      return Err(unexpected(ctx, callback));
    }

    ctx.cancel_children();
    ctx.clear_current_element();
    let result = GatherResult {
      digits: string(data, "Digits").unwrap_or_default(),
    };
    ctx.finish(self.result.as_deref(), &result)
  }

  fn on_child_completed(
    &self,
    ctx: &mut ActivityContext<'_, '_>,
    callback: Callback,
    _child: &ChildOutcome,
  ) -> Result<(), ActivityError> {
    match callback {
      Callback::BodyCompleted => {
        ctx.clear_current_element();
        Ok(())
      }
      other => Err(unexpected(ctx, other)),
    }
  }

  /// A failing prompt must not stop digit collection.
  fn on_child_faulted(
    &self,
    ctx: &mut ActivityContext<'_, '_>,
    callback: Callback,
    fault: ChildFault,
  ) -> Result<(), ActivityError> {
    if callback != Callback::BodyFaulted {
      return Err(unexpected(ctx, callback));
    }
    if let FaultReason::Error(error) = &fault.reason {
      warn!(
        activity_id = %ctx.activity_id(),
        body = %fault.activity_id,
        error = %error,
        "gather_body_faulted"
      );
    }
    ctx.clear_current_element();
    Ok(())
  }
}
