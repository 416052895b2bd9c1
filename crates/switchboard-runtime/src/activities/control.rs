use switchboard_workflow::{CallScope, Sequence, Switch};
use tracing::debug;

use super::{Behavior, unexpected};
use crate::context::ActivityContext;
use crate::error::ActivityError;
use crate::instance::Callback;
use crate::workflow::ChildOutcome;

const INDEX: &str = "index";

impl Behavior for CallScope {
  fn execute(&self, ctx: &mut ActivityContext<'_, '_>) -> Result<(), ActivityError> {
    let call = ctx.call().clone();
    ctx.set_frame_value("call", &call)?;

    if let Some(body) = &self.body {
      ctx.schedule_child(body, Some(Callback::BodyCompleted), None);
    }
    Ok(())
  }

  fn on_child_completed(
    &self,
    ctx: &mut ActivityContext<'_, '_>,
    callback: Callback,
    child: &ChildOutcome,
  ) -> Result<(), ActivityError> {
    match callback {
      Callback::BodyCompleted => {
        ctx.set_output(child.output.clone());
        Ok(())
      }
      other => Err(unexpected(ctx, other)),
    }
  }
}

impl Behavior for Sequence {
  fn execute(&self, ctx: &mut ActivityContext<'_, '_>) -> Result<(), ActivityError> {
    if let Some(first) = self.activities.first() {
      ctx.set_local(INDEX, 0);
      ctx.schedule_child(first, Some(Callback::ItemCompleted), None);
    }
    Ok(())
  }

  fn on_child_completed(
    &self,
    ctx: &mut ActivityContext<'_, '_>,
    callback: Callback,
    child: &ChildOutcome,
  ) -> Result<(), ActivityError> {
    if callback != Callback::ItemCompleted {
      return Err(unexpected(ctx, callback));
    }

    let next = ctx.local(INDEX).and_then(|v| v.as_u64()).unwrap_or(0) as usize + 1;
    match self.activities.get(next) {
      Some(activity_id) => {
        ctx.set_local(INDEX, next);
        ctx.schedule_child(activity_id, Some(Callback::ItemCompleted), None);
      }
      None => ctx.set_output(child.output.clone()),
    }
    Ok(())
  }
}

impl Behavior for Switch {
  fn execute(&self, ctx: &mut ActivityContext<'_, '_>) -> Result<(), ActivityError> {
    let value = ctx.render("value", &self.value)?;
    let value = value.trim();

    let selected = self
      .cases
      .iter()
      .find(|(case, _)| case == value)
      .map(|(_, activity_id)| activity_id)
      .or(self.default.as_ref());

    debug!(
      activity_id = %ctx.activity_id(),
      value = %value,
      matched = selected.is_some(),
      "switch_evaluated"
    );
    if let Some(activity_id) = selected {
      ctx.schedule_child(activity_id, Some(Callback::CaseCompleted), None);
    }
    Ok(())
  }

  fn on_child_completed(
    &self,
    ctx: &mut ActivityContext<'_, '_>,
    callback: Callback,
    child: &ChildOutcome,
  ) -> Result<(), ActivityError> {
    match callback {
      Callback::CaseCompleted => {
        ctx.set_output(child.output.clone());
        Ok(())
      }
      other => Err(unexpected(ctx, other)),
    }
  }
}
