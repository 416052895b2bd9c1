//! Dial and its nouns.
//!
//! Dial writes a `<Dial>` element and hands it to its nouns as their scope;
//! each noun writes one or more children into it. The dialed leg's outcome
//! arrives through the action bookmark. The platform may post the action
//! more than once: a delivery without `DialCallStatus` re-arms the bookmark
//! under the same name and the turn answers with a zero-length pause.

use switchboard_document::Element;
use switchboard_workflow::{Dial, Number, Queue, Sip};
use tracing::debug;

use super::{Behavior, unexpected};
use crate::context::ActivityContext;
use crate::error::ActivityError;
use crate::event::{EventData, field, number, string};
use crate::instance::Callback;
use crate::results::{CallStatus, DialResult};
use crate::workflow::ChildOutcome;

const BOOKMARK: &str = "bookmark";

impl Behavior for Dial {
  fn execute(&self, ctx: &mut ActivityContext<'_, '_>) -> Result<(), ActivityError> {
    let caller_id = ctx.render_opt("caller_id", self.caller_id.as_deref())?;
    let bookmark = ctx.create_bookmark(Callback::DialFinished)?;
    let action = ctx.bookmark_url(&bookmark);
    ctx.set_local(BOOKMARK, bookmark);

    let node = ctx.append(
      Element::new("Dial")
        .attr("action", action.as_str())
        .attr_opt("timeout", self.timeout_secs)
        .attr_opt("hangupOnStar", self.hangup_on_star)
        .attr_opt("timeLimit", self.time_limit_secs)
        .attr_opt("callerId", caller_id)
        .attr_opt("record", self.record),
    );
    ctx.set_current_element(node);

    for noun in &self.nouns {
      ctx.schedule_child(noun, None, Some(Callback::NounFaulted));
    }
    Ok(())
  }

  fn on_resume(
    &self,
    ctx: &mut ActivityContext<'_, '_>,
    callback: Callback,
    data: &EventData,
  ) -> Result<(), ActivityError> {
    if callback != Callback::DialFinished {
      return Err(unexpected(ctx, callback));
    }

    let Some(status) = field(data, "DialCallStatus") else {
      let name = ctx.local_str(BOOKMARK).map(str::to_string);
      let Some(name) = name else {
        return Err(ActivityError::MalformedEvent {
          field: "DialCallStatus".to_string(),
          value: String::new(),
        });
      };
      debug!(activity_id = %ctx.activity_id(), bookmark = %name, "dial_rearmed");
      ctx.create_named_bookmark(name, Callback::DialFinished, false)?;
      ctx.append_to_root(Element::new("Pause").attr("length", 0));
      return Ok(());
    };

    let status = CallStatus::parse(status).ok_or_else(|| ActivityError::MalformedEvent {
      field: "DialCallStatus".to_string(),
      value: status.to_string(),
    })?;
    let result = DialResult {
      status,
      sid: string(data, "DialCallSid"),
      duration_secs: number(data, "DialCallDuration")?,
      recording_url: string(data, "RecordingUrl"),
    };

    ctx.remove_all_bookmarks();
    ctx.cancel_children();
    ctx.clear_current_element();
    ctx.finish(self.result.as_deref(), &result)
  }
}

impl Behavior for Number {
  fn execute(&self, ctx: &mut ActivityContext<'_, '_>) -> Result<(), ActivityError> {
    let number = ctx.render("number", &self.number)?;
    let send_digits = ctx.render_opt("send_digits", self.send_digits.as_deref())?;
    ctx.append(
      Element::new("Number")
        .attr_opt("sendDigits", send_digits)
        .text(number.trim()),
    );
    Ok(())
  }
}

impl Behavior for Sip {
  fn execute(&self, ctx: &mut ActivityContext<'_, '_>) -> Result<(), ActivityError> {
    for uri in &self.uris {
      let address = ctx.render("uri", &uri.uri)?;
      let username = ctx.render_opt("username", uri.username.as_deref())?;
      let password = ctx.render_opt("password", uri.password.as_deref())?;
      ctx.append(
        Element::new("Sip")
          .attr_opt("username", username)
          .attr_opt("password", password)
          .text(address.trim()),
      );
    }
    Ok(())
  }
}

/// Bridges to the caller at the head of a queue. When a pickup body is set,
/// the platform fetches it for the answering party before the bridge.
impl Behavior for Queue {
  fn execute(&self, ctx: &mut ActivityContext<'_, '_>) -> Result<(), ActivityError> {
    let queue = ctx.render("queue", &self.queue)?;
    let mut element = Element::new("Queue");
    if self.pickup.is_some() {
      let bookmark = ctx.create_bookmark(Callback::PickupRequested)?;
      element = element.attr("url", ctx.bookmark_url(&bookmark).as_str());
    }
    ctx.append(element.text(queue.trim()));
    Ok(())
  }

  fn on_resume(
    &self,
    ctx: &mut ActivityContext<'_, '_>,
    callback: Callback,
    _data: &EventData,
  ) -> Result<(), ActivityError> {
    match (callback, &self.pickup) {
      (Callback::PickupRequested, Some(pickup)) => {
        let root = ctx.root_element();
        ctx.set_current_element(root);
        ctx.schedule_child(pickup, Some(Callback::PickupCompleted), None);
        Ok(())
      }
      (other, _) => Err(unexpected(ctx, other)),
    }
  }

  fn on_child_completed(
    &self,
    ctx: &mut ActivityContext<'_, '_>,
    callback: Callback,
    _child: &ChildOutcome,
  ) -> Result<(), ActivityError> {
    if callback != Callback::PickupCompleted {
      return Err(unexpected(ctx, callback));
    }

    ctx.clear_current_element();
    let root = ctx.root_element();
    if !ctx.has_elements(root) {
      ctx.append_to_root(Element::new("Pause").attr("length", 0));
    }
    Ok(())
  }
}
