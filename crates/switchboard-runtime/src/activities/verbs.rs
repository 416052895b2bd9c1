//! Leaf verbs that write one element and complete.

use switchboard_document::Element;
use switchboard_workflow::{Hangup, Leave, Pause, Play, Say};

use super::{Behavior, unexpected};
use crate::context::ActivityContext;
use crate::error::ActivityError;
use crate::event::EventData;
use crate::instance::Callback;

impl Behavior for Say {
  fn execute(&self, ctx: &mut ActivityContext<'_, '_>) -> Result<(), ActivityError> {
    let text = ctx.render("text", &self.text)?;
    ctx.append(
      Element::new("Say")
        .attr_opt("voice", self.voice.map(|v| v.as_str()))
        .attr_opt("language", self.language.as_deref())
        .attr_opt("loop", self.loop_count)
        .text(text),
    );
    Ok(())
  }
}

impl Behavior for Play {
  fn execute(&self, ctx: &mut ActivityContext<'_, '_>) -> Result<(), ActivityError> {
    let url = ctx.render("url", &self.url)?;
    let url = ctx.resolve_url(url.trim())?;
    ctx.append(
      Element::new("Play")
        .attr_opt("loop", self.loop_count)
        .text(url.as_str()),
    );
    Ok(())
  }
}

/// The platform pauses, then follows the redirect the turn ends with, which
/// resumes the bookmark and lets the flow continue.
impl Behavior for Pause {
  fn execute(&self, ctx: &mut ActivityContext<'_, '_>) -> Result<(), ActivityError> {
    ctx.append(Element::new("Pause").attr("length", self.duration_secs));
    ctx.create_redirect_bookmark(Callback::PauseElapsed)?;
    Ok(())
  }

  fn on_resume(
    &self,
    ctx: &mut ActivityContext<'_, '_>,
    callback: Callback,
    _data: &EventData,
  ) -> Result<(), ActivityError> {
    match callback {
      Callback::PauseElapsed => Ok(()),
      other => Err(unexpected(ctx, other)),
    }
  }
}

impl Behavior for Hangup {
  fn execute(&self, ctx: &mut ActivityContext<'_, '_>) -> Result<(), ActivityError> {
    ctx.append(Element::new("Hangup"));
    Ok(())
  }
}

impl Behavior for Leave {
  fn execute(&self, ctx: &mut ActivityContext<'_, '_>) -> Result<(), ActivityError> {
    ctx.append(Element::new("Leave"));
    Ok(())
  }
}
