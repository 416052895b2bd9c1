use switchboard_document::Element;
use switchboard_workflow::Record;

use super::{Behavior, unexpected};
use crate::context::ActivityContext;
use crate::error::ActivityError;
use crate::event::{EventData, field, number, string};
use crate::instance::Callback;
use crate::results::RecordResult;

impl Behavior for Record {
  fn execute(&self, ctx: &mut ActivityContext<'_, '_>) -> Result<(), ActivityError> {
    let bookmark = ctx.create_bookmark(Callback::RecordingFinished)?;
    let action = ctx.bookmark_url(&bookmark);

    ctx.append(
      Element::new("Record")
        .attr("action", action.as_str())
        .attr_opt("timeout", self.timeout_secs)
        .attr_opt("finishOnKey", self.finish_on_key)
        .attr_opt("maxLength", self.max_length_secs)
        .attr_opt("transcribe", self.transcribe)
        .attr_opt("playBeep", self.play_beep),
    );
    ctx.append(Element::new("Redirect").text(action.as_str()));
    Ok(())
  }

  fn on_resume(
    &self,
    ctx: &mut ActivityContext<'_, '_>,
    callback: Callback,
    data: &EventData,
  ) -> Result<(), ActivityError> {
    if callback != Callback::RecordingFinished {
      return Err(unexpected(ctx, callback));
    }

    // The platform may report the recording relative to the callback url.
    let recording_url = field(data, "RecordingUrl")
      .map(|url| ctx.resolve_url(url))
      .transpose()?
      .map(String::from);

    let result = RecordResult {
      recording_url,
      duration_secs: number(data, "RecordingDuration")?,
      digits: string(data, "Digits").unwrap_or_default(),
    };
    ctx.finish(self.result.as_deref(), &result)
  }
}
