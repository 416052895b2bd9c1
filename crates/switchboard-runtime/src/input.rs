//! Template rendering for activity fields.
//!
//! Fields are rendered with minijinja against a context assembled from the
//! execution's arguments and variables plus the frame data of the activity
//! and its ancestors (`call`, `queue`, ...). Undefined values, lookups
//! through them and absent optional fields render empty.

use minijinja::{Environment, UndefinedBehavior, Value, escape_formatter};

use crate::error::ActivityError;

/// Render a single template field.
pub(crate) fn render(
  activity_id: &str,
  field: &str,
  template: &str,
  context: &serde_json::Value,
) -> Result<String, ActivityError> {
  let mut env = Environment::new();
  env.set_undefined_behavior(UndefinedBehavior::Chainable);
  env.set_formatter(|out, state, value| {
    if value.is_none() {
      Ok(())
    } else {
      escape_formatter(out, state, value)
    }
  });
  env
    .render_str(template, Value::from_serialize(context))
    .map_err(|e| ActivityError::Template {
      activity_id: activity_id.to_string(),
      field: field.to_string(),
      message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_render_nested_values() {
    let context = json!({
      "args": { "Name": "ada" },
      "vars": { "menu": { "digits": "2" } },
      "call": { "from": { "number": "+15550100" } }
    });

    let text = render(
      "1.2",
      "text",
      "Hi {{ args.Name | title }}, you pressed {{ vars.menu.digits }} from {{ call.from.number }}",
      &context,
    )
    .unwrap();

    assert_eq!(text, "Hi Ada, you pressed 2 from +15550100");
  }

  #[test]
  fn test_undefined_renders_empty() {
    let text = render("1", "text", "[{{ queue.position }}]", &json!({})).unwrap();
    assert_eq!(text, "[]");
  }

  #[test]
  fn test_null_renders_empty() {
    let context = json!({ "call": { "to": { "number": null } } });
    let text = render("1", "caller_id", "<{{ call.to.number }}>", &context).unwrap();
    assert_eq!(text, "<>");
  }

  #[test]
  fn test_syntax_error() {
    let err = render("1.3", "number", "{{ args.Agent", &json!({})).unwrap_err();
    assert!(matches!(
      err,
      ActivityError::Template { ref activity_id, ref field, .. }
        if activity_id == "1.3" && field == "number"
    ));
  }
}
