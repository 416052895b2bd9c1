//! Definition-time structural checks.

use switchboard_config::{ActivityDef, ActivityType, FlowDef};

use crate::error::ValidationError;
use crate::flow::ROOT_ACTIVITY_ID;

/// Id of the `index`th (1-based) child of `parent_id`.
pub(crate) fn child_id(parent_id: &str, index: usize) -> String {
  format!("{}.{}", parent_id, index)
}

/// What encloses the activity being checked.
#[derive(Debug, Clone, Copy, Default)]
struct Enclosing {
  call_scope: bool,
  enqueue: bool,
  /// The direct parent is a Dial.
  dial: bool,
}

/// Check every structural rule of a flow definition.
///
/// Returns all violations found, in tree order. An empty list means the flow
/// can be locked.
pub fn validate(def: &FlowDef) -> Vec<ValidationError> {
  let mut errors = Vec::new();
  check(&def.root, ROOT_ACTIVITY_ID, Enclosing::default(), &mut errors);
  errors
}

fn check(
  def: &ActivityDef,
  activity_id: &str,
  enclosing: Enclosing,
  errors: &mut Vec<ValidationError>,
) {
  let id = || activity_id.to_string();
  let activity_type = &def.activity_type;

  if activity_type.is_noun() && !enclosing.dial {
    errors.push(ValidationError::NounOutsideDial {
      activity_id: id(),
      noun: activity_type.type_name().to_string(),
    });
  }

  match activity_type {
    ActivityType::CallScope { .. } if enclosing.call_scope => {
      errors.push(ValidationError::NestedCallScope { activity_id: id() });
    }
    ActivityType::Leave if !enclosing.enqueue => {
      errors.push(ValidationError::LeaveOutsideEnqueue { activity_id: id() });
    }
    ActivityType::Dial { nouns, .. } => {
      if nouns.is_empty() {
        errors.push(ValidationError::DialWithoutNoun { activity_id: id() });
      }
      for (index, noun) in nouns.iter().enumerate() {
        if !noun.activity_type.is_noun() {
          errors.push(ValidationError::NotANoun {
            activity_id: child_id(activity_id, index + 1),
            found: noun.activity_type.type_name().to_string(),
          });
        }
      }
    }
    ActivityType::Sip { uris } if uris.is_empty() => {
      errors.push(ValidationError::SipWithoutUri { activity_id: id() });
    }
    ActivityType::Gather {
      finish_on_key,
      num_digits,
      ..
    } => {
      check_finish_on_key(*finish_on_key, activity_id, errors);
      if *num_digits == Some(0) {
        errors.push(ValidationError::InvalidNumDigits { activity_id: id() });
      }
    }
    ActivityType::Record { finish_on_key, .. } => {
      check_finish_on_key(*finish_on_key, activity_id, errors);
    }
    _ => {}
  }

  let child_enclosing = Enclosing {
    call_scope: enclosing.call_scope || matches!(activity_type, ActivityType::CallScope { .. }),
    enqueue: enclosing.enqueue || matches!(activity_type, ActivityType::Enqueue { .. }),
    dial: matches!(activity_type, ActivityType::Dial { .. }),
  };
  for (index, child) in def.children().into_iter().enumerate() {
    check(child, &child_id(activity_id, index + 1), child_enclosing, errors);
  }
}

fn check_finish_on_key(key: Option<char>, activity_id: &str, errors: &mut Vec<ValidationError>) {
  if let Some(key) = key.filter(|k| !(k.is_ascii_digit() || *k == '#' || *k == '*')) {
    errors.push(ValidationError::InvalidFinishOnKey {
      activity_id: activity_id.to_string(),
      key,
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn errors_for(root: serde_json::Value) -> Vec<ValidationError> {
    let def: FlowDef = serde_json::from_value(json!({
      "flow_id": "test",
      "name": "Test",
      "root": root,
    }))
    .unwrap();
    validate(&def)
  }

  #[test]
  fn test_valid_flow() {
    let errors = errors_for(json!({
      "type": "call_scope",
      "body": {
        "type": "sequence",
        "activities": [
          { "type": "gather", "num_digits": 1, "finish_on_key": "#",
            "body": { "type": "say", "text": "Press one" } },
          { "type": "enqueue", "queue": "support",
            "wait": { "type": "sequence", "activities": [
              { "type": "play", "url": "hold.mp3" },
              { "type": "leave" }
            ]}},
          { "type": "dial", "nouns": [
            { "type": "number", "number": "+15550100" },
            { "type": "sip", "uris": [{ "uri": "sip:agent@example.com" }] },
            { "type": "queue", "queue": "support" }
          ]}
        ]
      }
    }));
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
  }

  #[test]
  fn test_dial_requires_noun() {
    let errors = errors_for(json!({ "type": "dial" }));
    assert_eq!(
      errors,
      vec![ValidationError::DialWithoutNoun {
        activity_id: "1".to_string()
      }]
    );
  }

  #[test]
  fn test_dial_children_must_be_nouns() {
    let errors = errors_for(json!({
      "type": "dial",
      "nouns": [{ "type": "say", "text": "Hello" }]
    }));
    assert_eq!(
      errors,
      vec![ValidationError::NotANoun {
        activity_id: "1.1".to_string(),
        found: "Say".to_string()
      }]
    );
  }

  #[test]
  fn test_noun_outside_dial() {
    let errors = errors_for(json!({
      "type": "sequence",
      "activities": [{ "type": "number", "number": "+15550100" }]
    }));
    assert_eq!(
      errors,
      vec![ValidationError::NounOutsideDial {
        activity_id: "1.1".to_string(),
        noun: "Number".to_string()
      }]
    );
  }

  #[test]
  fn test_nested_call_scope() {
    let errors = errors_for(json!({
      "type": "call_scope",
      "body": {
        "type": "sequence",
        "activities": [{ "type": "call_scope" }]
      }
    }));
    assert_eq!(
      errors,
      vec![ValidationError::NestedCallScope {
        activity_id: "1.1.1".to_string()
      }]
    );
  }

  #[test]
  fn test_leave_outside_enqueue() {
    let errors = errors_for(json!({
      "type": "dial",
      "nouns": [{ "type": "queue", "queue": "q", "pickup": { "type": "leave" } }]
    }));
    assert_eq!(
      errors,
      vec![ValidationError::LeaveOutsideEnqueue {
        activity_id: "1.1.1".to_string()
      }]
    );
  }

  #[test]
  fn test_collects_every_error() {
    let errors = errors_for(json!({
      "type": "sequence",
      "activities": [
        { "type": "gather", "num_digits": 0, "finish_on_key": "x" },
        { "type": "dial", "nouns": [{ "type": "sip", "uris": [] }] },
        { "type": "leave" }
      ]
    }));
    assert_eq!(
      errors,
      vec![
        ValidationError::InvalidFinishOnKey {
          activity_id: "1.1".to_string(),
          key: 'x'
        },
        ValidationError::InvalidNumDigits {
          activity_id: "1.1".to_string()
        },
        ValidationError::SipWithoutUri {
          activity_id: "1.2.1".to_string()
        },
        ValidationError::LeaveOutsideEnqueue {
          activity_id: "1.3".to_string()
        },
      ]
    );
  }
}
