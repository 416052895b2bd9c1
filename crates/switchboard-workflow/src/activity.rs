//! Locked activity nodes.
//!
//! Composite activities refer to their children by activity id rather than
//! owning them, so the whole flow is a flat table that persisted execution
//! state can point into.

use serde::{Deserialize, Serialize};
use switchboard_config::{InputValue, SipUriDef, Voice};

/// A locked activity ready for execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
  /// Stable id derived from the activity's position in the tree.
  pub activity_id: String,
  pub display_name: String,
  pub kind: ActivityKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityKind {
  CallScope(CallScope),
  Sequence(Sequence),
  Switch(Switch),
  Say(Say),
  Play(Play),
  Pause(Pause),
  Hangup(Hangup),
  Leave(Leave),
  Gather(Gather),
  Record(Record),
  Dial(Dial),
  Number(Number),
  Sip(Sip),
  Queue(Queue),
  Enqueue(Enqueue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallScope {
  pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
  pub activities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Switch {
  pub value: InputValue,
  /// (case value, activity id) pairs in definition order.
  pub cases: Vec<(String, String)>,
  pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Say {
  pub text: InputValue,
  pub voice: Option<Voice>,
  pub language: Option<String>,
  pub loop_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Play {
  pub url: InputValue,
  pub loop_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pause {
  pub duration_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hangup;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leave;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gather {
  pub timeout_secs: Option<u32>,
  pub finish_on_key: Option<char>,
  pub num_digits: Option<u32>,
  pub body: Option<String>,
  pub result: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
  pub timeout_secs: Option<u32>,
  pub finish_on_key: Option<char>,
  pub max_length_secs: Option<u32>,
  pub transcribe: Option<bool>,
  pub play_beep: Option<bool>,
  pub result: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dial {
  pub timeout_secs: Option<u32>,
  pub hangup_on_star: Option<bool>,
  pub time_limit_secs: Option<u32>,
  pub caller_id: Option<InputValue>,
  pub record: Option<bool>,
  pub nouns: Vec<String>,
  pub result: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Number {
  pub number: InputValue,
  pub send_digits: Option<InputValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sip {
  pub uris: Vec<SipUriDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Queue {
  pub queue: InputValue,
  pub pickup: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enqueue {
  pub queue: InputValue,
  pub wait: Option<String>,
  pub result: Option<String>,
}

impl ActivityKind {
  /// Ids of the activities this one may schedule.
  pub fn children(&self) -> Vec<&str> {
    match self {
      ActivityKind::CallScope(a) => a.body.iter().map(String::as_str).collect(),
      ActivityKind::Sequence(a) => a.activities.iter().map(String::as_str).collect(),
      ActivityKind::Switch(a) => a
        .cases
        .iter()
        .map(|(_, id)| id.as_str())
        .chain(a.default.as_deref())
        .collect(),
      ActivityKind::Gather(a) => a.body.iter().map(String::as_str).collect(),
      ActivityKind::Dial(a) => a.nouns.iter().map(String::as_str).collect(),
      ActivityKind::Queue(a) => a.pickup.iter().map(String::as_str).collect(),
      ActivityKind::Enqueue(a) => a.wait.iter().map(String::as_str).collect(),
      ActivityKind::Say(_)
      | ActivityKind::Play(_)
      | ActivityKind::Pause(_)
      | ActivityKind::Hangup(_)
      | ActivityKind::Leave(_)
      | ActivityKind::Record(_)
      | ActivityKind::Number(_)
      | ActivityKind::Sip(_) => Vec::new(),
    }
  }
}
