use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::enums::Voice;
use crate::input::InputValue;

/// A single activity in a call flow tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDef {
  /// Human readable name, used in bookmark names and logs.
  /// Defaults to the activity type ("Say", "Dial", ...).
  #[serde(skip_serializing_if = "Option::is_none")]
  pub display_name: Option<String>,
  #[serde(flatten)]
  pub activity_type: ActivityType,
}

impl ActivityDef {
  pub fn new(activity_type: ActivityType) -> Self {
    Self {
      display_name: None,
      activity_type,
    }
  }

  /// The display name, falling back to the activity type name.
  pub fn display_name(&self) -> &str {
    self
      .display_name
      .as_deref()
      .unwrap_or_else(|| self.activity_type.type_name())
  }

  /// Direct child activities in execution order.
  pub fn children(&self) -> Vec<&ActivityDef> {
    match &self.activity_type {
      ActivityType::CallScope { body } => body.iter().map(|b| b.as_ref()).collect(),
      ActivityType::Sequence { activities } => activities.iter().collect(),
      ActivityType::Switch { cases, default, .. } => cases
        .values()
        .chain(default.iter().map(|d| d.as_ref()))
        .collect(),
      ActivityType::Gather { body, .. } => body.iter().map(|b| b.as_ref()).collect(),
      ActivityType::Dial { nouns, .. } => nouns.iter().collect(),
      ActivityType::Queue { pickup, .. } => pickup.iter().map(|p| p.as_ref()).collect(),
      ActivityType::Enqueue { wait, .. } => wait.iter().map(|w| w.as_ref()).collect(),
      ActivityType::Say { .. }
      | ActivityType::Play { .. }
      | ActivityType::Pause { .. }
      | ActivityType::Hangup
      | ActivityType::Leave
      | ActivityType::Record { .. }
      | ActivityType::Number { .. }
      | ActivityType::Sip { .. } => Vec::new(),
    }
  }
}

/// A SIP endpoint dialed by a `sip` noun.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SipUriDef {
  pub uri: InputValue,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub username: Option<InputValue>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub password: Option<InputValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityType {
  /// Root of a call flow. Captures the call context for its body.
  CallScope {
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<Box<ActivityDef>>,
  },
  /// Runs each activity after the previous one completes.
  Sequence {
    #[serde(default)]
    activities: Vec<ActivityDef>,
  },
  /// Renders `value` and runs the matching case, or `default`.
  Switch {
    value: InputValue,
    #[serde(default)]
    cases: BTreeMap<String, ActivityDef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<Box<ActivityDef>>,
  },
  Say {
    text: InputValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<Voice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<String>,
    #[serde(rename = "loop", skip_serializing_if = "Option::is_none")]
    loop_count: Option<u32>,
  },
  Play {
    url: InputValue,
    #[serde(rename = "loop", skip_serializing_if = "Option::is_none")]
    loop_count: Option<u32>,
  },
  Pause {
    duration_secs: u32,
  },
  Hangup,
  /// Leaves the queue. Only valid inside an `enqueue` wait body.
  Leave,
  Gather {
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    finish_on_key: Option<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_digits: Option<u32>,
    /// Prompt played while collecting digits. Writes inside the Gather element.
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<Box<ActivityDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<String>,
  },
  Record {
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    finish_on_key: Option<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_length_secs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transcribe: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    play_beep: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<String>,
  },
  Dial {
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hangup_on_star: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_limit_secs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    caller_id: Option<InputValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<bool>,
    /// Dial nouns (`number`, `sip`, `queue`). At least one is required.
    #[serde(default)]
    nouns: Vec<ActivityDef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<String>,
  },
  /// Dial noun: a phone number.
  Number {
    number: InputValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    send_digits: Option<InputValue>,
  },
  /// Dial noun: one or more SIP endpoints.
  Sip {
    #[serde(default)]
    uris: Vec<SipUriDef>,
  },
  /// Dial noun: connect to the caller at the head of a queue.
  Queue {
    queue: InputValue,
    /// Played to the agent before the bridge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pickup: Option<Box<ActivityDef>>,
  },
  Enqueue {
    queue: InputValue,
    /// Runs each time the platform asks what to play while waiting.
    #[serde(skip_serializing_if = "Option::is_none")]
    wait: Option<Box<ActivityDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<String>,
  },
}

impl ActivityType {
  pub fn type_name(&self) -> &'static str {
    match self {
      ActivityType::CallScope { .. } => "CallScope",
      ActivityType::Sequence { .. } => "Sequence",
      ActivityType::Switch { .. } => "Switch",
      ActivityType::Say { .. } => "Say",
      ActivityType::Play { .. } => "Play",
      ActivityType::Pause { .. } => "Pause",
      ActivityType::Hangup => "Hangup",
      ActivityType::Leave => "Leave",
      ActivityType::Gather { .. } => "Gather",
      ActivityType::Record { .. } => "Record",
      ActivityType::Dial { .. } => "Dial",
      ActivityType::Number { .. } => "Number",
      ActivityType::Sip { .. } => "Sip",
      ActivityType::Queue { .. } => "Queue",
      ActivityType::Enqueue { .. } => "Enqueue",
    }
  }

  /// Whether this activity can only appear as a child of a Dial.
  pub fn is_noun(&self) -> bool {
    matches!(
      self,
      ActivityType::Number { .. } | ActivityType::Sip { .. } | ActivityType::Queue { .. }
    )
  }
}
