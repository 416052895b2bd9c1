use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use switchboard_config::{ActivityDef, ActivityType, FlowDef};

use crate::activity::*;
use crate::error::WorkflowError;
use crate::validate::{child_id, validate};

/// Id of the root activity of every locked flow.
pub const ROOT_ACTIVITY_ID: &str = "1";

/// A locked call flow ready for execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
  pub flow_id: String,
  pub name: String,
  /// Hex SHA-256 of the JSON definition this flow was locked from.
  pub digest: String,
  pub activities: HashMap<String, Activity>,
}

impl Flow {
  /// Validate a flow definition and lock it.
  pub fn from_def(def: FlowDef) -> Result<Self, WorkflowError> {
    let errors = validate(&def);
    if !errors.is_empty() {
      return Err(WorkflowError::Invalid(errors));
    }

    let digest = hex_digest(&serde_json::to_vec(&def)?);
    let mut activities = HashMap::new();
    lock_activity(&def.root, ROOT_ACTIVITY_ID.to_string(), &mut activities);

    Ok(Self {
      flow_id: def.flow_id,
      name: def.name,
      digest,
      activities,
    })
  }

  /// The root activity.
  pub fn root(&self) -> Result<&Activity, WorkflowError> {
    self.get_activity(ROOT_ACTIVITY_ID)
  }

  /// Get an activity by id.
  pub fn get_activity(&self, activity_id: &str) -> Result<&Activity, WorkflowError> {
    self
      .activities
      .get(activity_id)
      .ok_or_else(|| WorkflowError::ActivityNotFound(activity_id.to_string()))
  }
}

fn lock_activity(
  def: &ActivityDef,
  activity_id: String,
  activities: &mut HashMap<String, Activity>,
) -> String {
  let mut next = 0;
  let mut lock_child = |child: &ActivityDef, activities: &mut HashMap<String, Activity>| {
    next += 1;
    lock_activity(child, child_id(&activity_id, next), activities)
  };

  let kind = match &def.activity_type {
    ActivityType::CallScope { body } => ActivityKind::CallScope(CallScope {
      body: body.as_deref().map(|b| lock_child(b, activities)),
    }),
    ActivityType::Sequence { activities: items } => ActivityKind::Sequence(Sequence {
      activities: items.iter().map(|a| lock_child(a, activities)).collect(),
    }),
    ActivityType::Switch {
      value,
      cases,
      default,
    } => ActivityKind::Switch(Switch {
      value: value.clone(),
      cases: cases
        .iter()
        .map(|(case, a)| (case.clone(), lock_child(a, activities)))
        .collect(),
      default: default.as_deref().map(|d| lock_child(d, activities)),
    }),
    ActivityType::Say {
      text,
      voice,
      language,
      loop_count,
    } => ActivityKind::Say(Say {
      text: text.clone(),
      voice: *voice,
      language: language.clone(),
      loop_count: *loop_count,
    }),
    ActivityType::Play { url, loop_count } => ActivityKind::Play(Play {
      url: url.clone(),
      loop_count: *loop_count,
    }),
    ActivityType::Pause { duration_secs } => ActivityKind::Pause(Pause {
      duration_secs: *duration_secs,
    }),
    ActivityType::Hangup => ActivityKind::Hangup(Hangup),
    ActivityType::Leave => ActivityKind::Leave(Leave),
    ActivityType::Gather {
      timeout_secs,
      finish_on_key,
      num_digits,
      body,
      result,
    } => ActivityKind::Gather(Gather {
      timeout_secs: *timeout_secs,
      finish_on_key: *finish_on_key,
      num_digits: *num_digits,
      body: body.as_deref().map(|b| lock_child(b, activities)),
      result: result.clone(),
    }),
    ActivityType::Record {
      timeout_secs,
      finish_on_key,
      max_length_secs,
      transcribe,
      play_beep,
      result,
    } => ActivityKind::Record(Record {
      timeout_secs: *timeout_secs,
      finish_on_key: *finish_on_key,
      max_length_secs: *max_length_secs,
      transcribe: *transcribe,
      play_beep: *play_beep,
      result: result.clone(),
    }),
    ActivityType::Dial {
      timeout_secs,
      hangup_on_star,
      time_limit_secs,
      caller_id,
      record,
      nouns,
      result,
    } => ActivityKind::Dial(Dial {
      timeout_secs: *timeout_secs,
      hangup_on_star: *hangup_on_star,
      time_limit_secs: *time_limit_secs,
      caller_id: caller_id.clone(),
      record: *record,
      nouns: nouns.iter().map(|n| lock_child(n, activities)).collect(),
      result: result.clone(),
    }),
    ActivityType::Number {
      number,
      send_digits,
    } => ActivityKind::Number(Number {
      number: number.clone(),
      send_digits: send_digits.clone(),
    }),
    ActivityType::Sip { uris } => ActivityKind::Sip(Sip { uris: uris.clone() }),
    ActivityType::Queue { queue, pickup } => ActivityKind::Queue(Queue {
      queue: queue.clone(),
      pickup: pickup.as_deref().map(|p| lock_child(p, activities)),
    }),
    ActivityType::Enqueue {
      queue,
      wait,
      result,
    } => ActivityKind::Enqueue(Enqueue {
      queue: queue.clone(),
      wait: wait.as_deref().map(|w| lock_child(w, activities)),
      result: result.clone(),
    }),
  };

  activities.insert(
    activity_id.clone(),
    Activity {
      activity_id: activity_id.clone(),
      display_name: def.display_name().to_string(),
      kind,
    },
  );
  activity_id
}

fn hex_digest(bytes: &[u8]) -> String {
  hex::encode(Sha256::digest(bytes))
}
