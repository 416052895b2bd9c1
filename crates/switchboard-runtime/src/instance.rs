//! Activity instances: the persisted state of running activities.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies an activity instance within one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub(crate) u64);

impl fmt::Display for InstanceId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
  Created,
  Executing,
  /// Waiting on at least one bookmark and no children.
  Blocked,
  Closed,
  Faulted,
  Canceled,
}

impl ActivityState {
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      ActivityState::Closed | ActivityState::Faulted | ActivityState::Canceled
    )
  }
}

/// A continuation an activity registered for a child or a bookmark.
///
/// Continuations are stored as data so they survive persistence; the
/// runtime dispatches them back to the owning activity's handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Callback {
  BodyCompleted,
  BodyFaulted,
  ItemCompleted,
  CaseCompleted,
  NounFaulted,
  PickupCompleted,
  WaitCompleted,
  WaitFaulted,
  PauseElapsed,
  DigitsReceived,
  RecordingFinished,
  DialFinished,
  PickupRequested,
  QueueWait,
  QueueFinished,
}

impl Callback {
  pub fn name(&self) -> &'static str {
    match self {
      Callback::BodyCompleted => "body_completed",
      Callback::BodyFaulted => "body_faulted",
      Callback::ItemCompleted => "item_completed",
      Callback::CaseCompleted => "case_completed",
      Callback::NounFaulted => "noun_faulted",
      Callback::PickupCompleted => "pickup_completed",
      Callback::WaitCompleted => "wait_completed",
      Callback::WaitFaulted => "wait_faulted",
      Callback::PauseElapsed => "pause_elapsed",
      Callback::DigitsReceived => "digits_received",
      Callback::RecordingFinished => "recording_finished",
      Callback::DialFinished => "dial_finished",
      Callback::PickupRequested => "pickup_requested",
      Callback::QueueWait => "queue_wait",
      Callback::QueueFinished => "queue_finished",
    }
  }
}

impl fmt::Display for Callback {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// One running occurrence of an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityInstance {
  pub id: InstanceId,
  pub activity_id: String,
  pub parent: Option<InstanceId>,
  pub state: ActivityState,
  /// Outstanding children, in scheduling order.
  pub children: Vec<InstanceId>,
  /// Names of outstanding bookmarks owned by this instance.
  pub bookmarks: Vec<String>,
  /// Parent continuation invoked when this instance closes.
  pub on_complete: Option<Callback>,
  /// Parent continuation invoked when this instance faults or is canceled.
  pub on_fault: Option<Callback>,
  /// Scope id of the element this instance and its descendants write into.
  pub scope: Option<String>,
  /// Template data visible to this instance and its descendants.
  pub frame: BTreeMap<String, serde_json::Value>,
  /// Private working state.
  pub locals: BTreeMap<String, serde_json::Value>,
  pub output: Option<serde_json::Value>,
}

impl ActivityInstance {
  pub(crate) fn new(
    id: InstanceId,
    activity_id: String,
    parent: Option<InstanceId>,
    on_complete: Option<Callback>,
    on_fault: Option<Callback>,
  ) -> Self {
    Self {
      id,
      activity_id,
      parent,
      state: ActivityState::Created,
      children: Vec::new(),
      bookmarks: Vec::new(),
      on_complete,
      on_fault,
      scope: None,
      frame: BTreeMap::new(),
      locals: BTreeMap::new(),
      output: None,
    }
  }

  pub fn is_live(&self) -> bool {
    !self.state.is_terminal()
  }
}
