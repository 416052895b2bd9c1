//! Persisted execution state.
//!
//! A [`Snapshot`] is everything needed to continue an execution in a later
//! turn. It is stored as JSON split into fixed-size chunks
//! (`state_p0`, `state_p1`, ... plus `state_parts`) so backends with small
//! value limits, such as cookies, and row stores share one layout.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use switchboard_document::Document;
use switchboard_store::StateBlob;

use crate::bookmark::BookmarkRegistry;
use crate::error::RuntimeError;
use crate::instance::{ActivityInstance, InstanceId};

const PARTS_KEY: &str = "state_parts";
const PART_PREFIX: &str = "state_p";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
  Running,
  /// Waiting on bookmarks.
  Idle,
  Closed,
  Aborted,
  Canceled,
}

impl WorkflowStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      WorkflowStatus::Closed | WorkflowStatus::Aborted | WorkflowStatus::Canceled
    )
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
  pub execution_id: String,
  pub flow_id: String,
  pub flow_digest: String,
  pub status: WorkflowStatus,
  pub turn: u64,
  pub next_instance_id: u64,
  pub root: InstanceId,
  pub instances: BTreeMap<InstanceId, ActivityInstance>,
  pub bookmarks: BookmarkRegistry,
  pub arguments: BTreeMap<String, String>,
  pub variables: BTreeMap<String, serde_json::Value>,
  /// Response document of the latest turn.
  pub document: Document,
  /// Output of the root activity once it closes.
  pub output: Option<serde_json::Value>,
}

impl Snapshot {
  /// Encode the snapshot into chunks of at most `chunk_size` characters.
  pub fn to_blob(&self, chunk_size: usize) -> Result<StateBlob, RuntimeError> {
    let json = serde_json::to_string(self).map_err(|e| RuntimeError::Snapshot {
      message: e.to_string(),
    })?;

    let chars: Vec<char> = json.chars().collect();
    let mut blob = StateBlob::new();
    for (index, chunk) in chars.chunks(chunk_size.max(1)).enumerate() {
      blob.insert(
        format!("{}{}", PART_PREFIX, index),
        chunk.iter().collect(),
      );
    }
    let parts = blob.len();
    blob.insert(PARTS_KEY.to_string(), parts.to_string());
    Ok(blob)
  }

  /// Decode a snapshot written by [`Snapshot::to_blob`].
  pub fn from_blob(blob: &StateBlob) -> Result<Self, RuntimeError> {
    let parts: usize = blob
      .get(PARTS_KEY)
      .and_then(|p| p.parse().ok())
      .ok_or_else(|| RuntimeError::Snapshot {
        message: format!("missing or invalid '{}'", PARTS_KEY),
      })?;

    let mut json = String::new();
    for index in 0..parts {
      let key = format!("{}{}", PART_PREFIX, index);
      let part = blob.get(&key).ok_or_else(|| RuntimeError::Snapshot {
        message: format!("missing state part '{}'", key),
      })?;
      json.push_str(part);
    }

    serde_json::from_str(&json).map_err(|e| RuntimeError::Snapshot {
      message: e.to_string(),
    })
  }

  pub fn root_instance(&self) -> Option<&ActivityInstance> {
    self.instances.get(&self.root)
  }
}
