//! Results produced by verbs once the platform reports back.
//!
//! Results become the activity's output and, when the activity names a
//! `result` variable, are visible to later templates as `vars.<name>`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ActivityError;
use crate::event::{EventData, number, string};

/// Outcome of a dialed leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
  Completed,
  Busy,
  NoAnswer,
  Failed,
  Canceled,
}

impl CallStatus {
  pub fn parse(value: &str) -> Option<Self> {
    match value.to_ascii_lowercase().as_str() {
      "completed" => Some(CallStatus::Completed),
      "busy" => Some(CallStatus::Busy),
      "no-answer" => Some(CallStatus::NoAnswer),
      "failed" => Some(CallStatus::Failed),
      "canceled" => Some(CallStatus::Canceled),
      _ => None,
    }
  }
}

/// Final outcome of a call sitting in a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueResult {
  Bridged,
  QueueFull,
  Redirected,
  Leave,
  Hangup,
  Error,
  SystemError,
}

impl QueueResult {
  pub fn parse(value: &str) -> Option<Self> {
    match value.to_ascii_lowercase().as_str() {
      "bridged" => Some(QueueResult::Bridged),
      "queue-full" => Some(QueueResult::QueueFull),
      "redirected" => Some(QueueResult::Redirected),
      "leave" => Some(QueueResult::Leave),
      "hangup" => Some(QueueResult::Hangup),
      "error" => Some(QueueResult::Error),
      "system-error" => Some(QueueResult::SystemError),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatherResult {
  pub digits: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordResult {
  pub recording_url: Option<String>,
  pub duration_secs: u64,
  /// Key that ended the recording, if any.
  pub digits: String,
}

impl RecordResult {
  pub fn duration(&self) -> Duration {
    Duration::from_secs(self.duration_secs)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialResult {
  pub status: CallStatus,
  pub sid: Option<String>,
  pub duration_secs: u64,
  pub recording_url: Option<String>,
}

impl DialResult {
  pub fn duration(&self) -> Duration {
    Duration::from_secs(self.duration_secs)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueResult {
  pub result: QueueResult,
  pub sid: Option<String>,
  pub time_secs: u64,
}

/// Position of a waiting call, exposed to the wait body as `queue`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueStatus {
  pub sid: Option<String>,
  pub position: u32,
  pub time_secs: u64,
  pub current_queue_size: u32,
  pub average_queue_time_secs: u64,
}

impl EnqueueStatus {
  pub(crate) fn from_event(data: &EventData) -> Result<Self, ActivityError> {
    Ok(Self {
      sid: string(data, "QueueSid"),
      position: number(data, "QueuePosition")?,
      time_secs: number(data, "QueueTime")?,
      current_queue_size: number(data, "CurrentQueueSize")?,
      average_queue_time_secs: number(data, "AvgQueueTime")?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_call_status_values() {
    assert_eq!(CallStatus::parse("no-answer"), Some(CallStatus::NoAnswer));
    assert_eq!(CallStatus::parse("Completed"), Some(CallStatus::Completed));
    assert_eq!(CallStatus::parse("ringing"), None);
    assert_eq!(
      serde_json::to_value(CallStatus::NoAnswer).unwrap(),
      json!("no-answer")
    );
  }

  #[test]
  fn test_queue_result_values() {
    assert_eq!(QueueResult::parse("queue-full"), Some(QueueResult::QueueFull));
    assert_eq!(
      QueueResult::parse("system-error"),
      Some(QueueResult::SystemError)
    );
    assert_eq!(QueueResult::parse("bridging"), None);
  }

  #[test]
  fn test_enqueue_status_defaults() {
    let data: EventData = [("QueueSid", "QU1"), ("QueuePosition", "3")]
      .into_iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();

    let status = EnqueueStatus::from_event(&data).unwrap();
    assert_eq!(status.sid.as_deref(), Some("QU1"));
    assert_eq!(status.position, 3);
    assert_eq!(status.time_secs, 0);
    assert_eq!(status.current_queue_size, 0);
  }
}
