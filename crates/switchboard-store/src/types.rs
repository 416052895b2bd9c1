use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Opaque persisted state: entry name to value.
pub type StateBlob = BTreeMap<String, String>;

/// A suspended execution as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExecutionRecord {
  pub execution_id: String,
  pub flow_id: String,
  /// Number of turns the execution has run.
  pub turn: i64,
  pub pending_bookmarks: i64,
  pub updated_at: DateTime<Utc>,
}
