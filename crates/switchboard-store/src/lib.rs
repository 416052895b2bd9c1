//! Switchboard Store
//!
//! This crate provides the storage trait and implementations for the state
//! a call flow keeps between turns. The runtime hands the store an opaque
//! [`StateBlob`], a name to value map of strings, together with a small
//! [`ExecutionRecord`] describing it.
//!
//! The [`Store`] trait defines operations for:
//! - Saving and loading the state of a suspended execution
//! - Deleting state once an execution reaches a terminal state
//! - Listing suspended executions
//!
//! Loading, running a turn and saving is expected to happen sequentially for
//! a given execution id; the store does not lock executions.

mod memory;
mod sqlite;
mod types;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use types::{ExecutionRecord, StateBlob};

use async_trait::async_trait;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),
}

/// Storage trait for suspended call flow executions.
#[async_trait]
pub trait Store: Send + Sync {
  /// Load the state saved for an execution, if any.
  async fn load_state(&self, execution_id: &str) -> Result<Option<StateBlob>, Error>;

  /// Replace the saved state of an execution.
  async fn save_state(&self, record: &ExecutionRecord, state: &StateBlob) -> Result<(), Error>;

  /// Delete an execution and its state. Deleting a missing execution is not
  /// an error.
  async fn delete_state(&self, execution_id: &str) -> Result<(), Error>;

  /// Get the record of a suspended execution.
  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, Error>;

  /// List suspended executions, most recently updated first.
  async fn list_executions(&self) -> Result<Vec<ExecutionRecord>, Error>;
}
