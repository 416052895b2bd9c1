use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{Error, ExecutionRecord, StateBlob, Store};

/// In-process store, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
  executions: RwLock<HashMap<String, (ExecutionRecord, StateBlob)>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn load_state(&self, execution_id: &str) -> Result<Option<StateBlob>, Error> {
    let executions = self.executions.read().await;
    Ok(executions.get(execution_id).map(|(_, state)| state.clone()))
  }

  async fn save_state(&self, record: &ExecutionRecord, state: &StateBlob) -> Result<(), Error> {
    let mut executions = self.executions.write().await;
    executions.insert(
      record.execution_id.clone(),
      (record.clone(), state.clone()),
    );
    Ok(())
  }

  async fn delete_state(&self, execution_id: &str) -> Result<(), Error> {
    self.executions.write().await.remove(execution_id);
    Ok(())
  }

  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, Error> {
    let executions = self.executions.read().await;
    executions
      .get(execution_id)
      .map(|(record, _)| record.clone())
      .ok_or_else(|| Error::NotFound(execution_id.to_string()))
  }

  async fn list_executions(&self) -> Result<Vec<ExecutionRecord>, Error> {
    let executions = self.executions.read().await;
    let mut records: Vec<ExecutionRecord> =
      executions.values().map(|(record, _)| record.clone()).collect();
    records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Ok(records)
  }
}
