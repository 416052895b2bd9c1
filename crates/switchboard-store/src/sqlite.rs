use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::{Error, ExecutionRecord, StateBlob, Store};

/// SQLite-based store implementation.
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(&self.pool).await
  }
}

#[async_trait]
impl Store for SqliteStore {
  async fn load_state(&self, execution_id: &str) -> Result<Option<StateBlob>, Error> {
    let rows: Vec<(String, String)> = sqlx::query_as(
      r#"
      SELECT name, value
      FROM execution_state
      WHERE execution_id = ?
      "#,
    )
    .bind(execution_id)
    .fetch_all(&self.pool)
    .await?;

    if rows.is_empty() {
      return Ok(None);
    }
    Ok(Some(rows.into_iter().collect()))
  }

  async fn save_state(&self, record: &ExecutionRecord, state: &StateBlob) -> Result<(), Error> {
    let mut tx = self.pool.begin().await?;

    sqlx::query(
      r#"
      INSERT INTO executions (execution_id, flow_id, turn, pending_bookmarks, updated_at)
      VALUES (?, ?, ?, ?, ?)
      ON CONFLICT (execution_id) DO UPDATE SET
        flow_id = excluded.flow_id,
        turn = excluded.turn,
        pending_bookmarks = excluded.pending_bookmarks,
        updated_at = excluded.updated_at
      "#,
    )
    .bind(&record.execution_id)
    .bind(&record.flow_id)
    .bind(record.turn)
    .bind(record.pending_bookmarks)
    .bind(record.updated_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM execution_state WHERE execution_id = ?")
      .bind(&record.execution_id)
      .execute(&mut *tx)
      .await?;

    for (name, value) in state {
      sqlx::query(
        r#"
        INSERT INTO execution_state (execution_id, name, value)
        VALUES (?, ?, ?)
        "#,
      )
      .bind(&record.execution_id)
      .bind(name)
      .bind(value)
      .execute(&mut *tx)
      .await?;
    }

    tx.commit().await?;
    Ok(())
  }

  async fn delete_state(&self, execution_id: &str) -> Result<(), Error> {
    let mut tx = self.pool.begin().await?;

    sqlx::query("DELETE FROM execution_state WHERE execution_id = ?")
      .bind(execution_id)
      .execute(&mut *tx)
      .await?;
    sqlx::query("DELETE FROM executions WHERE execution_id = ?")
      .bind(execution_id)
      .execute(&mut *tx)
      .await?;

    tx.commit().await?;
    Ok(())
  }

  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, Error> {
    sqlx::query_as(
      r#"
      SELECT execution_id, flow_id, turn, pending_bookmarks, updated_at
      FROM executions
      WHERE execution_id = ?
      "#,
    )
    .bind(execution_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(execution_id.to_string()))
  }

  async fn list_executions(&self) -> Result<Vec<ExecutionRecord>, Error> {
    let records = sqlx::query_as(
      r#"
      SELECT execution_id, flow_id, turn, pending_bookmarks, updated_at
      FROM executions
      ORDER BY updated_at DESC
      "#,
    )
    .fetch_all(&self.pool)
    .await?;

    Ok(records)
  }
}
