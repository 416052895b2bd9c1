//! Per-turn orchestration.
//!
//! [`CallHandler`] turns one inbound platform request into one response
//! document. It loads or starts the execution, resumes the posted bookmark,
//! runs the flow until it is idle or done, and persists or deletes the state.

use std::collections::BTreeMap;

use chrono::Utc;
use switchboard_document::{Document, Element};
use switchboard_store::{ExecutionRecord, Store};
use switchboard_workflow::{ActivityKind, Flow};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};
use url::Url;
use uuid::Uuid;

use crate::call::CallContext;
use crate::error::RuntimeError;
use crate::event::{EventData, string};
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::snapshot::Snapshot;
use crate::urls::{ARGUMENT_PREFIX, BOOKMARK_KEY, CallbackUrls, INSTANCE_KEY};
use crate::workflow::{RunStatus, TurnEnv, WorkflowInstance};

/// Configuration for the call handler.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
  /// Url the platform posts turns to. Callback urls are built from it.
  pub base_url: Url,
  /// Length of the pause sent when an idle turn produced no output.
  pub idle_pause_secs: u32,
  /// Locale used when the platform does not send one.
  pub default_locale: String,
  /// Maximum characters per persisted state entry.
  pub state_chunk_size: usize,
}

impl RuntimeConfig {
  pub fn new(base_url: Url) -> Self {
    Self {
      base_url,
      idle_pause_secs: 2,
      default_locale: "en-US".to_string(),
      state_chunk_size: 2048,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
  /// The execution is waiting for the platform to post back.
  Idle,
  /// The flow finished; the call is hung up.
  Completed,
  /// The turn failed; the call is hung up and state is left untouched.
  Failed,
}

/// The response to one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnResponse {
  pub execution_id: String,
  /// The response document with internal attributes stripped.
  pub markup: String,
  pub status: TurnStatus,
}

impl TurnResponse {
  /// A response that ends the call.
  pub fn hangup(execution_id: impl Into<String>) -> Self {
    let mut document = Document::new();
    let root = document.root();
    document.append_child(root, Element::new("Hangup"));
    Self {
      execution_id: execution_id.into(),
      markup: document.to_markup(),
      status: TurnStatus::Failed,
    }
  }
}

/// Serves turns of one call flow.
pub struct CallHandler<S, N = NoopNotifier> {
  flow: Flow,
  store: S,
  config: RuntimeConfig,
  notifier: N,
}

impl<S: Store> CallHandler<S> {
  /// Create a handler. The flow's root must be a call scope.
  pub fn new(flow: Flow, store: S, config: RuntimeConfig) -> Result<Self, RuntimeError> {
    let root = flow.root()?;
    if !matches!(root.kind, ActivityKind::CallScope(_)) {
      return Err(RuntimeError::InvalidFlow {
        message: format!(
          "root activity of flow '{}' must be a call scope, found '{}'",
          flow.flow_id, root.display_name
        ),
      });
    }

    Ok(Self {
      flow,
      store,
      config,
      notifier: NoopNotifier,
    })
  }
}

impl<S: Store, N: ExecutionNotifier> CallHandler<S, N> {
  /// Replace the notifier receiving execution events.
  pub fn with_notifier<M: ExecutionNotifier>(self, notifier: M) -> CallHandler<S, M> {
    CallHandler {
      flow: self.flow,
      store: self.store,
      config: self.config,
      notifier,
    }
  }

  pub fn flow(&self) -> &Flow {
    &self.flow
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  pub fn config(&self) -> &RuntimeConfig {
    &self.config
  }

  /// Run one turn.
  ///
  /// A request without `wf_InstanceId` starts a new execution with the
  /// `arg_` fields as arguments. Otherwise the saved state is loaded and,
  /// when `wf_Bookmark` is present, that bookmark is resumed with the whole
  /// request as its event data.
  ///
  /// On error nothing is persisted: the saved state stays as it was before
  /// the turn, so the platform can retry.
  #[instrument(
    name = "call_turn",
    skip(self, event, cancel),
    fields(
      flow_id = %self.flow.flow_id,
    )
  )]
  pub async fn handle(
    &self,
    event: EventData,
    cancel: CancellationToken,
  ) -> Result<TurnResponse, RuntimeError> {
    let call = CallContext::from_event(&event, &self.config.default_locale)?;
    let existing = string(&event, INSTANCE_KEY);

    let snapshot = match &existing {
      Some(execution_id) => {
        let blob = self
          .store
          .load_state(execution_id)
          .await?
          .ok_or_else(|| RuntimeError::UnknownExecution(execution_id.clone()))?;
        Some(Snapshot::from_blob(&blob)?)
      }
      None => None,
    };

    let execution_id = existing.unwrap_or_else(|| Uuid::new_v4().to_string());
    let env = TurnEnv::new(
      call,
      CallbackUrls::new(self.config.base_url.clone(), execution_id.clone()),
    );

    let (outcome, markup) = self.run_turn(&execution_id, snapshot, env, &event, &cancel)?;

    match outcome {
      TurnOutcome::Idle(snapshot) => {
        let blob = snapshot.to_blob(self.config.state_chunk_size)?;
        let record = ExecutionRecord {
          execution_id: execution_id.clone(),
          flow_id: snapshot.flow_id.clone(),
          turn: snapshot.turn as i64,
          pending_bookmarks: snapshot.bookmarks.len() as i64,
          updated_at: Utc::now(),
        };
        self.store.save_state(&record, &blob).await?;
        info!(
          execution_id = %execution_id,
          turn = snapshot.turn,
          parts = blob.len(),
          "turn_idle"
        );
        Ok(TurnResponse {
          execution_id,
          markup,
          status: TurnStatus::Idle,
        })
      }
      TurnOutcome::Finished => {
        self.store.delete_state(&execution_id).await?;
        info!(execution_id = %execution_id, "turn_completed");
        Ok(TurnResponse {
          execution_id,
          markup,
          status: TurnStatus::Completed,
        })
      }
    }
  }

  /// Run one turn, answering any error with a hangup.
  pub async fn handle_or_hangup(&self, event: EventData, cancel: CancellationToken) -> TurnResponse {
    let execution_id = string(&event, INSTANCE_KEY).unwrap_or_default();
    match self.handle(event, cancel).await {
      Ok(response) => response,
      Err(e) => {
        error!(execution_id = %execution_id, error = %e, "turn_failed");
        TurnResponse::hangup(execution_id)
      }
    }
  }

  /// The synchronous part of a turn. Returns what to persist and the
  /// response markup.
  fn run_turn(
    &self,
    execution_id: &str,
    snapshot: Option<Snapshot>,
    env: TurnEnv,
    event: &EventData,
    cancel: &CancellationToken,
  ) -> Result<(TurnOutcome, String), RuntimeError> {
    let mut workflow = match snapshot {
      Some(snapshot) => {
        let mut workflow =
          WorkflowInstance::load(&self.flow, snapshot, env)?.with_notifier(&self.notifier);
        workflow.begin_turn();
        if let Some(bookmark) = string(event, BOOKMARK_KEY) {
          workflow.resume(&bookmark, event.clone())?;
        }
        workflow
      }
      None => {
        let arguments: BTreeMap<String, String> = event
          .iter()
          .filter_map(|(key, value)| {
            key
              .strip_prefix(ARGUMENT_PREFIX)
              .map(|name| (name.to_string(), value.clone()))
          })
          .collect();
        WorkflowInstance::start(&self.flow, execution_id, arguments, env)?
          .with_notifier(&self.notifier)
      }
    };

    info!(
      execution_id = %execution_id,
      turn = workflow.turn(),
      "turn_started"
    );
    self.notifier.notify(ExecutionEvent::TurnStarted {
      execution_id: execution_id.to_string(),
      flow_id: self.flow.flow_id.clone(),
      turn: workflow.turn(),
    });

    match workflow.run(cancel)? {
      RunStatus::Idle => {
        let redirect = workflow
          .pending_redirect()
          .map(|bookmark| workflow.urls().bookmark_url(&bookmark.name));
        match redirect {
          Some(url) => workflow.append_to_root(Element::new("Redirect").text(url.as_str())),
          None if !workflow.document().has_elements(workflow.document().root()) => {
            // Keep the platform polling rather than ending the call.
            let url = workflow.urls().execution_url();
            workflow.append_to_root(Element::new("Pause").attr("length", self.config.idle_pause_secs));
            workflow.append_to_root(Element::new("Redirect").text(url.as_str()));
          }
          None => {}
        }
        let markup = workflow.document().to_markup();
        Ok((TurnOutcome::Idle(Box::new(workflow.into_snapshot())), markup))
      }
      RunStatus::Completed | RunStatus::Canceled => {
        workflow.append_to_root(Element::new("Hangup"));
        Ok((TurnOutcome::Finished, workflow.document().to_markup()))
      }
    }
  }
}

enum TurnOutcome {
  Idle(Box<Snapshot>),
  Finished,
}
