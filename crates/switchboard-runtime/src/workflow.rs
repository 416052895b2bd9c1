//! The activity execution core.
//!
//! A [`WorkflowInstance`] runs one execution of a locked flow. Work is kept
//! in a FIFO readiness queue: executing a scheduled child, delivering a
//! bookmark resume, or delivering a child's completion or fault to its
//! parent. [`WorkflowInstance::run`] drains the queue; when it is empty the
//! execution is either closed or idle, waiting on bookmarks.
//!
//! An instance closes once it has no outstanding children and no
//! outstanding bookmarks after one of its handlers returns. Faults travel to
//! the parent's fault callback, or fault the parent in turn when none was
//! registered. A fault that reaches the root aborts the turn.

use std::collections::{BTreeMap, HashSet, VecDeque};

use switchboard_document::{Document, Element};
use switchboard_workflow::{Activity, Flow};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::activities;
use crate::bookmark::{Bookmark, BookmarkRegistry};
use crate::call::CallContext;
use crate::context::ActivityContext;
use crate::error::{ActivityError, RuntimeError};
use crate::event::EventData;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::instance::{ActivityInstance, ActivityState, Callback, InstanceId};
use crate::snapshot::{Snapshot, WorkflowStatus};
use crate::urls::CallbackUrls;

static NOOP_NOTIFIER: NoopNotifier = NoopNotifier;

/// Per-turn services available to activities.
#[derive(Debug, Clone)]
pub struct TurnEnv {
  pub call: CallContext,
  pub urls: CallbackUrls,
}

impl TurnEnv {
  pub fn new(call: CallContext, urls: CallbackUrls) -> Self {
    Self { call, urls }
  }
}

/// Where a call to [`WorkflowInstance::run`] left the execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
  /// Waiting on bookmarks.
  Idle,
  /// The root activity closed.
  Completed,
  /// The root activity was canceled.
  Canceled,
}

/// A closed child, as seen by its parent's completion callback.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildOutcome {
  pub instance: InstanceId,
  pub activity_id: String,
  pub output: Option<serde_json::Value>,
}

#[derive(Debug)]
pub enum FaultReason {
  Error(ActivityError),
  Canceled,
}

/// A faulted or canceled child, as seen by its parent's fault callback.
#[derive(Debug)]
pub struct ChildFault {
  pub instance: InstanceId,
  pub activity_id: String,
  pub reason: FaultReason,
}

impl ChildFault {
  pub fn is_canceled(&self) -> bool {
    matches!(self.reason, FaultReason::Canceled)
  }
}

#[derive(Debug)]
enum WorkItem {
  Execute {
    instance: InstanceId,
  },
  Resume {
    instance: InstanceId,
    callback: Callback,
    data: EventData,
    scope: Option<String>,
  },
  ChildCompleted {
    parent: InstanceId,
    callback: Callback,
    child: ChildOutcome,
  },
  ChildFaulted {
    parent: InstanceId,
    callback: Callback,
    fault: ChildFault,
  },
}

impl WorkItem {
  fn target(&self) -> InstanceId {
    match self {
      WorkItem::Execute { instance } | WorkItem::Resume { instance, .. } => *instance,
      WorkItem::ChildCompleted { parent, .. } | WorkItem::ChildFaulted { parent, .. } => *parent,
    }
  }
}

/// One execution of a flow.
pub struct WorkflowInstance<'f> {
  flow: &'f Flow,
  pub(crate) snapshot: Snapshot,
  pub(crate) env: TurnEnv,
  queue: VecDeque<WorkItem>,
  notifier: &'f dyn ExecutionNotifier,
}

impl<'f> WorkflowInstance<'f> {
  /// Start a new execution. The root activity is scheduled; call
  /// [`run`](Self::run) to execute it.
  pub fn start(
    flow: &'f Flow,
    execution_id: impl Into<String>,
    arguments: BTreeMap<String, String>,
    env: TurnEnv,
  ) -> Result<Self, RuntimeError> {
    let root_activity = flow.root()?;
    let root = InstanceId(0);

    let mut instances = BTreeMap::new();
    instances.insert(
      root,
      ActivityInstance::new(root, root_activity.activity_id.clone(), None, None, None),
    );

    let snapshot = Snapshot {
      execution_id: execution_id.into(),
      flow_id: flow.flow_id.clone(),
      flow_digest: flow.digest.clone(),
      status: WorkflowStatus::Running,
      turn: 1,
      next_instance_id: 1,
      root,
      instances,
      bookmarks: BookmarkRegistry::new(),
      arguments,
      variables: BTreeMap::new(),
      document: Document::new(),
      output: None,
    };

    let mut workflow = Self {
      flow,
      snapshot,
      env,
      queue: VecDeque::new(),
      notifier: &NOOP_NOTIFIER,
    };
    workflow
      .queue
      .push_back(WorkItem::Execute { instance: root });
    Ok(workflow)
  }

  /// Continue an execution from persisted state.
  pub fn load(flow: &'f Flow, snapshot: Snapshot, env: TurnEnv) -> Result<Self, RuntimeError> {
    if snapshot.flow_digest != flow.digest {
      return Err(RuntimeError::FlowMismatch {
        expected: snapshot.flow_digest,
        actual: flow.digest.clone(),
      });
    }
    if snapshot.status.is_terminal() {
      return Err(RuntimeError::NotRunning {
        execution_id: snapshot.execution_id,
      });
    }

    Ok(Self {
      flow,
      snapshot,
      env,
      queue: VecDeque::new(),
      notifier: &NOOP_NOTIFIER,
    })
  }

  pub fn with_notifier(mut self, notifier: &'f dyn ExecutionNotifier) -> Self {
    self.notifier = notifier;
    self
  }

  /// Begin a new turn with an empty response document. Scopes recorded in
  /// earlier turns resolve to the new root.
  pub fn begin_turn(&mut self) {
    self.snapshot.turn += 1;
    self.snapshot.document = Document::new();
  }

  pub fn execution_id(&self) -> &str {
    &self.snapshot.execution_id
  }

  pub fn status(&self) -> WorkflowStatus {
    self.snapshot.status
  }

  pub fn turn(&self) -> u64 {
    self.snapshot.turn
  }

  pub fn snapshot(&self) -> &Snapshot {
    &self.snapshot
  }

  pub fn into_snapshot(self) -> Snapshot {
    self.snapshot
  }

  pub fn document(&self) -> &Document {
    &self.snapshot.document
  }

  /// Append an element to the root of the response document.
  pub fn append_to_root(&mut self, element: Element) {
    let root = self.snapshot.document.root();
    self.snapshot.document.append_child(root, element);
  }

  pub fn bookmarks(&self) -> &BookmarkRegistry {
    &self.snapshot.bookmarks
  }

  pub fn variables(&self) -> &BTreeMap<String, serde_json::Value> {
    &self.snapshot.variables
  }

  pub fn output(&self) -> Option<&serde_json::Value> {
    self.snapshot.output.as_ref()
  }

  pub fn instance(&self, id: InstanceId) -> Option<&ActivityInstance> {
    self.snapshot.instances.get(&id)
  }

  pub fn root_instance(&self) -> InstanceId {
    self.snapshot.root
  }

  pub fn urls(&self) -> &CallbackUrls {
    &self.env.urls
  }

  /// Live instances of the given activity, in creation order.
  pub fn instances_of(&self, activity_id: &str) -> Vec<InstanceId> {
    self
      .snapshot
      .instances
      .values()
      .filter(|i| i.activity_id == activity_id && i.is_live())
      .map(|i| i.id)
      .collect()
  }

  /// The first redirect bookmark created during the current turn.
  pub fn pending_redirect(&self) -> Option<&Bookmark> {
    self
      .snapshot
      .bookmarks
      .iter()
      .find(|b| b.redirect && b.turn == self.snapshot.turn)
  }

  /// Consume a bookmark and queue its callback with `data`.
  ///
  /// The callback runs on the next call to [`run`](Self::run).
  pub fn resume(&mut self, name: &str, data: EventData) -> Result<(), RuntimeError> {
    let bookmark = self
      .snapshot
      .bookmarks
      .take(name)
      .ok_or_else(|| RuntimeError::UnknownBookmark(name.to_string()))?;

    let Some(owner) = self
      .snapshot
      .instances
      .get_mut(&bookmark.owner)
      .filter(|i| i.is_live())
    else {
      return Err(RuntimeError::UnknownBookmark(name.to_string()));
    };
    owner.bookmarks.retain(|b| b != name);

    info!(
      execution_id = %self.snapshot.execution_id,
      bookmark = %name,
      callback = %bookmark.callback,
      "bookmark_resumed"
    );
    self.notify(ExecutionEvent::BookmarkResumed {
      execution_id: self.snapshot.execution_id.clone(),
      bookmark: name.to_string(),
    });

    if self.snapshot.status == WorkflowStatus::Idle {
      self.snapshot.status = WorkflowStatus::Running;
    }
    self.queue.push_back(WorkItem::Resume {
      instance: bookmark.owner,
      callback: bookmark.callback,
      data,
      scope: bookmark.scope,
    });
    Ok(())
  }

  /// Run queued work until the execution is idle or closed.
  ///
  /// An unhandled fault returns [`RuntimeError::Unhandled`]; the state of
  /// this instance should then be discarded rather than persisted.
  pub fn run(&mut self, cancel: &CancellationToken) -> Result<RunStatus, RuntimeError> {
    while let Some(item) = self.queue.pop_front() {
      if cancel.is_cancelled() {
        return Err(RuntimeError::Cancelled);
      }
      self.dispatch(item)?;
    }

    match self.snapshot.status {
      WorkflowStatus::Closed => Ok(RunStatus::Completed),
      WorkflowStatus::Canceled => Ok(RunStatus::Canceled),
      _ => {
        self.snapshot.status = WorkflowStatus::Idle;
        info!(
          execution_id = %self.snapshot.execution_id,
          pending_bookmarks = self.snapshot.bookmarks.len(),
          "workflow_idle"
        );
        self.notify(ExecutionEvent::WorkflowIdle {
          execution_id: self.snapshot.execution_id.clone(),
          pending_bookmarks: self.snapshot.bookmarks.len(),
        });
        Ok(RunStatus::Idle)
      }
    }
  }

  /// Cancel an instance and everything below it.
  ///
  /// Bookmarks of the whole subtree are removed first, then instances are
  /// torn down children before parents. Canceling a closed or unknown
  /// instance does nothing.
  pub fn cancel(&mut self, instance: InstanceId) {
    self.cancel_subtree(instance, true);
  }

  fn dispatch(&mut self, item: WorkItem) -> Result<(), RuntimeError> {
    let target = item.target();
    let Some(activity) = self.live_activity(target)? else {
      debug!(instance = %target, "skipping work for inactive instance");
      return Ok(());
    };
    let behavior = activities::behavior(&activity.kind);

    let result = match item {
      WorkItem::Execute { instance } => {
        self.set_state(instance, ActivityState::Executing);
        debug!(
          execution_id = %self.snapshot.execution_id,
          activity_id = %activity.activity_id,
          instance = %instance,
          "activity_started"
        );
        self.notify(ExecutionEvent::ActivityStarted {
          execution_id: self.snapshot.execution_id.clone(),
          activity_id: activity.activity_id.clone(),
        });
        let mut ctx = ActivityContext::new(self, instance, activity, None);
        behavior.execute(&mut ctx)
      }
      WorkItem::Resume {
        instance,
        callback,
        data,
        scope,
      } => {
        self.set_state(instance, ActivityState::Executing);
        let mut ctx = ActivityContext::new(self, instance, activity, scope);
        behavior.on_resume(&mut ctx, callback, &data)
      }
      WorkItem::ChildCompleted {
        parent,
        callback,
        child,
      } => {
        let mut ctx = ActivityContext::new(self, parent, activity, None);
        behavior.on_child_completed(&mut ctx, callback, &child)
      }
      WorkItem::ChildFaulted {
        parent,
        callback,
        fault,
      } => {
        let canceled = fault.is_canceled();
        let mut ctx = ActivityContext::new(self, parent, activity, None);
        match behavior.on_child_faulted(&mut ctx, callback, fault) {
          Err(e) if canceled => {
            warn!(
              activity_id = %activity.activity_id,
              error = %e,
              "ignoring fault raised while handling a canceled child"
            );
            Ok(())
          }
          other => other,
        }
      }
    };

    self.settle(target, result)
  }

  fn live_activity(&self, id: InstanceId) -> Result<Option<&'f Activity>, RuntimeError> {
    let flow: &'f Flow = self.flow;
    match self.snapshot.instances.get(&id) {
      Some(instance) if instance.is_live() => Ok(Some(flow.get_activity(&instance.activity_id)?)),
      _ => Ok(None),
    }
  }

  fn set_state(&mut self, id: InstanceId, state: ActivityState) {
    if let Some(instance) = self.snapshot.instances.get_mut(&id) {
      instance.state = state;
    }
  }

  fn settle(&mut self, id: InstanceId, result: Result<(), ActivityError>) -> Result<(), RuntimeError> {
    match result {
      Ok(()) => {
        self.try_close(id);
        Ok(())
      }
      Err(error) => self.fault(id, None, error),
    }
  }

  /// Close the instance if nothing is outstanding, otherwise record whether
  /// it is executing children or blocked on bookmarks.
  fn try_close(&mut self, id: InstanceId) {
    let Some(instance) = self.snapshot.instances.get_mut(&id) else {
      return;
    };
    if !instance.is_live() {
      return;
    }
    if !instance.children.is_empty() {
      instance.state = ActivityState::Executing;
      return;
    }
    if !instance.bookmarks.is_empty() {
      instance.state = ActivityState::Blocked;
      return;
    }

    instance.state = ActivityState::Closed;
    let parent = instance.parent;
    let on_complete = instance.on_complete;
    let activity_id = instance.activity_id.clone();
    let output = instance.output.clone();

    debug!(
      execution_id = %self.snapshot.execution_id,
      activity_id = %activity_id,
      instance = %id,
      "activity_closed"
    );
    self.notify(ExecutionEvent::ActivityClosed {
      execution_id: self.snapshot.execution_id.clone(),
      activity_id: activity_id.clone(),
      output: output.clone(),
    });

    if id == self.snapshot.root {
      self.snapshot.status = WorkflowStatus::Closed;
      self.snapshot.output = output;
      info!(execution_id = %self.snapshot.execution_id, "workflow_completed");
      self.notify(ExecutionEvent::WorkflowCompleted {
        execution_id: self.snapshot.execution_id.clone(),
      });
      return;
    }

    self.snapshot.instances.remove(&id);
    let Some(parent) = parent else {
      return;
    };
    if let Some(p) = self.snapshot.instances.get_mut(&parent) {
      p.children.retain(|c| *c != id);
    }
    match on_complete {
      Some(callback) => self.queue.push_back(WorkItem::ChildCompleted {
        parent,
        callback,
        child: ChildOutcome {
          instance: id,
          activity_id,
          output,
        },
      }),
      None => self.try_close(parent),
    }
  }

  /// Fault an instance. `origin` is the activity the error was raised in
  /// when it is climbing through ancestors without a fault callback.
  fn fault(
    &mut self,
    id: InstanceId,
    origin: Option<String>,
    error: ActivityError,
  ) -> Result<(), RuntimeError> {
    let Some(instance) = self.snapshot.instances.get(&id) else {
      return Ok(());
    };
    if !instance.is_live() {
      return Ok(());
    }
    let activity_id = instance.activity_id.clone();
    let children = instance.children.clone();

    warn!(
      execution_id = %self.snapshot.execution_id,
      activity_id = %activity_id,
      error = %error,
      "activity_faulted"
    );
    self.notify(ExecutionEvent::ActivityFaulted {
      execution_id: self.snapshot.execution_id.clone(),
      activity_id: activity_id.clone(),
      error: error.to_string(),
    });

    for child in children {
      self.cancel_subtree(child, false);
    }
    self
      .snapshot
      .bookmarks
      .remove_owned_by(&HashSet::from([id]));

    let Some(instance) = self.snapshot.instances.get_mut(&id) else {
      return Ok(());
    };
    instance.state = ActivityState::Faulted;
    instance.bookmarks.clear();
    instance.children.clear();
    let parent = instance.parent;
    let on_fault = instance.on_fault;

    let Some(parent) = parent.filter(|_| id != self.snapshot.root) else {
      self.snapshot.status = WorkflowStatus::Aborted;
      self.notify(ExecutionEvent::WorkflowAborted {
        execution_id: self.snapshot.execution_id.clone(),
        error: error.to_string(),
      });
      return Err(RuntimeError::Unhandled {
        activity_id: origin.unwrap_or(activity_id),
        source: error,
      });
    };

    self.snapshot.instances.remove(&id);
    if let Some(p) = self.snapshot.instances.get_mut(&parent) {
      p.children.retain(|c| *c != id);
    }
    match on_fault {
      Some(callback) => {
        self.queue.push_back(WorkItem::ChildFaulted {
          parent,
          callback,
          fault: ChildFault {
            instance: id,
            activity_id,
            reason: FaultReason::Error(error),
          },
        });
        Ok(())
      }
      None => self.fault(parent, Some(origin.unwrap_or(activity_id)), error),
    }
  }

  /// Tear down `id` and its descendants.
  ///
  /// `close_parent` lets the parent close if the canceled child was its last
  /// piece of outstanding work. It is off when the parent itself asked for
  /// the cancellation, since its handler is still running.
  pub(crate) fn cancel_subtree(&mut self, id: InstanceId, close_parent: bool) {
    match self.snapshot.instances.get(&id) {
      Some(instance) if instance.is_live() => {}
      _ => return,
    }

    let mut subtree = Vec::new();
    self.collect_subtree(id, &mut subtree);
    let members: HashSet<InstanceId> = subtree.iter().copied().collect();

    let removed = self.snapshot.bookmarks.remove_owned_by(&members);
    self.queue.retain(|item| !members.contains(&item.target()));
    debug!(
      execution_id = %self.snapshot.execution_id,
      instance = %id,
      instances = subtree.len(),
      bookmarks = removed.len(),
      "canceling subtree"
    );

    let root_node = self.snapshot.document.root();
    for member in subtree {
      let instance = if member == self.snapshot.root {
        let Some(root) = self.snapshot.instances.get_mut(&member) else {
          continue;
        };
        root.state = ActivityState::Canceled;
        root.children.clear();
        root.bookmarks.clear();
        self.snapshot.status = WorkflowStatus::Canceled;
        root.clone()
      } else {
        let Some(mut instance) = self.snapshot.instances.remove(&member) else {
          continue;
        };
        instance.state = ActivityState::Canceled;
        instance
      };

      // Output written into this instance's own element is incomplete.
      if let Some(node) = instance
        .scope
        .as_deref()
        .and_then(|scope| self.snapshot.document.find_scope(scope))
        .filter(|node| *node != root_node)
      {
        self.snapshot.document.detach(node);
      }

      self.notify(ExecutionEvent::ActivityCanceled {
        execution_id: self.snapshot.execution_id.clone(),
        activity_id: instance.activity_id.clone(),
      });

      let Some(parent) = instance.parent.filter(|p| !members.contains(p)) else {
        continue;
      };
      let Some(p) = self.snapshot.instances.get_mut(&parent) else {
        continue;
      };
      p.children.retain(|c| *c != member);
      if !p.is_live() {
        continue;
      }
      match instance.on_fault {
        Some(callback) => self.queue.push_back(WorkItem::ChildFaulted {
          parent,
          callback,
          fault: ChildFault {
            instance: member,
            activity_id: instance.activity_id.clone(),
            reason: FaultReason::Canceled,
          },
        }),
        None if close_parent => self.try_close(parent),
        None => {}
      }
    }
  }

  /// Post-order walk: children before their parent.
  fn collect_subtree(&self, id: InstanceId, out: &mut Vec<InstanceId>) {
    if let Some(instance) = self.snapshot.instances.get(&id) {
      for child in &instance.children {
        self.collect_subtree(*child, out);
      }
    }
    out.push(id);
  }

  pub(crate) fn schedule(
    &mut self,
    parent: InstanceId,
    activity_id: &str,
    on_complete: Option<Callback>,
    on_fault: Option<Callback>,
  ) -> InstanceId {
    let id = InstanceId(self.snapshot.next_instance_id);
    self.snapshot.next_instance_id += 1;

    self.snapshot.instances.insert(
      id,
      ActivityInstance::new(
        id,
        activity_id.to_string(),
        Some(parent),
        on_complete,
        on_fault,
      ),
    );
    if let Some(p) = self.snapshot.instances.get_mut(&parent) {
      p.children.push(id);
    }
    self.queue.push_back(WorkItem::Execute { instance: id });
    id
  }

  /// Nearest scope id set on the instance or one of its ancestors.
  pub(crate) fn frame_scope(&self, id: InstanceId) -> Option<&str> {
    let mut current = self.snapshot.instances.get(&id);
    while let Some(instance) = current {
      if let Some(scope) = instance.scope.as_deref() {
        return Some(scope);
      }
      current = instance
        .parent
        .and_then(|p| self.snapshot.instances.get(&p));
    }
    None
  }

  /// Template context for an instance: arguments, variables and the frame
  /// data of the instance and its ancestors (nearest wins).
  pub(crate) fn template_context(&self, id: InstanceId) -> serde_json::Value {
    let mut context = serde_json::Map::new();
    let mut current = self.snapshot.instances.get(&id);
    while let Some(instance) = current {
      for (key, value) in &instance.frame {
        context
          .entry(key.clone())
          .or_insert_with(|| value.clone());
      }
      current = instance
        .parent
        .and_then(|p| self.snapshot.instances.get(&p));
    }

    context.insert(
      "args".to_string(),
      serde_json::to_value(&self.snapshot.arguments).unwrap_or_default(),
    );
    context.insert(
      "vars".to_string(),
      serde_json::to_value(&self.snapshot.variables).unwrap_or_default(),
    );
    serde_json::Value::Object(context)
  }

  pub(crate) fn notify(&self, event: ExecutionEvent) {
    self.notifier.notify(event);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use switchboard_config::FlowDef;
  use url::Url;

  fn gather_flow() -> Flow {
    let def: FlowDef = serde_json::from_value(json!({
      "flow_id": "test",
      "name": "Test",
      "root": { "type": "gather", "num_digits": 1 },
    }))
    .unwrap();
    Flow::from_def(def).unwrap()
  }

  fn blocked_gather(flow: &Flow) -> WorkflowInstance<'_> {
    let env = TurnEnv::new(
      CallContext::default(),
      CallbackUrls::new(Url::parse("http://www.tempuri.org/wf").unwrap(), "exec-1"),
    );
    let mut workflow = WorkflowInstance::start(flow, "exec-1", BTreeMap::new(), env).unwrap();
    assert_eq!(workflow.run(&CancellationToken::new()).unwrap(), RunStatus::Idle);
    workflow
  }

  fn child_faulted(workflow: &mut WorkflowInstance<'_>, reason: FaultReason) {
    let parent = workflow.root_instance();
    workflow.queue.push_back(WorkItem::ChildFaulted {
      parent,
      callback: Callback::WaitFaulted,
      fault: ChildFault {
        instance: InstanceId(99),
        activity_id: "1.1".to_string(),
        reason,
      },
    });
  }

  #[test]
  fn test_fault_while_handling_canceled_child_is_swallowed() {
    let flow = gather_flow();
    let mut workflow = blocked_gather(&flow);

    child_faulted(&mut workflow, FaultReason::Canceled);

    assert_eq!(workflow.run(&CancellationToken::new()).unwrap(), RunStatus::Idle);
    let root = workflow.root_instance();
    assert_eq!(
      workflow.instance(root).map(|i| i.state),
      Some(ActivityState::Blocked)
    );
    assert_eq!(workflow.bookmarks().len(), 1);
  }

  #[test]
  fn test_fault_while_handling_faulted_child_propagates() {
    let flow = gather_flow();
    let mut workflow = blocked_gather(&flow);

    child_faulted(
      &mut workflow,
      FaultReason::Error(ActivityError::MalformedEvent {
        field: "Digits".to_string(),
        value: "x".to_string(),
      }),
    );

    let err = workflow.run(&CancellationToken::new()).unwrap_err();
    assert!(matches!(err, RuntimeError::Unhandled { ref activity_id, .. } if activity_id == "1"));
    assert_eq!(workflow.status(), WorkflowStatus::Aborted);
  }
}
