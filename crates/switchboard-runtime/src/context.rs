//! The handle activities use to act on their execution.
//!
//! Activities never touch the instance tree, the bookmark registry or the
//! response document directly. Each handler invocation receives an
//! [`ActivityContext`] bound to one activity instance; everything it
//! schedules, writes or bookmarks is attributed to that instance.

use serde::Serialize;
use switchboard_document::{Element, NodeId};
use switchboard_workflow::Activity;
use tracing::debug;
use url::Url;

use crate::bookmark::{Bookmark, bookmark_name};
use crate::call::CallContext;
use crate::error::ActivityError;
use crate::events::ExecutionEvent;
use crate::input;
use crate::instance::{ActivityInstance, Callback, InstanceId};
use crate::workflow::WorkflowInstance;

pub struct ActivityContext<'a, 'f> {
  workflow: &'a mut WorkflowInstance<'f>,
  instance: InstanceId,
  activity: &'f Activity,
  /// Scope recorded on the bookmark being resumed, if any.
  resume_scope: Option<String>,
}

impl<'a, 'f> ActivityContext<'a, 'f> {
  pub(crate) fn new(
    workflow: &'a mut WorkflowInstance<'f>,
    instance: InstanceId,
    activity: &'f Activity,
    resume_scope: Option<String>,
  ) -> Self {
    Self {
      workflow,
      instance,
      activity,
      resume_scope,
    }
  }

  pub fn instance_id(&self) -> InstanceId {
    self.instance
  }

  pub fn activity(&self) -> &'f Activity {
    self.activity
  }

  pub fn activity_id(&self) -> &'f str {
    &self.activity.activity_id
  }

  pub fn call(&self) -> &CallContext {
    &self.workflow.env.call
  }

  fn state(&self) -> Option<&ActivityInstance> {
    self.workflow.snapshot.instances.get(&self.instance)
  }

  fn state_mut(&mut self) -> Option<&mut ActivityInstance> {
    self.workflow.snapshot.instances.get_mut(&self.instance)
  }

  // Document

  /// The element this activity writes into.
  ///
  /// Resolution order: the activity's own scope, the scope captured on the
  /// bookmark being resumed, the nearest ancestor's scope, then the root.
  /// Scopes recorded in an earlier turn resolve to the root.
  pub fn current_element(&self) -> NodeId {
    let own = self.state().and_then(|s| s.scope.as_deref());
    let inherited = self
      .state()
      .and_then(|s| s.parent)
      .and_then(|p| self.workflow.frame_scope(p));

    let document = &self.workflow.snapshot.document;
    own
      .or(self.resume_scope.as_deref())
      .or(inherited)
      .map(|scope| document.find_scope_root(scope))
      .unwrap_or_else(|| document.root())
  }

  /// Make `node` the element this activity and its descendants write into.
  pub fn set_current_element(&mut self, node: NodeId) {
    let scope = self.workflow.snapshot.document.ensure_scope_id(node);
    if let Some(state) = self.state_mut() {
      state.scope = Some(scope);
    }
  }

  pub fn clear_current_element(&mut self) {
    if let Some(state) = self.state_mut() {
      state.scope = None;
    }
  }

  pub fn root_element(&self) -> NodeId {
    self.workflow.snapshot.document.root()
  }

  /// Append to the current element.
  pub fn append(&mut self, element: Element) -> NodeId {
    let parent = self.current_element();
    self.append_to(parent, element)
  }

  pub fn append_to(&mut self, parent: NodeId, element: Element) -> NodeId {
    self
      .workflow
      .snapshot
      .document
      .append_child(parent, element)
  }

  pub fn append_to_root(&mut self, element: Element) -> NodeId {
    let root = self.root_element();
    self.append_to(root, element)
  }

  pub fn has_elements(&self, node: NodeId) -> bool {
    self.workflow.snapshot.document.has_elements(node)
  }

  // Children

  /// Schedule a child activity. It runs after work already queued.
  pub fn schedule_child(
    &mut self,
    activity_id: &str,
    on_complete: Option<Callback>,
    on_fault: Option<Callback>,
  ) -> InstanceId {
    self
      .workflow
      .schedule(self.instance, activity_id, on_complete, on_fault)
  }

  /// Cancel every outstanding child. Fault callbacks registered for them
  /// are still delivered.
  pub fn cancel_children(&mut self) {
    let children = self
      .state()
      .map(|s| s.children.clone())
      .unwrap_or_default();
    for child in children {
      self.workflow.cancel_subtree(child, false);
    }
  }

  pub fn has_children(&self) -> bool {
    self.state().is_some_and(|s| !s.children.is_empty())
  }

  // Bookmarks

  /// Register a bookmark resumed through `callback`. Returns its name.
  pub fn create_bookmark(&mut self, callback: Callback) -> Result<String, ActivityError> {
    let name = bookmark_name(self.instance, &self.activity.display_name, callback);
    self.create_named_bookmark(name, callback, false)
  }

  /// Register a bookmark the turn should redirect to once it goes idle.
  pub fn create_redirect_bookmark(&mut self, callback: Callback) -> Result<String, ActivityError> {
    let name = bookmark_name(self.instance, &self.activity.display_name, callback);
    self.create_named_bookmark(name, callback, true)
  }

  /// Register a bookmark under an explicit name, typically re-arming one
  /// that was just consumed.
  pub fn create_named_bookmark(
    &mut self,
    name: String,
    callback: Callback,
    redirect: bool,
  ) -> Result<String, ActivityError> {
    let scope = self.workflow.frame_scope(self.instance).map(str::to_string);
    let turn = self.workflow.snapshot.turn;
    self.workflow.snapshot.bookmarks.create(Bookmark {
      name: name.clone(),
      owner: self.instance,
      callback,
      scope,
      redirect,
      turn,
    })?;
    if let Some(state) = self.state_mut() {
      state.bookmarks.push(name.clone());
    }

    debug!(
      activity_id = %self.activity.activity_id,
      bookmark = %name,
      callback = %callback,
      "bookmark_created"
    );
    self.workflow.notify(ExecutionEvent::BookmarkCreated {
      execution_id: self.workflow.snapshot.execution_id.clone(),
      bookmark: name.clone(),
    });
    Ok(name)
  }

  pub fn has_bookmark(&self, name: &str) -> bool {
    self.workflow.snapshot.bookmarks.contains(name)
  }

  /// Drop every outstanding bookmark of this activity.
  pub fn remove_all_bookmarks(&mut self) {
    let owner = std::collections::HashSet::from([self.instance]);
    self.workflow.snapshot.bookmarks.remove_owned_by(&owner);
    if let Some(state) = self.state_mut() {
      state.bookmarks.clear();
    }
  }

  pub fn bookmark_url(&self, name: &str) -> Url {
    self.workflow.env.urls.bookmark_url(name)
  }

  pub fn execution_url(&self) -> Url {
    self.workflow.env.urls.execution_url()
  }

  /// Resolve a url from the flow or from event data against the base url.
  pub fn resolve_url(&self, reference: &str) -> Result<Url, ActivityError> {
    self
      .workflow
      .env
      .urls
      .resolve(reference)
      .map_err(|e| ActivityError::InvalidUrl {
        url: reference.to_string(),
        message: e.to_string(),
      })
  }

  // Data

  /// Render a template field of this activity.
  pub fn render(&self, field: &str, template: &str) -> Result<String, ActivityError> {
    let context = self.workflow.template_context(self.instance);
    input::render(&self.activity.activity_id, field, template, &context)
  }

  pub fn render_opt(
    &self,
    field: &str,
    template: Option<&str>,
  ) -> Result<Option<String>, ActivityError> {
    template.map(|t| self.render(field, t)).transpose()
  }

  /// Expose a value to this activity's descendants' templates.
  pub fn set_frame_value(&mut self, key: &str, value: &impl Serialize) -> Result<(), ActivityError> {
    let value = serde_json::to_value(value)?;
    if let Some(state) = self.state_mut() {
      state.frame.insert(key.to_string(), value);
    }
    Ok(())
  }

  pub fn local(&self, key: &str) -> Option<&serde_json::Value> {
    self.state().and_then(|s| s.locals.get(key))
  }

  pub fn local_str(&self, key: &str) -> Option<&str> {
    self.local(key).and_then(|v| v.as_str())
  }

  pub fn set_local(&mut self, key: &str, value: impl Into<serde_json::Value>) {
    if let Some(state) = self.state_mut() {
      state.locals.insert(key.to_string(), value.into());
    }
  }

  pub fn set_variable(&mut self, name: &str, value: serde_json::Value) {
    self
      .workflow
      .snapshot
      .variables
      .insert(name.to_string(), value);
  }

  pub fn set_output(&mut self, value: Option<serde_json::Value>) {
    if let Some(state) = self.state_mut() {
      state.output = value;
    }
  }

  /// Record a result as this activity's output and, when `result_var` is
  /// set, as a workflow variable.
  pub fn finish(
    &mut self,
    result_var: Option<&str>,
    result: &impl Serialize,
  ) -> Result<(), ActivityError> {
    let value = serde_json::to_value(result)?;
    if let Some(name) = result_var {
      self.set_variable(name, value.clone());
    }
    self.set_output(Some(value));
    Ok(())
  }
}
