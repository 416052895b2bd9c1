//! Integration tests for the execution core: bookmarks, cancellation,
//! faults and persistence of a suspended instance.

use std::collections::BTreeMap;

use serde_json::json;
use switchboard_config::FlowDef;
use switchboard_runtime::{
  ActivityState, CallContext, Callback, CallbackUrls, ChannelNotifier, EventData, ExecutionEvent,
  RunStatus, RuntimeError, Snapshot, TurnEnv, WorkflowInstance, WorkflowStatus,
};
use switchboard_workflow::Flow;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

const EXECUTION_ID: &str = "exec-1";

fn flow(root: serde_json::Value) -> Flow {
  let def: FlowDef = serde_json::from_value(json!({
    "flow_id": "test-flow",
    "name": "Test flow",
    "root": root,
  }))
  .unwrap();
  Flow::from_def(def).unwrap()
}

fn env() -> TurnEnv {
  TurnEnv::new(
    CallContext::default(),
    CallbackUrls::new(Url::parse("http://www.tempuri.org/wf").unwrap(), EXECUTION_ID),
  )
}

fn start(flow: &Flow) -> WorkflowInstance<'_> {
  WorkflowInstance::start(flow, EXECUTION_ID, BTreeMap::new(), env()).unwrap()
}

fn bookmark_for(workflow: &WorkflowInstance<'_>, callback: Callback) -> String {
  workflow
    .bookmarks()
    .iter()
    .find(|b| b.callback == callback)
    .map(|b| b.name.clone())
    .unwrap()
}

fn gather_with_pause() -> Flow {
  flow(json!({
    "type": "gather",
    "body": {
      "type": "sequence",
      "activities": [
        { "type": "pause", "duration_secs": 1 },
        { "type": "say", "text": "Still there?" }
      ]
    }
  }))
}

#[test]
fn test_bookmark_resumes_exactly_once() {
  let flow = flow(json!({ "type": "pause", "duration_secs": 5 }));
  let mut workflow = start(&flow);
  workflow.run(&CancellationToken::new()).unwrap();
  let bookmark = bookmark_for(&workflow, Callback::PauseElapsed);

  workflow.begin_turn();
  workflow.resume(&bookmark, EventData::new()).unwrap();
  assert!(workflow.bookmarks().is_empty());

  let err = workflow.resume(&bookmark, EventData::new()).unwrap_err();
  assert!(matches!(err, RuntimeError::UnknownBookmark(ref name) if *name == bookmark));

  assert_eq!(
    workflow.run(&CancellationToken::new()).unwrap(),
    RunStatus::Completed
  );
}

#[test]
fn test_unknown_bookmark() {
  let flow = flow(json!({ "type": "pause", "duration_secs": 5 }));
  let mut workflow = start(&flow);
  workflow.run(&CancellationToken::new()).unwrap();

  let err = workflow
    .resume("123_0_Pause_pause_elapsed", EventData::new())
    .unwrap_err();

  assert!(matches!(err, RuntimeError::UnknownBookmark(_)));
  assert_eq!(workflow.bookmarks().len(), 1);
}

#[test]
fn test_resume_observes_event_data() {
  let flow = flow(json!({ "type": "gather", "result": "menu" }));
  let mut workflow = start(&flow);
  workflow.run(&CancellationToken::new()).unwrap();
  let bookmark = bookmark_for(&workflow, Callback::DigitsReceived);

  let event: EventData = [("Digits", "42"), ("CallSid", "CA1")]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
  workflow.begin_turn();
  workflow.resume(&bookmark, event).unwrap();
  workflow.run(&CancellationToken::new()).unwrap();

  assert_eq!(workflow.variables().get("menu"), Some(&json!({ "digits": "42" })));
}

#[test]
fn test_cancel_is_total_and_idempotent() {
  let flow = flow(json!({
    "type": "dial",
    "nouns": [
      { "type": "number", "number": "+15550100" },
      { "type": "queue", "queue": "support", "pickup": { "type": "say", "text": "Hi" } }
    ]
  }));
  let mut workflow = start(&flow);
  workflow.run(&CancellationToken::new()).unwrap();
  assert_eq!(workflow.bookmarks().len(), 2);
  let pickup = bookmark_for(&workflow, Callback::PickupRequested);

  let root = workflow.root_instance();
  workflow.cancel(root);

  assert!(workflow.bookmarks().is_empty());
  assert_eq!(workflow.status(), WorkflowStatus::Canceled);
  assert_eq!(
    workflow.instance(root).map(|i| i.state),
    Some(ActivityState::Canceled)
  );
  // The partially written Dial is removed from the response.
  assert_eq!(workflow.document().to_markup(), "<Response />");
  assert!(matches!(
    workflow.resume(&pickup, EventData::new()),
    Err(RuntimeError::UnknownBookmark(_))
  ));

  workflow.cancel(root);
  assert_eq!(workflow.status(), WorkflowStatus::Canceled);
  assert_eq!(
    workflow.run(&CancellationToken::new()).unwrap(),
    RunStatus::Canceled
  );
}

#[test]
fn test_cancel_child_notifies_parent() {
  let flow = gather_with_pause();
  let mut workflow = start(&flow);
  workflow.run(&CancellationToken::new()).unwrap();
  assert_eq!(workflow.bookmarks().len(), 2);

  let body = workflow.instances_of("1.1");
  assert_eq!(body.len(), 1);
  workflow.cancel(body[0]);

  assert!(workflow.instances_of("1.1.1").is_empty());
  assert_eq!(workflow.bookmarks().len(), 1);
  assert_eq!(
    workflow.bookmarks().iter().next().map(|b| b.callback),
    Some(Callback::DigitsReceived)
  );

  // The gather handles the canceled body and keeps waiting for digits.
  assert_eq!(
    workflow.run(&CancellationToken::new()).unwrap(),
    RunStatus::Idle
  );
  let root = workflow.root_instance();
  assert_eq!(
    workflow.instance(root).map(|i| i.state),
    Some(ActivityState::Blocked)
  );
}

#[test]
fn test_digits_cancel_suspended_body() {
  let flow = gather_with_pause();
  let mut workflow = start(&flow);
  workflow.run(&CancellationToken::new()).unwrap();
  let digits = bookmark_for(&workflow, Callback::DigitsReceived);
  let pause = bookmark_for(&workflow, Callback::PauseElapsed);

  workflow.begin_turn();
  workflow
    .resume(&digits, [("Digits".to_string(), "9".to_string())].into())
    .unwrap();

  assert_eq!(
    workflow.run(&CancellationToken::new()).unwrap(),
    RunStatus::Completed
  );
  assert_eq!(workflow.document().to_markup(), "<Response />");
  assert!(matches!(
    workflow.resume(&pause, EventData::new()),
    Err(RuntimeError::UnknownBookmark(_))
  ));
}

#[test]
fn test_scope_survives_persistence() {
  let flow = gather_with_pause();
  let mut workflow = start(&flow);
  workflow.run(&CancellationToken::new()).unwrap();
  let digits = bookmark_for(&workflow, Callback::DigitsReceived);
  let pause = bookmark_for(&workflow, Callback::PauseElapsed);

  // Small chunks force the state across several entries.
  let blob = workflow.snapshot().to_blob(64).unwrap();
  assert!(blob.len() > 2);
  let snapshot = Snapshot::from_blob(&blob).unwrap();
  assert_eq!(&snapshot, workflow.snapshot());

  let mut restored = WorkflowInstance::load(&flow, snapshot, env()).unwrap();
  restored.resume(&pause, EventData::new()).unwrap();
  restored.run(&CancellationToken::new()).unwrap();

  let url = restored
    .urls()
    .bookmark_url(&digits)
    .as_str()
    .replace('&', "&amp;");
  assert_eq!(
    restored.document().to_markup(),
    format!(
      "<Response><Gather action=\"{url}\"><Pause length=\"1\" /><Say>Still there?</Say></Gather>\
       <Redirect>{url}</Redirect></Response>"
    )
  );
}

#[test]
fn test_new_turn_falls_back_to_root() {
  let flow = gather_with_pause();
  let mut workflow = start(&flow);
  workflow.run(&CancellationToken::new()).unwrap();
  let pause = bookmark_for(&workflow, Callback::PauseElapsed);

  workflow.begin_turn();
  workflow.resume(&pause, EventData::new()).unwrap();
  workflow.run(&CancellationToken::new()).unwrap();

  assert_eq!(
    workflow.document().to_markup(),
    "<Response><Say>Still there?</Say></Response>"
  );
}

#[test]
fn test_load_rejects_changed_flow() {
  let original = flow(json!({ "type": "pause", "duration_secs": 5 }));
  let mut workflow = start(&original);
  workflow.run(&CancellationToken::new()).unwrap();
  let snapshot = workflow.into_snapshot();

  let changed = flow(json!({ "type": "pause", "duration_secs": 10 }));
  let err = WorkflowInstance::load(&changed, snapshot, env()).err().unwrap();

  assert!(matches!(err, RuntimeError::FlowMismatch { .. }));
}

#[test]
fn test_unhandled_fault_aborts() {
  let flow = flow(json!({
    "type": "sequence",
    "activities": [
      { "type": "say", "text": "Hello" },
      { "type": "say", "text": "{{ args.Name" },
      { "type": "say", "text": "Never" }
    ]
  }));
  let (tx, mut rx) = mpsc::unbounded_channel();
  let notifier = ChannelNotifier::new(tx);
  let mut workflow = start(&flow).with_notifier(&notifier);

  let err = workflow.run(&CancellationToken::new()).unwrap_err();

  assert!(matches!(err, RuntimeError::Unhandled { ref activity_id, .. } if activity_id == "1.2"));
  assert_eq!(workflow.status(), WorkflowStatus::Aborted);

  let mut events = Vec::new();
  while let Ok(event) = rx.try_recv() {
    events.push(event);
  }
  assert!(events.iter().any(|e| matches!(
    e,
    ExecutionEvent::ActivityFaulted { activity_id, .. } if activity_id == "1.2"
  )));
  assert!(matches!(
    events.last(),
    Some(ExecutionEvent::WorkflowAborted { .. })
  ));
  assert!(!events.iter().any(|e| matches!(
    e,
    ExecutionEvent::ActivityStarted { activity_id, .. } if activity_id == "1.3"
  )));
}

#[test]
fn test_cancellation_token_stops_turn() {
  let flow = flow(json!({ "type": "say", "text": "Hello" }));
  let mut workflow = start(&flow);
  let cancel = CancellationToken::new();
  cancel.cancel();

  assert!(matches!(
    workflow.run(&cancel),
    Err(RuntimeError::Cancelled)
  ));
  assert_eq!(workflow.document().to_markup(), "<Response />");
}

#[test]
fn test_execution_without_bookmarks_is_deterministic() {
  let flow = flow(json!({
    "type": "sequence",
    "activities": [
      { "type": "say", "text": "Welcome {{ args.Name }}" },
      {
        "type": "switch",
        "value": "{{ args.Tier }}",
        "cases": { "gold": { "type": "play", "url": "gold.mp3" } },
        "default": { "type": "say", "text": "Please hold" }
      },
      { "type": "hangup" }
    ]
  }));
  let arguments = BTreeMap::from([
    ("Name".to_string(), "Ada".to_string()),
    ("Tier".to_string(), "gold".to_string()),
  ]);

  let run = || {
    let mut workflow =
      WorkflowInstance::start(&flow, EXECUTION_ID, arguments.clone(), env()).unwrap();
    assert_eq!(
      workflow.run(&CancellationToken::new()).unwrap(),
      RunStatus::Completed
    );
    workflow.document().to_markup()
  };

  let first = run();
  assert_eq!(first, run());
  assert_eq!(
    first,
    "<Response><Say>Welcome Ada</Say><Play>http://www.tempuri.org/gold.mp3</Play><Hangup /></Response>"
  );
}

#[test]
fn test_events_follow_activity_lifecycle() {
  let flow = flow(json!({ "type": "pause", "duration_secs": 1 }));
  let (tx, mut rx) = mpsc::unbounded_channel();
  let notifier = ChannelNotifier::new(tx);
  let mut workflow = start(&flow).with_notifier(&notifier);
  workflow.run(&CancellationToken::new()).unwrap();

  let mut events = Vec::new();
  while let Ok(event) = rx.try_recv() {
    events.push(event);
  }

  assert!(matches!(events[0], ExecutionEvent::ActivityStarted { .. }));
  assert!(matches!(events[1], ExecutionEvent::BookmarkCreated { .. }));
  assert_eq!(
    events[2],
    ExecutionEvent::WorkflowIdle {
      execution_id: EXECUTION_ID.to_string(),
      pending_bookmarks: 1,
    }
  );
}
