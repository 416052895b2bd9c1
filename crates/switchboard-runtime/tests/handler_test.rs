//! Integration tests for CallHandler turns against an in-memory store.

use serde_json::json;
use switchboard_config::FlowDef;
use switchboard_runtime::{
  BOOKMARK_KEY, CallHandler, EventData, INSTANCE_KEY, RuntimeConfig, RuntimeError, TurnStatus,
};
use switchboard_store::{MemoryStore, Store};
use switchboard_workflow::Flow;
use tokio_util::sync::CancellationToken;
use url::Url;

const BASE_URL: &str = "http://www.tempuri.org/wf";

fn flow(root: serde_json::Value) -> Flow {
  let def: FlowDef = serde_json::from_value(json!({
    "flow_id": "support-line",
    "name": "Support line",
    "root": root,
  }))
  .unwrap();
  Flow::from_def(def).unwrap()
}

fn handler(root: serde_json::Value) -> CallHandler<MemoryStore> {
  let config = RuntimeConfig::new(Url::parse(BASE_URL).unwrap());
  CallHandler::new(flow(root), MemoryStore::new(), config).unwrap()
}

fn data(entries: &[(&str, &str)]) -> EventData {
  entries
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// The query of the last `<Redirect>` in a response, as the platform would
/// post it back.
fn follow_redirect(markup: &str) -> EventData {
  let start = markup.rfind("<Redirect>").unwrap() + "<Redirect>".len();
  let end = markup.rfind("</Redirect>").unwrap();
  let url = Url::parse(&markup[start..end].replace("&amp;", "&")).unwrap();
  url.query_pairs().into_owned().collect()
}

fn greeting_flow() -> serde_json::Value {
  json!({
    "type": "call_scope",
    "body": {
      "type": "sequence",
      "activities": [
        { "type": "say", "text": "Hello {{ args.Name }}" },
        { "type": "pause", "duration_secs": 10 },
        { "type": "say", "text": "Goodbye" }
      ]
    }
  })
}

#[tokio::test]
async fn test_fresh_start_redirects_to_pause_bookmark() {
  let handler = handler(greeting_flow());

  let response = handler
    .handle(
      data(&[("arg_Name", "Ada"), ("CallSid", "CA1"), ("Direction", "inbound")]),
      CancellationToken::new(),
    )
    .await
    .unwrap();

  assert_eq!(response.status, TurnStatus::Idle);
  let next = follow_redirect(&response.markup);
  assert_eq!(next.get(INSTANCE_KEY), Some(&response.execution_id));
  let bookmark = next.get(BOOKMARK_KEY).unwrap();
  assert!(bookmark.ends_with("_Pause_pause_elapsed"));

  let redirect = Url::parse(BASE_URL)
    .map(|mut url| {
      url
        .query_pairs_mut()
        .append_pair(INSTANCE_KEY, &response.execution_id)
        .append_pair(BOOKMARK_KEY, bookmark);
      url.as_str().replace('&', "&amp;")
    })
    .unwrap();
  assert_eq!(
    response.markup,
    format!(
      "<Response><Say>Hello Ada</Say><Pause length=\"10\" /><Redirect>{}</Redirect></Response>",
      redirect
    )
  );

  let state = handler
    .store()
    .load_state(&response.execution_id)
    .await
    .unwrap()
    .unwrap();
  assert!(state.contains_key("state_parts"));
  assert!(state.contains_key("state_p0"));

  let record = handler
    .store()
    .get_execution(&response.execution_id)
    .await
    .unwrap();
  assert_eq!(record.flow_id, "support-line");
  assert_eq!(record.turn, 1);
  assert_eq!(record.pending_bookmarks, 1);
}

#[tokio::test]
async fn test_completion_hangs_up_and_deletes_state() {
  let handler = handler(greeting_flow());
  let first = handler
    .handle(data(&[("arg_Name", "Ada")]), CancellationToken::new())
    .await
    .unwrap();

  let second = handler
    .handle(follow_redirect(&first.markup), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(second.execution_id, first.execution_id);
  assert_eq!(second.status, TurnStatus::Completed);
  assert_eq!(
    second.markup,
    "<Response><Say>Goodbye</Say><Hangup /></Response>"
  );
  assert!(
    handler
      .store()
      .load_state(&first.execution_id)
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn test_idle_turn_without_output_polls_execution() {
  let handler = handler(json!({
    "type": "call_scope",
    "body": {
      "type": "gather",
      "num_digits": 1,
      "body": { "type": "pause", "duration_secs": 3 }
    }
  }));
  let first = handler
    .handle(EventData::new(), CancellationToken::new())
    .await
    .unwrap();

  let second = handler
    .handle(follow_redirect(&first.markup), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(second.status, TurnStatus::Idle);
  assert_eq!(
    second.markup,
    format!(
      "<Response><Pause length=\"2\" /><Redirect>{}?{}={}</Redirect></Response>",
      BASE_URL, INSTANCE_KEY, first.execution_id
    )
  );
}

#[tokio::test]
async fn test_unknown_bookmark_leaves_state_untouched() {
  let handler = handler(greeting_flow());
  let first = handler
    .handle(EventData::new(), CancellationToken::new())
    .await
    .unwrap();
  let before = handler
    .store()
    .load_state(&first.execution_id)
    .await
    .unwrap();

  let event = data(&[
    (INSTANCE_KEY, first.execution_id.as_str()),
    (BOOKMARK_KEY, "123_9_Gather_digits_received"),
  ]);
  let err = handler
    .handle(event.clone(), CancellationToken::new())
    .await
    .unwrap_err();
  assert!(matches!(err, RuntimeError::UnknownBookmark(_)));

  let response = handler
    .handle_or_hangup(event, CancellationToken::new())
    .await;
  assert_eq!(response.status, TurnStatus::Failed);
  assert_eq!(response.markup, "<Response><Hangup /></Response>");

  let after = handler
    .store()
    .load_state(&first.execution_id)
    .await
    .unwrap();
  assert_eq!(before, after);
}

#[tokio::test]
async fn test_unknown_execution() {
  let handler = handler(greeting_flow());

  let err = handler
    .handle(data(&[(INSTANCE_KEY, "missing")]), CancellationToken::new())
    .await
    .unwrap_err();

  assert!(matches!(err, RuntimeError::UnknownExecution(ref id) if id == "missing"));
}

#[tokio::test]
async fn test_cancelled_turn_saves_nothing() {
  let handler = handler(greeting_flow());
  let cancel = CancellationToken::new();
  cancel.cancel();

  let err = handler.handle(EventData::new(), cancel).await.unwrap_err();

  assert!(matches!(err, RuntimeError::Cancelled));
  assert!(handler.store().list_executions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unhandled_fault_hangs_up() {
  let handler = handler(json!({
    "type": "call_scope",
    "body": { "type": "say", "text": "{{ args.Name" }
  }));

  let response = handler
    .handle_or_hangup(EventData::new(), CancellationToken::new())
    .await;

  assert_eq!(response.status, TurnStatus::Failed);
  assert_eq!(response.markup, "<Response><Hangup /></Response>");
  assert!(handler.store().list_executions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_call_direction() {
  let handler = handler(greeting_flow());

  let err = handler
    .handle(data(&[("Direction", "sideways")]), CancellationToken::new())
    .await
    .unwrap_err();

  assert!(matches!(err, RuntimeError::InvalidCallContext { .. }));
}

#[test]
fn test_handler_requires_call_scope_root() {
  let config = RuntimeConfig::new(Url::parse(BASE_URL).unwrap());
  let result = CallHandler::new(
    flow(json!({ "type": "say", "text": "Hello" })),
    MemoryStore::new(),
    config,
  );

  assert!(matches!(result, Err(RuntimeError::InvalidFlow { .. })));
}
