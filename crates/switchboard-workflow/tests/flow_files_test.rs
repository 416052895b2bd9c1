//! The flows shipped with the repository must lock cleanly.

use switchboard_config::FlowDef;
use switchboard_workflow::{ActivityKind, Flow, validate};

const SUPPORT_LINE: &str = include_str!("../../../flows/support-line.json");

#[test]
fn test_support_line_locks() {
  let def: FlowDef = serde_json::from_str(SUPPORT_LINE).unwrap();
  assert!(validate(&def).is_empty());

  let flow = Flow::from_def(def).unwrap();
  assert_eq!(flow.flow_id, "support-line");
  assert!(matches!(
    flow.root().unwrap().kind,
    ActivityKind::CallScope(_)
  ));

  let menu = flow.get_activity("1.1.2").unwrap();
  assert_eq!(menu.display_name, "Main menu");
  assert!(matches!(menu.kind, ActivityKind::Gather(_)));
}
