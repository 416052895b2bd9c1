use serde::{Deserialize, Serialize};

use crate::activity::ActivityDef;

/// A complete call flow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDef {
  pub flow_id: String,
  pub name: String,
  /// The root activity. Flows served to callers use a `call_scope` root.
  pub root: ActivityDef,
}
