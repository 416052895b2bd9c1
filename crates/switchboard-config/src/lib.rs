//! Switchboard Config
//!
//! This crate contains the serializable call flow configuration types for
//! Switchboard. These types represent flow definitions before they are
//! validated and locked by `switchboard-workflow`.
//!
//! Flows are usually loaded from JSON files:
//!
//! ```json
//! {
//!   "flow_id": "support-line",
//!   "name": "Support line",
//!   "root": {
//!     "type": "call_scope",
//!     "body": { "type": "say", "text": "Hello {{ call.from.number }}" }
//!   }
//! }
//! ```

mod activity;
mod enums;
mod flow;
mod input;

pub use activity::{ActivityDef, ActivityType, SipUriDef};
pub use enums::Voice;
pub use flow::FlowDef;
pub use input::InputValue;
