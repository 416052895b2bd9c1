//! Call context: who is calling whom.

use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;
use crate::event::{EventData, string};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDirection {
  Inbound,
  Outbound,
  #[default]
  Unknown,
}

/// One party of the call as reported by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
  pub number: Option<String>,
  pub city: Option<String>,
  pub state: Option<String>,
  pub zip: Option<String>,
  pub country: Option<String>,
}

impl Endpoint {
  fn from_event(data: &EventData, prefix: &str) -> Self {
    Self {
      number: string(data, prefix),
      city: string(data, &format!("{}City", prefix)),
      state: string(data, &format!("{}State", prefix)),
      zip: string(data, &format!("{}Zip", prefix)),
      country: string(data, &format!("{}Country", prefix)),
    }
  }
}

/// Immutable snapshot of the call's identity, captured by the call scope and
/// exposed to templates as `call`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
  pub account_sid: Option<String>,
  pub call_sid: Option<String>,
  pub direction: CallDirection,
  pub caller: Endpoint,
  pub called: Endpoint,
  pub from: Endpoint,
  pub to: Endpoint,
  pub locale: String,
}

impl CallContext {
  /// Read the call context from the fields posted with a turn.
  pub fn from_event(data: &EventData, default_locale: &str) -> Result<Self, RuntimeError> {
    let direction = match string(data, "Direction").as_deref() {
      None => CallDirection::Unknown,
      Some("inbound") => CallDirection::Inbound,
      Some(d) if d.starts_with("outbound") => CallDirection::Outbound,
      Some(other) => {
        return Err(RuntimeError::InvalidCallContext {
          message: format!("unrecognized call direction '{}'", other),
        });
      }
    };

    Ok(Self {
      account_sid: string(data, "AccountSid"),
      call_sid: string(data, "CallSid"),
      direction,
      caller: Endpoint::from_event(data, "Caller"),
      called: Endpoint::from_event(data, "Called"),
      from: Endpoint::from_event(data, "From"),
      to: Endpoint::from_event(data, "To"),
      locale: string(data, "Locale").unwrap_or_else(|| default_locale.to_string()),
    })
  }
}
