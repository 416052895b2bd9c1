//! Inbound event data.
//!
//! Each turn carries a flat map of the fields the platform posted. Activity
//! callbacks pull the fields they need out of it with the helpers here.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::ActivityError;

/// Fields posted by the platform for one turn.
pub type EventData = BTreeMap<String, String>;

/// A trimmed, non-empty field value.
pub(crate) fn field<'a>(data: &'a EventData, key: &str) -> Option<&'a str> {
  data
    .get(key)
    .map(|v| v.trim())
    .filter(|v| !v.is_empty())
}

/// An owned copy of [`field`].
pub(crate) fn string(data: &EventData, key: &str) -> Option<String> {
  field(data, key).map(str::to_string)
}

/// A numeric field. Missing or empty fields read as the default; present
/// values that do not parse are malformed.
pub(crate) fn number<T>(data: &EventData, key: &str) -> Result<T, ActivityError>
where
  T: FromStr + Default,
{
  match field(data, key) {
    None => Ok(T::default()),
    Some(value) => value.parse().map_err(|_| ActivityError::MalformedEvent {
      field: key.to_string(),
      value: value.to_string(),
    }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn data(entries: &[(&str, &str)]) -> EventData {
    entries
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }

  #[test]
  fn test_field_ignores_blank_values() {
    let data = data(&[("Digits", " 12 "), ("RecordingUrl", "  ")]);
    assert_eq!(field(&data, "Digits"), Some("12"));
    assert_eq!(field(&data, "RecordingUrl"), None);
    assert_eq!(field(&data, "Missing"), None);
  }

  #[test]
  fn test_number_defaults_when_missing() {
    let data = data(&[("DialCallDuration", "30")]);
    assert_eq!(number::<u64>(&data, "DialCallDuration").unwrap(), 30);
    assert_eq!(number::<u64>(&data, "RecordingDuration").unwrap(), 0);
  }

  #[test]
  fn test_number_rejects_garbage() {
    let data = data(&[("QueuePosition", "first")]);
    let err = number::<u32>(&data, "QueuePosition").unwrap_err();
    assert!(matches!(
      err,
      ActivityError::MalformedEvent { ref field, ref value }
        if field == "QueuePosition" && value == "first"
    ));
  }
}
