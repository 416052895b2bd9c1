use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("activity not found: {0}")]
  ActivityNotFound(String),

  #[error("flow failed validation: {}", format_errors(.0))]
  Invalid(Vec<ValidationError>),

  #[error("failed to serialize flow definition: {0}")]
  Serialization(#[from] serde_json::Error),
}

/// A structural problem found in a flow definition.
///
/// Every variant carries the id of the offending activity, using the same
/// numbering as the locked [`crate::Flow`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("{activity_id}: Dial requires at least one noun")]
  DialWithoutNoun { activity_id: String },

  #[error("{activity_id}: '{found}' cannot be used as a Dial noun")]
  NotANoun { activity_id: String, found: String },

  #[error("{activity_id}: '{noun}' must be placed inside a Dial")]
  NounOutsideDial { activity_id: String, noun: String },

  #[error("{activity_id}: CallScope cannot be nested inside another CallScope")]
  NestedCallScope { activity_id: String },

  #[error("{activity_id}: Leave must be placed inside an Enqueue")]
  LeaveOutsideEnqueue { activity_id: String },

  #[error("{activity_id}: Sip requires at least one uri")]
  SipWithoutUri { activity_id: String },

  #[error("{activity_id}: finish_on_key '{key}' must be a digit, '#' or '*'")]
  InvalidFinishOnKey { activity_id: String, key: char },

  #[error("{activity_id}: num_digits must be at least 1")]
  InvalidNumDigits { activity_id: String },
}

fn format_errors(errors: &[ValidationError]) -> String {
  errors
    .iter()
    .map(|e| e.to_string())
    .collect::<Vec<_>>()
    .join("; ")
}
