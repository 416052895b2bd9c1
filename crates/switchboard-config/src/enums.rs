use serde::{Deserialize, Serialize};

/// Voice used by the platform's text-to-speech engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Voice {
  Man,
  Woman,
}

impl Voice {
  pub fn as_str(&self) -> &'static str {
    match self {
      Voice::Man => "man",
      Voice::Woman => "woman",
    }
  }
}
