//! Callback urls handed to the platform.

use url::Url;

/// Query key carrying the execution id.
pub const INSTANCE_KEY: &str = "wf_InstanceId";

/// Query key carrying the bookmark to resume.
pub const BOOKMARK_KEY: &str = "wf_Bookmark";

/// Form keys with this prefix become arguments of a new execution.
pub const ARGUMENT_PREFIX: &str = "arg_";

/// Builds urls that route the platform back to one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackUrls {
  base: Url,
  execution_id: String,
}

impl CallbackUrls {
  pub fn new(base: Url, execution_id: impl Into<String>) -> Self {
    Self {
      base,
      execution_id: execution_id.into(),
    }
  }

  pub fn base(&self) -> &Url {
    &self.base
  }

  pub fn execution_id(&self) -> &str {
    &self.execution_id
  }

  /// Url that continues the execution without resuming a bookmark.
  pub fn execution_url(&self) -> Url {
    let mut url = self.base.clone();
    url
      .query_pairs_mut()
      .append_pair(INSTANCE_KEY, &self.execution_id);
    url
  }

  /// Url that resumes `bookmark`.
  pub fn bookmark_url(&self, bookmark: &str) -> Url {
    let mut url = self.execution_url();
    url.query_pairs_mut().append_pair(BOOKMARK_KEY, bookmark);
    url
  }

  /// Resolve an absolute or base-relative reference.
  pub fn resolve(&self, reference: &str) -> Result<Url, url::ParseError> {
    match Url::parse(reference) {
      Ok(url) => Ok(url),
      Err(url::ParseError::RelativeUrlWithoutBase) => self.base.join(reference),
      Err(e) => Err(e),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn urls() -> CallbackUrls {
    CallbackUrls::new(Url::parse("http://www.tempuri.org/calls/flow").unwrap(), "exec-1")
  }

  #[test]
  fn test_bookmark_url_round_trips() {
    let url = urls().bookmark_url("123_4_Dial_dial_finished");
    assert_eq!(
      url.as_str(),
      "http://www.tempuri.org/calls/flow?wf_InstanceId=exec-1&wf_Bookmark=123_4_Dial_dial_finished"
    );

    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert_eq!(pairs[1], (BOOKMARK_KEY.to_string(), "123_4_Dial_dial_finished".to_string()));
  }

  #[test]
  fn test_resolve_relative_and_absolute() {
    let urls = urls();
    assert_eq!(
      urls.resolve("recordings/RE1.wav").unwrap().as_str(),
      "http://www.tempuri.org/calls/recordings/RE1.wav"
    );
    assert_eq!(
      urls.resolve("/media/hold.mp3").unwrap().as_str(),
      "http://www.tempuri.org/media/hold.mp3"
    );
    assert_eq!(
      urls.resolve("https://api.example.com/RE1").unwrap().as_str(),
      "https://api.example.com/RE1"
    );
  }
}
