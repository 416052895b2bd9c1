//! Bookmark registry.
//!
//! A bookmark is a named suspension point: the platform is handed a url
//! carrying the name, and posting to it resumes the owning activity through
//! the stored callback. Every bookmark is consumed exactly once.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ActivityError;
use crate::instance::{Callback, InstanceId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
  pub name: String,
  pub owner: InstanceId,
  pub callback: Callback,
  /// Scope the owner was writing into when the bookmark was created.
  pub scope: Option<String>,
  /// The turn should end with a redirect to this bookmark's url.
  pub redirect: bool,
  /// Turn in which the bookmark was created.
  pub turn: u64,
}

/// Outstanding bookmarks of one execution, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookmarkRegistry {
  bookmarks: Vec<Bookmark>,
}

impl BookmarkRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a bookmark. Names are unique within an execution.
  pub fn create(&mut self, bookmark: Bookmark) -> Result<(), ActivityError> {
    if self.contains(&bookmark.name) {
      return Err(ActivityError::DuplicateBookmark(bookmark.name));
    }
    self.bookmarks.push(bookmark);
    Ok(())
  }

  pub fn get(&self, name: &str) -> Option<&Bookmark> {
    self.bookmarks.iter().find(|b| b.name == name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.get(name).is_some()
  }

  /// Remove and return a bookmark. A second call with the same name
  /// returns `None`.
  pub fn take(&mut self, name: &str) -> Option<Bookmark> {
    let index = self.bookmarks.iter().position(|b| b.name == name)?;
    Some(self.bookmarks.remove(index))
  }

  /// Remove every bookmark owned by any of `owners` in one step.
  pub fn remove_owned_by(&mut self, owners: &HashSet<InstanceId>) -> Vec<Bookmark> {
    let (removed, kept): (Vec<Bookmark>, Vec<Bookmark>) = std::mem::take(&mut self.bookmarks)
      .into_iter()
      .partition(|b| owners.contains(&b.owner));
    self.bookmarks = kept;
    removed
  }

  pub fn iter(&self) -> impl Iterator<Item = &Bookmark> {
    self.bookmarks.iter()
  }

  pub fn len(&self) -> usize {
    self.bookmarks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bookmarks.is_empty()
  }
}

/// Build a bookmark name: `{salt}_{instance}_{display name}_{callback}`.
///
/// The display name is reduced to url-safe characters so the whole name
/// round-trips through a query string unchanged.
pub(crate) fn bookmark_name(instance: InstanceId, display_name: &str, callback: Callback) -> String {
  let salt = Uuid::new_v4().as_fields().0;
  let display: String = display_name
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
    .collect();
  format!("{}_{}_{}_{}", salt, instance, display, callback.name())
}
