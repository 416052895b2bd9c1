//! Switchboard Document
//!
//! The response document built up while a call flow executes. A document is
//! a tree of elements rooted at `<Response>`; activities append verbs to it
//! and composite activities append their children inside their own element.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Ids are only
//! meaningful inside the document that issued them. To find a node again
//! after the document has been serialized and restored (or replaced by the
//! next turn's document), an element is tagged with a hidden scope id via
//! [`Document::ensure_scope_id`] and located with
//! [`Document::find_scope_root`]. Hidden attributes never reach the markup.

mod document;
mod element;
mod markup;

pub use document::{Content, Document, HIDDEN_PREFIX, Node, NodeId, SCOPE_ATTRIBUTE};
pub use element::Element;
