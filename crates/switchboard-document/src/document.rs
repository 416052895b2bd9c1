use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::element::{Element, ElementContent};
use crate::markup;

/// Attributes starting with this prefix are internal and stripped from markup.
pub const HIDDEN_PREFIX: &str = "wf:";

/// Hidden attribute holding an element's scope id.
pub const SCOPE_ATTRIBUTE: &str = "wf:scope";

const DEFAULT_ROOT: &str = "Response";

/// Index of a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Content {
  Element(NodeId),
  Text(String),
}

/// An element in the document arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
  pub name: String,
  attributes: Vec<(String, String)>,
  content: Vec<Content>,
  parent: Option<NodeId>,
}

impl Node {
  fn new(name: String, parent: Option<NodeId>) -> Self {
    Self {
      name,
      attributes: Vec::new(),
      content: Vec::new(),
      parent,
    }
  }

  pub fn attributes(&self) -> &[(String, String)] {
    &self.attributes
  }

  pub fn content(&self) -> &[Content] {
    &self.content
  }

  pub fn parent(&self) -> Option<NodeId> {
    self.parent
  }

  pub fn attribute(&self, name: &str) -> Option<&str> {
    self
      .attributes
      .iter()
      .find(|(n, _)| n == name)
      .map(|(_, v)| v.as_str())
  }
}

/// The response document for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
  nodes: Vec<Node>,
  root: NodeId,
}

impl Default for Document {
  fn default() -> Self {
    Self::new()
  }
}

impl Document {
  /// An empty `<Response>` document.
  pub fn new() -> Self {
    Self::with_root(DEFAULT_ROOT)
  }

  pub fn with_root(name: impl Into<String>) -> Self {
    Self {
      nodes: vec![Node::new(name.into(), None)],
      root: NodeId(0),
    }
  }

  pub fn root(&self) -> NodeId {
    self.root
  }

  pub fn node(&self, id: NodeId) -> &Node {
    &self.nodes[id.0]
  }

  /// Append an element (and everything built inside it) as the last child of
  /// `parent`. Returns the id of the new element.
  pub fn append_child(&mut self, parent: NodeId, element: Element) -> NodeId {
    let id = NodeId(self.nodes.len());
    self.nodes.push(Node::new(element.name, Some(parent)));
    self.nodes[parent.0].content.push(Content::Element(id));

    self.nodes[id.0].attributes = element.attributes;
    for content in element.content {
      match content {
        ElementContent::Text(text) => self.append_text(id, text),
        ElementContent::Element(child) => {
          self.append_child(id, child);
        }
      }
    }
    id
  }

  pub fn append_text(&mut self, parent: NodeId, text: impl Into<String>) {
    self.nodes[parent.0].content.push(Content::Text(text.into()));
  }

  /// Set an attribute on an existing node, replacing any earlier value.
  pub fn set_attribute(&mut self, node: NodeId, name: impl Into<String>, value: impl Into<String>) {
    let name = name.into();
    let value = value.into();
    let attributes = &mut self.nodes[node.0].attributes;
    match attributes.iter_mut().find(|(n, _)| *n == name) {
      Some(existing) => existing.1 = value,
      None => attributes.push((name, value)),
    }
  }

  pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
    self.node(node).attribute(name)
  }

  /// Element children of `node`, in document order.
  pub fn children(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    self.nodes[node.0].content.iter().filter_map(|c| match c {
      Content::Element(id) => Some(*id),
      Content::Text(_) => None,
    })
  }

  pub fn has_elements(&self, node: NodeId) -> bool {
    self.children(node).next().is_some()
  }

  /// Whether `node` is still reachable from the root.
  pub fn is_attached(&self, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(id) = current {
      if id == self.root {
        return true;
      }
      current = self.nodes.get(id.0).and_then(|n| n.parent);
    }
    false
  }

  pub fn scope_id(&self, node: NodeId) -> Option<&str> {
    self.attribute(node, SCOPE_ATTRIBUTE)
  }

  /// Return the node's scope id, assigning a fresh one if it has none.
  pub fn ensure_scope_id(&mut self, node: NodeId) -> String {
    if let Some(existing) = self.scope_id(node) {
      return existing.to_string();
    }
    let scope_id = Uuid::new_v4().simple().to_string();
    self.set_attribute(node, SCOPE_ATTRIBUTE, scope_id.clone());
    scope_id
  }

  /// Find the attached node carrying `scope_id`.
  pub fn find_scope(&self, scope_id: &str) -> Option<NodeId> {
    let mut stack = vec![self.root];
    while let Some(id) = stack.pop() {
      if self.scope_id(id) == Some(scope_id) {
        return Some(id);
      }
      // Reverse so the walk visits children in document order.
      let children: Vec<NodeId> = self.children(id).collect();
      stack.extend(children.into_iter().rev());
    }
    None
  }

  /// Find the node carrying `scope_id`, or the root when no attached node
  /// carries it.
  pub fn find_scope_root(&self, scope_id: &str) -> NodeId {
    self.find_scope(scope_id).unwrap_or(self.root)
  }

  /// Detach a node and its subtree from its parent. The root cannot be
  /// detached.
  pub fn detach(&mut self, node: NodeId) {
    if node == self.root {
      return;
    }
    if let Some(parent) = self.nodes[node.0].parent.take() {
      self.nodes[parent.0]
        .content
        .retain(|c| !matches!(c, Content::Element(id) if *id == node));
    }
  }

  /// Render the document without hidden attributes.
  pub fn to_markup(&self) -> String {
    let mut out = String::new();
    markup::write_node(self, self.root, &mut out);
    out
  }

  /// Render the document with an XML declaration.
  pub fn to_xml(&self) -> String {
    format!(
      "<?xml version=\"1.0\" encoding=\"UTF-8\"?>{}",
      self.to_markup()
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_append_preserves_order() {
    let mut doc = Document::new();
    let root = doc.root();
    doc.append_child(root, Element::new("Say").text("One"));
    let gather = doc.append_child(root, Element::new("Gather"));
    doc.append_child(root, Element::new("Say").text("Two"));
    doc.append_child(gather, Element::new("Play").text("menu.wav"));

    assert_eq!(
      doc.to_markup(),
      "<Response><Say>One</Say><Gather><Play>menu.wav</Play></Gather><Say>Two</Say></Response>"
    );
    assert!(doc.has_elements(gather));
  }

  #[test]
  fn test_empty_elements_self_close() {
    let mut doc = Document::new();
    let root = doc.root();
    doc.append_child(root, Element::new("Pause").attr("length", 60));
    doc.append_child(root, Element::new("Hangup"));

    assert_eq!(
      doc.to_markup(),
      "<Response><Pause length=\"60\" /><Hangup /></Response>"
    );
  }

  #[test]
  fn test_scope_ids_are_hidden() {
    let mut doc = Document::new();
    let root = doc.root();
    let dial = doc.append_child(root, Element::new("Dial").attr("timeout", 30));
    let scope = doc.ensure_scope_id(dial);

    assert_eq!(doc.ensure_scope_id(dial), scope);
    assert_eq!(doc.attribute(dial, SCOPE_ATTRIBUTE), Some(scope.as_str()));
    assert_eq!(doc.to_markup(), "<Response><Dial timeout=\"30\" /></Response>");
  }

  #[test]
  fn test_find_scope_root_survives_serialization() {
    let mut doc = Document::new();
    let root = doc.root();
    doc.append_child(root, Element::new("Say").text("Hello"));
    let dial = doc.append_child(root, Element::new("Dial"));
    let scope = doc.ensure_scope_id(dial);

    let json = serde_json::to_string(&doc).unwrap();
    let mut restored: Document = serde_json::from_str(&json).unwrap();

    let found = restored.find_scope_root(&scope);
    assert_ne!(found, restored.root());
    assert_eq!(restored.node(found).name, "Dial");

    restored.append_child(found, Element::new("Number").text("+15550100"));
    assert_eq!(
      restored.to_markup(),
      "<Response><Say>Hello</Say><Dial><Number>+15550100</Number></Dial></Response>"
    );
  }

  #[test]
  fn test_find_scope_root_falls_back_to_root() {
    let doc = Document::new();
    assert_eq!(doc.find_scope_root("missing"), doc.root());
  }

  #[test]
  fn test_detached_scope_is_not_found() {
    let mut doc = Document::new();
    let root = doc.root();
    let gather = doc.append_child(root, Element::new("Gather"));
    let scope = doc.ensure_scope_id(gather);
    doc.append_child(gather, Element::new("Say").text("Press one"));

    doc.detach(gather);

    assert!(!doc.is_attached(gather));
    assert_eq!(doc.find_scope_root(&scope), doc.root());
    assert_eq!(doc.to_markup(), "<Response />");
  }

  #[test]
  fn test_root_cannot_be_detached() {
    let mut doc = Document::new();
    let root = doc.root();
    doc.detach(root);
    assert!(doc.is_attached(root));
  }

  #[test]
  fn test_escapes_text_and_attributes() {
    let mut doc = Document::new();
    let root = doc.root();
    doc.append_child(
      root,
      Element::new("Redirect")
        .attr("note", "a \"quoted\" <value>")
        .text("http://example.com/?a=1&b=2"),
    );

    assert_eq!(
      doc.to_markup(),
      "<Response><Redirect note=\"a &quot;quoted&quot; &lt;value&gt;\">http://example.com/?a=1&amp;b=2</Redirect></Response>"
    );
  }
}
