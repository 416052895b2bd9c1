//! Markup rendering. Hidden attributes are dropped here so no caller can
//! forget to strip them.

use std::fmt::Write;

use crate::document::{Content, Document, HIDDEN_PREFIX, NodeId};

pub(crate) fn write_node(doc: &Document, id: NodeId, out: &mut String) {
  let node = doc.node(id);
  let _ = write!(out, "<{}", node.name);
  for (name, value) in node.attributes() {
    if name.starts_with(HIDDEN_PREFIX) {
      continue;
    }
    let _ = write!(out, " {}=\"{}\"", name, escape_attribute(value));
  }

  if node.content().is_empty() {
    out.push_str(" />");
    return;
  }

  out.push('>');
  for content in node.content() {
    match content {
      Content::Element(child) => write_node(doc, *child, out),
      Content::Text(text) => out.push_str(&escape_text(text)),
    }
  }
  let _ = write!(out, "</{}>", node.name);
}

/// Control characters other than tab, newline and carriage return are not
/// allowed in XML and are dropped.
fn escape_text(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '\t' | '\n' | '\r' => out.push(c),
      c if (c as u32) < 0x20 => {}
      c => out.push(c),
    }
  }
  out
}

fn escape_attribute(s: &str) -> String {
  escape_text(s).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_control_characters_are_dropped() {
    assert_eq!(escape_text("a\u{0}b\u{7}c\u{1b}"), "abc");
    assert_eq!(escape_text("line\tone\r\ntwo"), "line\tone\r\ntwo");
    assert_eq!(escape_attribute("\"x\u{1f}\""), "&quot;x&quot;");
  }
}
