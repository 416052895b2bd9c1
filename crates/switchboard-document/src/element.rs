/// A detached element built before it is appended to a [`crate::Document`].
///
/// ```
/// use switchboard_document::Element;
///
/// let gather = Element::new("Gather")
///   .attr("numDigits", 1)
///   .attr_opt("finishOnKey", None::<char>)
///   .child(Element::new("Say").text("Press one"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
  pub(crate) name: String,
  pub(crate) attributes: Vec<(String, String)>,
  pub(crate) content: Vec<ElementContent>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ElementContent {
  Text(String),
  Element(Element),
}

impl Element {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      attributes: Vec::new(),
      content: Vec::new(),
    }
  }

  /// Set an attribute, replacing an earlier value with the same name.
  pub fn attr(mut self, name: impl Into<String>, value: impl ToString) -> Self {
    let name = name.into();
    let value = value.to_string();
    match self.attributes.iter_mut().find(|(n, _)| *n == name) {
      Some(existing) => existing.1 = value,
      None => self.attributes.push((name, value)),
    }
    self
  }

  /// Set an attribute only when a value is present.
  pub fn attr_opt<V: ToString>(self, name: impl Into<String>, value: Option<V>) -> Self {
    match value {
      Some(value) => self.attr(name, value),
      None => self,
    }
  }

  pub fn text(mut self, text: impl Into<String>) -> Self {
    self.content.push(ElementContent::Text(text.into()));
    self
  }

  pub fn child(mut self, element: Element) -> Self {
    self.content.push(ElementContent::Element(element));
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }
}
