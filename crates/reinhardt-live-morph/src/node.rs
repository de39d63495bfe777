//! Markup trees.

use crate::error::{MorphError, MorphResult};
use indexmap::IndexMap;
use scraper::{ElementRef, Html, Node};

/// Elements serialized without a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
	"area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
	"wbr",
];

/// Attribute that pins an element for keyed matching.
pub const KEY_ATTRIBUTE: &str = "wire:key";
/// Attribute that freezes an element and its subtree.
pub const IGNORE_ATTRIBUTE: &str = "wire:ignore";
/// Attribute that freezes an element's own attributes only.
pub const IGNORE_SELF_ATTRIBUTE: &str = "wire:ignore.self";

/// An element with ordered attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
	/// Lowercase tag name.
	pub tag: String,
	/// Attributes in source order.
	pub attrs: IndexMap<String, String>,
	/// Child nodes.
	pub children: Vec<VNode>,
}

impl Element {
	/// Creates an element without attributes or children.
	pub fn new(tag: impl Into<String>) -> Self {
		Self {
			tag: tag.into(),
			attrs: IndexMap::new(),
			children: Vec::new(),
		}
	}

	/// Adds an attribute.
	pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.attrs.insert(name.into(), value.into());
		self
	}

	/// Adds a child.
	pub fn child(mut self, child: impl Into<VNode>) -> Self {
		self.children.push(child.into());
		self
	}

	/// Matching key: `wire:key`, then `id`, then `wire:id`.
	pub fn key(&self) -> Option<&str> {
		[KEY_ATTRIBUTE, "id", "wire:id"]
			.iter()
			.find_map(|name| self.attrs.get(*name))
			.map(String::as_str)
	}

	/// Whether the element and its subtree are frozen.
	pub fn is_ignored(&self) -> bool {
		self.attrs.contains_key(IGNORE_ATTRIBUTE)
	}

	/// Whether the element's own attributes are frozen.
	pub fn is_self_ignored(&self) -> bool {
		self.attrs.contains_key(IGNORE_SELF_ATTRIBUTE)
	}
}

/// A node of a markup tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VNode {
	/// Element node.
	Element(Element),
	/// Text node.
	Text(String),
	/// Comment node.
	Comment(String),
}

impl From<Element> for VNode {
	fn from(element: Element) -> Self {
		Self::Element(element)
	}
}

impl VNode {
	/// Text node.
	pub fn text(text: impl Into<String>) -> Self {
		Self::Text(text.into())
	}

	/// The element, if this is one.
	pub fn as_element(&self) -> Option<&Element> {
		match self {
			Self::Element(element) => Some(element),
			_ => None,
		}
	}

	/// Mutable element, if this is one.
	pub fn as_element_mut(&mut self) -> Option<&mut Element> {
		match self {
			Self::Element(element) => Some(element),
			_ => None,
		}
	}

	/// Child nodes; empty for text and comments.
	pub fn children(&self) -> &[VNode] {
		match self {
			Self::Element(element) => &element.children,
			_ => &[],
		}
	}

	/// Follows child indexes from this node.
	pub fn at(&self, path: &[usize]) -> Option<&VNode> {
		path.iter()
			.try_fold(self, |node, index| node.children().get(*index))
	}

	/// Mutable [`VNode::at`].
	pub fn at_mut(&mut self, path: &[usize]) -> Option<&mut VNode> {
		let mut node = self;
		for index in path {
			node = match node {
				Self::Element(element) => element.children.get_mut(*index)?,
				_ => return None,
			};
		}
		Some(node)
	}

	/// Serializes the tree.
	pub fn to_html(&self) -> String {
		let mut out = String::new();
		self.write_html(&mut out);
		out
	}

	fn write_html(&self, out: &mut String) {
		match self {
			Self::Text(text) => out.push_str(&escape_text(text)),
			Self::Comment(comment) => {
				out.push_str("<!--");
				out.push_str(comment);
				out.push_str("-->");
			}
			Self::Element(element) => {
				out.push('<');
				out.push_str(&element.tag);
				for (name, value) in &element.attrs {
					out.push(' ');
					out.push_str(name);
					out.push_str("=\"");
					out.push_str(&escape_attribute(value));
					out.push('"');
				}
				out.push('>');
				if VOID_ELEMENTS.contains(&element.tag.as_str()) {
					return;
				}
				for child in &element.children {
					child.write_html(out);
				}
				out.push_str("</");
				out.push_str(&element.tag);
				out.push('>');
			}
		}
	}
}

/// Parses markup with exactly one root element; surrounding whitespace and
/// comments are dropped.
pub fn parse(html: &str) -> MorphResult<VNode> {
	let mut roots: Vec<VNode> = parse_nodes(html)
		.into_iter()
		.filter(|node| matches!(node, VNode::Element(_)))
		.collect();
	match roots.len() {
		1 => Ok(roots.remove(0)),
		count => Err(MorphError::RootCount(count)),
	}
}

/// Parses a markup fragment into its top-level nodes.
pub fn parse_nodes(html: &str) -> Vec<VNode> {
	let fragment = Html::parse_fragment(html);
	convert_children(fragment.root_element())
}

fn convert_children(element: ElementRef<'_>) -> Vec<VNode> {
	element
		.children()
		.filter_map(|child| match child.value() {
			Node::Element(_) => ElementRef::wrap(child).map(convert_element),
			Node::Text(text) => Some(VNode::Text(String::from(&**text))),
			Node::Comment(comment) => Some(VNode::Comment(String::from(&**comment))),
			_ => None,
		})
		.collect()
}

fn convert_element(element: ElementRef<'_>) -> VNode {
	let value = element.value();
	VNode::Element(Element {
		tag: value.name().to_string(),
		attrs: value
			.attrs()
			.map(|(name, value)| (name.to_string(), value.to_string()))
			.collect(),
		children: convert_children(element),
	})
}

fn escape_text(text: &str) -> String {
	text.replace('&', "&amp;")
		.replace('<', "&lt;")
		.replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
	value.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_parse_single_root() {
		// Act
		let node = parse("\n  <div wire:id=\"a\"><span>Hi &amp; bye</span><!-- c --></div>\n").unwrap();

		// Assert
		let expected = Element::new("div")
			.attr("wire:id", "a")
			.child(Element::new("span").child(VNode::text("Hi & bye")))
			.child(VNode::Comment(" c ".into()));
		assert_eq!(node, VNode::Element(expected));
	}

	#[rstest]
	#[case("", 0)]
	#[case("<p></p><p></p>", 2)]
	#[case("just text", 0)]
	fn test_parse_rejects_root_count(#[case] html: &str, #[case] count: usize) {
		// Act
		let result = parse(html);

		// Assert
		assert_eq!(result, Err(MorphError::RootCount(count)));
	}

	#[rstest]
	fn test_to_html_round_trip() {
		// Arrange
		let html = "<form><input value=\"a &quot;b&quot;\"><p>1 &lt; 2</p></form>";

		// Act
		let node = parse(html).unwrap();

		// Assert
		assert_eq!(node.to_html(), html);
		assert_eq!(parse(&node.to_html()).unwrap(), node);
	}

	#[rstest]
	#[case("<li wire:key=\"k\" id=\"i\"></li>", Some("k"))]
	#[case("<li id=\"i\" wire:id=\"w\"></li>", Some("i"))]
	#[case("<li wire:id=\"w\"></li>", Some("w"))]
	#[case("<li class=\"x\"></li>", None)]
	fn test_key_precedence(#[case] html: &str, #[case] expected: Option<&str>) {
		// Act
		let node = parse(html).unwrap();

		// Assert
		assert_eq!(node.as_element().unwrap().key(), expected);
	}

	#[rstest]
	fn test_at_follows_path() {
		// Arrange
		let node = parse("<ul><li>a</li><li>b</li></ul>").unwrap();

		// Act & Assert
		assert_eq!(node.at(&[1, 0]), Some(&VNode::text("b")));
		assert_eq!(node.at(&[2]), None);
	}
}
