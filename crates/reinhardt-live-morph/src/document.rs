//! Arena document with stable node identity.
//!
//! A [`Document`] is the live tree a client runtime works on. Nodes are
//! addressed by [`NodeId`]; morphing a subtree applies [`Patch`]es in place,
//! so every node the diff matched keeps its id, and with it the state a
//! browser would keep on the element: focus, scroll offsets and the value a
//! user typed into an input.

use crate::diff::{ChildOp, Patch, diff};
use crate::error::{MorphError, MorphResult};
use crate::node::{Element, VNode, parse, parse_nodes};
use indexmap::IndexMap;

/// Handle to a node of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
	/// Arena index.
	pub fn index(self) -> usize {
		self.0
	}
}

impl std::fmt::Display for NodeId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Browser-side state attached to a node rather than to its markup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeState {
	/// Scroll offsets `(left, top)`.
	pub scroll: (i64, i64),
	/// Value typed by the user, overriding the `value` attribute.
	pub value: Option<String>,
}

#[derive(Debug, Clone)]
enum NodeKind {
	Element {
		tag: String,
		attrs: IndexMap<String, String>,
	},
	Text(String),
	Comment(String),
}

#[derive(Debug, Clone)]
struct NodeData {
	kind: NodeKind,
	parent: Option<NodeId>,
	children: Vec<NodeId>,
	state: NodeState,
}

/// Mutable node tree with stable ids.
#[derive(Debug, Clone, Default)]
pub struct Document {
	nodes: Vec<Option<NodeData>>,
	roots: Vec<NodeId>,
	focus: Option<NodeId>,
}

impl Document {
	/// Creates an empty document.
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses a page; every top-level node becomes a document root.
	pub fn parse(html: &str) -> Self {
		let mut document = Self::new();
		for node in parse_nodes(html) {
			let id = document.insert_tree(&node, None);
			document.roots.push(id);
		}
		document
	}

	/// Top-level nodes.
	pub fn roots(&self) -> &[NodeId] {
		&self.roots
	}

	/// Adds a detached subtree and returns its root.
	pub fn insert_tree(&mut self, node: &VNode, parent: Option<NodeId>) -> NodeId {
		let kind = match node {
			VNode::Element(element) => NodeKind::Element {
				tag: element.tag.clone(),
				attrs: element.attrs.clone(),
			},
			VNode::Text(text) => NodeKind::Text(text.clone()),
			VNode::Comment(comment) => NodeKind::Comment(comment.clone()),
		};
		let id = NodeId(self.nodes.len());
		self.nodes.push(Some(NodeData {
			kind,
			parent,
			children: Vec::new(),
			state: NodeState::default(),
		}));
		let children: Vec<NodeId> = node
			.children()
			.iter()
			.map(|child| self.insert_tree(child, Some(id)))
			.collect();
		if let Some(Some(data)) = self.nodes.get_mut(id.0) {
			data.children = children;
		}
		id
	}

	/// Appends markup to an element.
	pub fn append_html(&mut self, parent: NodeId, html: &str) -> MorphResult<Vec<NodeId>> {
		self.data(parent)?;
		let ids: Vec<NodeId> = parse_nodes(html)
			.iter()
			.map(|node| self.insert_tree(node, Some(parent)))
			.collect();
		self.data_mut(parent)?.children.extend(ids.iter().copied());
		Ok(ids)
	}

	/// Whether the id refers to a live node.
	pub fn contains(&self, id: NodeId) -> bool {
		matches!(self.nodes.get(id.0), Some(Some(_)))
	}

	/// Parent of a node.
	pub fn parent(&self, id: NodeId) -> Option<NodeId> {
		self.data(id).ok().and_then(|data| data.parent)
	}

	/// Children of a node.
	pub fn children(&self, id: NodeId) -> &[NodeId] {
		self.data(id).map(|data| data.children.as_slice()).unwrap_or(&[])
	}

	/// Tag name of an element.
	pub fn tag(&self, id: NodeId) -> Option<&str> {
		match &self.data(id).ok()?.kind {
			NodeKind::Element { tag, .. } => Some(tag),
			_ => None,
		}
	}

	/// Text or comment content.
	pub fn text(&self, id: NodeId) -> Option<&str> {
		match &self.data(id).ok()?.kind {
			NodeKind::Text(text) | NodeKind::Comment(text) => Some(text),
			NodeKind::Element { .. } => None,
		}
	}

	/// Concatenated text of a subtree.
	pub fn text_content(&self, id: NodeId) -> String {
		let mut out = String::new();
		for node in self.descendants(id) {
			if let Ok(NodeData {
				kind: NodeKind::Text(text),
				..
			}) = self.data(node)
			{
				out.push_str(text);
			}
		}
		out
	}

	/// Attributes of an element.
	pub fn attrs(&self, id: NodeId) -> Option<&IndexMap<String, String>> {
		match &self.data(id).ok()?.kind {
			NodeKind::Element { attrs, .. } => Some(attrs),
			_ => None,
		}
	}

	/// One attribute of an element.
	pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
		self.attrs(id)?.get(name).map(String::as_str)
	}

	/// Sets an attribute.
	pub fn set_attr(&mut self, id: NodeId, name: impl Into<String>, value: impl Into<String>) -> MorphResult<()> {
		match &mut self.data_mut(id)?.kind {
			NodeKind::Element { attrs, .. } => {
				attrs.insert(name.into(), value.into());
				Ok(())
			}
			_ => Err(MorphError::StaleNode(id.0)),
		}
	}

	/// Removes an attribute.
	pub fn remove_attr(&mut self, id: NodeId, name: &str) -> MorphResult<Option<String>> {
		match &mut self.data_mut(id)?.kind {
			NodeKind::Element { attrs, .. } => Ok(attrs.shift_remove(name)),
			_ => Err(MorphError::StaleNode(id.0)),
		}
	}

	/// A node and its descendants, depth first.
	pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
		let mut out = Vec::new();
		let mut stack = vec![id];
		while let Some(node) = stack.pop() {
			let Ok(data) = self.data(node) else {
				continue;
			};
			out.push(node);
			stack.extend(data.children.iter().rev().copied());
		}
		out
	}

	/// Elements in a subtree carrying an attribute.
	pub fn find_all_with_attr(&self, root: NodeId, name: &str) -> Vec<NodeId> {
		self.descendants(root)
			.into_iter()
			.filter(|id| self.attr(*id, name).is_some())
			.collect()
	}

	/// First element in the document whose attribute has the given value.
	pub fn find_by_attr(&self, name: &str, value: &str) -> Option<NodeId> {
		self.roots
			.iter()
			.flat_map(|root| self.descendants(*root))
			.find(|id| self.attr(*id, name) == Some(value))
	}

	/// Closest ancestor (or the node itself) carrying an attribute.
	pub fn closest_with_attr(&self, id: NodeId, name: &str) -> Option<NodeId> {
		let mut current = Some(id);
		while let Some(node) = current {
			if self.attr(node, name).is_some() {
				return Some(node);
			}
			current = self.parent(node);
		}
		None
	}

	/// Focuses a node.
	pub fn focus(&mut self, id: NodeId) -> MorphResult<()> {
		self.data(id)?;
		self.focus = Some(id);
		Ok(())
	}

	/// The focused node, if any.
	pub fn focused(&self) -> Option<NodeId> {
		self.focus
	}

	/// Clears focus.
	pub fn blur(&mut self) {
		self.focus = None;
	}

	/// Node state.
	pub fn state(&self, id: NodeId) -> Option<&NodeState> {
		self.data(id).ok().map(|data| &data.state)
	}

	/// Records scroll offsets.
	pub fn set_scroll(&mut self, id: NodeId, left: i64, top: i64) -> MorphResult<()> {
		self.data_mut(id)?.state.scroll = (left, top);
		Ok(())
	}

	/// Records a typed value.
	pub fn set_value(&mut self, id: NodeId, value: impl Into<String>) -> MorphResult<()> {
		self.data_mut(id)?.state.value = Some(value.into());
		Ok(())
	}

	/// Current value of an input: the typed value, else the `value` attribute.
	pub fn value(&self, id: NodeId) -> Option<&str> {
		let data = self.data(id).ok()?;
		data.state.value.as_deref().or_else(|| self.attr(id, "value"))
	}

	/// Snapshot of a subtree as a [`VNode`].
	pub fn to_vnode(&self, id: NodeId) -> MorphResult<VNode> {
		let data = self.data(id)?;
		Ok(match &data.kind {
			NodeKind::Element { tag, attrs } => VNode::Element(Element {
				tag: tag.clone(),
				attrs: attrs.clone(),
				children: data
					.children
					.iter()
					.map(|child| self.to_vnode(*child))
					.collect::<MorphResult<_>>()?,
			}),
			NodeKind::Text(text) => VNode::Text(text.clone()),
			NodeKind::Comment(comment) => VNode::Comment(comment.clone()),
		})
	}

	/// Serializes a subtree.
	pub fn to_html(&self, id: NodeId) -> MorphResult<String> {
		Ok(self.to_vnode(id)?.to_html())
	}

	/// Morphs the subtree at `root` into `html`; returns the subtree's root,
	/// which only changes when the root itself had to be replaced.
	pub fn morph(&mut self, root: NodeId, html: &str) -> MorphResult<NodeId> {
		let target = parse(html)?;
		let current = self.to_vnode(root)?;
		let patches = diff(&current, &target);
		tracing::debug!(root = %root, patches = patches.len(), "morphing subtree");
		self.apply(root, &patches)
	}

	/// Applies patches computed against the subtree at `root`.
	pub fn apply(&mut self, root: NodeId, patches: &[Patch]) -> MorphResult<NodeId> {
		let mut root = root;
		for patch in patches {
			match patch {
				Patch::Replace { path, node } => {
					let target = self.resolve(root, path)?;
					let parent = self.data(target)?.parent;
					let replacement = self.insert_tree(node, parent);
					match parent {
						Some(parent) => {
							for child in &mut self.data_mut(parent)?.children {
								if *child == target {
									*child = replacement;
								}
							}
						}
						None => {
							for top in &mut self.roots {
								if *top == target {
									*top = replacement;
								}
							}
						}
					}
					if target == root {
						root = replacement;
					}
					self.remove_subtree(target);
				}
				Patch::SetAttribute { path, name, value } => {
					let target = self.resolve(root, path)?;
					self.set_attr(target, name.clone(), value.clone())
						.map_err(|_| MorphError::NotAnElement(path.clone()))?;
				}
				Patch::RemoveAttribute { path, name } => {
					let target = self.resolve(root, path)?;
					self.remove_attr(target, name)
						.map_err(|_| MorphError::NotAnElement(path.clone()))?;
				}
				Patch::SetText { path, text } => {
					let target = self.resolve(root, path)?;
					match &mut self.data_mut(target)?.kind {
						NodeKind::Text(content) | NodeKind::Comment(content) => *content = text.clone(),
						NodeKind::Element { .. } => return Err(MorphError::InvalidPath(path.clone())),
					}
				}
				Patch::Children { path, ops } => {
					let target = self.resolve(root, path)?;
					let old = std::mem::take(&mut self.data_mut(target)?.children);
					let mut kept = vec![false; old.len()];
					let mut children = Vec::with_capacity(ops.len());
					for op in ops {
						match op {
							ChildOp::Keep(index) => {
								let id = old.get(*index).copied().ok_or(MorphError::InvalidKeep {
									index: *index,
									len: old.len(),
								})?;
								kept[*index] = true;
								children.push(id);
							}
							ChildOp::Insert(node) => children.push(self.insert_tree(node, Some(target))),
						}
					}
					for (index, id) in old.iter().enumerate() {
						if !kept[index] {
							self.remove_subtree(*id);
						}
					}
					self.data_mut(target)?.children = children;
				}
			}
		}
		Ok(root)
	}

	/// Detaches and frees a subtree.
	pub fn remove(&mut self, id: NodeId) -> MorphResult<()> {
		let parent = self.data(id)?.parent;
		match parent {
			Some(parent) => self.data_mut(parent)?.children.retain(|child| *child != id),
			None => self.roots.retain(|root| *root != id),
		}
		self.remove_subtree(id);
		Ok(())
	}

	fn remove_subtree(&mut self, id: NodeId) {
		for node in self.descendants(id) {
			if self.focus == Some(node) {
				self.focus = None;
			}
			if let Some(slot) = self.nodes.get_mut(node.0) {
				*slot = None;
			}
		}
	}

	fn resolve(&self, root: NodeId, path: &[usize]) -> MorphResult<NodeId> {
		path.iter().try_fold(root, |node, index| {
			self.children(node)
				.get(*index)
				.copied()
				.ok_or_else(|| MorphError::InvalidPath(path.to_vec()))
		})
	}

	fn data(&self, id: NodeId) -> MorphResult<&NodeData> {
		self.nodes
			.get(id.0)
			.and_then(Option::as_ref)
			.ok_or(MorphError::StaleNode(id.0))
	}

	fn data_mut(&mut self, id: NodeId) -> MorphResult<&mut NodeData> {
		self.nodes
			.get_mut(id.0)
			.and_then(Option::as_mut)
			.ok_or(MorphError::StaleNode(id.0))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn root(document: &Document) -> NodeId {
		document.roots()[0]
	}

	#[rstest]
	fn test_morph_preserves_identity_and_state() {
		// Arrange
		let mut document = Document::parse("<form><input id=\"name\" value=\"a\"><p>0</p></form>");
		let form = root(&document);
		let input = document.find_by_attr("id", "name").unwrap();
		document.focus(input).unwrap();
		document.set_value(input, "typed").unwrap();
		document.set_scroll(form, 0, 40).unwrap();

		// Act
		let form_after = document
			.morph(form, "<form><input id=\"name\" value=\"b\"><p>1</p></form>")
			.unwrap();

		// Assert
		assert_eq!(form_after, form);
		assert_eq!(document.find_by_attr("id", "name"), Some(input));
		assert_eq!(document.focused(), Some(input));
		assert_eq!(document.value(input), Some("typed"));
		assert_eq!(document.attr(input, "value"), Some("b"));
		assert_eq!(document.state(form).unwrap().scroll, (0, 40));
		assert_eq!(document.text_content(form), "1");
	}

	#[rstest]
	fn test_removed_node_loses_focus() {
		// Arrange
		let mut document = Document::parse("<ul><li id=\"a\">A</li><li id=\"b\">B</li></ul>");
		let list = root(&document);
		let b = document.find_by_attr("id", "b").unwrap();
		document.focus(b).unwrap();

		// Act
		document.morph(list, "<ul><li id=\"a\">A</li></ul>").unwrap();

		// Assert
		assert!(!document.contains(b));
		assert_eq!(document.focused(), None);
	}

	#[rstest]
	fn test_keyed_reorder_keeps_ids() {
		// Arrange
		let mut document =
			Document::parse("<ul><li wire:key=\"1\">one</li><li wire:key=\"2\">two</li></ul>");
		let list = root(&document);
		let first = document.children(list)[0];
		let second = document.children(list)[1];

		// Act
		document
			.morph(list, "<ul><li wire:key=\"2\">two</li><li wire:key=\"1\">one</li></ul>")
			.unwrap();

		// Assert
		assert_eq!(document.children(list), &[second, first]);
	}

	#[rstest]
	fn test_root_replacement_returns_new_root() {
		// Arrange
		let mut document = Document::parse("<div wire:id=\"a\"></div>");
		let old = root(&document);

		// Act
		let new = document.morph(old, "<section wire:id=\"a\"></section>").unwrap();

		// Assert
		assert_ne!(new, old);
		assert_eq!(document.roots(), &[new]);
		assert!(!document.contains(old));
		assert_eq!(document.tag(new), Some("section"));
	}

	#[rstest]
	fn test_nested_replacement_keeps_parent() {
		// Arrange
		let mut document = Document::parse("<div><span>a</span></div>");
		let div = root(&document);

		// Act
		document.morph(div, "<div><em>a</em></div>").unwrap();

		// Assert
		let child = document.children(div)[0];
		assert_eq!(document.tag(child), Some("em"));
		assert_eq!(document.parent(child), Some(div));
	}

	#[rstest]
	fn test_closest_with_attr() {
		// Arrange
		let document = Document::parse("<div wire:id=\"x\"><p><button>go</button></p></div>");
		let button = document.descendants(root(&document))[2];

		// Act
		let owner = document.closest_with_attr(button, "wire:id");

		// Assert
		assert_eq!(owner, Some(root(&document)));
		assert_eq!(document.tag(button), Some("button"));
	}

	#[rstest]
	fn test_stale_node_is_reported() {
		// Arrange
		let mut document = Document::parse("<div><p>x</p></div>");
		let p = document.children(root(&document))[0];
		document.remove(p).unwrap();

		// Act
		let result = document.focus(p);

		// Assert
		assert_eq!(result, Err(MorphError::StaleNode(p.index())));
	}
}
