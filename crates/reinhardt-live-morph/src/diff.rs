//! Keyed tree diff.
//!
//! [`diff`] compares the current tree with freshly rendered markup and
//! returns the patches that turn one into the other. Paths index into the
//! *old* tree. Patches are emitted in post-order: every patch below a node
//! comes before that node's [`Patch::Children`], so applying them in order
//! never invalidates a later path.
//!
//! Children are matched by key (`wire:key`, `id`, `wire:id`) first, then in
//! order among unkeyed siblings of the same kind and tag. Matched nodes are
//! patched in place, which is what keeps their identity (and focus, scroll and
//! typed input) in a live document.

use crate::error::{MorphError, MorphResult};
use crate::node::{Element, VNode};
use std::collections::HashSet;

/// One step of a morph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch {
	/// Replaces the node at `path` with a new subtree.
	Replace {
		/// Old-tree path.
		path: Vec<usize>,
		/// Replacement.
		node: VNode,
	},
	/// Adds or changes an attribute.
	SetAttribute {
		/// Old-tree path.
		path: Vec<usize>,
		/// Attribute name.
		name: String,
		/// New value.
		value: String,
	},
	/// Removes an attribute.
	RemoveAttribute {
		/// Old-tree path.
		path: Vec<usize>,
		/// Attribute name.
		name: String,
	},
	/// Replaces the content of a text or comment node.
	SetText {
		/// Old-tree path.
		path: Vec<usize>,
		/// New content.
		text: String,
	},
	/// Rebuilds a child list from kept old children and inserted nodes.
	Children {
		/// Old-tree path.
		path: Vec<usize>,
		/// New child list, in order.
		ops: Vec<ChildOp>,
	},
}

/// Entry of a [`Patch::Children`] list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildOp {
	/// Keeps the old child at this index.
	Keep(usize),
	/// Inserts a new subtree.
	Insert(VNode),
}

/// Computes the patches that turn `old` into `new`.
pub fn diff(old: &VNode, new: &VNode) -> Vec<Patch> {
	let mut patches = Vec::new();
	if same_node(old, new) {
		diff_node(old, new, &mut Vec::new(), &mut patches);
	} else {
		patches.push(Patch::Replace {
			path: Vec::new(),
			node: new.clone(),
		});
	}
	patches
}

/// Applies patches from [`diff`] to a tree.
pub fn apply(root: &mut VNode, patches: &[Patch]) -> MorphResult<()> {
	for patch in patches {
		match patch {
			Patch::Replace { path, node } => {
				*resolve(root, path)? = node.clone();
			}
			Patch::SetAttribute { path, name, value } => {
				element_at(root, path)?
					.attrs
					.insert(name.clone(), value.clone());
			}
			Patch::RemoveAttribute { path, name } => {
				element_at(root, path)?.attrs.shift_remove(name);
			}
			Patch::SetText { path, text } => match resolve(root, path)? {
				VNode::Text(content) | VNode::Comment(content) => *content = text.clone(),
				VNode::Element(_) => return Err(MorphError::InvalidPath(path.clone())),
			},
			Patch::Children { path, ops } => {
				let element = element_at(root, path)?;
				let mut old: Vec<Option<VNode>> =
					std::mem::take(&mut element.children).into_iter().map(Some).collect();
				let len = old.len();
				for op in ops {
					let child = match op {
						ChildOp::Keep(index) => old
							.get_mut(*index)
							.and_then(Option::take)
							.ok_or(MorphError::InvalidKeep { index: *index, len })?,
						ChildOp::Insert(node) => node.clone(),
					};
					element.children.push(child);
				}
			}
		}
	}
	Ok(())
}

fn resolve<'a>(root: &'a mut VNode, path: &[usize]) -> MorphResult<&'a mut VNode> {
	root.at_mut(path)
		.ok_or_else(|| MorphError::InvalidPath(path.to_vec()))
}

fn element_at<'a>(root: &'a mut VNode, path: &[usize]) -> MorphResult<&'a mut Element> {
	resolve(root, path)?
		.as_element_mut()
		.ok_or_else(|| MorphError::NotAnElement(path.to_vec()))
}

/// Whether two nodes may be morphed into each other instead of replaced.
fn same_node(old: &VNode, new: &VNode) -> bool {
	match (old, new) {
		(VNode::Element(old), VNode::Element(new)) => old.tag == new.tag && old.key() == new.key(),
		(VNode::Text(_), VNode::Text(_)) | (VNode::Comment(_), VNode::Comment(_)) => true,
		_ => false,
	}
}

fn diff_node(old: &VNode, new: &VNode, path: &mut Vec<usize>, patches: &mut Vec<Patch>) {
	match (old, new) {
		(VNode::Element(old), VNode::Element(new)) => {
			if old.is_ignored() {
				tracing::trace!(path = ?path, tag = %old.tag, "skipping ignored subtree");
				return;
			}
			if !old.is_self_ignored() {
				diff_attributes(old, new, path, patches);
			}
			diff_children(&old.children, &new.children, path, patches);
		}
		(VNode::Text(old), VNode::Text(new)) | (VNode::Comment(old), VNode::Comment(new)) => {
			if old != new {
				patches.push(Patch::SetText {
					path: path.clone(),
					text: new.clone(),
				});
			}
		}
		_ => patches.push(Patch::Replace {
			path: path.clone(),
			node: new.clone(),
		}),
	}
}

fn diff_attributes(old: &Element, new: &Element, path: &[usize], patches: &mut Vec<Patch>) {
	for (name, value) in &new.attrs {
		if old.attrs.get(name) != Some(value) {
			patches.push(Patch::SetAttribute {
				path: path.to_vec(),
				name: name.clone(),
				value: value.clone(),
			});
		}
	}
	for name in old.attrs.keys() {
		if !new.attrs.contains_key(name) {
			patches.push(Patch::RemoveAttribute {
				path: path.to_vec(),
				name: name.clone(),
			});
		}
	}
}

fn diff_children(old: &[VNode], new: &[VNode], path: &mut Vec<usize>, patches: &mut Vec<Patch>) {
	let mut used = HashSet::new();
	let mut ops = Vec::with_capacity(new.len());
	let mut cursor = 0;

	for node in new {
		let matched = match node.as_element().and_then(Element::key) {
			Some(key) => old.iter().enumerate().position(|(index, candidate)| {
				!used.contains(&index)
					&& candidate.as_element().and_then(Element::key) == Some(key)
					&& same_node(candidate, node)
			}),
			None => (cursor..old.len()).find(|index| {
				let candidate = &old[*index];
				!used.contains(index) && is_unkeyed(candidate) && same_node(candidate, node)
			}),
		};
		match matched {
			Some(index) => {
				used.insert(index);
				if node.as_element().and_then(Element::key).is_none() {
					cursor = index + 1;
				}
				path.push(index);
				diff_node(&old[index], node, path, patches);
				path.pop();
				ops.push(ChildOp::Keep(index));
			}
			None => ops.push(ChildOp::Insert(node.clone())),
		}
	}

	let unchanged = ops.len() == old.len()
		&& ops
			.iter()
			.enumerate()
			.all(|(position, op)| *op == ChildOp::Keep(position));
	if !unchanged {
		patches.push(Patch::Children {
			path: path.clone(),
			ops,
		});
	}
}

fn is_unkeyed(node: &VNode) -> bool {
	node.as_element().and_then(Element::key).is_none()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::node::parse;
	use rstest::rstest;

	fn morph(old: &str, new: &str) -> (VNode, Vec<Patch>) {
		let mut tree = parse(old).unwrap();
		let target = parse(new).unwrap();
		let patches = diff(&tree, &target);
		apply(&mut tree, &patches).unwrap();
		(tree, patches)
	}

	#[rstest]
	fn test_identical_trees_produce_no_patches() {
		// Arrange
		let tree = parse("<div class=\"a\"><p>x</p></div>").unwrap();

		// Act
		let patches = diff(&tree, &tree.clone());

		// Assert
		assert!(patches.is_empty());
	}

	#[rstest]
	fn test_text_change_is_in_place() {
		// Act
		let (tree, patches) = morph("<div><span>1</span></div>", "<div><span>2</span></div>");

		// Assert
		assert_eq!(
			patches,
			vec![Patch::SetText {
				path: vec![0, 0],
				text: "2".into()
			}]
		);
		assert_eq!(tree.to_html(), "<div><span>2</span></div>");
	}

	#[rstest]
	fn test_attribute_changes() {
		// Act
		let (tree, patches) = morph(
			"<div class=\"a\" title=\"t\"></div>",
			"<div class=\"b\" data-x=\"1\"></div>",
		);

		// Assert
		assert_eq!(patches.len(), 3);
		let element = tree.as_element().unwrap();
		assert_eq!(element.attrs.get("class").map(String::as_str), Some("b"));
		assert_eq!(element.attrs.get("data-x").map(String::as_str), Some("1"));
		assert!(!element.attrs.contains_key("title"));
	}

	#[rstest]
	fn test_keyed_reorder_keeps_children() {
		// Act
		let (tree, patches) = morph(
			"<ul><li wire:key=\"a\">A</li><li wire:key=\"b\">B</li></ul>",
			"<ul><li wire:key=\"b\">B</li><li wire:key=\"a\">A</li></ul>",
		);

		// Assert
		assert_eq!(
			patches,
			vec![Patch::Children {
				path: vec![],
				ops: vec![ChildOp::Keep(1), ChildOp::Keep(0)]
			}]
		);
		assert_eq!(
			tree.to_html(),
			"<ul><li wire:key=\"b\">B</li><li wire:key=\"a\">A</li></ul>"
		);
	}

	#[rstest]
	fn test_keyed_insert_in_front() {
		// Act
		let (_, patches) = morph(
			"<ul><li id=\"a\">A</li></ul>",
			"<ul><li id=\"z\">Z</li><li id=\"a\">A</li></ul>",
		);

		// Assert
		let Patch::Children { ops, .. } = &patches[0] else {
			panic!("expected a children patch, got {:?}", patches);
		};
		assert!(matches!(ops[0], ChildOp::Insert(_)));
		assert_eq!(ops[1], ChildOp::Keep(0));
	}

	#[rstest]
	fn test_tag_change_replaces() {
		// Act
		let (tree, patches) = morph("<div><p>x</p></div>", "<div><h1>x</h1></div>");

		// Assert
		assert_eq!(tree.to_html(), "<div><h1>x</h1></div>");
		assert!(matches!(&patches[0], Patch::Children { ops, .. } if matches!(ops[0], ChildOp::Insert(_))));
	}

	#[rstest]
	fn test_root_key_change_replaces_root() {
		// Act
		let patches = diff(
			&parse("<div wire:id=\"a\"></div>").unwrap(),
			&parse("<div wire:id=\"b\"></div>").unwrap(),
		);

		// Assert
		assert!(matches!(&patches[..], [Patch::Replace { path, .. }] if path.is_empty()));
	}

	#[rstest]
	fn test_ignore_keeps_subtree() {
		// Act
		let (tree, patches) = morph(
			"<div><section wire:ignore class=\"a\"><p>kept</p></section></div>",
			"<div><section wire:ignore class=\"b\"><p>new</p></section></div>",
		);

		// Assert
		assert!(patches.is_empty());
		assert!(tree.to_html().contains("kept"));
	}

	#[rstest]
	fn test_ignore_self_morphs_children_only() {
		// Act
		let (tree, _) = morph(
			"<div wire:ignore.self class=\"a\"><p>old</p></div>",
			"<div wire:ignore.self class=\"b\"><p>new</p></div>",
		);

		// Assert
		let element = tree.as_element().unwrap();
		assert_eq!(element.attrs.get("class").map(String::as_str), Some("a"));
		assert!(tree.to_html().contains("new"));
	}

	#[rstest]
	fn test_apply_rejects_bad_path() {
		// Arrange
		let mut tree = parse("<div></div>").unwrap();
		let patches = vec![Patch::SetText {
			path: vec![3],
			text: "x".into(),
		}];

		// Act
		let result = apply(&mut tree, &patches);

		// Assert
		assert_eq!(result, Err(MorphError::InvalidPath(vec![3])));
	}
}
