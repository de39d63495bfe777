//! Component registry.
//!
//! Every component root found in the document gets one [`ComponentEntry`]
//! holding its last confirmed snapshot, its pending actions and the turn
//! counter that serializes its requests.

use crate::error::{ClientError, ClientResult};
use indexmap::IndexMap;
use reinhardt_live_core::actions::Action;
use reinhardt_live_core::protocol::Effects;
use reinhardt_live_core::render::{EFFECTS_ATTRIBUTE, ID_ATTRIBUTE, SNAPSHOT_ATTRIBUTE};
use reinhardt_live_core::snapshot::Snapshot;
use reinhardt_live_core::url::UrlBinding;
use reinhardt_live_morph::{Document, NodeId};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::watch;

/// Lifecycle of a component on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentState {
	/// Discovered but not yet registered.
	Uninitialized,
	/// Registered; no request sent yet.
	Mounted,
	/// A request is in flight.
	AwaitingResponse,
	/// The last request completed.
	Idle,
	/// Removed from the page.
	Destroyed,
}

/// Request turns of one component.
///
/// Tickets are handed out in commit order and `served` is the ticket whose
/// request may go out next. Tickets that finish out of order, which only
/// happens when a waiting commit is dropped, are parked in `finished`.
#[derive(Debug, Default)]
pub(crate) struct Turns {
	pub(crate) served: u64,
	finished: BTreeSet<u64>,
}

impl Turns {
	pub(crate) fn finish(&mut self, ticket: u64) {
		self.finished.insert(ticket);
		while self.finished.remove(&self.served) {
			self.served += 1;
		}
	}
}

/// A registered component.
#[derive(Debug)]
pub struct ComponentEntry {
	pub(crate) id: String,
	pub(crate) name: String,
	pub(crate) root: NodeId,
	pub(crate) parent: Option<String>,
	pub(crate) snapshot: Snapshot,
	pub(crate) listeners: Vec<String>,
	pub(crate) url: IndexMap<String, UrlBinding>,
	pub(crate) state: ComponentState,
	pub(crate) pending: Vec<Action>,
	pub(crate) overlay: serde_json::Map<String, serde_json::Value>,
	pub(crate) next_ticket: u64,
	pub(crate) turns: Arc<watch::Sender<Turns>>,
}

impl ComponentEntry {
	fn new(id: String, root: NodeId, parent: Option<String>, snapshot: Snapshot) -> Self {
		let (turns, _) = watch::channel(Turns::default());
		Self {
			name: snapshot.name().to_string(),
			id,
			root,
			parent,
			snapshot,
			listeners: Vec::new(),
			url: IndexMap::new(),
			state: ComponentState::Uninitialized,
			pending: Vec::new(),
			overlay: serde_json::Map::new(),
			next_ticket: 0,
			turns: Arc::new(turns),
		}
	}

	/// Component id.
	pub fn id(&self) -> &str {
		&self.id
	}

	/// Component name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Root element.
	pub fn root(&self) -> NodeId {
		self.root
	}

	/// Parent component id.
	pub fn parent(&self) -> Option<&str> {
		self.parent.as_deref()
	}

	/// Last confirmed snapshot.
	pub fn snapshot(&self) -> &Snapshot {
		&self.snapshot
	}

	/// Events the component listens for.
	pub fn listeners(&self) -> &[String] {
		&self.listeners
	}

	/// Properties mirrored in the query string.
	pub fn url_bindings(&self) -> &IndexMap<String, UrlBinding> {
		&self.url
	}

	/// Lifecycle state.
	pub fn state(&self) -> ComponentState {
		self.state
	}

	/// Actions waiting for the next commit.
	pub fn pending(&self) -> &[Action] {
		&self.pending
	}

	/// Whether the component listens for `event`.
	pub fn listens_to(&self, event: &str) -> bool {
		self.listeners.iter().any(|listener| listener == event)
	}

	/// Drops local writes a finished batch carried, keeping any that were
	/// overwritten while it was in flight.
	pub(crate) fn settle(&mut self, synced: &[(String, serde_json::Value)]) {
		for (path, value) in synced {
			if self.overlay.get(path) == Some(value) {
				self.overlay.remove(path);
			}
		}
	}

	/// Reads snapshot, effects and root from a component root element.
	fn refresh_from(&mut self, document: &Document, root: NodeId) -> ClientResult<()> {
		let (snapshot, effects) = read_root(document, root)?;
		self.root = root;
		self.name = snapshot.name().to_string();
		self.snapshot = snapshot;
		self.listeners = effects.listeners;
		self.url = effects.url;
		Ok(())
	}
}

/// All components on the page, in discovery order.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
	entries: IndexMap<String, ComponentEntry>,
	destroyed: HashSet<String>,
}

impl ComponentRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers every top-level component of a document and, recursively,
	/// their descendants. Returns the registered ids.
	pub fn discover(&mut self, document: &Document) -> ClientResult<Vec<String>> {
		let mut registered = Vec::new();
		for root in top_level_roots(document) {
			self.register_tree(document, root, None, &mut registered)?;
		}
		Ok(registered)
	}

	/// Registers the component rooted at `root` and its descendants.
	pub(crate) fn register_tree(
		&mut self,
		document: &Document,
		root: NodeId,
		parent: Option<String>,
		registered: &mut Vec<String>,
	) -> ClientResult<()> {
		let id = document
			.attr(root, ID_ATTRIBUTE)
			.ok_or(ClientError::MissingAttribute(ID_ATTRIBUTE))?
			.to_string();
		let (snapshot, effects) = read_root(document, root)?;
		let mut entry = ComponentEntry::new(id.clone(), root, parent, snapshot);
		entry.listeners = effects.listeners;
		entry.url = effects.url;
		entry.state = ComponentState::Mounted;
		tracing::debug!(component = %entry.name, id = %id, "registered component");
		self.destroyed.remove(&id);
		self.entries.insert(id.clone(), entry);
		registered.push(id.clone());
		for child in child_roots(document, root) {
			self.register_tree(document, child, Some(id.clone()), registered)?;
		}
		Ok(())
	}

	/// Brings the descendants of `id` in line with the document after a
	/// morph. Returns the ids that were registered and destroyed.
	pub(crate) fn reconcile(
		&mut self,
		document: &Document,
		id: &str,
	) -> ClientResult<(Vec<String>, Vec<String>)> {
		let mut registered = Vec::new();
		let mut destroyed = Vec::new();
		self.reconcile_into(document, id, &mut registered, &mut destroyed)?;
		Ok((registered, destroyed))
	}

	fn reconcile_into(
		&mut self,
		document: &Document,
		id: &str,
		registered: &mut Vec<String>,
		destroyed: &mut Vec<String>,
	) -> ClientResult<()> {
		let Some(root) = self.entries.get(id).map(|entry| entry.root) else {
			return Ok(());
		};
		let mut present = HashSet::new();
		for child_root in child_roots(document, root) {
			let Some(child_id) = document.attr(child_root, ID_ATTRIBUTE).map(str::to_string) else {
				continue;
			};
			present.insert(child_id.clone());
			match self.entries.get_mut(&child_id) {
				Some(entry) => {
					entry.parent = Some(id.to_string());
					entry.refresh_from(document, child_root)?;
					self.reconcile_into(document, &child_id, registered, destroyed)?;
				}
				None => {
					self.register_tree(document, child_root, Some(id.to_string()), registered)?;
				}
			}
		}
		let stale: Vec<String> = self
			.children_of(id)
			.into_iter()
			.filter(|child| !present.contains(child))
			.collect();
		for child in stale {
			destroyed.extend(self.unregister(&child));
		}
		Ok(())
	}

	/// Removes a component and its descendants; returns the removed ids.
	pub fn unregister(&mut self, id: &str) -> Vec<String> {
		let mut removed = Vec::new();
		for child in self.children_of(id) {
			removed.extend(self.unregister(&child));
		}
		if let Some(entry) = self.entries.shift_remove(id) {
			tracing::debug!(component = %entry.name, id = %id, "destroyed component");
			self.destroyed.insert(id.to_string());
			removed.push(id.to_string());
		}
		removed
	}

	/// Looks up a component.
	pub fn get(&self, id: &str) -> Option<&ComponentEntry> {
		self.entries.get(id)
	}

	pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut ComponentEntry> {
		self.entries.get_mut(id)
	}

	/// Looks up a component or fails.
	pub fn require(&self, id: &str) -> ClientResult<&ComponentEntry> {
		self.get(id)
			.ok_or_else(|| ClientError::ComponentNotFound(id.to_string()))
	}

	pub(crate) fn require_mut(&mut self, id: &str) -> ClientResult<&mut ComponentEntry> {
		self.entries
			.get_mut(id)
			.ok_or_else(|| ClientError::ComponentNotFound(id.to_string()))
	}

	/// Lifecycle state; destroyed components stay observable.
	pub fn state_of(&self, id: &str) -> Option<ComponentState> {
		match self.entries.get(id) {
			Some(entry) => Some(entry.state),
			None if self.destroyed.contains(id) => Some(ComponentState::Destroyed),
			None => None,
		}
	}

	/// Registered ids in discovery order.
	pub fn ids(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(String::as_str)
	}

	/// Direct children of a component.
	pub fn children_of(&self, id: &str) -> Vec<String> {
		self.entries
			.values()
			.filter(|entry| entry.parent.as_deref() == Some(id))
			.map(|entry| entry.id.clone())
			.collect()
	}

	/// Every registered descendant of a component, depth first.
	pub fn descendants_of(&self, id: &str) -> Vec<String> {
		let mut out = Vec::new();
		for child in self.children_of(id) {
			let nested = self.descendants_of(&child);
			out.push(child);
			out.extend(nested);
		}
		out
	}

	/// Ancestors of a component, nearest first.
	pub fn ancestors_of(&self, id: &str) -> Vec<String> {
		let mut out = Vec::new();
		let mut current = self.get(id).and_then(|entry| entry.parent.clone());
		while let Some(parent) = current {
			current = self.get(&parent).and_then(|entry| entry.parent.clone());
			out.push(parent);
		}
		out
	}

	/// Components listening for `event`.
	pub fn listening(&self, event: &str) -> Vec<String> {
		self.entries
			.values()
			.filter(|entry| entry.listens_to(event))
			.map(|entry| entry.id.clone())
			.collect()
	}

	/// Component owning a document node.
	pub fn owner_of(&self, document: &Document, node: NodeId) -> Option<String> {
		let root = document.closest_with_attr(node, ID_ATTRIBUTE)?;
		let id = document.attr(root, ID_ATTRIBUTE)?;
		self.entries.contains_key(id).then(|| id.to_string())
	}

	/// The snapshot to send for `id`: its own snapshot with the latest
	/// snapshot of every registered descendant spliced into the memo.
	pub fn assemble(&self, id: &str) -> ClientResult<Snapshot> {
		let mut snapshot = self.require(id)?.snapshot.clone();
		for child in snapshot.memo.children.values_mut() {
			if self.entries.contains_key(&child.id) {
				child.snapshot = Some(Box::new(self.assemble(&child.id)?));
			}
		}
		Ok(snapshot)
	}
}

fn read_root(document: &Document, root: NodeId) -> ClientResult<(Snapshot, Effects)> {
	let raw = document
		.attr(root, SNAPSHOT_ATTRIBUTE)
		.ok_or(ClientError::MissingAttribute(SNAPSHOT_ATTRIBUTE))?;
	let snapshot = Snapshot::from_attribute_json(raw)?;
	let effects = match document.attr(root, EFFECTS_ATTRIBUTE) {
		Some(raw) => serde_json::from_str::<Effects>(raw)?,
		None => Effects::default(),
	};
	Ok((snapshot, effects))
}

/// Component roots with no enclosing component root.
pub fn top_level_roots(document: &Document) -> Vec<NodeId> {
	document
		.roots()
		.iter()
		.flat_map(|root| document.find_all_with_attr(*root, ID_ATTRIBUTE))
		.filter(|node| {
			document
				.parent(*node)
				.and_then(|parent| document.closest_with_attr(parent, ID_ATTRIBUTE))
				.is_none()
		})
		.collect()
}

/// Component roots directly nested in the component rooted at `root`.
pub fn child_roots(document: &Document, root: NodeId) -> Vec<NodeId> {
	document
		.find_all_with_attr(root, ID_ATTRIBUTE)
		.into_iter()
		.filter(|node| *node != root)
		.filter(|node| {
			document
				.parent(*node)
				.and_then(|parent| document.closest_with_attr(parent, ID_ATTRIBUTE))
				== Some(root)
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use reinhardt_live_core::snapshot::{ChildEntry, Fingerprint, Memo};
	use reinhardt_live_core::render::escape_attribute;
	use rstest::rstest;

	fn snapshot(id: &str, name: &str) -> Snapshot {
		Snapshot {
			fingerprint: Fingerprint {
				id: id.into(),
				name: name.into(),
				locale: "en".into(),
				path: "/".into(),
			},
			memo: Memo::default(),
			checksum: "sig".into(),
		}
	}

	fn root(id: &str, name: &str, listeners: &[&str], inner: &str) -> String {
		let snapshot = serde_json::to_string(&snapshot(id, name)).unwrap();
		let effects = serde_json::json!({ "listeners": listeners }).to_string();
		format!(
			"<div wire:id=\"{}\" wire:snapshot=\"{}\" wire:effects=\"{}\">{}</div>",
			id,
			escape_attribute(&snapshot),
			escape_attribute(&effects),
			inner
		)
	}

	#[rstest]
	fn test_discover_registers_tree_with_parents() {
		// Arrange
		let child = root("c1", "item", &["saved"], "<span>c</span>");
		let page = format!(
			"<main>{}<p>x</p>{}</main>",
			root("p1", "list", &[], &format!("<ul>{}</ul>", child)),
			root("p2", "other", &[], "")
		);
		let document = Document::parse(&page);
		let mut registry = ComponentRegistry::new();

		// Act
		let ids = registry.discover(&document).unwrap();

		// Assert
		assert_eq!(ids, vec!["p1", "c1", "p2"]);
		assert_eq!(registry.get("c1").unwrap().parent(), Some("p1"));
		assert_eq!(registry.get("p1").unwrap().parent(), None);
		assert_eq!(registry.children_of("p1"), vec!["c1"]);
		assert_eq!(registry.ancestors_of("c1"), vec!["p1"]);
		assert_eq!(registry.descendants_of("p1"), vec!["c1"]);
		assert!(registry.descendants_of("p2").is_empty());
		assert_eq!(registry.listening("saved"), vec!["c1"]);
		assert_eq!(registry.state_of("p2"), Some(ComponentState::Mounted));
		assert_eq!(registry.get("c1").unwrap().name(), "item");
	}

	#[rstest]
	fn test_top_level_roots_skip_nested() {
		// Arrange
		let page = root("a", "outer", &[], &root("b", "inner", &[], ""));
		let document = Document::parse(&page);

		// Act
		let roots = top_level_roots(&document);

		// Assert
		assert_eq!(roots.len(), 1);
		assert_eq!(document.attr(roots[0], ID_ATTRIBUTE), Some("a"));
	}

	#[rstest]
	fn test_missing_snapshot_attribute() {
		// Arrange
		let document = Document::parse("<div wire:id=\"a\"></div>");
		let mut registry = ComponentRegistry::new();

		// Act
		let result = registry.discover(&document);

		// Assert
		assert!(matches!(
			result,
			Err(ClientError::MissingAttribute(SNAPSHOT_ATTRIBUTE))
		));
	}

	#[rstest]
	fn test_unregister_removes_descendants() {
		// Arrange
		let page = root("a", "outer", &[], &root("b", "inner", &[], ""));
		let document = Document::parse(&page);
		let mut registry = ComponentRegistry::new();
		registry.discover(&document).unwrap();

		// Act
		let removed = registry.unregister("a");

		// Assert
		assert_eq!(removed, vec!["b", "a"]);
		assert_eq!(registry.state_of("b"), Some(ComponentState::Destroyed));
		assert_eq!(registry.state_of("zzz"), None);
		assert_eq!(registry.ids().count(), 0);
	}

	#[rstest]
	fn test_assemble_splices_latest_child_snapshot() {
		// Arrange
		let page = root("a", "outer", &[], &root("b", "inner", &[], ""));
		let document = Document::parse(&page);
		let mut registry = ComponentRegistry::new();
		registry.discover(&document).unwrap();
		registry.get_mut("a").unwrap().snapshot.memo.children.insert(
			"slot".into(),
			ChildEntry {
				id: "b".into(),
				name: "inner".into(),
				bindings: IndexMap::new(),
				snapshot: None,
			},
		);
		registry.get_mut("b").unwrap().snapshot.checksum = "newer".into();

		// Act
		let assembled = registry.assemble("a").unwrap();

		// Assert
		let child = assembled.child("slot").unwrap();
		assert_eq!(child.snapshot.as_ref().unwrap().checksum, "newer");
	}

	#[rstest]
	fn test_reconcile_follows_swapped_component_name() {
		// Arrange
		let before = root("a", "outer", &[], &root("b", "inner", &[], ""));
		let mut document = Document::parse(&before);
		let mut registry = ComponentRegistry::new();
		registry.discover(&document).unwrap();
		let top = registry.get("a").unwrap().root();
		let after = root("a", "outer", &[], &root("b", "banner", &["closed"], ""));
		let top = document.morph(top, &after).unwrap();
		registry.get_mut("a").unwrap().root = top;

		// Act
		let (registered, destroyed) = registry.reconcile(&document, "a").unwrap();

		// Assert
		assert!(registered.is_empty());
		assert!(destroyed.is_empty());
		assert_eq!(registry.get("b").unwrap().name(), "banner");
		assert!(registry.get("b").unwrap().listens_to("closed"));
	}

	#[rstest]
	fn test_turns_skip_abandoned_tickets() {
		// Arrange
		let mut turns = Turns::default();

		// Act
		turns.finish(1);
		let before = turns.served;
		turns.finish(0);

		// Assert
		assert_eq!(before, 0);
		assert_eq!(turns.served, 2);
	}
}
