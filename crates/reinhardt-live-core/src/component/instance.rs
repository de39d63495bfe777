//! A live component instance for the duration of one request.

use super::erased::ErasedComponent;
use super::{Component, Lifecycle};
use crate::capabilities::{ActionContext, Capabilities};
use crate::error::LiveResult;
use crate::services::Services;
use crate::snapshot::{Fingerprint, Snapshot};
use crate::store::ComponentStore;
use crate::url::UrlBinding;
use crate::validation::ErrorBag;
use crate::value::Value;
use indexmap::IndexMap;

/// A mounted or hydrated component with its capabilities and children.
pub struct Instance {
	pub(crate) id: String,
	pub(crate) name: String,
	pub(crate) locale: String,
	pub(crate) path: String,
	pub(crate) component: Box<dyn ErasedComponent>,
	pub(crate) caps: Capabilities,
	pub(crate) children: IndexMap<String, ChildSlot>,
	pub(crate) skip_render: bool,
	pub(crate) updated: Vec<String>,
}

/// A child component held in one of its parent's slots.
pub struct ChildSlot {
	pub(crate) instance: Instance,
	/// Parent property → child property.
	pub(crate) bindings: IndexMap<String, String>,
	/// Snapshot taken when the child was last rendered in this request.
	pub(crate) snapshot: Option<Snapshot>,
}

impl ChildSlot {
	pub(crate) fn new(instance: Instance, bindings: IndexMap<String, String>) -> Self {
		Self {
			instance,
			bindings,
			snapshot: None,
		}
	}

	/// The child instance.
	pub fn instance(&self) -> &Instance {
		&self.instance
	}

	/// Parent property → child property bindings.
	pub fn bindings(&self) -> &IndexMap<String, String> {
		&self.bindings
	}
}

impl std::fmt::Debug for Instance {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Instance")
			.field("id", &self.id)
			.field("name", &self.name)
			.field("locale", &self.locale)
			.field("state", &self.component.public_values())
			.field("children", &self.children.keys().collect::<Vec<_>>())
			.finish()
	}
}

impl Instance {
	pub(crate) fn new(
		id: String,
		name: String,
		locale: String,
		path: String,
		component: Box<dyn ErasedComponent>,
	) -> Self {
		Self {
			id,
			name,
			locale,
			path,
			component,
			caps: Capabilities::builder().build(),
			children: IndexMap::new(),
			skip_render: false,
			updated: Vec::new(),
		}
	}

	/// Component id.
	pub fn id(&self) -> &str {
		&self.id
	}

	/// Registered component name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Locale carried in the fingerprint.
	pub fn locale(&self) -> &str {
		&self.locale
	}

	/// Request path the component was first mounted on.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Identity portion of the snapshot.
	pub fn fingerprint(&self) -> Fingerprint {
		Fingerprint {
			id: self.id.clone(),
			name: self.name.clone(),
			locale: self.locale.clone(),
			path: self.path.clone(),
		}
	}

	/// Reads a public property.
	pub fn get(&self, property: &str) -> LiveResult<Value> {
		self.component.get_property(property)
	}

	/// Writes a public property directly, bypassing update hooks.
	pub fn set(&mut self, property: &str, value: Value) -> LiveResult<()> {
		self.component.set_property(property, value)
	}

	/// Public state in declaration order.
	pub fn public_values(&self) -> Vec<(String, Value)> {
		self.component.public_values()
	}

	/// Typed access to the component.
	pub fn component<C: Component>(&self) -> Option<&C> {
		self.component.as_any().downcast_ref::<C>()
	}

	/// Mutable typed access to the component.
	pub fn component_mut<C: Component>(&mut self) -> Option<&mut C> {
		self.component.as_any_mut().downcast_mut::<C>()
	}

	/// Current field errors.
	pub fn errors(&self) -> &ErrorBag {
		self.caps.validation.errors()
	}

	/// The component's capabilities.
	pub fn capabilities(&self) -> &Capabilities {
		&self.caps
	}

	/// Whether rendering was skipped for this request.
	pub fn render_skipped(&self) -> bool {
		self.skip_render
	}

	/// Child in a slot.
	pub fn child(&self, slot: &str) -> Option<&Instance> {
		self.children.get(slot).map(|child| &child.instance)
	}

	/// Children by slot.
	pub fn children(&self) -> impl Iterator<Item = (&str, &ChildSlot)> {
		self.children
			.iter()
			.map(|(slot, child)| (slot.as_str(), child))
	}

	/// Property paths written by the client during this request.
	pub fn updated_paths(&self) -> &[String] {
		&self.updated
	}

	/// Event → action listeners.
	pub fn listeners(&self) -> Vec<String> {
		self.component.listeners().keys().cloned().collect()
	}

	/// Properties mirrored in the query string.
	pub fn url_bindings(&self) -> IndexMap<String, UrlBinding> {
		self.component.url_bindings().clone()
	}

	/// Runs `f` with the component and a context borrowing this instance's
	/// capabilities.
	pub(crate) fn with_context<R>(
		&mut self,
		services: &Services,
		store: &mut ComponentStore,
		f: impl FnOnce(&mut dyn ErasedComponent, &mut ActionContext<'_>) -> LiveResult<R>,
	) -> LiveResult<R> {
		let mut ctx = ActionContext::new(
			&self.id,
			&self.name,
			&self.locale,
			&mut self.caps,
			services,
			store,
			&mut self.skip_render,
		);
		f(&mut *self.component, &mut ctx)
	}

	pub(crate) fn run_lifecycle(
		&mut self,
		lifecycle: Lifecycle,
		services: &Services,
		store: &mut ComponentStore,
	) -> LiveResult<()> {
		tracing::debug!(
			component = %self.name,
			id = %self.id,
			hook = lifecycle.as_str(),
			"running lifecycle hooks"
		);
		self.with_context(services, store, |component, ctx| {
			component.lifecycle(lifecycle, ctx)
		})
	}

	/// Runs a lifecycle hook on this instance and every descendant, parents
	/// first.
	pub(crate) fn run_lifecycle_tree(
		&mut self,
		lifecycle: Lifecycle,
		services: &Services,
		store: &mut ComponentStore,
	) -> LiveResult<()> {
		self.run_lifecycle(lifecycle, services, store)?;
		for child in self.children.values_mut() {
			child.instance.run_lifecycle_tree(lifecycle, services, store)?;
		}
		Ok(())
	}

	/// Visits this instance and its descendants depth first.
	pub(crate) fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Instance)) {
		visit(self);
		for child in self.children.values() {
			child.instance.walk(visit);
		}
	}

	/// Finds an instance in this subtree by id.
	pub fn find(&self, id: &str) -> Option<&Instance> {
		if self.id == id {
			return Some(self);
		}
		self.children
			.values()
			.find_map(|child| child.instance.find(id))
	}
}
