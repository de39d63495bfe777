//! Component lookup by name.

use super::definition::Definition;
use super::erased::{Bound, ErasedComponent};
use super::instance::Instance;
use super::Component;
use crate::error::{LiveError, LiveResult};
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;

trait ComponentFactory: Send + Sync {
	fn create(&self) -> Box<dyn ErasedComponent>;
}

struct DefinitionFactory<C: Component> {
	definition: Arc<Definition<C>>,
}

impl<C: Component> ComponentFactory for DefinitionFactory<C> {
	fn create(&self) -> Box<dyn ErasedComponent> {
		Box::new(Bound::new(self.definition.clone()))
	}
}

/// Introspection data about a registered component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentInfo {
	/// Registered name.
	pub name: String,
	/// Public properties in wire order.
	pub properties: Vec<String>,
	/// Callable actions.
	pub actions: Vec<String>,
	/// Event → action listeners.
	pub listeners: IndexMap<String, String>,
	/// Bindable property, if any.
	pub modelable: Option<String>,
}

/// Maps component names to their definitions.
#[derive(Default, Clone)]
pub struct ComponentRegistry {
	factories: IndexMap<String, Arc<dyn ComponentFactory>>,
}

impl std::fmt::Debug for ComponentRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ComponentRegistry")
			.field("components", &self.factories.keys().collect::<Vec<_>>())
			.finish()
	}
}

impl ComponentRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `C` under `name`, building and validating its definition.
	pub fn register<C: Component>(&mut self, name: impl Into<String>) -> LiveResult<&mut Self> {
		let name = name.into();
		if name.is_empty() {
			return Err(LiveError::InvalidDefinition {
				component: name,
				message: "component name must not be empty".into(),
			});
		}
		if self.factories.contains_key(&name) {
			return Err(LiveError::InvalidDefinition {
				component: name,
				message: "a component is already registered under this name".into(),
			});
		}
		let mut definition = Definition::<C>::new(name.clone());
		C::define(&mut definition);
		definition.validate()?;
		tracing::debug!(component = %name, "registered live component");
		self.factories.insert(
			name,
			Arc::new(DefinitionFactory {
				definition: Arc::new(definition),
			}),
		);
		Ok(self)
	}

	/// Whether a component is registered under `name`.
	pub fn contains(&self, name: &str) -> bool {
		self.factories.contains_key(name)
	}

	/// Registered names in registration order.
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.factories.keys().map(String::as_str)
	}

	/// Describes the component registered under `name`.
	pub fn resolve(&self, name: &str) -> LiveResult<ComponentInfo> {
		let component = self.create(name)?;
		Ok(ComponentInfo {
			name: name.to_string(),
			properties: component
				.property_names()
				.into_iter()
				.map(str::to_string)
				.collect(),
			actions: component
				.action_names()
				.into_iter()
				.map(str::to_string)
				.collect(),
			listeners: component.listeners().clone(),
			modelable: component.modelable().map(str::to_string),
		})
	}

	fn create(&self, name: &str) -> LiveResult<Box<dyn ErasedComponent>> {
		self.factories
			.get(name)
			.map(|factory| factory.create())
			.ok_or_else(|| LiveError::ComponentNotFound(name.to_string()))
	}

	/// Builds a fresh instance with default state.
	pub fn instantiate(
		&self,
		name: &str,
		id: impl Into<String>,
		locale: impl Into<String>,
		path: impl Into<String>,
	) -> LiveResult<Instance> {
		let component = self.create(name)?;
		Ok(Instance::new(
			id.into(),
			name.to_string(),
			locale.into(),
			path.into(),
			component,
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::component::Definition;
	use crate::live_property;
	use rstest::rstest;

	#[derive(Default)]
	struct Toggle {
		on: bool,
	}

	impl Component for Toggle {
		fn define(def: &mut Definition<Self>) {
			live_property!(def, on);
			def.action("flip", |toggle, _args, _ctx| {
				toggle.on = !toggle.on;
				Ok(())
			});
			def.listen("reset-all", "flip");
		}
	}

	#[derive(Default)]
	struct Broken;

	impl Component for Broken {
		fn define(def: &mut Definition<Self>) {
			def.listen("saved", "missing");
		}
	}

	#[rstest]
	fn test_resolve_describes_component() {
		// Arrange
		let mut registry = ComponentRegistry::new();
		registry.register::<Toggle>("toggle").unwrap();

		// Act
		let info = registry.resolve("toggle").unwrap();

		// Assert
		assert_eq!(info.properties, vec!["on"]);
		assert_eq!(info.actions, vec!["flip"]);
		assert_eq!(info.listeners["reset-all"], "flip");
	}

	#[rstest]
	fn test_unknown_component() {
		// Act
		let result = ComponentRegistry::new().instantiate("missing", "id", "en", "/");

		// Assert
		assert!(matches!(result, Err(LiveError::ComponentNotFound(name)) if name == "missing"));
	}

	#[rstest]
	fn test_invalid_definition_is_rejected() {
		// Act
		let result = ComponentRegistry::new().register::<Broken>("broken").map(|_| ());

		// Assert
		assert!(matches!(result, Err(LiveError::InvalidDefinition { .. })));
	}

	#[rstest]
	fn test_duplicate_name_is_rejected() {
		// Arrange
		let mut registry = ComponentRegistry::new();
		registry.register::<Toggle>("toggle").unwrap();

		// Act
		let result = registry.register::<Toggle>("toggle").map(|_| ());

		// Assert
		assert!(result.is_err());
	}

	#[rstest]
	fn test_instantiate_uses_defaults() {
		// Arrange
		let mut registry = ComponentRegistry::new();
		registry.register::<Toggle>("toggle").unwrap();

		// Act
		let instance = registry.instantiate("toggle", "abc", "en", "/").unwrap();

		// Assert
		assert_eq!(instance.id(), "abc");
		assert_eq!(instance.get("on").unwrap(), crate::value::Value::Bool(false));
	}
}
