//! Type erasure over [`Component`] implementations.

use super::definition::{Args, Definition, Params};
use super::{Component, Lifecycle, MethodAccess};
use crate::capabilities::ActionContext;
use crate::error::LiveResult;
use crate::render::RenderContext;
use crate::url::UrlBinding;
use crate::validation::Rules;
use crate::value::Value;
use indexmap::IndexMap;
use std::any::Any;
use std::sync::Arc;

/// Object-safe view of a component paired with its definition.
pub(crate) trait ErasedComponent: Send + Sync {
	fn as_any(&self) -> &dyn Any;
	fn as_any_mut(&mut self) -> &mut dyn Any;
	fn property_names(&self) -> Vec<&str>;
	fn action_names(&self) -> Vec<&str>;
	fn has_property(&self, property: &str) -> bool;
	fn get_property(&self, property: &str) -> LiveResult<Value>;
	fn set_property(&mut self, property: &str, value: Value) -> LiveResult<()>;
	fn public_values(&self) -> Vec<(String, Value)>;
	fn method_access(&self, method: &str) -> MethodAccess;
	fn call(
		&mut self,
		method: &str,
		args: &Args,
		ctx: &mut ActionContext<'_>,
	) -> LiveResult<Option<Value>>;
	fn before_update(
		&mut self,
		property: &str,
		key: Option<&str>,
		value: &mut Value,
		ctx: &mut ActionContext<'_>,
	) -> LiveResult<()>;
	fn after_update(
		&mut self,
		property: &str,
		key: Option<&str>,
		value: &Value,
		ctx: &mut ActionContext<'_>,
	) -> LiveResult<()>;
	fn lifecycle(&mut self, lifecycle: Lifecycle, ctx: &mut ActionContext<'_>) -> LiveResult<()>;
	fn has_mount(&self) -> bool;
	fn mount(&mut self, params: &Params, ctx: &mut ActionContext<'_>) -> LiveResult<()>;
	fn render(&self, ctx: &mut RenderContext<'_>) -> LiveResult<String>;
	fn template(&self) -> Option<&str>;
	fn listeners(&self) -> &IndexMap<String, String>;
	fn rules(&self) -> &Rules;
	fn modelable(&self) -> Option<&str>;
	fn url_bindings(&self) -> &IndexMap<String, UrlBinding>;
}

/// A component value bound to its shared definition.
pub(crate) struct Bound<C: Component> {
	component: C,
	definition: Arc<Definition<C>>,
}

impl<C: Component> Bound<C> {
	pub(crate) fn new(definition: Arc<Definition<C>>) -> Self {
		Self {
			component: C::default(),
			definition,
		}
	}

	fn enter(&self, ctx: &mut ActionContext<'_>) {
		ctx.set_definition(self.definition.clone());
	}
}

impl<C: Component> ErasedComponent for Bound<C> {
	fn as_any(&self) -> &dyn Any {
		&self.component
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		&mut self.component
	}

	fn property_names(&self) -> Vec<&str> {
		self.definition.property_names().collect()
	}

	fn action_names(&self) -> Vec<&str> {
		self.definition.action_names().collect()
	}

	fn has_property(&self, property: &str) -> bool {
		self.definition.has_property(property)
	}

	fn get_property(&self, property: &str) -> LiveResult<Value> {
		self.definition.get(&self.component, property)
	}

	fn set_property(&mut self, property: &str, value: Value) -> LiveResult<()> {
		self.definition.set(&mut self.component, property, value)
	}

	fn public_values(&self) -> Vec<(String, Value)> {
		self.definition.public_values(&self.component)
	}

	fn method_access(&self, method: &str) -> MethodAccess {
		self.definition.method_access(method)
	}

	fn call(
		&mut self,
		method: &str,
		args: &Args,
		ctx: &mut ActionContext<'_>,
	) -> LiveResult<Option<Value>> {
		self.enter(ctx);
		self.definition.call(&mut self.component, method, args, ctx)
	}

	fn before_update(
		&mut self,
		property: &str,
		key: Option<&str>,
		value: &mut Value,
		ctx: &mut ActionContext<'_>,
	) -> LiveResult<()> {
		self.enter(ctx);
		self.definition
			.before_update_hook(&mut self.component, property, key, value, ctx)
	}

	fn after_update(
		&mut self,
		property: &str,
		key: Option<&str>,
		value: &Value,
		ctx: &mut ActionContext<'_>,
	) -> LiveResult<()> {
		self.enter(ctx);
		self.definition
			.after_update_hook(&mut self.component, property, key, value, ctx)
	}

	fn lifecycle(&mut self, lifecycle: Lifecycle, ctx: &mut ActionContext<'_>) -> LiveResult<()> {
		self.enter(ctx);
		self.definition
			.run_hooks(&mut self.component, lifecycle, ctx)
	}

	fn has_mount(&self) -> bool {
		self.definition.has_mount()
	}

	fn mount(&mut self, params: &Params, ctx: &mut ActionContext<'_>) -> LiveResult<()> {
		self.enter(ctx);
		self.definition.run_mount(&mut self.component, params, ctx)
	}

	fn render(&self, ctx: &mut RenderContext<'_>) -> LiveResult<String> {
		match self.definition.custom_render() {
			Some(render) => render(&self.component, ctx),
			None => ctx.default_view().render(),
		}
	}

	fn template(&self) -> Option<&str> {
		self.definition.template_name()
	}

	fn listeners(&self) -> &IndexMap<String, String> {
		self.definition.listeners()
	}

	fn rules(&self) -> &Rules {
		self.definition.rules()
	}

	fn modelable(&self) -> Option<&str> {
		self.definition.modelable_property()
	}

	fn url_bindings(&self) -> &IndexMap<String, UrlBinding> {
		self.definition.url_bindings()
	}
}
