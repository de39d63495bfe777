//! Declarative component surface.

use super::{Lifecycle, MethodAccess, is_internal_method};
use crate::capabilities::ActionContext;
use crate::error::{LiveError, LiveResult};
use crate::render::RenderContext;
use crate::url::UrlBinding;
use crate::validation::Rules;
use crate::value::{FromValue, IntoValue, Value};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// Mount parameters, by name.
pub type Params = IndexMap<String, Value>;

type Getter<C> = Box<dyn Fn(&C) -> Value + Send + Sync>;
type Setter<C> = Box<dyn Fn(&mut C, Value) -> LiveResult<()> + Send + Sync>;
type ActionFn<C> =
	Box<dyn Fn(&mut C, &Args, &mut ActionContext<'_>) -> LiveResult<Option<Value>> + Send + Sync>;
type BeforeUpdateFn<C> = Box<
	dyn Fn(&mut C, &mut Value, Option<&str>, &mut ActionContext<'_>) -> LiveResult<()>
		+ Send
		+ Sync,
>;
type AfterUpdateFn<C> = Box<
	dyn Fn(&mut C, &Value, Option<&str>, &mut ActionContext<'_>) -> LiveResult<()> + Send + Sync,
>;
type HookFn<C> = Box<dyn Fn(&mut C, &mut ActionContext<'_>) -> LiveResult<()> + Send + Sync>;
type MountFn<C> = Box<dyn Fn(&mut C, &Params, &mut ActionContext<'_>) -> LiveResult<()> + Send + Sync>;
type RenderFn<C> = Box<dyn Fn(&C, &mut RenderContext<'_>) -> LiveResult<String> + Send + Sync>;

struct PropertyDef<C> {
	get: Getter<C>,
	set: Setter<C>,
}

/// Positional action arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(Vec<Value>);

impl Args {
	/// Wraps already converted values.
	pub fn new(values: Vec<Value>) -> Self {
		Self(values)
	}

	/// Converts client-supplied JSON parameters.
	pub fn from_json(params: Vec<serde_json::Value>) -> Self {
		Self(params.into_iter().map(Value::from_json).collect())
	}

	/// Number of arguments.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Whether no argument was passed.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Raw argument at a position.
	pub fn raw(&self, index: usize) -> Option<&Value> {
		self.0.get(index)
	}

	/// Converts the argument at a position. A missing argument converts from
	/// `null`, so `Option<T>` parameters are optional.
	pub fn get<T: FromValue>(&self, index: usize) -> LiveResult<T> {
		T::from_value(self.0.get(index).cloned().unwrap_or_default())
	}

	/// Converts the argument at a position, or returns `default` when absent.
	pub fn get_or<T: FromValue>(&self, index: usize, default: T) -> LiveResult<T> {
		match self.0.get(index) {
			Some(value) => T::from_value(value.clone()),
			None => Ok(default),
		}
	}

	/// All arguments.
	pub fn values(&self) -> &[Value] {
		&self.0
	}
}

/// Values an action may return to the client.
pub trait ActionReturn {
	/// Converts the return into a client-visible value.
	fn into_return(self) -> Option<Value>;
}

impl ActionReturn for () {
	fn into_return(self) -> Option<Value> {
		None
	}
}

impl<T: IntoValue> ActionReturn for T {
	fn into_return(self) -> Option<Value> {
		Some(self.into_value())
	}
}

/// The public surface of a component type, filled in by [`super::Component::define`].
pub struct Definition<C> {
	name: String,
	properties: IndexMap<String, PropertyDef<C>>,
	actions: IndexMap<String, ActionFn<C>>,
	before_update: HashMap<String, BeforeUpdateFn<C>>,
	after_update: HashMap<String, AfterUpdateFn<C>>,
	hooks: HashMap<Lifecycle, Vec<HookFn<C>>>,
	mount: Option<MountFn<C>>,
	listeners: IndexMap<String, String>,
	rules: Rules,
	modelable: Option<String>,
	url: IndexMap<String, UrlBinding>,
	render: Option<RenderFn<C>>,
	template: Option<String>,
}

impl<C> std::fmt::Debug for Definition<C> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Definition")
			.field("name", &self.name)
			.field("properties", &self.properties.keys().collect::<Vec<_>>())
			.field("actions", &self.actions.keys().collect::<Vec<_>>())
			.field("listeners", &self.listeners)
			.field("rules", &self.rules)
			.field("modelable", &self.modelable)
			.field("url", &self.url)
			.field("template", &self.template)
			.finish()
	}
}

impl<C: 'static> Definition<C> {
	pub(crate) fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			properties: IndexMap::new(),
			actions: IndexMap::new(),
			before_update: HashMap::new(),
			after_update: HashMap::new(),
			hooks: HashMap::new(),
			mount: None,
			listeners: IndexMap::new(),
			rules: Rules::new(),
			modelable: None,
			url: IndexMap::new(),
			render: None,
			template: None,
		}
	}

	/// Registered component name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Declares a public property backed by a field.
	///
	/// Only declared properties are serialized into snapshots or writable by
	/// the client. Declaration order is the wire order.
	pub fn property<T, G, S>(&mut self, name: impl Into<String>, get: G, get_mut: S) -> &mut Self
	where
		T: IntoValue + FromValue + Clone + 'static,
		G: Fn(&C) -> &T + Send + Sync + 'static,
		S: Fn(&mut C) -> &mut T + Send + Sync + 'static,
	{
		self.properties.insert(
			name.into(),
			PropertyDef {
				get: Box::new(move |component| get(component).clone().into_value()),
				set: Box::new(move |component, value| {
					*get_mut(component) = T::from_value(value)?;
					Ok(())
				}),
			},
		);
		self
	}

	/// Declares a client-callable action.
	pub fn action<F, R>(&mut self, name: impl Into<String>, action: F) -> &mut Self
	where
		F: Fn(&mut C, &Args, &mut ActionContext<'_>) -> LiveResult<R> + Send + Sync + 'static,
		R: ActionReturn,
	{
		self.actions.insert(
			name.into(),
			Box::new(move |component, args, ctx| {
				action(component, args, ctx).map(ActionReturn::into_return)
			}),
		);
		self
	}

	/// Runs before a client write to `property` (or a path under it).
	///
	/// The hook receives the incoming value and may rewrite it; the nested
	/// key, if any, is the remainder of the path (`"0.name"` for
	/// `items.0.name`).
	pub fn before_update<F>(&mut self, property: impl Into<String>, hook: F) -> &mut Self
	where
		F: Fn(&mut C, &mut Value, Option<&str>, &mut ActionContext<'_>) -> LiveResult<()>
			+ Send
			+ Sync
			+ 'static,
	{
		self.before_update.insert(property.into(), Box::new(hook));
		self
	}

	/// Runs after a client write to `property` has been assigned.
	pub fn after_update<F>(&mut self, property: impl Into<String>, hook: F) -> &mut Self
	where
		F: Fn(&mut C, &Value, Option<&str>, &mut ActionContext<'_>) -> LiveResult<()>
			+ Send
			+ Sync
			+ 'static,
	{
		self.after_update.insert(property.into(), Box::new(hook));
		self
	}

	/// Registers a lifecycle hook.
	pub fn on<F>(&mut self, lifecycle: Lifecycle, hook: F) -> &mut Self
	where
		F: Fn(&mut C, &mut ActionContext<'_>) -> LiveResult<()> + Send + Sync + 'static,
	{
		self.hooks.entry(lifecycle).or_default().push(Box::new(hook));
		self
	}

	/// Runs on every request after the instance is built.
	pub fn on_boot<F>(&mut self, hook: F) -> &mut Self
	where
		F: Fn(&mut C, &mut ActionContext<'_>) -> LiveResult<()> + Send + Sync + 'static,
	{
		self.on(Lifecycle::Boot, hook)
	}

	/// Runs after hydration from a snapshot.
	pub fn on_hydrate<F>(&mut self, hook: F) -> &mut Self
	where
		F: Fn(&mut C, &mut ActionContext<'_>) -> LiveResult<()> + Send + Sync + 'static,
	{
		self.on(Lifecycle::Hydrate, hook)
	}

	/// Runs once before the action batch.
	pub fn on_updating<F>(&mut self, hook: F) -> &mut Self
	where
		F: Fn(&mut C, &mut ActionContext<'_>) -> LiveResult<()> + Send + Sync + 'static,
	{
		self.on(Lifecycle::Updating, hook)
	}

	/// Runs once after the action batch.
	pub fn on_updated<F>(&mut self, hook: F) -> &mut Self
	where
		F: Fn(&mut C, &mut ActionContext<'_>) -> LiveResult<()> + Send + Sync + 'static,
	{
		self.on(Lifecycle::Updated, hook)
	}

	/// Runs before rendering.
	pub fn on_rendering<F>(&mut self, hook: F) -> &mut Self
	where
		F: Fn(&mut C, &mut ActionContext<'_>) -> LiveResult<()> + Send + Sync + 'static,
	{
		self.on(Lifecycle::Rendering, hook)
	}

	/// Runs before dehydration.
	pub fn on_dehydrate<F>(&mut self, hook: F) -> &mut Self
	where
		F: Fn(&mut C, &mut ActionContext<'_>) -> LiveResult<()> + Send + Sync + 'static,
	{
		self.on(Lifecycle::Dehydrate, hook)
	}

	/// Runs once when the component is first mounted.
	pub fn on_mount<F>(&mut self, hook: F) -> &mut Self
	where
		F: Fn(&mut C, &Params, &mut ActionContext<'_>) -> LiveResult<()> + Send + Sync + 'static,
	{
		self.mount = Some(Box::new(hook));
		self
	}

	/// Calls `action` whenever `event` is dispatched.
	pub fn listen(&mut self, event: impl Into<String>, action: impl Into<String>) -> &mut Self {
		self.listeners.insert(event.into(), action.into());
		self
	}

	/// Adds a validation rule for a field path.
	pub fn rule(&mut self, field: impl Into<String>, rule: impl Into<String>) -> &mut Self {
		self.rules.insert(field.into(), rule.into());
		self
	}

	/// Marks the property a parent may bind to.
	pub fn modelable(&mut self, property: impl Into<String>) -> &mut Self {
		self.modelable = Some(property.into());
		self
	}

	/// Mirrors a property in the page query string under its own name.
	pub fn url(&mut self, property: impl Into<String>) -> &mut Self {
		self.url_with(property, UrlBinding::new())
	}

	/// Mirrors a property in the page query string.
	///
	/// ```ignore
	/// def.url_with("page", UrlBinding::new().alias("p").history());
	/// ```
	pub fn url_with(&mut self, property: impl Into<String>, binding: UrlBinding) -> &mut Self {
		self.url.insert(property.into(), binding);
		self
	}

	/// Overrides the template name.
	pub fn template(&mut self, template: impl Into<String>) -> &mut Self {
		self.template = Some(template.into());
		self
	}

	/// Supplies a custom render function.
	pub fn render<F>(&mut self, render: F) -> &mut Self
	where
		F: Fn(&C, &mut RenderContext<'_>) -> LiveResult<String> + Send + Sync + 'static,
	{
		self.render = Some(Box::new(render));
		self
	}

	pub(crate) fn validate(&self) -> LiveResult<()> {
		let invalid = |message: String| LiveError::InvalidDefinition {
			component: self.name.clone(),
			message,
		};
		for property in self.properties.keys() {
			if property.is_empty() || property.contains('.') {
				return Err(invalid(format!("invalid property name {:?}", property)));
			}
		}
		for action in self.actions.keys() {
			if action.is_empty() || action.starts_with('$') {
				return Err(invalid(format!("invalid action name {:?}", action)));
			}
		}
		for (event, action) in &self.listeners {
			if !self.actions.contains_key(action) {
				return Err(invalid(format!(
					"listener for {:?} names undeclared action {:?}",
					event, action
				)));
			}
		}
		for property in self.before_update.keys().chain(self.after_update.keys()) {
			if !self.properties.contains_key(property) {
				return Err(invalid(format!(
					"update hook names undeclared property {:?}",
					property
				)));
			}
		}
		let mut parameters = HashSet::new();
		for (property, binding) in &self.url {
			if !self.properties.contains_key(property) {
				return Err(invalid(format!(
					"url property {:?} is not declared",
					property
				)));
			}
			if !parameters.insert(binding.name(property)) {
				return Err(invalid(format!(
					"query parameter {:?} is used twice",
					binding.name(property)
				)));
			}
		}
		if let Some(modelable) = &self.modelable
			&& !self.properties.contains_key(modelable)
		{
			return Err(invalid(format!(
				"modelable property {:?} is not declared",
				modelable
			)));
		}
		Ok(())
	}

	pub(crate) fn property_names(&self) -> impl Iterator<Item = &str> {
		self.properties.keys().map(String::as_str)
	}

	pub(crate) fn action_names(&self) -> impl Iterator<Item = &str> {
		self.actions.keys().map(String::as_str)
	}

	pub(crate) fn has_property(&self, name: &str) -> bool {
		self.properties.contains_key(name)
	}

	pub(crate) fn get(&self, component: &C, property: &str) -> LiveResult<Value> {
		self.properties
			.get(property)
			.map(|def| (def.get)(component))
			.ok_or_else(|| LiveError::InvalidPath(property.to_string()))
	}

	pub(crate) fn set(&self, component: &mut C, property: &str, value: Value) -> LiveResult<()> {
		let def = self
			.properties
			.get(property)
			.ok_or_else(|| LiveError::InvalidPath(property.to_string()))?;
		(def.set)(component, value)
	}

	pub(crate) fn public_values(&self, component: &C) -> Vec<(String, Value)> {
		self.properties
			.iter()
			.map(|(name, def)| (name.clone(), (def.get)(component)))
			.collect()
	}

	pub(crate) fn method_access(&self, method: &str) -> MethodAccess {
		if self.actions.contains_key(method) {
			MethodAccess::Public
		} else if is_internal_method(method) {
			MethodAccess::Internal
		} else {
			MethodAccess::Missing
		}
	}

	pub(crate) fn call(
		&self,
		component: &mut C,
		method: &str,
		args: &Args,
		ctx: &mut ActionContext<'_>,
	) -> LiveResult<Option<Value>> {
		match self.actions.get(method) {
			Some(action) => action(component, args, ctx),
			None => Err(LiveError::MethodNotFound {
				component: self.name.clone(),
				method: method.to_string(),
			}),
		}
	}

	pub(crate) fn before_update_hook(
		&self,
		component: &mut C,
		property: &str,
		key: Option<&str>,
		value: &mut Value,
		ctx: &mut ActionContext<'_>,
	) -> LiveResult<()> {
		match self.before_update.get(property) {
			Some(hook) => hook(component, value, key, ctx),
			None => Ok(()),
		}
	}

	pub(crate) fn after_update_hook(
		&self,
		component: &mut C,
		property: &str,
		key: Option<&str>,
		value: &Value,
		ctx: &mut ActionContext<'_>,
	) -> LiveResult<()> {
		match self.after_update.get(property) {
			Some(hook) => hook(component, value, key, ctx),
			None => Ok(()),
		}
	}

	pub(crate) fn run_hooks(
		&self,
		component: &mut C,
		lifecycle: Lifecycle,
		ctx: &mut ActionContext<'_>,
	) -> LiveResult<()> {
		if let Some(hooks) = self.hooks.get(&lifecycle) {
			for hook in hooks {
				hook(component, ctx)?;
			}
		}
		Ok(())
	}

	pub(crate) fn has_mount(&self) -> bool {
		self.mount.is_some()
	}

	pub(crate) fn run_mount(
		&self,
		component: &mut C,
		params: &Params,
		ctx: &mut ActionContext<'_>,
	) -> LiveResult<()> {
		match &self.mount {
			Some(mount) => mount(component, params, ctx),
			None => Ok(()),
		}
	}

	pub(crate) fn custom_render(&self) -> Option<&RenderFn<C>> {
		self.render.as_ref()
	}

	pub(crate) fn template_name(&self) -> Option<&str> {
		self.template.as_deref()
	}

	pub(crate) fn listeners(&self) -> &IndexMap<String, String> {
		&self.listeners
	}

	pub(crate) fn rules(&self) -> &Rules {
		&self.rules
	}

	pub(crate) fn modelable_property(&self) -> Option<&str> {
		self.modelable.as_deref()
	}

	pub(crate) fn url_bindings(&self) -> &IndexMap<String, UrlBinding> {
		&self.url
	}
}

/// Declares a public property backed by a field of the same name.
///
/// ```ignore
/// live_property!(def, count);
/// live_property!(def, "displayName" => display_name);
/// ```
#[macro_export]
macro_rules! live_property {
	($def:expr, $field:ident) => {
		$def.property(
			stringify!($field),
			|component| &component.$field,
			|component| &mut component.$field,
		)
	};
	($def:expr, $name:expr => $field:ident) => {
		$def.property(
			$name,
			|component| &component.$field,
			|component| &mut component.$field,
		)
	};
}
