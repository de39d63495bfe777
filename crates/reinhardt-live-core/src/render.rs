//! Rendering: the template collaborator, the render context handed to
//! components, and root attribute injection.
//!
//! Components never render through ambient state. Everything a render needs
//! (props, errors, locale, the renderer, child slots) travels in the
//! [`RenderContext`] built for that one render.

use crate::component::{ChildSlot, Instance, Lifecycle, Params};
use crate::error::{LiveError, LiveResult};
use crate::nesting::NestingCoordinator;
use crate::protocol::Effects;
use crate::services::Services;
use crate::snapshot::{Snapshot, SnapshotCodec};
use crate::store::ComponentStore;
use crate::synth::DehydrateContext;
use crate::value::{IntoValue, Value};
use indexmap::IndexMap;
use tera::{Context, Tera};

/// Attribute carrying the component id on the root element.
pub const ID_ATTRIBUTE: &str = "wire:id";
/// Attribute carrying the JSON snapshot on the root element.
pub const SNAPSHOT_ATTRIBUTE: &str = "wire:snapshot";
/// Attribute carrying the JSON effects on the root element.
pub const EFFECTS_ATTRIBUTE: &str = "wire:effects";

/// Renders a named template with a props mapping.
pub trait TemplateRenderer: Send + Sync {
	/// Produces markup.
	fn render(
		&self,
		template: &str,
		props: &serde_json::Map<String, serde_json::Value>,
	) -> LiveResult<String>;
}

/// [`TemplateRenderer`] backed by Tera.
///
/// Templates whose names end in `.html` are autoescaped.
#[derive(Debug, Default)]
pub struct TeraRenderer {
	tera: Tera,
}

impl TeraRenderer {
	/// Wraps a configured Tera instance.
	pub fn new(tera: Tera) -> Self {
		Self { tera }
	}

	/// Loads every template matching a glob, e.g. `templates/**/*.html`.
	pub fn from_glob(glob: &str) -> LiveResult<Self> {
		Ok(Self::new(Tera::new(glob)?))
	}

	/// Adds an inline template.
	pub fn add_raw_template(&mut self, name: &str, content: &str) -> LiveResult<&mut Self> {
		self.tera.add_raw_template(name, content)?;
		Ok(self)
	}

	/// The underlying Tera instance.
	pub fn tera(&self) -> &Tera {
		&self.tera
	}
}

impl TemplateRenderer for TeraRenderer {
	fn render(
		&self,
		template: &str,
		props: &serde_json::Map<String, serde_json::Value>,
	) -> LiveResult<String> {
		let context = Context::from_serialize(props)?;
		Ok(self.tera.render(template, &context)?)
	}
}

/// [`TemplateRenderer`] backed by a closure.
pub struct FnRenderer<F>(F);

impl<F> FnRenderer<F>
where
	F: Fn(&str, &serde_json::Map<String, serde_json::Value>) -> LiveResult<String> + Send + Sync,
{
	/// Wraps the closure.
	pub fn new(render: F) -> Self {
		Self(render)
	}
}

impl<F> TemplateRenderer for FnRenderer<F>
where
	F: Fn(&str, &serde_json::Map<String, serde_json::Value>) -> LiveResult<String> + Send + Sync,
{
	fn render(
		&self,
		template: &str,
		props: &serde_json::Map<String, serde_json::Value>,
	) -> LiveResult<String> {
		(self.0)(template, props)
	}
}

/// Everything a component's render can see.
pub struct RenderContext<'a> {
	pub(crate) services: &'a Services,
	pub(crate) store: &'a mut ComponentStore,
	pub(crate) id: &'a str,
	pub(crate) name: &'a str,
	pub(crate) locale: &'a str,
	pub(crate) path: &'a str,
	pub(crate) template: String,
	pub(crate) state: IndexMap<String, Value>,
	pub(crate) props: serde_json::Map<String, serde_json::Value>,
	pub(crate) previous: IndexMap<String, ChildSlot>,
	pub(crate) children: IndexMap<String, ChildSlot>,
}

impl<'a> RenderContext<'a> {
	/// Component id.
	pub fn id(&self) -> &str {
		self.id
	}

	/// Component name.
	pub fn name(&self) -> &str {
		self.name
	}

	/// Locale from the fingerprint.
	pub fn locale(&self) -> &str {
		self.locale
	}

	/// Template props: public state, `errors` and `locale`.
	pub fn props(&self) -> &serde_json::Map<String, serde_json::Value> {
		&self.props
	}

	/// A public property value.
	pub fn state(&self, property: &str) -> Option<&Value> {
		self.state.get(property)
	}

	/// A view of the component's own template.
	pub fn default_view(&self) -> View<'a> {
		self.view(self.template.clone())
	}

	/// A view of another template, with the same props.
	pub fn view(&self, template: impl Into<String>) -> View<'a> {
		View {
			renderer: self.services.renderer(),
			template: template.into(),
			props: self.props.clone(),
		}
	}

	/// Starts mounting (or reusing) a child component in `slot`.
	pub fn child<'c>(
		&'c mut self,
		slot: impl Into<String>,
		name: impl Into<String>,
	) -> ChildBuilder<'c, 'a> {
		ChildBuilder {
			ctx: self,
			slot: slot.into(),
			name: name.into(),
			params: Params::new(),
			binding: None,
		}
	}
}

/// A template plus props, ready to render.
pub struct View<'a> {
	renderer: &'a dyn TemplateRenderer,
	template: String,
	props: serde_json::Map<String, serde_json::Value>,
}

impl View<'_> {
	/// Adds or replaces a prop.
	pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.props.insert(key.into(), value.into());
		self
	}

	/// Template name.
	pub fn template(&self) -> &str {
		&self.template
	}

	/// Renders the view.
	pub fn render(self) -> LiveResult<String> {
		self.renderer.render(&self.template, &self.props)
	}
}

/// Builder for a child mount inside a render.
pub struct ChildBuilder<'c, 'a> {
	ctx: &'c mut RenderContext<'a>,
	slot: String,
	name: String,
	params: Params,
	binding: Option<String>,
}

impl ChildBuilder<'_, '_> {
	/// Adds a mount parameter.
	pub fn param(mut self, key: impl Into<String>, value: impl IntoValue) -> Self {
		self.params.insert(key.into(), value.into_value());
		self
	}

	/// Binds a parent property to the child's modelable property.
	pub fn bind(mut self, outer: impl Into<String>) -> Self {
		self.binding = Some(outer.into());
		self
	}

	/// Mounts or reuses the child and returns its markup.
	pub fn mount(self) -> LiveResult<String> {
		let services = self.ctx.services;
		NestingCoordinator::new(services).mount_child(
			self.ctx,
			&self.name,
			self.params,
			&self.slot,
			self.binding.as_deref(),
		)
	}
}

pub(crate) fn default_template_name(prefix: &str, name: &str) -> String {
	format!("{}{}.html", prefix, name)
}

/// Renders an instance, replacing its children with the ones mounted during
/// this render. Returns `None` when the component skipped rendering.
pub(crate) fn render_instance(
	instance: &mut Instance,
	services: &Services,
	store: &mut ComponentStore,
) -> LiveResult<Option<String>> {
	if instance.skip_render {
		tracing::debug!(component = %instance.name, id = %instance.id, "render skipped");
		return Ok(None);
	}
	instance.run_lifecycle(Lifecycle::Rendering, services, store)?;

	let registry = services.synthesizers();
	let mut state = IndexMap::new();
	let mut props = serde_json::Map::new();
	for (property, value) in instance.public_values() {
		let ctx = DehydrateContext {
			registry,
			component: &instance.name,
			property: &property,
		};
		props.insert(property.clone(), registry.render_value(&value, &ctx)?);
		state.insert(property, value);
	}
	if !props.contains_key("errors") {
		props.insert("errors".into(), serde_json::to_value(instance.errors())?);
	}
	if !props.contains_key("locale") {
		props.insert("locale".into(), instance.locale.clone().into());
	}

	let template = instance
		.component
		.template()
		.map(str::to_string)
		.unwrap_or_else(|| default_template_name(&services.settings().template_prefix, &instance.name));
	let previous = std::mem::take(&mut instance.children);

	let (html, children) = {
		let mut ctx = RenderContext {
			services,
			store,
			id: &instance.id,
			name: &instance.name,
			locale: &instance.locale,
			path: &instance.path,
			template,
			state,
			props,
			previous,
			children: IndexMap::new(),
		};
		let html = instance.component.render(&mut ctx);
		for (slot, child) in &ctx.previous {
			tracing::debug!(
				component = %instance.name,
				slot = %slot,
				child = %child.instance.id,
				"unmounting child"
			);
		}
		(html, ctx.children)
	};
	instance.children = children;
	html.map(Some)
}

/// Runs dehydrate hooks, signs the snapshot and stamps the root element.
pub(crate) fn finalize(
	instance: &mut Instance,
	html: Option<String>,
	services: &Services,
	store: &mut ComponentStore,
) -> LiveResult<(Snapshot, Option<String>)> {
	instance.run_lifecycle(Lifecycle::Dehydrate, services, store)?;
	let snapshot = SnapshotCodec::new(services).dehydrate(instance)?;
	let html = match html {
		Some(html) => {
			let effects = Effects {
				listeners: instance.listeners(),
				url: instance.url_bindings(),
				..Effects::default()
			};
			let snapshot_json = snapshot.to_attribute_json()?;
			let effects_json = serde_json::to_string(&effects)?;
			Some(insert_root_attributes(
				&html,
				&[
					(ID_ATTRIBUTE, instance.id()),
					(SNAPSHOT_ATTRIBUTE, &snapshot_json),
					(EFFECTS_ATTRIBUTE, &effects_json),
				],
			)?)
		}
		None => None,
	};
	Ok((snapshot, html))
}

/// Adds attributes to the first element of `html`.
pub fn insert_root_attributes(html: &str, attributes: &[(&str, &str)]) -> LiveResult<String> {
	let bytes = html.as_bytes();
	let mut from = 0;
	let start = loop {
		let Some(offset) = html[from..].find('<') else {
			return Err(LiveError::Render(
				"component markup must have a single root element".into(),
			));
		};
		let at = from + offset;
		match bytes.get(at + 1) {
			Some(byte) if byte.is_ascii_alphabetic() => break at,
			_ => from = at + 1,
		}
	};
	let name_end = html[start + 1..]
		.find(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/')
		.map(|offset| start + 1 + offset)
		.ok_or_else(|| LiveError::Render("unterminated root element".into()))?;

	let mut out = String::with_capacity(html.len() + 64);
	out.push_str(&html[..name_end]);
	for (name, value) in attributes {
		out.push(' ');
		out.push_str(name);
		out.push_str("=\"");
		out.push_str(&escape_attribute(value));
		out.push('"');
	}
	out.push_str(&html[name_end..]);
	Ok(out)
}

/// Escapes a value for a double-quoted attribute.
pub fn escape_attribute(value: &str) -> String {
	let mut escaped = String::with_capacity(value.len());
	for c in value.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&#39;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			_ => escaped.push(c),
		}
	}
	escaped
}
