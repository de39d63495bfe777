//! Entry points: mounting components and processing client requests.
//!
//! [`LiveManager`] owns the shared [`Services`] and exposes the two
//! operations every transport needs. Each call builds its own instance tree
//! from scratch; nothing survives between calls except what travels in the
//! snapshot.
//!
//! ```ignore
//! let manager = LiveManager::builder()
//!     .settings(LiveSettings::from_toml_file("live.toml")?.apply_env()?)
//!     .component::<Counter>("counter")
//!     .renderer(TeraRenderer::from_glob("templates/**/*.html")?)
//!     .build()?;
//!
//! let mounted = manager.mount("counter", Params::new())?;
//! let (status, body) = manager.handle_json(&request_body);
//! ```

use crate::actions::ActionProcessor;
use crate::checksum::ChecksumManager;
use crate::component::{Component, ComponentRegistry, Instance, Lifecycle, Params};
use crate::error::{ErrorKind, LiveError, LiveResult};
use crate::keys::{SigningKeyProvider, StaticKeyProvider};
use crate::model::{ModelRepository, NoModels};
use crate::protocol::{Effects, ErrorResponse, RequestPayload, ResponsePayload};
use crate::render::{TemplateRenderer, finalize, render_instance};
use crate::services::Services;
use crate::settings::LiveSettings;
use crate::snapshot::{Memo, Snapshot, SnapshotCodec};
use crate::store::ComponentStore;
use crate::synth::{Synthesizer, SynthesizerRegistry, Wireable};
use crate::url::{parse_query, read_param};
use crate::validation::{NoopValidator, Validator};
use crate::value::Value;
use crate::capabilities::DispatchedEvent;
use std::sync::Arc;

/// Options for [`LiveManager::mount_with`].
#[derive(Debug, Clone)]
pub struct MountOptions {
	/// Locale; defaults to the configured default locale.
	pub locale: Option<String>,
	/// Path of the page the component is mounted on.
	pub path: String,
	/// Query string of the page. Values for URL-bound properties override
	/// same-named params.
	pub query: Option<String>,
}

impl Default for MountOptions {
	fn default() -> Self {
		Self {
			locale: None,
			path: "/".to_string(),
			query: None,
		}
	}
}

/// A freshly mounted component.
#[derive(Debug, Clone, PartialEq)]
pub struct Mounted {
	/// Initial snapshot.
	pub snapshot: Snapshot,
	/// Markup with the snapshot embedded in the root element.
	pub html: String,
	/// Effects raised while mounting.
	pub effects: Effects,
}

/// Mounts and updates live components.
#[derive(Debug, Clone)]
pub struct LiveManager {
	services: Services,
}

impl LiveManager {
	/// Starts a builder.
	pub fn builder() -> LiveManagerBuilder {
		LiveManagerBuilder::default()
	}

	/// Shared services.
	pub fn services(&self) -> &Services {
		&self.services
	}

	/// Mounts a component on the root path with the default locale.
	pub fn mount(&self, name: &str, params: Params) -> LiveResult<Mounted> {
		self.mount_with(name, params, MountOptions::default())
	}

	/// Mounts a component: creates it, fills params, runs its mount hook,
	/// renders it and signs the first snapshot.
	pub fn mount_with(&self, name: &str, params: Params, options: MountOptions) -> LiveResult<Mounted> {
		let services = &self.services;
		let MountOptions {
			locale,
			path,
			query,
		} = options;
		let id = uuid::Uuid::new_v4().simple().to_string();
		let locale = locale.unwrap_or_else(|| services.settings().default_locale.clone());
		let mut store = ComponentStore::new();
		let mut instance = services.components().instantiate(name, id, locale, path)?;
		tracing::info!(component = %name, id = %instance.id, "mounting component");

		let params = match query {
			Some(query) => with_query_values(&instance, params, &query)?,
			None => params,
		};
		mount_instance(&mut instance, &params, services, &mut store)?;
		let html = render_instance(&mut instance, services, &mut store)?
			.unwrap_or_else(|| "<div></div>".to_string());
		let (snapshot, html) = finalize(&mut instance, Some(html), services, &mut store)?;
		let html = html.ok_or_else(|| LiveError::Render("mount produced no markup".into()))?;

		let effects = Effects {
			redirect_to: redirect_target(&instance),
			dispatched_events: dispatched_events(&instance),
			listeners: instance.listeners(),
			url: instance.url_bindings(),
			..Effects::default()
		};
		Ok(Mounted {
			snapshot,
			html,
			effects,
		})
	}

	/// Hydrates the snapshot, applies the actions, re-renders and signs the
	/// new snapshot.
	pub fn process_request(&self, payload: RequestPayload) -> LiveResult<ResponsePayload> {
		let result = self.process(&payload);
		if let Err(error) = &result {
			match error.kind() {
				ErrorKind::Tamper | ErrorKind::Security => {}
				_ => tracing::error!(
					component = %payload.snapshot.fingerprint.name,
					id = %payload.snapshot.fingerprint.id,
					error = %error,
					"live request failed"
				),
			}
		}
		result
	}

	fn process(&self, payload: &RequestPayload) -> LiveResult<ResponsePayload> {
		let services = &self.services;
		let mut store = ComponentStore::new();
		let mut instance = SnapshotCodec::new(services).hydrate(&payload.snapshot)?;
		tracing::debug!(
			component = %instance.name,
			id = %instance.id,
			actions = payload.actions.len(),
			"processing request"
		);

		instance.run_lifecycle_tree(Lifecycle::Boot, services, &mut store)?;
		instance.run_lifecycle_tree(Lifecycle::Hydrate, services, &mut store)?;
		let outcome =
			ActionProcessor::new(services).apply(&mut instance, &payload.actions, &mut store)?;

		let redirect_to = redirect_target(&instance);
		if redirect_to.is_some() && !services.settings().render_on_redirect {
			instance.skip_render = true;
		}
		let html = render_instance(&mut instance, services, &mut store)?;
		let (snapshot, html) = finalize(&mut instance, html, services, &mut store)?;
		let dirty = dirty_properties(&payload.snapshot.memo, &snapshot.memo, instance.updated_paths());

		let effects = Effects {
			html,
			redirect_to,
			dispatched_events: dispatched_events(&instance),
			listeners: instance.listeners(),
			returns: outcome.returns,
			dirty,
			url: instance.url_bindings(),
		};
		Ok(ResponsePayload { snapshot, effects })
	}

	/// Transport-neutral JSON entry point: returns an HTTP-style status and
	/// the response body.
	pub fn handle_json(&self, body: &[u8]) -> (u16, Vec<u8>) {
		let payload: RequestPayload = match serde_json::from_slice(body) {
			Ok(payload) => payload,
			Err(error) => {
				tracing::warn!(error = %error, "malformed live request");
				let mut effect = LiveError::Json(error).to_error_effect();
				effect.status = 400;
				return error_body(ErrorResponse { error: effect });
			}
		};
		match self.process_request(payload) {
			Ok(response) => match serde_json::to_vec(&response) {
				Ok(bytes) => (200, bytes),
				Err(error) => error_body(ErrorResponse {
					error: LiveError::Json(error).to_error_effect(),
				}),
			},
			Err(error) => error_body(ErrorResponse {
				error: error.to_error_effect(),
			}),
		}
	}

	/// Script tag loading the client runtime.
	pub fn script_tag(&self) -> String {
		format!(
			"<script src=\"{}\" defer></script>",
			crate::render::escape_attribute(&self.services.settings().asset_url)
		)
	}
}

fn error_body(response: ErrorResponse) -> (u16, Vec<u8>) {
	let status = response.error.status;
	(status, serde_json::to_vec(&response).unwrap_or_default())
}

/// Fills same-named public properties from params, then runs the boot and
/// mount hooks.
pub(crate) fn mount_instance(
	instance: &mut Instance,
	params: &Params,
	services: &Services,
	store: &mut ComponentStore,
) -> LiveResult<()> {
	for (key, value) in params {
		if instance.component.has_property(key) {
			instance.set(key, value.clone())?;
		}
	}
	instance.run_lifecycle(Lifecycle::Boot, services, store)?;
	instance.with_context(services, store, |component, ctx| component.mount(params, ctx))
}

/// Overlays query values of URL-bound properties onto the mount params.
fn with_query_values(instance: &Instance, mut params: Params, query: &str) -> LiveResult<Params> {
	let pairs = parse_query(query)?;
	for (property, binding) in instance.url_bindings() {
		if let Some(value) = read_param(&pairs, binding.name(&property)) {
			tracing::debug!(id = %instance.id, property = %property, "property initialized from query string");
			params.insert(property, Value::from_json(value));
		}
	}
	Ok(params)
}

fn redirect_target(instance: &Instance) -> Option<String> {
	let mut target = None;
	instance.walk(&mut |node| {
		if target.is_none() {
			target = node.caps.redirector.target().map(str::to_string);
		}
	});
	target
}

fn dispatched_events(instance: &Instance) -> Vec<DispatchedEvent> {
	let mut events = Vec::new();
	instance.walk(&mut |node| events.extend(node.caps.events.events().iter().cloned()));
	events
}

/// Properties whose wire value changed, followed by client-written paths.
pub(crate) fn dirty_properties(before: &Memo, after: &Memo, updated: &[String]) -> Vec<String> {
	let mut dirty: Vec<String> = after
		.data
		.iter()
		.filter(|(property, value)| before.data.get(property.as_str()) != Some(*value))
		.map(|(property, _)| property.clone())
		.collect();
	for path in updated {
		if !dirty.contains(path) {
			dirty.push(path.clone());
		}
	}
	dirty
}

/// Builder for [`LiveManager`].
pub struct LiveManagerBuilder {
	components: ComponentRegistry,
	errors: Vec<LiveError>,
	synthesizers: SynthesizerRegistry,
	renderer: Option<Arc<dyn TemplateRenderer>>,
	validator: Arc<dyn Validator>,
	models: Arc<dyn ModelRepository>,
	keys: Option<Arc<dyn SigningKeyProvider>>,
	settings: LiveSettings,
}

impl Default for LiveManagerBuilder {
	fn default() -> Self {
		Self {
			components: ComponentRegistry::new(),
			errors: Vec::new(),
			synthesizers: SynthesizerRegistry::new(),
			renderer: None,
			validator: Arc::new(NoopValidator),
			models: Arc::new(NoModels),
			keys: None,
			settings: LiveSettings::default(),
		}
	}
}

impl LiveManagerBuilder {
	/// Replaces the settings.
	pub fn settings(mut self, settings: LiveSettings) -> Self {
		self.settings = settings;
		self
	}

	/// Sets the signing secret in the settings.
	pub fn secret_key(mut self, key: impl Into<String>) -> Self {
		self.settings.set_secret_key(key);
		self
	}

	/// Registers a component; definition errors surface from [`Self::build`].
	pub fn component<C: Component>(mut self, name: impl Into<String>) -> Self {
		if let Err(error) = self.components.register::<C>(name) {
			self.errors.push(error);
		}
		self
	}

	/// Appends a custom synthesizer after the built-ins.
	pub fn synthesizer(mut self, synthesizer: impl Synthesizer + 'static) -> Self {
		self.synthesizers.register(synthesizer);
		self
	}

	/// Appends the synthesizer of a [`Wireable`] type.
	pub fn wireable<T: Wireable>(mut self) -> Self {
		self.synthesizers.register_wireable::<T>();
		self
	}

	/// Sets the template renderer.
	pub fn renderer(mut self, renderer: impl TemplateRenderer + 'static) -> Self {
		self.renderer = Some(Arc::new(renderer));
		self
	}

	/// Sets the validator.
	pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
		self.validator = validator;
		self
	}

	/// Sets the model repository.
	pub fn models(mut self, models: Arc<dyn ModelRepository>) -> Self {
		self.models = models;
		self
	}

	/// Uses a custom signing key provider instead of the settings secret.
	pub fn key_provider(mut self, keys: Arc<dyn SigningKeyProvider>) -> Self {
		self.keys = Some(keys);
		self
	}

	/// Validates the configuration and builds the manager.
	pub fn build(self) -> LiveResult<LiveManager> {
		if let Some(error) = self.errors.into_iter().next() {
			return Err(error);
		}
		let renderer = self
			.renderer
			.ok_or_else(|| LiveError::Settings("a template renderer is required".into()))?;
		let keys = match self.keys {
			Some(keys) => {
				if self.settings.default_locale.trim().is_empty() {
					return Err(LiveError::Settings("default_locale must not be empty".into()));
				}
				keys
			}
			None => {
				self.settings.validate()?;
				Arc::new(StaticKeyProvider::from_settings(&self.settings)) as Arc<dyn SigningKeyProvider>
			}
		};
		tracing::debug!(
			components = self.components.names().count(),
			keys = keys.name(),
			"built live manager"
		);
		Ok(LiveManager {
			services: Services {
				components: Arc::new(self.components),
				synthesizers: Arc::new(self.synthesizers),
				renderer,
				validator: self.validator,
				models: self.models,
				checksum: ChecksumManager::new(keys),
				settings: Arc::new(self.settings),
			},
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::actions::Action;
	use crate::component::Definition;
	use crate::live_property;
	use crate::render::FnRenderer;
	use crate::value::{IntoValue, Value};
	use rstest::{fixture, rstest};
	use serde_json::json;

	const KEY: &str = "0123456789abcdef0123456789abcdef";

	#[derive(Default)]
	struct Counter {
		count: i64,
	}

	impl Component for Counter {
		fn define(def: &mut Definition<Self>) {
			live_property!(def, count);
			def.action("increment", |counter, _args, _ctx| {
				counter.count += 1;
				Ok(())
			});
			def.action("finish", |_counter, _args, ctx| {
				ctx.redirect("/done");
				Ok(())
			});
			def.action("announce", |counter, _args, ctx| {
				ctx.dispatch("counted", vec![json!(counter.count)]).up();
				Ok(())
			});
			def.action("quiet", |counter, _args, ctx| {
				counter.count += 10;
				ctx.skip_render();
				Ok(())
			});
		}
	}

	#[fixture]
	fn manager() -> LiveManager {
		LiveManager::builder()
			.secret_key(KEY)
			.component::<Counter>("counter")
			.renderer(FnRenderer::new(|template, props| {
				Ok(format!("<div data-template=\"{}\">{}</div>", template, props["count"]))
			}))
			.build()
			.unwrap()
	}

	fn request(manager: &LiveManager, snapshot: Snapshot, actions: Vec<Action>) -> LiveResult<ResponsePayload> {
		manager.process_request(RequestPayload::new(snapshot, actions))
	}

	#[rstest]
	fn test_mount_fills_params_and_stamps_root(manager: LiveManager) {
		// Arrange
		let mut params = Params::new();
		params.insert("count".into(), 5.into_value());

		// Act
		let mounted = manager.mount("counter", params).unwrap();

		// Assert
		assert_eq!(mounted.snapshot.data("count"), Some(&json!(5)));
		assert!(mounted.html.starts_with(&format!("<div wire:id=\"{}\"", mounted.snapshot.id())));
		assert!(mounted.html.contains("wire:snapshot="));
		assert!(mounted.html.contains("data-template=\"counter.html\""));
		assert!(mounted.html.ends_with(">5</div>"));
	}

	#[rstest]
	fn test_mount_ids_are_unique(manager: LiveManager) {
		// Act
		let first = manager.mount("counter", Params::new()).unwrap();
		let second = manager.mount("counter", Params::new()).unwrap();

		// Assert
		assert_ne!(first.snapshot.id(), second.snapshot.id());
	}

	#[rstest]
	fn test_mount_unknown_component(manager: LiveManager) {
		// Act
		let result = manager.mount("missing", Params::new());

		// Assert
		assert!(matches!(result, Err(LiveError::ComponentNotFound(_))));
	}

	#[rstest]
	fn test_increment_end_to_end(manager: LiveManager) {
		// Arrange
		let mounted = manager.mount("counter", Params::new()).unwrap();

		// Act
		let response = request(
			&manager,
			mounted.snapshot.clone(),
			vec![Action::call("increment", vec![])],
		)
		.unwrap();

		// Assert
		assert_eq!(response.snapshot.data("count"), Some(&json!(1)));
		assert_ne!(response.snapshot.checksum, mounted.snapshot.checksum);
		assert_eq!(response.effects.dirty, vec!["count"]);
		assert!(response.effects.html.unwrap().ends_with(">1</div>"));
	}

	#[rstest]
	fn test_redirect_skips_render(manager: LiveManager) {
		// Arrange
		let mounted = manager.mount("counter", Params::new()).unwrap();

		// Act
		let response = request(&manager, mounted.snapshot, vec![Action::call("finish", vec![])]).unwrap();

		// Assert
		assert_eq!(response.effects.redirect_to.as_deref(), Some("/done"));
		assert!(response.effects.html.is_none());
	}

	#[rstest]
	fn test_skip_render_still_returns_snapshot(manager: LiveManager) {
		// Arrange
		let mounted = manager.mount("counter", Params::new()).unwrap();

		// Act
		let response = request(&manager, mounted.snapshot, vec![Action::call("quiet", vec![])]).unwrap();

		// Assert
		assert!(response.effects.html.is_none());
		assert_eq!(response.snapshot.data("count"), Some(&json!(10)));
	}

	#[rstest]
	fn test_dispatched_events_are_reported(manager: LiveManager) {
		// Arrange
		let mounted = manager.mount("counter", Params::new()).unwrap();

		// Act
		let response = request(&manager, mounted.snapshot, vec![Action::call("announce", vec![])]).unwrap();

		// Assert
		let event = &response.effects.dispatched_events[0];
		assert_eq!(event.name, "counted");
		assert!(event.up);
		assert_eq!(event.source.as_deref(), Some(response.snapshot.id()));
	}

	#[rstest]
	fn test_handle_json_success(manager: LiveManager) {
		// Arrange
		let mounted = manager.mount("counter", Params::new()).unwrap();
		let body = serde_json::to_vec(&json!({
			"snapshot": mounted.snapshot,
			"actions": [{"type": "callMethod", "payload": {"method": "increment", "params": []}}]
		}))
		.unwrap();

		// Act
		let (status, response) = manager.handle_json(&body);

		// Assert
		assert_eq!(status, 200);
		let response: ResponsePayload = serde_json::from_slice(&response).unwrap();
		assert_eq!(response.snapshot.data("count"), Some(&json!(1)));
	}

	#[rstest]
	fn test_handle_json_tamper_is_generic_419(manager: LiveManager) {
		// Arrange
		let mut snapshot = manager.mount("counter", Params::new()).unwrap().snapshot;
		snapshot.memo.data.insert("count".into(), json!(1000));
		let body = serde_json::to_vec(&RequestPayload::new(snapshot, vec![])).unwrap();

		// Act
		let (status, response) = manager.handle_json(&body);

		// Assert
		assert_eq!(status, 419);
		let response: ErrorResponse = serde_json::from_slice(&response).unwrap();
		assert_eq!(response.error.message, "corrupt component payload");
	}

	#[rstest]
	fn test_handle_json_malformed_body(manager: LiveManager) {
		// Act
		let (status, _) = manager.handle_json(b"{not json");

		// Assert
		assert_eq!(status, 400);
	}

	#[rstest]
	fn test_builder_requires_renderer() {
		// Act
		let result = LiveManager::builder().secret_key(KEY).build();

		// Assert
		assert!(matches!(result, Err(LiveError::Settings(_))));
	}

	#[rstest]
	fn test_builder_requires_secret() {
		// Act
		let result = LiveManager::builder()
			.renderer(FnRenderer::new(|_, _| Ok("<div></div>".into())))
			.build();

		// Assert
		assert!(matches!(result, Err(LiveError::Settings(_))));
	}

	#[rstest]
	fn test_dirty_properties() {
		// Arrange
		let mut before = Memo::default();
		before.data.insert("a".into(), json!(1));
		before.data.insert("b".into(), json!(2));
		let mut after = before.clone();
		after.data.insert("b".into(), json!(3));

		// Act
		let dirty = dirty_properties(&before, &after, &["a".to_string(), "b".to_string()]);

		// Assert
		assert_eq!(dirty, vec!["b", "a"]);
	}

	#[rstest]
	fn test_script_tag(manager: LiveManager) {
		// Act & Assert
		assert_eq!(
			manager.script_tag(),
			"<script src=\"/live/live.js\" defer></script>"
		);
	}

	#[rstest]
	fn test_value_params_accept_json(manager: LiveManager) {
		// Arrange
		let mut params = Params::new();
		params.insert("count".into(), Value::from_json(json!("7")));

		// Act
		let mounted = manager.mount("counter", params).unwrap();

		// Assert
		assert_eq!(mounted.snapshot.data("count"), Some(&json!(7)));
	}
}
