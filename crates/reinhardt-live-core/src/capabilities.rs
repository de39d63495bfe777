//! Component capabilities.
//!
//! Redirects, event dispatch and field errors are independent capability
//! objects composed into a [`Capabilities`] value per instance. Actions and
//! hooks reach them through the [`ActionContext`] they are handed; components
//! never inherit framework behavior.

use crate::component::{Component, Definition};
use crate::error::{LiveError, LiveResult};
use crate::services::Services;
use crate::store::ComponentStore;
use crate::synth::DehydrateContext;
use crate::validation::{ErrorBag, Rules, Validator};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

/// Records a redirect effect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redirector {
	target: Option<String>,
}

impl Redirector {
	/// Requests a redirect; the last call wins.
	pub fn redirect(&mut self, url: impl Into<String>) {
		self.target = Some(url.into());
	}

	/// The requested redirect target.
	pub fn target(&self) -> Option<&str> {
		self.target.as_deref()
	}

	/// Whether a redirect was requested.
	pub fn is_redirecting(&self) -> bool {
		self.target.is_some()
	}

	/// Takes the redirect target.
	pub fn take(&mut self) -> Option<String> {
		self.target.take()
	}
}

/// An event dispatched by a component during a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchedEvent {
	/// Event name.
	pub name: String,
	/// Event parameters.
	#[serde(default)]
	pub params: Vec<serde_json::Value>,
	/// Only the dispatching component receives the event.
	#[serde(rename = "self", default, skip_serializing_if = "std::ops::Not::not")]
	pub self_only: bool,
	/// Only ancestors of the dispatching component receive the event.
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub up: bool,
	/// Only components with this name receive the event.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub to: Option<String>,
	/// Id of the dispatching component.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source: Option<String>,
}

impl DispatchedEvent {
	/// A broadcast event.
	pub fn new(name: impl Into<String>, params: Vec<serde_json::Value>) -> Self {
		Self {
			name: name.into(),
			params,
			self_only: false,
			up: false,
			to: None,
			source: None,
		}
	}

	/// Targets components registered under `component`.
	pub fn to(&mut self, component: impl Into<String>) -> &mut Self {
		self.to = Some(component.into());
		self
	}

	/// Targets ancestors only.
	pub fn up(&mut self) -> &mut Self {
		self.up = true;
		self
	}

	/// Targets the dispatching component only.
	pub fn self_only(&mut self) -> &mut Self {
		self.self_only = true;
		self
	}
}

/// Collects dispatched events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventBus {
	events: Vec<DispatchedEvent>,
}

impl EventBus {
	/// Queues an event and returns it for scoping.
	pub fn dispatch(&mut self, event: DispatchedEvent) -> &mut DispatchedEvent {
		self.events.push(event);
		let last = self.events.len() - 1;
		&mut self.events[last]
	}

	/// Queued events.
	pub fn events(&self) -> &[DispatchedEvent] {
		&self.events
	}

	/// Drains the queued events.
	pub fn take(&mut self) -> Vec<DispatchedEvent> {
		std::mem::take(&mut self.events)
	}
}

/// Field errors plus an optional validator override.
#[derive(Clone, Default)]
pub struct ValidationBag {
	errors: ErrorBag,
	validator: Option<Arc<dyn Validator>>,
}

impl std::fmt::Debug for ValidationBag {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ValidationBag")
			.field("errors", &self.errors)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl ValidationBag {
	/// Current errors.
	pub fn errors(&self) -> &ErrorBag {
		&self.errors
	}

	/// Mutable errors.
	pub fn errors_mut(&mut self) -> &mut ErrorBag {
		&mut self.errors
	}

	/// Replaces every error.
	pub fn replace(&mut self, errors: ErrorBag) {
		self.errors = errors;
	}

	/// The validator override, if any.
	pub fn validator(&self) -> Option<Arc<dyn Validator>> {
		self.validator.clone()
	}
}

/// Capabilities of one instance.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
	/// Redirect effect.
	pub redirector: Redirector,
	/// Dispatched events.
	pub events: EventBus,
	/// Field errors.
	pub validation: ValidationBag,
}

impl Capabilities {
	/// Starts a builder.
	pub fn builder() -> CapabilitiesBuilder {
		CapabilitiesBuilder::default()
	}
}

/// Builder for [`Capabilities`].
#[derive(Default)]
pub struct CapabilitiesBuilder {
	errors: ErrorBag,
	validator: Option<Arc<dyn Validator>>,
	redirect: Option<String>,
}

impl CapabilitiesBuilder {
	/// Starts with the given field errors.
	pub fn errors(mut self, errors: ErrorBag) -> Self {
		self.errors = errors;
		self
	}

	/// Overrides the application validator for this instance.
	pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
		self.validator = Some(validator);
		self
	}

	/// Starts with a pending redirect.
	pub fn redirect(mut self, url: impl Into<String>) -> Self {
		self.redirect = Some(url.into());
		self
	}

	/// Builds the capabilities.
	pub fn build(self) -> Capabilities {
		Capabilities {
			redirector: Redirector {
				target: self.redirect,
			},
			events: EventBus::default(),
			validation: ValidationBag {
				errors: self.errors,
				validator: self.validator,
			},
		}
	}
}

/// What actions and hooks can reach while they run.
pub struct ActionContext<'a> {
	id: &'a str,
	name: &'a str,
	locale: &'a str,
	caps: &'a mut Capabilities,
	services: &'a Services,
	store: &'a mut ComponentStore,
	skip_render: &'a mut bool,
	definition: Option<Arc<dyn Any + Send + Sync>>,
}

impl<'a> ActionContext<'a> {
	pub(crate) fn new(
		id: &'a str,
		name: &'a str,
		locale: &'a str,
		caps: &'a mut Capabilities,
		services: &'a Services,
		store: &'a mut ComponentStore,
		skip_render: &'a mut bool,
	) -> Self {
		Self {
			id,
			name,
			locale,
			caps,
			services,
			store,
			skip_render,
			definition: None,
		}
	}

	pub(crate) fn set_definition(&mut self, definition: Arc<dyn Any + Send + Sync>) {
		self.definition = Some(definition);
	}

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

	/// Shared services.
	pub fn services(&self) -> &Services {
		self.services
	}

	/// The instance's capabilities.
	pub fn capabilities(&mut self) -> &mut Capabilities {
		self.caps
	}

	/// Redirects the browser after this request.
	pub fn redirect(&mut self, url: impl Into<String>) {
		let url = url.into();
		tracing::debug!(component = %self.name, id = %self.id, url = %url, "redirect requested");
		self.caps.redirector.redirect(url);
	}

	/// Dispatches an event; scope it with the returned handle.
	pub fn dispatch(
		&mut self,
		event: impl Into<String>,
		params: Vec<serde_json::Value>,
	) -> &mut DispatchedEvent {
		let mut event = DispatchedEvent::new(event, params);
		event.source = Some(self.id.to_string());
		self.caps.events.dispatch(event)
	}

	/// Returns the snapshot without re-rendering.
	pub fn skip_render(&mut self) {
		*self.skip_render = true;
	}

	/// Adds a field error.
	pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
		self.caps.validation.errors_mut().add(field, message);
	}

	/// Clears every field error.
	pub fn reset_errors(&mut self) {
		self.caps.validation.errors_mut().clear();
	}

	/// Clears one field's errors.
	pub fn reset_error(&mut self, field: &str) {
		self.caps.validation.errors_mut().forget(field);
	}

	/// Current field errors.
	pub fn errors(&self) -> &ErrorBag {
		self.caps.validation.errors()
	}

	/// Reads from the per-request side table.
	pub fn stored(&self, key: &str) -> Option<&serde_json::Value> {
		self.store.get(self.id, key)
	}

	/// Writes to the per-request side table.
	pub fn store(&mut self, key: impl Into<String>, value: serde_json::Value) {
		self.store.set(self.id, key, value);
	}

	/// Validates the component against every declared rule.
	///
	/// On failure the error bag is replaced and [`LiveError::Validation`] is
	/// returned; propagating it with `?` aborts the rest of the batch while
	/// the request still succeeds.
	pub fn validate<C: Component>(&mut self, component: &C) -> LiveResult<()> {
		let definition = self.definition::<C>()?;
		if definition.rules().is_empty() {
			return Err(LiveError::InvalidDefinition {
				component: self.name.to_string(),
				message: "validate called without declared rules".into(),
			});
		}
		let rules = definition.rules().clone();
		self.run_validation(&definition, component, &rules, None)
	}

	/// Validates a single field (and its nested paths).
	pub fn validate_only<C: Component>(&mut self, component: &C, field: &str) -> LiveResult<()> {
		let definition = self.definition::<C>()?;
		let nested = format!("{}.", field);
		let rules: Rules = definition
			.rules()
			.iter()
			.filter(|(rule_field, _)| *rule_field == field || rule_field.starts_with(&nested))
			.map(|(rule_field, rule)| (rule_field.clone(), rule.clone()))
			.collect();
		if rules.is_empty() {
			return Ok(());
		}
		self.run_validation(&definition, component, &rules, Some(field))
	}

	fn definition<C: Component>(&self) -> LiveResult<Arc<Definition<C>>> {
		self.definition
			.clone()
			.and_then(|definition| definition.downcast::<Definition<C>>().ok())
			.ok_or_else(|| LiveError::InvalidDefinition {
				component: self.name.to_string(),
				message: format!(
					"validation requested for {} outside its own action",
					std::any::type_name::<C>()
				),
			})
	}

	fn run_validation<C: Component>(
		&mut self,
		definition: &Definition<C>,
		component: &C,
		rules: &Rules,
		only: Option<&str>,
	) -> LiveResult<()> {
		let registry = self.services.synthesizers();
		let mut data = serde_json::Map::new();
		for (property, value) in definition.public_values(component) {
			let ctx = DehydrateContext {
				registry,
				component: self.name,
				property: &property,
			};
			data.insert(property.clone(), registry.render_value(&value, &ctx)?);
		}
		let validator = self
			.caps
			.validation
			.validator()
			.unwrap_or_else(|| self.services.validator().clone());
		match validator.validate(&data, rules) {
			Ok(()) => {
				let errors = self.caps.validation.errors_mut();
				for field in rules.keys() {
					errors.forget(field);
				}
				Ok(())
			}
			Err(bag) => {
				tracing::debug!(
					component = %self.name,
					id = %self.id,
					fields = bag.len(),
					"validation failed"
				);
				match only {
					None => self.caps.validation.replace(bag.clone()),
					Some(field) => {
						let errors = self.caps.validation.errors_mut();
						errors.forget(field);
						errors.merge(bag.clone());
					}
				}
				Err(LiveError::Validation(bag))
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_dispatched_event_wire_form() {
		// Arrange
		let mut bus = EventBus::default();

		// Act
		bus.dispatch(DispatchedEvent::new("saved", vec![json!(1)]))
			.to("sidebar")
			.up();

		// Assert
		assert_eq!(
			serde_json::to_value(&bus.events()[0]).unwrap(),
			json!({"name": "saved", "params": [1], "up": true, "to": "sidebar"})
		);
	}

	#[rstest]
	fn test_self_only_serializes_as_self() {
		// Arrange
		let mut event = DispatchedEvent::new("ping", vec![]);

		// Act
		event.self_only();

		// Assert
		assert_eq!(serde_json::to_value(&event).unwrap()["self"], json!(true));
	}

	#[rstest]
	fn test_builder_composes_capabilities() {
		// Act
		let caps = Capabilities::builder()
			.errors(ErrorBag::new().with("email", "required"))
			.redirect("/done")
			.build();

		// Assert
		assert!(caps.validation.errors().has("email"));
		assert_eq!(caps.redirector.target(), Some("/done"));
		assert!(caps.events.events().is_empty());
	}

	#[rstest]
	fn test_redirect_last_call_wins() {
		// Arrange
		let mut redirector = Redirector::default();

		// Act
		redirector.redirect("/a");
		redirector.redirect("/b");

		// Assert
		assert_eq!(redirector.take().as_deref(), Some("/b"));
		assert!(!redirector.is_redirecting());
	}
}
