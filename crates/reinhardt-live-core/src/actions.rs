//! Client actions and the processor that applies them.

use crate::component::{Args, Instance, Lifecycle, MethodAccess};
use crate::error::{ErrorKind, LiveError, LiveResult};
use crate::model::Model;
use crate::services::Services;
use crate::store::ComponentStore;
use crate::synth::DehydrateContext;
use crate::validation::{ErrorBag, Rules};
use crate::value::{Value, set_segments, split_path};
use serde::{Deserialize, Serialize};

/// One client-requested mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Action {
	/// Writes a public property path.
	#[serde(rename = "syncInput")]
	PropertySync {
		/// Dotted property path.
		#[serde(rename = "name")]
		path: String,
		/// New value.
		value: serde_json::Value,
	},
	/// Calls a declared action or a magic method.
	#[serde(rename = "callMethod")]
	MethodCall {
		/// Method name.
		method: String,
		/// Positional arguments.
		#[serde(default)]
		params: Vec<serde_json::Value>,
	},
	/// Broadcasts an event to listening components.
	#[serde(rename = "fireEvent")]
	EventDispatch {
		/// Event name.
		event: String,
		/// Event parameters.
		#[serde(default)]
		params: Vec<serde_json::Value>,
	},
}

impl Action {
	/// A property sync.
	pub fn sync(path: impl Into<String>, value: serde_json::Value) -> Self {
		Self::PropertySync {
			path: path.into(),
			value,
		}
	}

	/// A method call.
	pub fn call(method: impl Into<String>, params: Vec<serde_json::Value>) -> Self {
		Self::MethodCall {
			method: method.into(),
			params,
		}
	}

	/// An event dispatch.
	pub fn fire(event: impl Into<String>, params: Vec<serde_json::Value>) -> Self {
		Self::EventDispatch {
			event: event.into(),
			params,
		}
	}
}

/// Result of applying a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionOutcome {
	/// Field errors that aborted the batch, if any.
	pub errors: Option<ErrorBag>,
	/// Return values of method calls, in call order.
	pub returns: Vec<serde_json::Value>,
}

/// Applies action batches to hydrated instances.
pub struct ActionProcessor<'a> {
	services: &'a Services,
}

impl<'a> ActionProcessor<'a> {
	/// Creates a processor over the shared services.
	pub fn new(services: &'a Services) -> Self {
		Self { services }
	}

	/// Applies `actions` in order, bracketed by the batch hooks.
	///
	/// A validation failure stops the batch and is reported in the outcome;
	/// every other error aborts the request.
	pub fn apply(
		&self,
		instance: &mut Instance,
		actions: &[Action],
		store: &mut ComponentStore,
	) -> LiveResult<ActionOutcome> {
		instance.run_lifecycle(Lifecycle::Updating, self.services, store)?;

		let mut outcome = ActionOutcome::default();
		for (index, action) in actions.iter().enumerate() {
			match self.apply_one(instance, action, store, &mut outcome) {
				Ok(()) => {}
				Err(LiveError::Validation(bag)) => {
					tracing::debug!(
						component = %instance.name,
						id = %instance.id,
						skipped = actions.len() - index - 1,
						"validation failed, skipping remaining actions"
					);
					record_validation(instance, &bag);
					outcome.errors = Some(bag);
					break;
				}
				Err(error) => {
					if error.kind() == ErrorKind::Security {
						tracing::warn!(
							component = %instance.name,
							id = %instance.id,
							error = %error,
							"rejected client action"
						);
					}
					return Err(error);
				}
			}
		}

		instance.run_lifecycle(Lifecycle::Updated, self.services, store)?;
		Ok(outcome)
	}

	fn apply_one(
		&self,
		instance: &mut Instance,
		action: &Action,
		store: &mut ComponentStore,
		outcome: &mut ActionOutcome,
	) -> LiveResult<()> {
		match action {
			Action::PropertySync { path, value } => {
				self.sync(instance, path, Value::from_json(value.clone()), store)
			}
			Action::MethodCall { method, params } => {
				self.method(instance, method, params, store, outcome)
			}
			Action::EventDispatch { event, params } => {
				let args = Args::from_json(params.clone());
				self.fire(instance, event, &args, store, true)
			}
		}
	}

	fn method(
		&self,
		instance: &mut Instance,
		method: &str,
		params: &[serde_json::Value],
		store: &mut ComponentStore,
		outcome: &mut ActionOutcome,
	) -> LiveResult<()> {
		match method {
			"$refresh" | "$commit" => Ok(()),
			"$set" | "$sync" => {
				let path = path_param(method, params)?;
				let value = params.get(1).cloned().unwrap_or_default();
				self.sync(instance, path, Value::from_json(value), store)
			}
			"$toggle" => {
				let path = path_param(method, params)?;
				let current = match path.split_once('.') {
					Some((property, rest)) => instance
						.get(property)
						.ok()
						.and_then(|value| value.get_path(rest).map(Value::is_truthy))
						.unwrap_or(false),
					None => instance
						.get(path)
						.map(|value| value.is_truthy())
						.unwrap_or(false),
				};
				self.sync(instance, path, Value::Bool(!current), store)
			}
			_ => {
				let args = Args::from_json(params.to_vec());
				if let Some(value) = self.call(instance, method, &args, store)? {
					let registry = self.services.synthesizers();
					let ctx = DehydrateContext {
						registry,
						component: &instance.name,
						property: method,
					};
					outcome.returns.push(registry.render_value(&value, &ctx)?);
				}
				Ok(())
			}
		}
	}

	fn call(
		&self,
		instance: &mut Instance,
		method: &str,
		args: &Args,
		store: &mut ComponentStore,
	) -> LiveResult<Option<Value>> {
		match instance.component.method_access(method) {
			MethodAccess::Public => {}
			MethodAccess::Internal => {
				return Err(LiveError::NonPublicMethodCall {
					component: instance.name.clone(),
					method: method.to_string(),
				});
			}
			MethodAccess::Missing => {
				return Err(LiveError::MethodNotFound {
					component: instance.name.clone(),
					method: method.to_string(),
				});
			}
		}
		tracing::debug!(
			component = %instance.name,
			id = %instance.id,
			method = %method,
			"calling action"
		);
		instance.with_context(self.services, store, |component, ctx| {
			component.call(method, args, ctx)
		})
	}

	fn sync(
		&self,
		instance: &mut Instance,
		path: &str,
		value: Value,
		store: &mut ComponentStore,
	) -> LiveResult<()> {
		let segments = split_path(path)?;
		let property = segments[0].to_string();
		if !instance.component.has_property(&property) {
			return Err(LiveError::ProtectedPropertyBinding {
				component: instance.name.clone(),
				property: path.to_string(),
			});
		}
		let rest = &segments[1..];
		let key = path.split_once('.').map(|(_, rest)| rest.to_string());
		let current = instance.get(&property)?;

		if !rest.is_empty()
			&& current.downcast_ref::<Model>().is_some()
			&& !has_rule_for(instance.component.rules(), path)
		{
			return Err(LiveError::CannotBindToModelDataWithoutValidationRule {
				component: instance.name.clone(),
				path: path.to_string(),
			});
		}

		let mut incoming = value;
		instance.with_context(self.services, store, |component, ctx| {
			component.before_update(&property, key.as_deref(), &mut incoming, ctx)
		})?;

		let updated = if rest.is_empty() {
			incoming.clone()
		} else {
			let mut whole = current;
			set_segments(&mut whole, rest, incoming.clone())?;
			whole
		};
		instance.set(&property, updated)?;
		instance.updated.push(path.to_string());
		tracing::debug!(
			component = %instance.name,
			id = %instance.id,
			path = %path,
			"synced property"
		);

		instance.with_context(self.services, store, |component, ctx| {
			component.after_update(&property, key.as_deref(), &incoming, ctx)
		})
	}

	fn fire(
		&self,
		instance: &mut Instance,
		event: &str,
		args: &Args,
		store: &mut ComponentStore,
		root: bool,
	) -> LiveResult<()> {
		let listener = instance.component.listeners().get(event).cloned();
		if let Some(action) = listener {
			tracing::debug!(
				component = %instance.name,
				id = %instance.id,
				event = %event,
				action = %action,
				"delivering event"
			);
			match self.call(instance, &action, args, store) {
				Ok(_) => {}
				Err(LiveError::Validation(bag)) if !root => record_validation(instance, &bag),
				Err(error) => return Err(error),
			}
		}
		for child in instance.children.values_mut() {
			self.fire(&mut child.instance, event, args, store, false)?;
		}
		Ok(())
	}
}

fn path_param<'p>(method: &str, params: &'p [serde_json::Value]) -> LiveResult<&'p str> {
	params
		.first()
		.and_then(serde_json::Value::as_str)
		.ok_or_else(|| LiveError::mismatch("property path", format!("{} without a path", method)))
}

/// Makes the instance's error bag reflect `bag` for the fields it names.
fn record_validation(instance: &mut Instance, bag: &ErrorBag) {
	let errors = instance.caps.validation.errors_mut();
	for field in bag.fields() {
		errors.forget(field);
	}
	errors.merge(bag.clone());
}

/// Whether a rule covers `path`; `*` in a rule matches any one segment.
fn has_rule_for(rules: &Rules, path: &str) -> bool {
	rules.keys().any(|rule| {
		let rule_segments: Vec<&str> = rule.split('.').collect();
		let path_segments: Vec<&str> = path.split('.').collect();
		rule_segments.len() == path_segments.len()
			&& rule_segments
				.iter()
				.zip(&path_segments)
				.all(|(rule, segment)| *rule == "*" || rule == segment)
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::component::{Component, Definition};
	use crate::live_property;
	use crate::manager::LiveManager;
	use crate::render::FnRenderer;
	use crate::validation::FnValidator;
	use indexmap::IndexMap;
	use rstest::{fixture, rstest};
	use serde_json::json;
	use std::sync::Arc;

	#[derive(Default)]
	struct Counter {
		count: i64,
		title: String,
		items: Vec<IndexMap<String, String>>,
		post: Option<Model>,
		open: bool,
		secret: String,
		log: Vec<String>,
	}

	impl Component for Counter {
		fn define(def: &mut Definition<Self>) {
			live_property!(def, count);
			live_property!(def, title);
			live_property!(def, items);
			live_property!(def, post);
			live_property!(def, open);
			live_property!(def, log);
			def.rule("title", "required");
			def.rule("post.title", "required");
			def.action("increment", |counter, _args, _ctx| {
				counter.count += 1;
				Ok(())
			});
			def.action("add", |counter, args, _ctx| {
				counter.count += args.get::<i64>(0)?;
				Ok(counter.count)
			});
			def.action("save", |counter, _args, ctx| {
				ctx.validate(counter)?;
				counter.log.push("saved".into());
				Ok(())
			});
			def.action("reload", |counter, _args, _ctx| {
				counter.log.push("reloaded".into());
				Ok(())
			});
			def.listen("refresh-counter", "reload");
			def.before_update("title", |_counter, value, _key, _ctx| {
				if let Some(text) = value.as_str() {
					*value = Value::String(text.trim().to_string());
				}
				Ok(())
			});
			def.after_update("title", |counter, value, _key, _ctx| {
				counter.log.push(format!("title={}", value.as_str().unwrap_or_default()));
				Ok(())
			});
			def.after_update("items", |counter, _value, key, _ctx| {
				counter.log.push(format!("items:{}", key.unwrap_or("-")));
				Ok(())
			});
			def.on_updating(|counter, _ctx| {
				counter.log.push("updating".into());
				Ok(())
			});
			def.on_updated(|counter, _ctx| {
				counter.log.push("updated".into());
				Ok(())
			});
		}
	}

	#[fixture]
	fn manager() -> LiveManager {
		let validator = FnValidator::new(|data, rules| {
			let mut bag = ErrorBag::new();
			for field in rules.keys() {
				if field == "title" && data["title"].as_str().is_none_or(str::is_empty) {
					bag.add("title", "The title field is required.");
				}
			}
			if bag.is_empty() { Ok(()) } else { Err(bag) }
		});
		LiveManager::builder()
			.secret_key("0123456789abcdef0123456789abcdef")
			.component::<Counter>("counter")
			.validator(Arc::new(validator))
			.renderer(FnRenderer::new(|_, _| Ok("<div></div>".to_string())))
			.build()
			.unwrap()
	}

	fn apply(manager: &LiveManager, instance: &mut Instance, actions: &[Action]) -> LiveResult<ActionOutcome> {
		let mut store = ComponentStore::new();
		ActionProcessor::new(manager.services()).apply(instance, actions, &mut store)
	}

	fn counter(manager: &LiveManager) -> Instance {
		manager
			.services()
			.components()
			.instantiate("counter", "c1", "en", "/")
			.unwrap()
	}

	#[rstest]
	fn test_actions_apply_in_order(manager: LiveManager) {
		// Arrange
		let mut instance = counter(&manager);

		// Act
		apply(
			&manager,
			&mut instance,
			&[Action::call("increment", vec![]), Action::call("increment", vec![])],
		)
		.unwrap();

		// Assert
		assert_eq!(instance.get("count").unwrap(), Value::Int(2));
	}

	#[rstest]
	fn test_batch_hooks_bracket_actions(manager: LiveManager) {
		// Arrange
		let mut instance = counter(&manager);

		// Act
		apply(&manager, &mut instance, &[Action::sync("title", json!("  hi  "))]).unwrap();

		// Assert
		let log = &instance.component::<Counter>().unwrap().log;
		assert_eq!(log, &vec!["updating", "title=hi", "updated"]);
		assert_eq!(instance.get("title").unwrap(), Value::String("hi".into()));
		assert_eq!(instance.updated_paths(), ["title"]);
	}

	#[rstest]
	fn test_return_values_are_captured(manager: LiveManager) {
		// Arrange
		let mut instance = counter(&manager);

		// Act
		let outcome = apply(&manager, &mut instance, &[Action::call("add", vec![json!(5)])]).unwrap();

		// Assert
		assert_eq!(outcome.returns, vec![json!(5)]);
	}

	#[rstest]
	#[case("redirect")]
	#[case("validate")]
	#[case("updated_title")]
	#[case("render")]
	fn test_framework_methods_are_not_callable(manager: LiveManager, #[case] method: &str) {
		// Arrange
		let mut instance = counter(&manager);

		// Act
		let result = apply(&manager, &mut instance, &[Action::call(method, vec![])]);

		// Assert
		assert!(matches!(result, Err(LiveError::NonPublicMethodCall { .. })));
	}

	#[rstest]
	fn test_unknown_method(manager: LiveManager) {
		// Arrange
		let mut instance = counter(&manager);

		// Act
		let result = apply(&manager, &mut instance, &[Action::call("explode", vec![])]);

		// Assert
		assert!(matches!(result, Err(LiveError::MethodNotFound { .. })));
	}

	#[rstest]
	fn test_protected_property_is_not_writable(manager: LiveManager) {
		// Arrange
		let mut instance = counter(&manager);
		instance.component_mut::<Counter>().unwrap().secret = "keep".into();

		// Act
		let result = apply(&manager, &mut instance, &[Action::sync("secret", json!("x"))]);

		// Assert
		assert!(matches!(result, Err(LiveError::ProtectedPropertyBinding { .. })));
		assert_eq!(instance.component::<Counter>().unwrap().secret, "keep");
	}

	#[rstest]
	fn test_nested_sync_passes_key_to_hooks(manager: LiveManager) {
		// Arrange
		let mut instance = counter(&manager);

		// Act
		apply(&manager, &mut instance, &[Action::sync("items.0.name", json!("first"))]).unwrap();

		// Assert
		let component = instance.component::<Counter>().unwrap();
		assert_eq!(component.items[0]["name"], "first");
		assert!(component.log.contains(&"items:0.name".to_string()));
	}

	#[rstest]
	fn test_model_field_binding_requires_rule(manager: LiveManager) {
		// Arrange
		let mut instance = counter(&manager);
		instance.component_mut::<Counter>().unwrap().post = Some(Model::new("post"));

		// Act
		let guarded = apply(&manager, &mut instance, &[Action::sync("post.body", json!("x"))]);
		let allowed = apply(&manager, &mut instance, &[Action::sync("post.title", json!("Hello"))]);

		// Assert
		assert!(matches!(
			guarded,
			Err(LiveError::CannotBindToModelDataWithoutValidationRule { .. })
		));
		assert!(allowed.is_ok());
		let post = instance.component::<Counter>().unwrap().post.clone().unwrap();
		assert_eq!(post.get("title"), Some(&Value::String("Hello".into())));
	}

	#[rstest]
	fn test_validation_aborts_remaining_actions(manager: LiveManager) {
		// Arrange
		let mut instance = counter(&manager);

		// Act
		let outcome = apply(
			&manager,
			&mut instance,
			&[Action::call("save", vec![]), Action::call("increment", vec![])],
		)
		.unwrap();

		// Assert
		assert!(outcome.errors.unwrap().has("title"));
		assert!(instance.errors().has("title"));
		assert_eq!(instance.get("count").unwrap(), Value::Int(0));
		let log = &instance.component::<Counter>().unwrap().log;
		assert_eq!(log.last().map(String::as_str), Some("updated"));
	}

	#[rstest]
	fn test_successful_validation_clears_errors(manager: LiveManager) {
		// Arrange
		let mut instance = counter(&manager);
		apply(&manager, &mut instance, &[Action::call("save", vec![])]).unwrap();

		// Act
		apply(
			&manager,
			&mut instance,
			&[Action::sync("title", json!("Title")), Action::call("save", vec![])],
		)
		.unwrap();

		// Assert
		assert!(instance.errors().is_empty());
	}

	#[rstest]
	fn test_magic_actions(manager: LiveManager) {
		// Arrange
		let mut instance = counter(&manager);

		// Act
		apply(
			&manager,
			&mut instance,
			&[
				Action::call("$set", vec![json!("count"), json!(7)]),
				Action::call("$toggle", vec![json!("open")]),
				Action::call("$refresh", vec![]),
			],
		)
		.unwrap();

		// Assert
		assert_eq!(instance.get("count").unwrap(), Value::Int(7));
		assert_eq!(instance.get("open").unwrap(), Value::Bool(true));
	}

	#[rstest]
	fn test_event_reaches_listener(manager: LiveManager) {
		// Arrange
		let mut instance = counter(&manager);

		// Act
		apply(&manager, &mut instance, &[Action::fire("refresh-counter", vec![])]).unwrap();

		// Assert
		assert!(
			instance
				.component::<Counter>()
				.unwrap()
				.log
				.contains(&"reloaded".to_string())
		);
	}

	#[rstest]
	fn test_action_wire_form() {
		// Arrange
		let action = Action::sync("title", json!("x"));

		// Act
		let json = serde_json::to_value(&action).unwrap();

		// Assert
		assert_eq!(json, json!({"type": "syncInput", "payload": {"name": "title", "value": "x"}}));
		assert_eq!(serde_json::from_value::<Action>(json).unwrap(), action);
	}

	#[rstest]
	#[case("items.*.name", "items.3.name", true)]
	#[case("post.title", "post.title", true)]
	#[case("post.title", "post.body", false)]
	#[case("post", "post.title", false)]
	fn test_rule_matching(#[case] rule: &str, #[case] path: &str, #[case] expected: bool) {
		// Arrange
		let mut rules = Rules::new();
		rules.insert(rule.into(), "required".into());

		// Act & Assert
		assert_eq!(has_rule_for(&rules, path), expected);
	}
}
