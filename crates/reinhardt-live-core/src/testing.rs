//! Same-process test harness for live components.
//!
//! [`LiveTest`] drives a component the way a browser would: every request and
//! response is serialized to JSON and parsed back before it is used, so a test
//! exercises the same bytes a transport would carry.
//!
//! ```ignore
//! let mut test = LiveTest::mount(&manager, "counter", Params::new())?;
//! test.call("increment", vec![])?.assert_set("count", 1);
//! test.set("name", "Ada")?.assert_has_no_errors();
//! ```

use crate::actions::Action;
use crate::component::Params;
use crate::error::LiveResult;
use crate::manager::{LiveManager, Mounted};
use crate::protocol::{Effects, RequestPayload, ResponsePayload};
use crate::snapshot::Snapshot;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Drives one mounted component through JSON round trips.
#[derive(Debug)]
pub struct LiveTest<'a> {
	manager: &'a LiveManager,
	snapshot: Snapshot,
	html: String,
	effects: Effects,
}

impl<'a> LiveTest<'a> {
	/// Mounts `name` with `params`.
	pub fn mount(manager: &'a LiveManager, name: &str, params: Params) -> LiveResult<Self> {
		let Mounted {
			snapshot,
			html,
			effects,
		} = manager.mount(name, params)?;
		Ok(Self {
			manager,
			snapshot: through_json(&snapshot)?,
			html,
			effects,
		})
	}

	/// Writes a property, as `wire:model` would.
	pub fn set(
		&mut self,
		path: impl Into<String>,
		value: impl Into<serde_json::Value>,
	) -> LiveResult<&mut Self> {
		self.run(vec![Action::sync(path, value.into())])
	}

	/// Calls an action.
	pub fn call(
		&mut self,
		method: impl Into<String>,
		params: Vec<serde_json::Value>,
	) -> LiveResult<&mut Self> {
		self.run(vec![Action::call(method, params)])
	}

	/// Fires an event at the component tree.
	pub fn dispatch(
		&mut self,
		event: impl Into<String>,
		params: Vec<serde_json::Value>,
	) -> LiveResult<&mut Self> {
		self.run(vec![Action::fire(event, params)])
	}

	/// Re-renders without changing state.
	pub fn refresh(&mut self) -> LiveResult<&mut Self> {
		self.call("$refresh", vec![])
	}

	/// Sends a batch of actions in one request.
	///
	/// On failure the last confirmed snapshot is kept.
	pub fn run(&mut self, actions: Vec<Action>) -> LiveResult<&mut Self> {
		let request: RequestPayload = through_json(&RequestPayload::new(self.snapshot.clone(), actions))?;
		let response: ResponsePayload = through_json(&self.manager.process_request(request)?)?;
		self.snapshot = response.snapshot;
		if let Some(html) = &response.effects.html {
			self.html = html.clone();
		}
		self.effects = response.effects;
		Ok(self)
	}

	/// Wire value of a property in the current snapshot.
	pub fn get(&self, property: &str) -> Option<&serde_json::Value> {
		self.snapshot.data(property)
	}

	/// Current snapshot.
	pub fn snapshot(&self) -> &Snapshot {
		&self.snapshot
	}

	/// Last rendered markup.
	pub fn html(&self) -> &str {
		&self.html
	}

	/// Effects of the last request.
	pub fn effects(&self) -> &Effects {
		&self.effects
	}

	/// Asserts a property's wire value.
	#[track_caller]
	pub fn assert_set(&self, property: &str, expected: impl Into<serde_json::Value>) -> &Self {
		let expected = expected.into();
		assert_eq!(
			self.get(property),
			Some(&expected),
			"property {:?} of component {:?}",
			property,
			self.snapshot.name()
		);
		self
	}

	/// Asserts every field has at least one error.
	#[track_caller]
	pub fn assert_has_errors(&self, fields: &[&str]) -> &Self {
		let errors = &self.snapshot.memo.errors;
		assert!(!errors.is_empty(), "expected validation errors, found none");
		for field in fields {
			assert!(
				errors.has(field),
				"expected an error for {:?}, found errors for {:?}",
				field,
				errors.fields().collect::<Vec<_>>()
			);
		}
		self
	}

	/// Asserts the error bag is empty.
	#[track_caller]
	pub fn assert_has_no_errors(&self) -> &Self {
		let errors = &self.snapshot.memo.errors;
		assert!(
			errors.is_empty(),
			"expected no errors, found errors for {:?}",
			errors.fields().collect::<Vec<_>>()
		);
		self
	}

	/// Asserts the last request redirected to `target`.
	#[track_caller]
	pub fn assert_redirect(&self, target: &str) -> &Self {
		assert_eq!(self.effects.redirect_to.as_deref(), Some(target));
		self
	}

	/// Asserts the last request dispatched `event`.
	#[track_caller]
	pub fn assert_dispatched(&self, event: &str) -> &Self {
		assert!(
			self.effects.dispatched_events.iter().any(|dispatched| dispatched.name == event),
			"event {:?} was not dispatched",
			event
		);
		self
	}

	/// Asserts the last markup contains `text`.
	#[track_caller]
	pub fn assert_see(&self, text: &str) -> &Self {
		assert!(self.html.contains(text), "{:?} not found in {}", text, self.html);
		self
	}

	/// Asserts the last markup does not contain `text`.
	#[track_caller]
	pub fn assert_dont_see(&self, text: &str) -> &Self {
		assert!(!self.html.contains(text), "{:?} found in {}", text, self.html);
		self
	}
}

fn through_json<T: Serialize + DeserializeOwned>(value: &T) -> LiveResult<T> {
	let bytes = serde_json::to_vec(value)?;
	Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::component::{Component, Definition};
	use crate::error::LiveError;
	use crate::live_property;
	use crate::render::FnRenderer;
	use crate::validation::FnValidator;
	use rstest::{fixture, rstest};
	use std::sync::Arc;

	#[derive(Default)]
	struct Signup {
		email: String,
	}

	impl Component for Signup {
		fn define(def: &mut Definition<Self>) {
			live_property!(def, email);
			def.rule("email", "required|email");
			def.action("save", |signup, _args, ctx| {
				ctx.validate(signup)?;
				ctx.dispatch("signed-up", vec![signup.email.clone().into()]);
				ctx.redirect("/welcome");
				Ok(())
			});
		}
	}

	#[fixture]
	fn manager() -> LiveManager {
		LiveManager::builder()
			.secret_key("0123456789abcdef0123456789abcdef")
			.component::<Signup>("signup")
			.validator(Arc::new(FnValidator::new(|data, rules| {
				let mut errors = crate::validation::ErrorBag::new();
				for field in rules.keys() {
					let value = data.get(field).and_then(|value| value.as_str()).unwrap_or("");
					if !value.contains('@') {
						errors.add(field.clone(), format!("The {} must be a valid email.", field));
					}
				}
				if errors.is_empty() {
					Ok(())
				} else {
					Err(errors)
				}
			})))
			.renderer(FnRenderer::new(|_, props| {
				Ok(format!("<form>{}</form>", props["email"].as_str().unwrap_or_default()))
			}))
			.build()
			.unwrap()
	}

	#[rstest]
	fn test_invalid_save_keeps_errors(manager: LiveManager) {
		// Arrange
		let mut test = LiveTest::mount(&manager, "signup", Params::new()).unwrap();

		// Act
		test.set("email", "nope").unwrap().call("save", vec![]).unwrap();

		// Assert
		test.assert_has_errors(&["email"]).assert_see("nope");
		assert!(test.effects().redirect_to.is_none());
	}

	#[rstest]
	fn test_valid_save_redirects(manager: LiveManager) {
		// Arrange
		let mut test = LiveTest::mount(&manager, "signup", Params::new()).unwrap();

		// Act
		test.set("email", "ada@example.com").unwrap().call("save", vec![]).unwrap();

		// Assert
		test.assert_has_no_errors()
			.assert_redirect("/welcome")
			.assert_dispatched("signed-up")
			.assert_set("email", "ada@example.com");
	}

	#[rstest]
	fn test_failed_request_keeps_snapshot(manager: LiveManager) {
		// Arrange
		let mut test = LiveTest::mount(&manager, "signup", Params::new()).unwrap();
		let before = test.snapshot().clone();

		// Act
		let result = test.call("redirect", vec![]);

		// Assert
		assert!(matches!(result, Err(LiveError::NonPublicMethodCall { .. })));
		assert_eq!(test.snapshot(), &before);
	}
}
