//! Field errors and the validator collaborator.
//!
//! Rule evaluation belongs to the host application; this module only defines
//! the narrow [`Validator`] interface and the [`ErrorBag`] that carries the
//! resulting field → messages mapping through the snapshot and into render.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Field name → error messages, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorBag(IndexMap<String, Vec<String>>);

impl ErrorBag {
	/// Creates an empty bag.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a message for a field.
	pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
		self.0.entry(field.into()).or_default().push(message.into());
		self
	}

	/// Adds a message, builder style.
	pub fn with(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
		self.add(field, message);
		self
	}

	/// Merges another bag into this one.
	pub fn merge(&mut self, other: ErrorBag) {
		for (field, messages) in other.0 {
			self.0.entry(field).or_default().extend(messages);
		}
	}

	/// Messages for a field.
	pub fn get(&self, field: &str) -> Option<&[String]> {
		self.0.get(field).map(Vec::as_slice)
	}

	/// First message for a field.
	pub fn first(&self, field: &str) -> Option<&str> {
		self.0.get(field)?.first().map(String::as_str)
	}

	/// Whether a field has errors.
	pub fn has(&self, field: &str) -> bool {
		self.0.get(field).is_some_and(|messages| !messages.is_empty())
	}

	/// Removes a field's errors.
	pub fn forget(&mut self, field: &str) {
		self.0.shift_remove(field);
	}

	/// Removes every error.
	pub fn clear(&mut self) {
		self.0.clear();
	}

	/// Whether the bag is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Number of fields with errors.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Field names with errors.
	pub fn fields(&self) -> impl Iterator<Item = &str> {
		self.0.keys().map(String::as_str)
	}

	/// Iterates over fields and messages.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
		self.0
			.iter()
			.map(|(field, messages)| (field.as_str(), messages.as_slice()))
	}
}

/// Validation rules, field → rule expression.
pub type Rules = IndexMap<String, String>;

/// Evaluates rules against public data.
pub trait Validator: Send + Sync {
	/// Returns the field errors, or `Ok(())` when the data passes.
	fn validate(
		&self,
		data: &serde_json::Map<String, serde_json::Value>,
		rules: &Rules,
	) -> Result<(), ErrorBag>;
}

/// Validator that accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopValidator;

impl Validator for NoopValidator {
	fn validate(
		&self,
		_data: &serde_json::Map<String, serde_json::Value>,
		_rules: &Rules,
	) -> Result<(), ErrorBag> {
		Ok(())
	}
}

/// Validator backed by a closure.
pub struct FnValidator<F>(F);

impl<F> FnValidator<F>
where
	F: Fn(&serde_json::Map<String, serde_json::Value>, &Rules) -> Result<(), ErrorBag>
		+ Send
		+ Sync,
{
	/// Wraps the closure.
	pub fn new(validate: F) -> Self {
		Self(validate)
	}
}

impl<F> Validator for FnValidator<F>
where
	F: Fn(&serde_json::Map<String, serde_json::Value>, &Rules) -> Result<(), ErrorBag>
		+ Send
		+ Sync,
{
	fn validate(
		&self,
		data: &serde_json::Map<String, serde_json::Value>,
		rules: &Rules,
	) -> Result<(), ErrorBag> {
		(self.0)(data, rules)
	}
}
