//! Model references carried in public state.
//!
//! Persistence is not this crate's concern: a [`Model`] is an attribute bag
//! with a class tag, an optional key and the attribute values it was loaded
//! with. Only the key and the dirty attributes cross the wire; hydration asks
//! a [`ModelRepository`] to re-fetch the rest.

use crate::error::{LiveError, LiveResult};
use crate::value::{IntoValue, Key, Value, set_segments};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;

/// A model instance referenced by public state.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
	class: String,
	key: Option<Key>,
	attributes: IndexMap<String, Value>,
	original: IndexMap<String, Value>,
}

impl Model {
	/// A new, unsaved model.
	pub fn new(class: impl Into<String>) -> Self {
		Self {
			class: class.into(),
			key: None,
			attributes: IndexMap::new(),
			original: IndexMap::new(),
		}
	}

	/// A persisted model whose attributes are all clean.
	pub fn persisted(
		class: impl Into<String>,
		key: impl Into<Key>,
		attributes: IndexMap<String, Value>,
	) -> Self {
		Self {
			class: class.into(),
			key: Some(key.into()),
			original: attributes.clone(),
			attributes,
		}
	}

	/// Sets an attribute, builder style.
	pub fn with(mut self, attribute: impl Into<String>, value: impl IntoValue) -> Self {
		self.set(attribute, value);
		self
	}

	/// Class tag.
	pub fn class(&self) -> &str {
		&self.class
	}

	/// Primary key, if persisted.
	pub fn key(&self) -> Option<&Key> {
		self.key.as_ref()
	}

	/// Whether the model has a key.
	pub fn exists(&self) -> bool {
		self.key.is_some()
	}

	/// Reads an attribute.
	pub fn get(&self, attribute: &str) -> Option<&Value> {
		self.attributes.get(attribute)
	}

	/// Writes an attribute.
	pub fn set(&mut self, attribute: impl Into<String>, value: impl IntoValue) {
		self.attributes.insert(attribute.into(), value.into_value());
	}

	/// All current attributes.
	pub fn attributes(&self) -> &IndexMap<String, Value> {
		&self.attributes
	}

	/// Attributes whose value differs from the loaded value.
	pub fn dirty(&self) -> impl Iterator<Item = (&String, &Value)> {
		self.attributes
			.iter()
			.filter(|(name, value)| self.original.get(name.as_str()) != Some(*value))
	}

	/// Whether any attribute is dirty.
	pub fn is_dirty(&self) -> bool {
		self.dirty().next().is_some()
	}

	/// Marks the current attributes as clean, e.g. after saving.
	pub fn sync_original(&mut self) {
		self.original = self.attributes.clone();
	}

	pub(crate) fn set_segments(&mut self, segments: &[Key], value: Value) -> LiveResult<()> {
		let Some((head, rest)) = segments.split_first() else {
			return Err(LiveError::InvalidPath(self.class.clone()));
		};
		let slot = self
			.attributes
			.entry(head.to_string())
			.or_insert(Value::Null);
		set_segments(slot, rest, value)
	}
}

/// Looks models up by class and key during hydration.
pub trait ModelRepository: Send + Sync {
	/// Fetches a persisted model, `None` when it no longer exists.
	fn find(&self, class: &str, key: &Key) -> LiveResult<Option<Model>>;
}

/// Repository that knows no models; every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoModels;

impl ModelRepository for NoModels {
	fn find(&self, _class: &str, _key: &Key) -> LiveResult<Option<Model>> {
		Ok(None)
	}
}

/// In-memory repository, mostly for tests and prototypes.
#[derive(Debug, Default)]
pub struct InMemoryModelRepository {
	models: RwLock<HashMap<(String, Key), Model>>,
}

impl InMemoryModelRepository {
	/// Creates an empty repository.
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores a persisted model. Models without a key are ignored.
	pub fn insert(&self, model: Model) {
		let Some(key) = model.key.clone() else {
			return;
		};
		let mut stored = model;
		stored.sync_original();
		self.models
			.write()
			.insert((stored.class.clone(), key), stored);
	}

	/// Removes a model.
	pub fn remove(&self, class: &str, key: &Key) -> Option<Model> {
		self.models.write().remove(&(class.to_string(), key.clone()))
	}
}

impl ModelRepository for InMemoryModelRepository {
	fn find(&self, class: &str, key: &Key) -> LiveResult<Option<Model>> {
		Ok(self
			.models
			.read()
			.get(&(class.to_string(), key.clone()))
			.cloned())
	}
}
