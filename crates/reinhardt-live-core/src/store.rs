//! Per-request auxiliary storage keyed by component id.
//!
//! Hooks that need to hand data to a later hook in the same request write it
//! here instead of onto the component. The table lives exactly as long as the
//! request that created it.

use indexmap::IndexMap;
use std::collections::HashMap;

/// Side table of values per component id.
#[derive(Debug, Clone, Default)]
pub struct ComponentStore {
	entries: HashMap<String, IndexMap<String, serde_json::Value>>,
}

impl ComponentStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Reads a value.
	pub fn get(&self, id: &str, key: &str) -> Option<&serde_json::Value> {
		self.entries.get(id)?.get(key)
	}

	/// Writes a value.
	pub fn set(&mut self, id: &str, key: impl Into<String>, value: serde_json::Value) {
		self.entries
			.entry(id.to_string())
			.or_default()
			.insert(key.into(), value);
	}

	/// Whether a value is present.
	pub fn has(&self, id: &str, key: &str) -> bool {
		self.get(id, key).is_some()
	}

	/// Removes a value.
	pub fn forget(&mut self, id: &str, key: &str) -> Option<serde_json::Value> {
		self.entries.get_mut(id)?.shift_remove(key)
	}

	/// Every value stored for a component.
	pub fn for_component(&self, id: &str) -> Option<&IndexMap<String, serde_json::Value>> {
		self.entries.get(id)
	}

	/// Drops everything stored for a component.
	pub fn remove_component(&mut self, id: &str) {
		self.entries.remove(id);
	}
}
