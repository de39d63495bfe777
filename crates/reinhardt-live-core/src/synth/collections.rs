use super::{DehydrateContext, Dehydrated, HydrateContext, Meta, Synthesizer};
use crate::error::{LiveError, LiveResult};
use crate::value::{Key, Value};
use indexmap::IndexMap;

/// Dehydrates [`Value::List`] element by element.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListSynth;

impl Synthesizer for ListSynth {
	fn key(&self) -> &str {
		"arr"
	}

	fn matches(&self, value: &Value) -> bool {
		matches!(value, Value::List(_))
	}

	fn dehydrate(&self, value: &Value, ctx: &DehydrateContext<'_>) -> LiveResult<Dehydrated> {
		let Value::List(items) = value else {
			return Err(LiveError::mismatch("list", value.type_label()));
		};
		let mut meta = Meta::new(self.key());
		let mut wire = Vec::with_capacity(items.len());
		for (index, item) in items.iter().enumerate() {
			let (item_wire, item_meta) = ctx.registry.dehydrate_value(item, ctx)?;
			if let Some(item_meta) = item_meta {
				meta.children.insert(index.to_string(), item_meta);
			}
			wire.push(item_wire);
		}
		Ok((serde_json::Value::Array(wire), Some(meta)))
	}

	fn hydrate(
		&self,
		wire: serde_json::Value,
		meta: &Meta,
		ctx: &HydrateContext<'_>,
	) -> LiveResult<Value> {
		let items = match wire {
			serde_json::Value::Array(items) => items,
			other => return Err(LiveError::mismatch("array", json_label(&other))),
		};
		items
			.into_iter()
			.enumerate()
			.map(|(index, item)| {
				ctx.registry
					.hydrate_value(item, meta.children.get(&index.to_string()), ctx)
			})
			.collect::<LiveResult<Vec<_>>>()
			.map(Value::List)
	}
}

/// Dehydrates [`Value::Map`], normalizing key order on the way out.
///
/// JSON object decoders do not reliably keep integer-like keys where the
/// source put them, so integer keys are emitted first in ascending order,
/// followed by string keys in their original relative order. Nested maps are
/// normalized as they are dehydrated.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapSynth;

/// Returns map entries in wire order: integer keys ascending, then string
/// keys in insertion order.
pub fn normalize_key_order(entries: &IndexMap<Key, Value>) -> Vec<(&Key, &Value)> {
	let (mut ints, strings): (Vec<_>, Vec<_>) = entries.iter().partition(|(key, _)| key.is_int());
	ints.sort_by(|(a, _), (b, _)| a.cmp(b));
	ints.extend(strings);
	ints
}

impl Synthesizer for MapSynth {
	fn key(&self) -> &str {
		"map"
	}

	fn matches(&self, value: &Value) -> bool {
		matches!(value, Value::Map(_))
	}

	fn dehydrate(&self, value: &Value, ctx: &DehydrateContext<'_>) -> LiveResult<Dehydrated> {
		let Value::Map(entries) = value else {
			return Err(LiveError::mismatch("map", value.type_label()));
		};
		let mut meta = Meta::new(self.key());
		let mut wire = serde_json::Map::with_capacity(entries.len());
		for (key, item) in normalize_key_order(entries) {
			let (item_wire, item_meta) = ctx.registry.dehydrate_value(item, ctx)?;
			let key = key.to_string();
			if let Some(item_meta) = item_meta {
				meta.children.insert(key.clone(), item_meta);
			}
			wire.insert(key, item_wire);
		}
		Ok((serde_json::Value::Object(wire), Some(meta)))
	}

	fn hydrate(
		&self,
		wire: serde_json::Value,
		meta: &Meta,
		ctx: &HydrateContext<'_>,
	) -> LiveResult<Value> {
		let mut entries = IndexMap::new();
		match wire {
			serde_json::Value::Object(object) => {
				for (key, item) in object {
					let value = ctx
						.registry
						.hydrate_value(item, meta.children.get(&key), ctx)?;
					entries.insert(Key::from(key), value);
				}
			}
			serde_json::Value::Array(items) => {
				for (index, item) in items.into_iter().enumerate() {
					let value =
						ctx.registry
							.hydrate_value(item, meta.children.get(&index.to_string()), ctx)?;
					entries.insert(Key::from(index), value);
				}
			}
			other => return Err(LiveError::mismatch("object", json_label(&other))),
		}
		Ok(Value::Map(entries))
	}
}

pub(super) fn json_label(value: &serde_json::Value) -> String {
	match value {
		serde_json::Value::Null => "null",
		serde_json::Value::Bool(_) => "bool",
		serde_json::Value::Number(_) => "number",
		serde_json::Value::String(_) => "string",
		serde_json::Value::Array(_) => "array",
		serde_json::Value::Object(_) => "object",
	}
	.to_string()
}
