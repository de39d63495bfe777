use super::collections::json_label;
use super::{DehydrateContext, Dehydrated, HydrateContext, Meta, Synthesizer};
use crate::error::{LiveError, LiveResult};
use crate::model::Model;
use crate::value::{Key, Value};

const CLASS: &str = "class";
const KEY: &str = "key";

/// Dehydrates [`Model`] references.
///
/// Only the class tag and key travel in the meta, plus the dirty attributes
/// in the wire data so unsaved edits survive the round trip. Hydration
/// re-fetches the model from the [`ModelRepository`](crate::model::ModelRepository)
/// and re-applies those attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelSynth;

impl Synthesizer for ModelSynth {
	fn key(&self) -> &str {
		"mdl"
	}

	fn matches(&self, value: &Value) -> bool {
		value.downcast_ref::<Model>().is_some()
	}

	fn dehydrate(&self, value: &Value, ctx: &DehydrateContext<'_>) -> LiveResult<Dehydrated> {
		let model = value
			.downcast_ref::<Model>()
			.ok_or_else(|| LiveError::mismatch("model", value.type_label()))?;
		let key = match model.key() {
			Some(Key::Int(number)) => serde_json::Value::from(*number),
			Some(Key::Str(text)) => serde_json::Value::from(text.as_str()),
			None => serde_json::Value::Null,
		};
		let mut meta = Meta::new(self.key())
			.with_extra(CLASS, serde_json::Value::from(model.class()))
			.with_extra(KEY, key);
		let mut data = serde_json::Map::new();
		for (attribute, attribute_value) in model.dirty() {
			let (wire, attribute_meta) = ctx.registry.dehydrate_value(attribute_value, ctx)?;
			if let Some(attribute_meta) = attribute_meta {
				meta.children.insert(attribute.clone(), attribute_meta);
			}
			data.insert(attribute.clone(), wire);
		}
		Ok((serde_json::Value::Object(data), Some(meta)))
	}

	fn hydrate(
		&self,
		wire: serde_json::Value,
		meta: &Meta,
		ctx: &HydrateContext<'_>,
	) -> LiveResult<Value> {
		let class = meta
			.extra_str(CLASS)
			.ok_or_else(|| LiveError::mismatch("model class", "missing"))?;
		let key = match meta.extra.get(KEY) {
			None | Some(serde_json::Value::Null) => None,
			Some(serde_json::Value::Number(number)) => number.as_i64().map(Key::Int),
			Some(serde_json::Value::String(text)) => Some(Key::from(text.as_str())),
			Some(other) => return Err(LiveError::mismatch("model key", json_label(other))),
		};
		let mut model = match key {
			Some(key) => ctx
				.models
				.find(class, &key)?
				.ok_or_else(|| LiveError::ModelNotFound {
					class: class.to_string(),
					key: key.to_string(),
				})?,
			None => Model::new(class),
		};
		let dirty = match wire {
			serde_json::Value::Object(dirty) => dirty,
			serde_json::Value::Null => serde_json::Map::new(),
			other => return Err(LiveError::mismatch("object", json_label(&other))),
		};
		for (attribute, attribute_wire) in dirty {
			let value = ctx.registry.hydrate_value(
				attribute_wire,
				meta.children.get(&attribute),
				ctx,
			)?;
			model.set(attribute, value);
		}
		Ok(Value::object(model))
	}

	fn render_json(
		&self,
		value: &Value,
		ctx: &DehydrateContext<'_>,
	) -> LiveResult<serde_json::Value> {
		let model = value
			.downcast_ref::<Model>()
			.ok_or_else(|| LiveError::mismatch("model", value.type_label()))?;
		let mut object = serde_json::Map::new();
		if let Some(key) = model.key() {
			object.insert(KEY.to_string(), serde_json::Value::from(key.to_string()));
		}
		for (attribute, attribute_value) in model.attributes() {
			object.insert(
				attribute.clone(),
				ctx.registry.render_value(attribute_value, ctx)?,
			);
		}
		Ok(serde_json::Value::Object(object))
	}
}
