//! Synthesizers: type-specific dehydrate/hydrate handlers.
//!
//! A [`SynthesizerRegistry`] is an ordered list of [`Synthesizer`]s; the first
//! one whose [`Synthesizer::matches`] accepts a value dehydrates it. Every
//! non-primitive value records a [`Meta`] naming the synthesizer that produced
//! it, so hydration can pick the inverse without guessing.
//!
//! The registry is an explicit collaborator handed to the codec through
//! [`DehydrateContext`] and [`HydrateContext`]; nothing here is global.

mod collections;
mod date;
mod model;
mod primitive;
mod wireable;

pub use collections::{ListSynth, MapSynth, normalize_key_order};
pub use date::DateSynth;
pub use model::ModelSynth;
pub use primitive::PrimitiveSynth;
pub use wireable::{Wireable, WireableSynth};

use crate::error::{LiveError, LiveResult};
use crate::model::ModelRepository;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Type annotation recorded next to a dehydrated value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Meta {
	/// Key of the synthesizer that produced the value.
	#[serde(rename = "s")]
	pub synth: String,
	/// Synthesizer-specific extras (date kind, model class and key, ...).
	#[serde(rename = "x", default, skip_serializing_if = "serde_json::Map::is_empty")]
	pub extra: serde_json::Map<String, serde_json::Value>,
	/// Metas of non-primitive children, by child key.
	#[serde(rename = "c", default, skip_serializing_if = "BTreeMap::is_empty")]
	pub children: BTreeMap<String, Meta>,
}

impl Meta {
	/// A meta tagged with the given synthesizer key.
	pub fn new(synth: impl Into<String>) -> Self {
		Self {
			synth: synth.into(),
			..Self::default()
		}
	}

	/// Adds an extra field.
	pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
		self.extra.insert(key.into(), value);
		self
	}

	/// Reads an extra string field.
	pub fn extra_str(&self, key: &str) -> Option<&str> {
		self.extra.get(key).and_then(serde_json::Value::as_str)
	}
}

/// Context threaded through dehydration.
#[derive(Clone, Copy)]
pub struct DehydrateContext<'a> {
	/// Registry used for nested values.
	pub registry: &'a SynthesizerRegistry,
	/// Component being dehydrated, for diagnostics.
	pub component: &'a str,
	/// Top-level property being dehydrated, for diagnostics.
	pub property: &'a str,
}

/// Context threaded through hydration.
#[derive(Clone, Copy)]
pub struct HydrateContext<'a> {
	/// Registry used for nested values.
	pub registry: &'a SynthesizerRegistry,
	/// Model lookups.
	pub models: &'a dyn ModelRepository,
}

/// Dehydrated wire value and its optional meta.
pub type Dehydrated = (serde_json::Value, Option<Meta>);

/// Handler for one value shape.
pub trait Synthesizer: Send + Sync {
	/// Meta tag identifying this synthesizer on the wire.
	fn key(&self) -> &str;

	/// Whether this synthesizer handles the value.
	fn matches(&self, value: &Value) -> bool;

	/// Converts a value into its wire form.
	fn dehydrate(&self, value: &Value, ctx: &DehydrateContext<'_>) -> LiveResult<Dehydrated>;

	/// Reconstructs a value from its wire form.
	fn hydrate(
		&self,
		wire: serde_json::Value,
		meta: &Meta,
		ctx: &HydrateContext<'_>,
	) -> LiveResult<Value>;

	/// JSON handed to templates; defaults to the wire form.
	fn render_json(
		&self,
		value: &Value,
		ctx: &DehydrateContext<'_>,
	) -> LiveResult<serde_json::Value> {
		self.dehydrate(value, ctx).map(|(wire, _)| wire)
	}
}

/// Ordered list of synthesizers.
#[derive(Clone)]
pub struct SynthesizerRegistry {
	synthesizers: Vec<Arc<dyn Synthesizer>>,
}

impl Default for SynthesizerRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for SynthesizerRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list()
			.entries(self.synthesizers.iter().map(|synth| synth.key()))
			.finish()
	}
}

impl SynthesizerRegistry {
	/// Registry holding the built-in synthesizers in priority order.
	pub fn new() -> Self {
		let mut registry = Self::empty();
		registry
			.register(PrimitiveSynth)
			.register(ListSynth)
			.register(MapSynth)
			.register(DateSynth)
			.register(ModelSynth);
		registry
	}

	/// Registry with no synthesizers at all.
	pub fn empty() -> Self {
		Self {
			synthesizers: Vec::new(),
		}
	}

	/// Appends a synthesizer; earlier registrations win.
	pub fn register(&mut self, synthesizer: impl Synthesizer + 'static) -> &mut Self {
		self.synthesizers.push(Arc::new(synthesizer));
		self
	}

	/// Appends the synthesizer for a [`Wireable`] type.
	pub fn register_wireable<T: Wireable>(&mut self) -> &mut Self {
		self.register(WireableSynth::<T>::new())
	}

	/// Registered keys in priority order.
	pub fn keys(&self) -> Vec<&str> {
		self.synthesizers.iter().map(|synth| synth.key()).collect()
	}

	/// First synthesizer matching the value.
	pub fn resolve(&self, value: &Value) -> Option<&dyn Synthesizer> {
		self.synthesizers
			.iter()
			.find(|synth| synth.matches(value))
			.map(|synth| synth.as_ref())
	}

	/// Synthesizer registered under a meta tag.
	pub fn resolve_by_meta(&self, tag: &str) -> LiveResult<&dyn Synthesizer> {
		self.synthesizers
			.iter()
			.find(|synth| synth.key() == tag)
			.map(|synth| synth.as_ref())
			.ok_or_else(|| LiveError::UnsupportedType(tag.to_string()))
	}

	/// Dehydrates a value with the first matching synthesizer.
	pub fn dehydrate_value(
		&self,
		value: &Value,
		ctx: &DehydrateContext<'_>,
	) -> LiveResult<Dehydrated> {
		self.resolve(value)
			.ok_or_else(|| unsupported(value, ctx))?
			.dehydrate(value, ctx)
	}

	/// Hydrates a wire value; without meta the value is taken as plain JSON.
	pub fn hydrate_value(
		&self,
		wire: serde_json::Value,
		meta: Option<&Meta>,
		ctx: &HydrateContext<'_>,
	) -> LiveResult<Value> {
		match meta {
			Some(meta) => self.resolve_by_meta(&meta.synth)?.hydrate(wire, meta, ctx),
			None => Ok(Value::from_json(wire)),
		}
	}

	/// JSON for templates.
	pub fn render_value(
		&self,
		value: &Value,
		ctx: &DehydrateContext<'_>,
	) -> LiveResult<serde_json::Value> {
		self.resolve(value)
			.ok_or_else(|| unsupported(value, ctx))?
			.render_json(value, ctx)
	}
}

fn unsupported(value: &Value, ctx: &DehydrateContext<'_>) -> LiveError {
	LiveError::UnsupportedPropertyType {
		component: ctx.component.to_string(),
		property: ctx.property.to_string(),
		type_name: value.type_label(),
	}
}

#[cfg(test)]
pub(crate) mod test_support {
	use super::*;
	use crate::model::NoModels;

	pub(crate) fn round_trip(registry: &SynthesizerRegistry, value: &Value) -> Value {
		let dctx = DehydrateContext {
			registry,
			component: "test",
			property: "value",
		};
		let (wire, meta) = registry.dehydrate_value(value, &dctx).unwrap();
		let text = serde_json::to_string(&wire).unwrap();
		let meta_text = serde_json::to_string(&meta).unwrap();
		let wire: serde_json::Value = serde_json::from_str(&text).unwrap();
		let meta: Option<Meta> = serde_json::from_str(&meta_text).unwrap();
		let hctx = HydrateContext {
			registry,
			models: &NoModels,
		};
		registry.hydrate_value(wire, meta.as_ref(), &hctx).unwrap()
	}
}

#[cfg(test)]
mod tests {
	use super::test_support::round_trip;
	use super::*;
	use crate::value::Key;
	use chrono::NaiveDate;
	use proptest::prelude::*;
	use rstest::rstest;

	#[derive(Debug, Clone, PartialEq)]
	struct Opaque;

	#[rstest]
	fn test_builtin_priority_order() {
		// Act
		let registry = SynthesizerRegistry::new();

		// Assert
		assert_eq!(registry.keys(), vec!["prim", "arr", "map", "date", "mdl"]);
	}

	#[rstest]
	fn test_unknown_object_is_unsupported_property_type() {
		// Arrange
		let registry = SynthesizerRegistry::new();
		let ctx = DehydrateContext {
			registry: &registry,
			component: "dashboard",
			property: "handle",
		};

		// Act
		let result = registry.dehydrate_value(&Value::object(Opaque), &ctx);

		// Assert
		match result {
			Err(LiveError::UnsupportedPropertyType {
				component,
				property,
				..
			}) => {
				assert_eq!(component, "dashboard");
				assert_eq!(property, "handle");
			}
			other => panic!("unexpected result: {:?}", other.map(|(wire, _)| wire)),
		}
	}

	#[rstest]
	fn test_unknown_meta_tag_is_unsupported_type() {
		// Arrange
		let registry = SynthesizerRegistry::new();

		// Act
		let result = registry.resolve_by_meta("nope");

		// Assert
		assert!(matches!(result, Err(LiveError::UnsupportedType(tag)) if tag == "nope"));
	}

	#[rstest]
	fn test_nested_mixed_structure_round_trips() {
		// Arrange
		let registry = SynthesizerRegistry::new();
		let mut inner = indexmap::IndexMap::new();
		inner.insert(Key::Int(2), Value::String("two".into()));
		inner.insert(Key::Str("when".into()), Value::object(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()));
		let value = Value::List(vec![Value::Int(1), Value::Map(inner), Value::Null]);

		// Act
		let restored = round_trip(&registry, &value);

		// Assert
		assert_eq!(restored, value);
	}

	fn arb_value() -> impl Strategy<Value = Value> {
		let leaf = prop_oneof![
			Just(Value::Null),
			any::<bool>().prop_map(Value::Bool),
			any::<i64>().prop_map(Value::Int),
			(-1.0e9f64..1.0e9f64).prop_map(Value::Float),
			"[a-z0-9 ]{0,8}".prop_map(Value::String),
			(0i64..4000, 1u32..13, 1u32..29).prop_map(|(y, m, d)| Value::object(
				NaiveDate::from_ymd_opt(y as i32, m, d).unwrap()
			)),
		];
		leaf.prop_recursive(3, 24, 4, |inner| {
			prop_oneof![
				prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
				prop::collection::vec(
					(
						prop_oneof![
							(0i64..20).prop_map(Key::Int),
							"[a-z]{1,4}".prop_map(Key::Str),
						],
						inner
					),
					0..4
				)
				.prop_map(|entries| Value::Map(entries.into_iter().collect())),
			]
		})
	}

	proptest! {
		#[test]
		fn test_round_trip_law(value in arb_value()) {
			let registry = SynthesizerRegistry::new();
			prop_assert_eq!(round_trip(&registry, &value), value);
		}
	}
}
