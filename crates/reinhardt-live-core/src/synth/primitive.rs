use super::{DehydrateContext, Dehydrated, HydrateContext, Meta, Synthesizer};
use crate::error::LiveResult;
use crate::value::Value;

/// Passes booleans, null, numbers and strings through untouched.
///
/// Primitives never record a meta; a missing meta means "plain JSON".
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimitiveSynth;

impl Synthesizer for PrimitiveSynth {
	fn key(&self) -> &str {
		"prim"
	}

	fn matches(&self, value: &Value) -> bool {
		value.is_primitive()
	}

	fn dehydrate(&self, value: &Value, _ctx: &DehydrateContext<'_>) -> LiveResult<Dehydrated> {
		Ok((value.to_plain_json()?, None))
	}

	fn hydrate(
		&self,
		wire: serde_json::Value,
		_meta: &Meta,
		_ctx: &HydrateContext<'_>,
	) -> LiveResult<Value> {
		Ok(Value::from_json(wire))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::synth::SynthesizerRegistry;
	use crate::synth::test_support::round_trip;
	use rstest::rstest;

	#[rstest]
	#[case(Value::Null)]
	#[case(Value::Bool(true))]
	#[case(Value::Int(-12))]
	#[case(Value::Float(2.5))]
	#[case(Value::Float(3.0))]
	#[case(Value::String("hello".into()))]
	fn test_primitive_round_trip(#[case] value: Value) {
		// Arrange
		let registry = SynthesizerRegistry::new();

		// Act & Assert
		assert_eq!(round_trip(&registry, &value), value);
	}

	#[rstest]
	fn test_primitive_emits_no_meta() {
		// Arrange
		let registry = SynthesizerRegistry::new();
		let ctx = DehydrateContext {
			registry: &registry,
			component: "c",
			property: "p",
		};

		// Act
		let (wire, meta) = PrimitiveSynth.dehydrate(&Value::Int(5), &ctx).unwrap();

		// Assert
		assert_eq!(wire, serde_json::json!(5));
		assert!(meta.is_none());
	}

	#[rstest]
	fn test_non_finite_float_is_rejected() {
		// Arrange
		let registry = SynthesizerRegistry::new();
		let ctx = DehydrateContext {
			registry: &registry,
			component: "c",
			property: "p",
		};

		// Act & Assert
		assert!(PrimitiveSynth.dehydrate(&Value::Float(f64::NAN), &ctx).is_err());
	}
}
