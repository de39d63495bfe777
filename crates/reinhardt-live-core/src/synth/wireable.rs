use super::{DehydrateContext, Dehydrated, HydrateContext, Meta, Synthesizer};
use crate::error::{LiveError, LiveResult};
use crate::value::Value;
use std::fmt;
use std::marker::PhantomData;

/// A user type that knows how to put itself on the wire.
///
/// Register it with [`SynthesizerRegistry::register_wireable`](super::SynthesizerRegistry::register_wireable)
/// and carry it in public state as a [`Value::Object`] (see
/// [`object_value!`](crate::object_value)).
pub trait Wireable: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
	/// Meta tag; must be unique within the registry.
	const TAG: &'static str;

	/// Converts into wire JSON.
	fn to_wire(&self) -> LiveResult<serde_json::Value>;

	/// Converts back from wire JSON.
	fn from_wire(wire: serde_json::Value) -> LiveResult<Self>;
}

/// Synthesizer adapter for a [`Wireable`] type.
pub struct WireableSynth<T> {
	marker: PhantomData<fn() -> T>,
}

impl<T> WireableSynth<T> {
	/// Creates the adapter.
	pub fn new() -> Self {
		Self {
			marker: PhantomData,
		}
	}
}

impl<T> Default for WireableSynth<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Wireable> Synthesizer for WireableSynth<T> {
	fn key(&self) -> &str {
		T::TAG
	}

	fn matches(&self, value: &Value) -> bool {
		value.downcast_ref::<T>().is_some()
	}

	fn dehydrate(&self, value: &Value, _ctx: &DehydrateContext<'_>) -> LiveResult<Dehydrated> {
		let object = value
			.downcast_ref::<T>()
			.ok_or_else(|| LiveError::mismatch(T::TAG, value.type_label()))?;
		Ok((object.to_wire()?, Some(Meta::new(T::TAG))))
	}

	fn hydrate(
		&self,
		wire: serde_json::Value,
		_meta: &Meta,
		_ctx: &HydrateContext<'_>,
	) -> LiveResult<Value> {
		T::from_wire(wire).map(Value::object)
	}
}
