//! Runtime values held in public component state.
//!
//! Public properties are read out of a component as [`Value`]s before they are
//! dehydrated, and written back as [`Value`]s after hydration or a property
//! sync. The closed set of variants mirrors what the wire format can carry;
//! anything richer (dates, models, user types) travels as a
//! [`Value::Object`] and needs a synthesizer.

use crate::error::{LiveError, LiveResult};
use crate::model::Model;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use indexmap::IndexMap;
use std::any::Any;
use std::fmt;

/// Placeholder the client uses for a literal `.` inside a path segment.
pub const DOT_PLACEHOLDER: &str = "__dot__";

/// Placeholder the client uses for a literal `*` inside a path segment.
pub const ASTERISK_PLACEHOLDER: &str = "__asterisk__";

/// Key of a [`Value::Map`] entry.
///
/// Strings that spell a canonical decimal integer become [`Key::Int`], so a
/// map keyed by numbers survives a trip through JSON object keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
	/// Integer key.
	Int(i64),
	/// String key.
	Str(String),
}

impl Key {
	/// Parses a raw key, recognizing canonical integers.
	pub fn parse(raw: &str) -> Self {
		match canonical_int(raw) {
			Some(number) => Key::Int(number),
			None => Key::Str(raw.to_string()),
		}
	}

	/// Returns the key as a list index when it is a non-negative integer.
	pub fn as_index(&self) -> Option<usize> {
		match self {
			Key::Int(number) => usize::try_from(*number).ok(),
			Key::Str(_) => None,
		}
	}

	/// Whether this is an integer key.
	pub fn is_int(&self) -> bool {
		matches!(self, Key::Int(_))
	}
}

fn canonical_int(raw: &str) -> Option<i64> {
	let digits = raw.strip_prefix('-').unwrap_or(raw);
	if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}
	if digits.len() > 1 && digits.starts_with('0') {
		return None;
	}
	if digits.len() != raw.len() && digits == "0" {
		return None;
	}
	raw.parse().ok()
}

impl fmt::Display for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Key::Int(number) => write!(f, "{}", number),
			Key::Str(text) => f.write_str(text),
		}
	}
}

impl From<&str> for Key {
	fn from(raw: &str) -> Self {
		Key::parse(raw)
	}
}

impl From<String> for Key {
	fn from(raw: String) -> Self {
		match canonical_int(&raw) {
			Some(number) => Key::Int(number),
			None => Key::Str(raw),
		}
	}
}

impl From<i64> for Key {
	fn from(number: i64) -> Self {
		Key::Int(number)
	}
}

impl From<usize> for Key {
	fn from(index: usize) -> Self {
		i64::try_from(index)
			.map(Key::Int)
			.unwrap_or_else(|_| Key::Str(index.to_string()))
	}
}

/// A type-erased value that can live inside public state.
///
/// Implemented for every `Clone + PartialEq + Debug + Send + Sync + 'static`
/// type; whether it can actually cross the wire depends on a synthesizer
/// matching it.
pub trait LiveObject: Any + Send + Sync + fmt::Debug {
	/// Rust type name, used in diagnostics.
	fn type_name(&self) -> &'static str;
	/// Borrow as [`Any`] for downcasting.
	fn as_any(&self) -> &dyn Any;
	/// Mutably borrow as [`Any`] for downcasting.
	fn as_any_mut(&mut self) -> &mut dyn Any;
	/// Convert into a boxed [`Any`].
	fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
	/// Clone behind the trait object.
	fn clone_object(&self) -> Box<dyn LiveObject>;
	/// Compare with another object of possibly different type.
	fn eq_object(&self, other: &dyn LiveObject) -> bool;
}

impl<T> LiveObject for T
where
	T: Any + Clone + PartialEq + fmt::Debug + Send + Sync,
{
	fn type_name(&self) -> &'static str {
		std::any::type_name::<T>()
	}

	fn as_any(&self) -> &dyn Any {
		self
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}

	fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
		self
	}

	fn clone_object(&self) -> Box<dyn LiveObject> {
		Box::new(self.clone())
	}

	fn eq_object(&self, other: &dyn LiveObject) -> bool {
		other
			.as_any()
			.downcast_ref::<T>()
			.is_some_and(|other| other == self)
	}
}

/// A public state value.
#[derive(Debug, Default)]
pub enum Value {
	/// Absent value.
	#[default]
	Null,
	/// Boolean.
	Bool(bool),
	/// Integer.
	Int(i64),
	/// Floating point number.
	Float(f64),
	/// String.
	String(String),
	/// Ordered list with implicit `0..n` keys.
	List(Vec<Value>),
	/// Ordered mapping with explicit keys.
	Map(IndexMap<Key, Value>),
	/// Anything else; needs a synthesizer to cross the wire.
	Object(Box<dyn LiveObject>),
}

impl Clone for Value {
	fn clone(&self) -> Self {
		match self {
			Value::Null => Value::Null,
			Value::Bool(flag) => Value::Bool(*flag),
			Value::Int(number) => Value::Int(*number),
			Value::Float(number) => Value::Float(*number),
			Value::String(text) => Value::String(text.clone()),
			Value::List(items) => Value::List(items.clone()),
			Value::Map(entries) => Value::Map(entries.clone()),
			Value::Object(object) => Value::Object(object.clone_object()),
		}
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Value::Null, Value::Null) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Int(a), Value::Int(b)) => a == b,
			(Value::Float(a), Value::Float(b)) => a == b,
			(Value::String(a), Value::String(b)) => a == b,
			(Value::List(a), Value::List(b)) => a == b,
			(Value::Map(a), Value::Map(b)) => a == b,
			(Value::Object(a), Value::Object(b)) => a.eq_object(b.as_ref()),
			_ => false,
		}
	}
}

impl Value {
	/// Wraps an arbitrary object.
	pub fn object<T: LiveObject>(object: T) -> Self {
		Value::Object(Box::new(object))
	}

	/// An empty map.
	pub fn empty_map() -> Self {
		Value::Map(IndexMap::new())
	}

	/// Short description of the runtime type, used in diagnostics.
	pub fn type_label(&self) -> String {
		match self {
			Value::Null => "null".to_string(),
			Value::Bool(_) => "bool".to_string(),
			Value::Int(_) => "int".to_string(),
			Value::Float(_) => "float".to_string(),
			Value::String(_) => "string".to_string(),
			Value::List(_) => "list".to_string(),
			Value::Map(_) => "map".to_string(),
			Value::Object(object) => object.type_name().to_string(),
		}
	}

	/// Whether this is [`Value::Null`].
	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	/// Whether this is one of the scalar variants.
	pub fn is_primitive(&self) -> bool {
		matches!(
			self,
			Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_)
		)
	}

	/// Boolean view.
	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(flag) => Some(*flag),
			_ => None,
		}
	}

	/// Integer view.
	pub fn as_i64(&self) -> Option<i64> {
		match self {
			Value::Int(number) => Some(*number),
			_ => None,
		}
	}

	/// Float view; integers widen.
	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Value::Float(number) => Some(*number),
			Value::Int(number) => Some(*number as f64),
			_ => None,
		}
	}

	/// String view.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(text) => Some(text),
			_ => None,
		}
	}

	/// Loose truthiness used by toggles.
	pub fn is_truthy(&self) -> bool {
		match self {
			Value::Null => false,
			Value::Bool(flag) => *flag,
			Value::Int(number) => *number != 0,
			Value::Float(number) => *number != 0.0,
			Value::String(text) => !text.is_empty() && text != "0",
			Value::List(items) => !items.is_empty(),
			Value::Map(entries) => !entries.is_empty(),
			Value::Object(_) => true,
		}
	}

	/// Downcasts an object value.
	pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
		match self {
			Value::Object(object) => object.as_any().downcast_ref::<T>(),
			_ => None,
		}
	}

	/// Mutably downcasts an object value.
	pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
		match self {
			Value::Object(object) => object.as_any_mut().downcast_mut::<T>(),
			_ => None,
		}
	}

	/// Takes the object out of this value.
	pub fn into_object<T: LiveObject>(self) -> LiveResult<T> {
		match self {
			Value::Object(object) => {
				let found = object.type_name();
				object
					.into_any()
					.downcast::<T>()
					.map(|boxed| *boxed)
					.map_err(|_| LiveError::mismatch(std::any::type_name::<T>(), found))
			}
			other => Err(LiveError::mismatch(
				std::any::type_name::<T>(),
				other.type_label(),
			)),
		}
	}

	/// Converts meta-less JSON into a value.
	pub fn from_json(json: serde_json::Value) -> Self {
		match json {
			serde_json::Value::Null => Value::Null,
			serde_json::Value::Bool(flag) => Value::Bool(flag),
			serde_json::Value::Number(number) => match number.as_i64() {
				Some(int) => Value::Int(int),
				None => number.as_f64().map_or(Value::Null, Value::Float),
			},
			serde_json::Value::String(text) => Value::String(text),
			serde_json::Value::Array(items) => {
				Value::List(items.into_iter().map(Value::from_json).collect())
			}
			serde_json::Value::Object(entries) => Value::Map(
				entries
					.into_iter()
					.map(|(key, value)| (Key::from(key), Value::from_json(value)))
					.collect(),
			),
		}
	}

	/// Converts a value without objects into JSON.
	pub fn to_plain_json(&self) -> LiveResult<serde_json::Value> {
		Ok(match self {
			Value::Null => serde_json::Value::Null,
			Value::Bool(flag) => serde_json::Value::Bool(*flag),
			Value::Int(number) => serde_json::Value::from(*number),
			Value::Float(number) => serde_json::Number::from_f64(*number)
				.map(serde_json::Value::Number)
				.ok_or_else(|| LiveError::mismatch("finite number", number.to_string()))?,
			Value::String(text) => serde_json::Value::String(text.clone()),
			Value::List(items) => serde_json::Value::Array(
				items
					.iter()
					.map(Value::to_plain_json)
					.collect::<LiveResult<_>>()?,
			),
			Value::Map(entries) => {
				let mut object = serde_json::Map::with_capacity(entries.len());
				for (key, value) in entries {
					object.insert(key.to_string(), value.to_plain_json()?);
				}
				serde_json::Value::Object(object)
			}
			Value::Object(object) => {
				return Err(LiveError::mismatch("plain value", object.type_name()));
			}
		})
	}

	/// Reads a nested value by dotted path (`items.0.name`).
	pub fn get_path(&self, path: &str) -> Option<&Value> {
		let segments = split_path(path).ok()?;
		get_segments(self, &segments)
	}

	/// Writes a nested value by dotted path, creating intermediate maps.
	pub fn set_path(&mut self, path: &str, value: Value) -> LiveResult<()> {
		let segments = split_path(path)?;
		set_segments(self, &segments, value)
	}
}

/// Restores `.` and `*` placeholders inside a single path segment.
pub fn restore_placeholders(segment: &str) -> String {
	segment
		.replace(DOT_PLACEHOLDER, ".")
		.replace(ASTERISK_PLACEHOLDER, "*")
}

/// Splits a dotted path into keys, restoring placeholders per segment.
pub fn split_path(path: &str) -> LiveResult<Vec<Key>> {
	if path.is_empty() {
		return Err(LiveError::InvalidPath(path.to_string()));
	}
	path.split('.')
		.map(|segment| {
			if segment.is_empty() {
				Err(LiveError::InvalidPath(path.to_string()))
			} else {
				Ok(Key::from(restore_placeholders(segment)))
			}
		})
		.collect()
}

fn join_segments(segments: &[Key]) -> String {
	segments
		.iter()
		.map(ToString::to_string)
		.collect::<Vec<_>>()
		.join(".")
}

fn get_segments<'a>(value: &'a Value, segments: &[Key]) -> Option<&'a Value> {
	let Some((head, rest)) = segments.split_first() else {
		return Some(value);
	};
	let next = match value {
		Value::Map(entries) => entries.get(head)?,
		Value::List(items) => items.get(head.as_index()?)?,
		Value::Object(object) => object
			.as_any()
			.downcast_ref::<Model>()?
			.get(&head.to_string())?,
		_ => return None,
	};
	get_segments(next, rest)
}

pub(crate) fn set_segments(target: &mut Value, segments: &[Key], value: Value) -> LiveResult<()> {
	let Some((head, rest)) = segments.split_first() else {
		*target = value;
		return Ok(());
	};
	if target.is_null() {
		*target = Value::empty_map();
	}
	if let Value::List(items) = target {
		match head.as_index() {
			Some(index) if index < items.len() => {
				return set_segments(&mut items[index], rest, value);
			}
			Some(index) if index == items.len() => {
				items.push(Value::Null);
				return set_segments(&mut items[index], rest, value);
			}
			_ => {
				let entries = items
					.drain(..)
					.enumerate()
					.map(|(index, item)| (Key::from(index), item))
					.collect();
				*target = Value::Map(entries);
			}
		}
	}
	match target {
		Value::Map(entries) => {
			let slot = entries.entry(head.clone()).or_insert(Value::Null);
			set_segments(slot, rest, value)
		}
		Value::Object(object) => match object.as_any_mut().downcast_mut::<Model>() {
			Some(model) => model.set_segments(segments, value),
			None => Err(LiveError::InvalidPath(join_segments(segments))),
		},
		_ => Err(LiveError::InvalidPath(join_segments(segments))),
	}
}

/// Conversion of a Rust property type into a [`Value`].
pub trait IntoValue {
	/// Performs the conversion.
	fn into_value(self) -> Value;
}

/// Conversion of a [`Value`] back into a Rust property type.
///
/// Numeric strings coerce into numbers because form inputs submit strings.
pub trait FromValue: Sized {
	/// Performs the conversion.
	fn from_value(value: Value) -> LiveResult<Self>;
}

impl IntoValue for Value {
	fn into_value(self) -> Value {
		self
	}
}

impl FromValue for Value {
	fn from_value(value: Value) -> LiveResult<Self> {
		Ok(value)
	}
}

impl IntoValue for bool {
	fn into_value(self) -> Value {
		Value::Bool(self)
	}
}

impl FromValue for bool {
	fn from_value(value: Value) -> LiveResult<Self> {
		match value {
			Value::Bool(flag) => Ok(flag),
			Value::Int(0) => Ok(false),
			Value::Int(1) => Ok(true),
			Value::String(text) => match text.as_str() {
				"1" | "true" | "on" => Ok(true),
				"" | "0" | "false" | "off" => Ok(false),
				_ => Err(LiveError::mismatch("bool", format!("string {:?}", text))),
			},
			other => Err(LiveError::mismatch("bool", other.type_label())),
		}
	}
}

fn value_to_i64(value: &Value) -> LiveResult<i64> {
	match value {
		Value::Int(number) => Ok(*number),
		Value::Float(number) => whole_number(*number)
			.ok_or_else(|| LiveError::mismatch("integer", format!("float {}", number))),
		Value::String(text) => {
			let trimmed = text.trim();
			trimmed
				.parse::<i64>()
				.ok()
				.or_else(|| trimmed.parse::<f64>().ok().and_then(whole_number))
				.ok_or_else(|| LiveError::mismatch("integer", format!("string {:?}", text)))
		}
		other => Err(LiveError::mismatch("integer", other.type_label())),
	}
}

/// A float with no fractional part that fits in an `i64`.
fn whole_number(number: f64) -> Option<i64> {
	// i64::MAX as f64 rounds up to 2^63, which is out of range.
	let in_range = number >= i64::MIN as f64 && number < i64::MAX as f64;
	(number.is_finite() && number.fract() == 0.0 && in_range).then_some(number as i64)
}

macro_rules! impl_integer_value {
	($($ty:ty),* $(,)?) => {$(
		impl IntoValue for $ty {
			fn into_value(self) -> Value {
				i64::try_from(self)
					.map(Value::Int)
					.unwrap_or(Value::Float(self as f64))
			}
		}

		impl FromValue for $ty {
			fn from_value(value: Value) -> LiveResult<Self> {
				let number = value_to_i64(&value)?;
				<$ty>::try_from(number)
					.map_err(|_| LiveError::mismatch(stringify!($ty), number.to_string()))
			}
		}
	)*};
}

impl_integer_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

fn value_to_f64(value: &Value) -> LiveResult<f64> {
	match value {
		Value::Float(number) => Ok(*number),
		Value::Int(number) => Ok(*number as f64),
		Value::String(text) => text
			.trim()
			.parse::<f64>()
			.map_err(|_| LiveError::mismatch("number", format!("string {:?}", text))),
		other => Err(LiveError::mismatch("number", other.type_label())),
	}
}

impl IntoValue for f64 {
	fn into_value(self) -> Value {
		Value::Float(self)
	}
}

impl FromValue for f64 {
	fn from_value(value: Value) -> LiveResult<Self> {
		value_to_f64(&value)
	}
}

impl IntoValue for f32 {
	fn into_value(self) -> Value {
		Value::Float(f64::from(self))
	}
}

impl FromValue for f32 {
	fn from_value(value: Value) -> LiveResult<Self> {
		value_to_f64(&value).map(|number| number as f32)
	}
}

impl IntoValue for String {
	fn into_value(self) -> Value {
		Value::String(self)
	}
}

impl IntoValue for &str {
	fn into_value(self) -> Value {
		Value::String(self.to_string())
	}
}

impl FromValue for String {
	fn from_value(value: Value) -> LiveResult<Self> {
		match value {
			Value::String(text) => Ok(text),
			Value::Int(number) => Ok(number.to_string()),
			Value::Float(number) => Ok(number.to_string()),
			Value::Bool(flag) => Ok(flag.to_string()),
			other => Err(LiveError::mismatch("string", other.type_label())),
		}
	}
}

impl<T: IntoValue> IntoValue for Option<T> {
	fn into_value(self) -> Value {
		match self {
			Some(inner) => inner.into_value(),
			None => Value::Null,
		}
	}
}

impl<T: FromValue> FromValue for Option<T> {
	fn from_value(value: Value) -> LiveResult<Self> {
		match value {
			Value::Null => Ok(None),
			other => T::from_value(other).map(Some),
		}
	}
}

impl<T: IntoValue> IntoValue for Vec<T> {
	fn into_value(self) -> Value {
		Value::List(self.into_iter().map(IntoValue::into_value).collect())
	}
}

impl<T: FromValue> FromValue for Vec<T> {
	fn from_value(value: Value) -> LiveResult<Self> {
		match value {
			Value::List(items) => items.into_iter().map(T::from_value).collect(),
			Value::Map(entries) => entries.into_values().map(T::from_value).collect(),
			other => Err(LiveError::mismatch("list", other.type_label())),
		}
	}
}

impl<T: IntoValue> IntoValue for IndexMap<String, T> {
	fn into_value(self) -> Value {
		Value::Map(
			self.into_iter()
				.map(|(key, value)| (Key::from(key), value.into_value()))
				.collect(),
		)
	}
}

impl<T: FromValue> FromValue for IndexMap<String, T> {
	fn from_value(value: Value) -> LiveResult<Self> {
		match value {
			Value::Map(entries) => entries
				.into_iter()
				.map(|(key, value)| Ok((key.to_string(), T::from_value(value)?)))
				.collect(),
			Value::List(items) => items
				.into_iter()
				.enumerate()
				.map(|(index, value)| Ok((index.to_string(), T::from_value(value)?)))
				.collect(),
			other => Err(LiveError::mismatch("map", other.type_label())),
		}
	}
}

/// Implements [`IntoValue`] and [`FromValue`] for types carried as
/// [`Value::Object`].
///
/// ```
/// use reinhardt_live_core::object_value;
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Point {
/// 	x: i64,
/// 	y: i64,
/// }
///
/// object_value!(Point);
/// ```
#[macro_export]
macro_rules! object_value {
	($($ty:ty),* $(,)?) => {$(
		impl $crate::value::IntoValue for $ty {
			fn into_value(self) -> $crate::value::Value {
				$crate::value::Value::object(self)
			}
		}

		impl $crate::value::FromValue for $ty {
			fn from_value(value: $crate::value::Value) -> $crate::error::LiveResult<Self> {
				value.into_object::<$ty>()
			}
		}
	)*};
}

object_value!(Model);

fn parse_datetime_string<T>(
	value: Value,
	expected: &'static str,
	parse: impl Fn(&str) -> Option<T>,
) -> LiveResult<T>
where
	T: LiveObject,
{
	match value {
		Value::String(text) => {
			parse(text.trim()).ok_or_else(|| LiveError::mismatch(expected, format!("{:?}", text)))
		}
		other => other.into_object::<T>(),
	}
}

impl IntoValue for DateTime<Utc> {
	fn into_value(self) -> Value {
		Value::object(self)
	}
}

impl FromValue for DateTime<Utc> {
	fn from_value(value: Value) -> LiveResult<Self> {
		parse_datetime_string(value, "datetime", |text| {
			DateTime::parse_from_rfc3339(text)
				.ok()
				.map(|parsed| parsed.with_timezone(&Utc))
		})
	}
}

impl IntoValue for DateTime<FixedOffset> {
	fn into_value(self) -> Value {
		Value::object(self)
	}
}

impl FromValue for DateTime<FixedOffset> {
	fn from_value(value: Value) -> LiveResult<Self> {
		parse_datetime_string(value, "datetime", |text| {
			DateTime::parse_from_rfc3339(text).ok()
		})
	}
}

impl IntoValue for NaiveDateTime {
	fn into_value(self) -> Value {
		Value::object(self)
	}
}

impl FromValue for NaiveDateTime {
	fn from_value(value: Value) -> LiveResult<Self> {
		parse_datetime_string(value, "naive datetime", |text| {
			NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
				.or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
				.ok()
		})
	}
}

impl IntoValue for NaiveDate {
	fn into_value(self) -> Value {
		Value::object(self)
	}
}

impl FromValue for NaiveDate {
	fn from_value(value: Value) -> LiveResult<Self> {
		parse_datetime_string(value, "date", |text| {
			NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	#[case("0", Key::Int(0))]
	#[case("42", Key::Int(42))]
	#[case("-7", Key::Int(-7))]
	#[case("007", Key::Str("007".into()))]
	#[case("-0", Key::Str("-0".into()))]
	#[case("+1", Key::Str("+1".into()))]
	#[case("1.5", Key::Str("1.5".into()))]
	#[case("bob", Key::Str("bob".into()))]
	fn test_key_parse(#[case] raw: &str, #[case] expected: Key) {
		// Act & Assert
		assert_eq!(Key::parse(raw), expected);
	}

	#[rstest]
	fn test_from_json_turns_numeric_keys_into_ints() {
		// Arrange
		let json = json!({"1": "foo", "bob": "lob"});

		// Act
		let value = Value::from_json(json);

		// Assert
		let Value::Map(entries) = value else {
			panic!("expected map");
		};
		assert_eq!(entries.get(&Key::Int(1)), Some(&Value::String("foo".into())));
		assert_eq!(entries.get(&Key::Str("bob".into())), Some(&Value::String("lob".into())));
	}

	#[rstest]
	fn test_set_path_creates_intermediate_maps() {
		// Arrange
		let mut value = Value::Null;

		// Act
		value.set_path("address.city", "Paris".into_value()).unwrap();

		// Assert
		assert_eq!(value.get_path("address.city"), Some(&Value::String("Paris".into())));
	}

	#[rstest]
	fn test_set_path_extends_and_converts_lists() {
		// Arrange
		let mut value = Value::from_json(json!({"foo": []}));

		// Act
		value.set_path("foo.0", "bar".into_value()).unwrap();
		value.set_path("foo.bar", "baz".into_value()).unwrap();

		// Assert
		let expected = Value::from_json(json!({"foo": {"0": "bar", "bar": "baz"}}));
		assert_eq!(value, expected);
	}

	#[rstest]
	fn test_set_path_restores_placeholders() {
		// Arrange
		let mut value = Value::empty_map();

		// Act
		value
			.set_path("files.report__dot__pdf", true.into_value())
			.unwrap();
		value
			.set_path("globs.__asterisk__", 1i64.into_value())
			.unwrap();

		// Assert
		let Value::Map(entries) = &value else {
			panic!("expected map");
		};
		let Some(Value::Map(files)) = entries.get(&Key::from("files")) else {
			panic!("expected files map");
		};
		assert!(files.contains_key(&Key::from("report.pdf")));
		let Some(Value::Map(globs)) = entries.get(&Key::from("globs")) else {
			panic!("expected globs map");
		};
		assert!(globs.contains_key(&Key::from("*")));
	}

	#[rstest]
	fn test_set_path_rejects_scalars() {
		// Arrange
		let mut value = Value::from_json(json!({"count": 1}));

		// Act
		let result = value.set_path("count.inner", Value::Null);

		// Assert
		assert!(matches!(result, Err(LiveError::InvalidPath(_))));
	}

	#[rstest]
	#[case(Value::String("5".into()), 5)]
	#[case(Value::String(" 12 ".into()), 12)]
	#[case(Value::Float(3.0), 3)]
	#[case(Value::Float(-9_223_372_036_854_775_808.0), i64::MIN)]
	#[case(Value::String("2e3".into()), 2000)]
	#[case(Value::Int(-4), -4)]
	fn test_integer_coercion(#[case] input: Value, #[case] expected: i64) {
		// Act & Assert
		assert_eq!(i64::from_value(input).unwrap(), expected);
	}

	#[rstest]
	#[case(Value::String("abc".into()))]
	#[case(Value::Float(1.5))]
	#[case(Value::Float(1e30))]
	#[case(Value::Float(-1e30))]
	#[case(Value::Float(9_223_372_036_854_775_808.0))]
	#[case(Value::Float(f64::INFINITY))]
	#[case(Value::String("1e30".into()))]
	#[case(Value::String("-9.3e18".into()))]
	#[case(Value::Null)]
	fn test_integer_coercion_rejects(#[case] input: Value) {
		// Act & Assert
		assert!(matches!(
			i64::from_value(input),
			Err(LiveError::TypeMismatch { .. })
		));
	}

	#[rstest]
	fn test_option_round_trip() {
		// Arrange
		let some: Option<String> = Some("x".into());
		let none: Option<String> = None;

		// Act & Assert
		assert_eq!(Option::<String>::from_value(some.clone().into_value()).unwrap(), some);
		assert_eq!(Option::<String>::from_value(none.into_value()).unwrap(), None);
	}

	#[rstest]
	fn test_object_equality_and_downcast() {
		// Arrange
		let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
		let value = date.into_value();

		// Act
		let cloned = value.clone();

		// Assert
		assert_eq!(value, cloned);
		assert_eq!(value.downcast_ref::<NaiveDate>(), Some(&date));
		assert_eq!(NaiveDate::from_value(cloned).unwrap(), date);
		assert_ne!(value, Value::String("2024-02-29".into()));
	}

	#[rstest]
	fn test_date_from_string_input() {
		// Act
		let parsed = NaiveDate::from_value(Value::String("2024-01-31".into())).unwrap();

		// Assert
		assert_eq!(parsed, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
	}

	#[rstest]
	fn test_to_plain_json_rejects_objects() {
		// Arrange
		let value = Value::object(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

		// Act & Assert
		assert!(value.to_plain_json().is_err());
	}

	#[rstest]
	fn test_map_equality_ignores_order() {
		// Arrange
		let a = Value::from_json(json!({"1": "foo", "0": "bar"}));
		let b = Value::from_json(json!({"0": "bar", "1": "foo"}));

		// Act & Assert
		assert_eq!(a, b);
	}
}
