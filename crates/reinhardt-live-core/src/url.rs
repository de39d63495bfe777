//! Properties mirrored in the page query string.
//!
//! A component lists the properties the client keeps in the address bar with
//! [`Definition::url`](crate::component::Definition::url). When mounting,
//! query values for those properties override same-named params; afterwards
//! the client rewrites the query string whenever a tracked value changes.
//!
//! Scalars map to one parameter. Lists and maps are flattened with bracketed
//! keys: `tags[0]=a&tags[1]=b`, `filter[status]=open`.

use crate::error::{LiveError, LiveResult};
use serde::{Deserialize, Serialize};

/// Decoded query string pairs, in address bar order.
pub type QueryPairs = Vec<(String, String)>;

/// How a property is reflected in the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlBinding {
	/// Parameter name; defaults to the property name.
	#[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
	pub alias: Option<String>,
	/// Push a history entry on change instead of replacing the current one.
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub history: bool,
	/// Keep the parameter when the value returns to its initial value.
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub keep: bool,
}

impl UrlBinding {
	/// Binding under the property's own name.
	pub fn new() -> Self {
		Self::default()
	}

	/// Uses `name` as the parameter name.
	pub fn alias(mut self, name: impl Into<String>) -> Self {
		self.alias = Some(name.into());
		self
	}

	/// Pushes a history entry on every change.
	pub fn history(mut self) -> Self {
		self.history = true;
		self
	}

	/// Always shows the parameter.
	pub fn keep(mut self) -> Self {
		self.keep = true;
		self
	}

	/// Parameter name for `property`.
	pub fn name<'a>(&'a self, property: &'a str) -> &'a str {
		self.alias.as_deref().unwrap_or(property)
	}
}

/// Decodes a query string; a leading `?` is ignored.
pub fn parse_query(query: &str) -> LiveResult<QueryPairs> {
	serde_urlencoded::from_str(query.trim_start_matches('?'))
		.map_err(|error| LiveError::Query(error.to_string()))
}

/// Encodes pairs as a query string without the leading `?`.
pub fn format_query(pairs: &[(String, String)]) -> LiveResult<String> {
	serde_urlencoded::to_string(pairs).map_err(|error| LiveError::Query(error.to_string()))
}

/// Whether `key` belongs to parameter `name`.
pub fn is_param_key(key: &str, name: &str) -> bool {
	key == name
		|| key
			.strip_prefix(name)
			.is_some_and(|rest| rest.starts_with('['))
}

/// Value of parameter `name`: a string for `name=v`, a list or map for
/// bracketed keys, `None` when absent.
pub fn read_param(pairs: &[(String, String)], name: &str) -> Option<serde_json::Value> {
	if let Some((_, value)) = pairs.iter().find(|(key, _)| key == name) {
		return Some(serde_json::Value::String(value.clone()));
	}
	let mut nested = serde_json::Value::Null;
	let mut found = false;
	for (key, value) in pairs {
		let Some(rest) = key.strip_prefix(name) else {
			continue;
		};
		let Some(segments) = bracket_segments(rest) else {
			continue;
		};
		insert_nested(&mut nested, &segments, value.clone());
		found = true;
	}
	found.then_some(nested)
}

/// Pairs encoding `value` under parameter `name`; `null` encodes to nothing.
pub fn write_param(name: &str, value: &serde_json::Value) -> QueryPairs {
	let mut pairs = Vec::new();
	flatten(name.to_string(), value, &mut pairs);
	pairs
}

/// Replaces the pairs of parameter `name` with `replacement`, at the
/// position of its first pair. A new parameter goes last.
pub fn replace_param(pairs: &mut QueryPairs, name: &str, replacement: QueryPairs) {
	let position = pairs.iter().position(|(key, _)| is_param_key(key, name));
	pairs.retain(|(key, _)| !is_param_key(key, name));
	let at = position.unwrap_or(pairs.len()).min(pairs.len());
	pairs.splice(at..at, replacement);
}

/// `[a][0]` → `["a", "0"]`; `None` unless `rest` is only bracket groups.
fn bracket_segments(rest: &str) -> Option<Vec<String>> {
	let mut segments = Vec::new();
	let mut remaining = rest;
	while !remaining.is_empty() {
		let inner = remaining.strip_prefix('[')?;
		let end = inner.find(']')?;
		segments.push(inner[..end].to_string());
		remaining = &inner[end + 1..];
	}
	(!segments.is_empty()).then_some(segments)
}

fn insert_nested(target: &mut serde_json::Value, segments: &[String], value: String) {
	let Some((first, rest)) = segments.split_first() else {
		*target = serde_json::Value::String(value);
		return;
	};
	let index = if first.is_empty() {
		Some(usize::MAX)
	} else {
		first.parse::<usize>().ok()
	};
	if target.is_null() {
		*target = match index {
			Some(_) => serde_json::Value::Array(Vec::new()),
			None => serde_json::Value::Object(serde_json::Map::new()),
		};
	}
	if index.is_none()
		&& let serde_json::Value::Array(items) = target
	{
		let map = std::mem::take(items)
			.into_iter()
			.enumerate()
			.map(|(position, item)| (position.to_string(), item))
			.collect();
		*target = serde_json::Value::Object(map);
	}
	match target {
		serde_json::Value::Array(items) => {
			// Sparse or appended indices land at the end.
			let slot = index.unwrap_or(usize::MAX).min(items.len());
			if slot == items.len() {
				items.push(serde_json::Value::Null);
			}
			insert_nested(&mut items[slot], rest, value);
		}
		serde_json::Value::Object(map) => {
			let key = if first.is_empty() {
				map.len().to_string()
			} else {
				first.clone()
			};
			insert_nested(map.entry(key).or_insert(serde_json::Value::Null), rest, value);
		}
		other => {
			*other = serde_json::Value::Null;
			insert_nested(other, segments, value);
		}
	}
}

fn flatten(key: String, value: &serde_json::Value, out: &mut QueryPairs) {
	match value {
		serde_json::Value::Null => {}
		serde_json::Value::Bool(flag) => out.push((key, flag.to_string())),
		serde_json::Value::Number(number) => out.push((key, number.to_string())),
		serde_json::Value::String(text) => out.push((key, text.clone())),
		serde_json::Value::Array(items) => {
			for (index, item) in items.iter().enumerate() {
				flatten(format!("{}[{}]", key, index), item, out);
			}
		}
		serde_json::Value::Object(map) => {
			for (name, item) in map {
				flatten(format!("{}[{}]", key, name), item, out);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	fn pairs(raw: &[(&str, &str)]) -> QueryPairs {
		raw.iter()
			.map(|(key, value)| (key.to_string(), value.to_string()))
			.collect()
	}

	#[rstest]
	fn test_parse_and_format_keep_order() {
		// Arrange
		let query = "?foo=baz&eoo=lob&space=a+b&amp=x%26y";

		// Act
		let parsed = parse_query(query).unwrap();
		let formatted = format_query(&parsed).unwrap();

		// Assert
		assert_eq!(
			parsed,
			pairs(&[("foo", "baz"), ("eoo", "lob"), ("space", "a b"), ("amp", "x&y")])
		);
		assert_eq!(formatted, "foo=baz&eoo=lob&space=a+b&amp=x%26y");
	}

	#[rstest]
	#[case(&[("foo", "bar")], "foo", Some(json!("bar")))]
	#[case(&[("tags[0]", "a"), ("tags[1]", "b")], "tags", Some(json!(["a", "b"])))]
	#[case(&[("tags[]", "a"), ("tags[]", "b")], "tags", Some(json!(["a", "b"])))]
	#[case(&[("filter[status]", "open"), ("filter[owner]", "me")], "filter", Some(json!({"status": "open", "owner": "me"})))]
	#[case(&[("grid[0][x]", "1")], "grid", Some(json!([{"x": "1"}])))]
	#[case(&[("tags[99]", "a")], "tags", Some(json!(["a"])))]
	#[case(&[("foobar", "x"), ("foo[", "y")], "foo", None)]
	#[case(&[], "foo", None)]
	fn test_read_param(
		#[case] raw: &[(&str, &str)],
		#[case] name: &str,
		#[case] expected: Option<serde_json::Value>,
	) {
		// Act & Assert
		assert_eq!(read_param(&pairs(raw), name), expected);
	}

	#[rstest]
	fn test_write_param_flattens_nested_values() {
		// Act
		let written = write_param("q", &json!({"tags": ["a", "b"], "page": 2, "open": true, "none": null}));

		// Assert
		assert_eq!(
			written,
			pairs(&[("q[tags][0]", "a"), ("q[tags][1]", "b"), ("q[page]", "2"), ("q[open]", "true")])
		);
	}

	#[rstest]
	fn test_replace_param_keeps_position() {
		// Arrange
		let mut query = pairs(&[("a", "1"), ("tags[0]", "x"), ("tags[1]", "y"), ("z", "2")]);

		// Act
		replace_param(&mut query, "tags", pairs(&[("tags[0]", "w")]));
		replace_param(&mut query, "new", pairs(&[("new", "n")]));
		replace_param(&mut query, "a", Vec::new());

		// Assert
		assert_eq!(query, pairs(&[("tags[0]", "w"), ("z", "2"), ("new", "n")]));
	}

	#[rstest]
	fn test_binding_serializes_only_set_options() {
		// Arrange
		let plain = UrlBinding::new();
		let full = UrlBinding::new().alias("p").history().keep();

		// Act & Assert
		assert_eq!(serde_json::to_value(&plain).unwrap(), json!({}));
		assert_eq!(
			serde_json::to_value(&full).unwrap(),
			json!({"as": "p", "history": true, "keep": true})
		);
		assert_eq!(full.name("page"), "p");
		assert_eq!(plain.name("page"), "page");
	}
}
