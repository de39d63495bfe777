//! The page address and the properties mirrored in its query string.
//!
//! Components declare URL-bound properties in their root effects. The
//! runtime tracks each binding from the moment the component is registered
//! and, after every applied response, rewrites the query string from the
//! confirmed snapshots. A change to a binding declared with `history` pushes
//! an entry that [`Runtime::back`](crate::Runtime::back) can restore.

use crate::error::ClientResult;
use crate::registry::ComponentRegistry;
use indexmap::IndexMap;
use reinhardt_live_core::url::{
	QueryPairs, UrlBinding, format_query, is_param_key, parse_query, read_param, replace_param,
	write_param,
};

/// A property a component mirrors in the query string.
#[derive(Debug, Clone)]
struct Tracked {
	name: String,
	binding: UrlBinding,
	initial: serde_json::Value,
	in_address: bool,
}

/// Current address of the page.
#[derive(Debug, Clone)]
pub struct Location {
	path: String,
	query: QueryPairs,
	href: String,
	history: Vec<QueryPairs>,
	tracked: IndexMap<(String, String), Tracked>,
}

impl Default for Location {
	fn default() -> Self {
		Self {
			path: "/".to_string(),
			query: QueryPairs::new(),
			href: "/".to_string(),
			history: Vec::new(),
			tracked: IndexMap::new(),
		}
	}
}

impl Location {
	/// Parses `path?query`; a fragment is dropped.
	pub fn parse(url: &str) -> ClientResult<Self> {
		let url = url.split_once('#').map_or(url, |(url, _)| url);
		let (path, query) = url.split_once('?').unwrap_or((url, ""));
		let mut location = Self {
			path: if path.is_empty() { "/" } else { path }.to_string(),
			query: parse_query(query)?,
			..Self::default()
		};
		location.href = location.format()?;
		Ok(location)
	}

	/// Path and query string.
	pub fn href(&self) -> &str {
		&self.href
	}

	/// Decoded query pairs.
	pub fn query(&self) -> &[(String, String)] {
		&self.query
	}

	/// Number of history entries that can be restored.
	pub fn depth(&self) -> usize {
		self.history.len()
	}

	/// Starts mirroring the URL-bound properties of a registered component.
	/// The value it has now is the one that keeps its parameter hidden.
	pub(crate) fn track(&mut self, registry: &ComponentRegistry, id: &str) {
		let Some(entry) = registry.get(id) else {
			return;
		};
		for (property, binding) in entry.url_bindings() {
			let key = (id.to_string(), property.clone());
			if self.tracked.contains_key(&key) {
				continue;
			}
			let name = binding.name(property).to_string();
			let in_address = self.query.iter().any(|(key, _)| is_param_key(key, &name));
			let initial = entry
				.snapshot()
				.data(property)
				.cloned()
				.unwrap_or(serde_json::Value::Null);
			tracing::debug!(id = %id, property = %property, param = %name, "tracking url property");
			self.tracked.insert(
				key,
				Tracked {
					name,
					binding: binding.clone(),
					initial,
					in_address,
				},
			);
		}
	}

	/// Stops mirroring the properties of removed components.
	pub(crate) fn untrack(&mut self, ids: &[String]) {
		self.tracked.retain(|(id, _), _| !ids.contains(id));
	}

	/// Rewrites the query string from the confirmed snapshots. Returns
	/// `Some(pushed)` when the address changed.
	pub(crate) fn sync(&mut self, registry: &ComponentRegistry) -> ClientResult<Option<bool>> {
		let mut query = self.query.clone();
		let mut push = false;
		for ((id, property), tracked) in &self.tracked {
			let Some(value) = registry
				.get(id)
				.and_then(|entry| entry.snapshot().data(property))
			else {
				continue;
			};
			let hidden = *value == tracked.initial && !tracked.binding.keep && !tracked.in_address;
			let pairs = if hidden {
				QueryPairs::new()
			} else {
				write_param(&tracked.name, value)
			};
			if pairs != param_pairs(&query, &tracked.name) {
				push |= tracked.binding.history;
				replace_param(&mut query, &tracked.name, pairs);
			}
		}
		if query == self.query {
			return Ok(None);
		}
		if push {
			self.history.push(std::mem::replace(&mut self.query, query));
		} else {
			self.query = query;
		}
		self.href = self.format()?;
		Ok(Some(push))
	}

	/// Restores the previous history entry. Returns the property values to
	/// write back, or `None` when there is nothing to go back to.
	pub(crate) fn back(&mut self) -> ClientResult<Option<Vec<(String, String, serde_json::Value)>>> {
		let Some(previous) = self.history.pop() else {
			return Ok(None);
		};
		let restored = self
			.tracked
			.iter()
			.filter(|(_, tracked)| {
				param_pairs(&previous, &tracked.name) != param_pairs(&self.query, &tracked.name)
			})
			.map(|((id, property), tracked)| {
				let value =
					read_param(&previous, &tracked.name).unwrap_or_else(|| tracked.initial.clone());
				(id.clone(), property.clone(), value)
			})
			.collect();
		self.query = previous;
		self.href = self.format()?;
		Ok(Some(restored))
	}

	fn format(&self) -> ClientResult<String> {
		if self.query.is_empty() {
			return Ok(self.path.clone());
		}
		Ok(format!("{}?{}", self.path, format_query(&self.query)?))
	}
}

fn param_pairs(query: &[(String, String)], name: &str) -> QueryPairs {
	query
		.iter()
		.filter(|(key, _)| is_param_key(key, name))
		.cloned()
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("/shop?q=rust&page=2#top", "/shop", "/shop?q=rust&page=2")]
	#[case("?q=a+b", "/", "/?q=a+b")]
	#[case("/plain", "/plain", "/plain")]
	#[case("", "/", "/")]
	fn test_parse_location(#[case] url: &str, #[case] path: &str, #[case] href: &str) {
		// Act
		let location = Location::parse(url).unwrap();

		// Assert
		assert_eq!(location.path, path);
		assert_eq!(location.href(), href);
		assert_eq!(location.depth(), 0);
	}

	#[rstest]
	fn test_param_pairs_select_bracketed_keys() {
		// Arrange
		let query = parse_query("tags[0]=a&tagsx=1&tags[1]=b&q=x").unwrap();

		// Act
		let pairs = param_pairs(&query, "tags");

		// Assert
		assert_eq!(
			pairs,
			vec![
				("tags[0]".to_string(), "a".to_string()),
				("tags[1]".to_string(), "b".to_string())
			]
		);
	}
}
