//! `wire:*` directives.
//!
//! A directive is an attribute such as `wire:click="add('milk', 2)"` or
//! `wire:model.live="query"`. The part after `wire:` splits on `.` into a
//! name and modifiers; the value is an expression or a property path.
//! Expression arguments are JSON5, so single-quoted strings and trailing
//! commas are accepted.

use crate::error::{ClientError, ClientResult};
use indexmap::IndexMap;

/// Attribute prefix of every directive.
pub const PREFIX: &str = "wire:";

/// A parsed `wire:*` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
	/// Directive name (`click`, `model`, `keydown`, ...).
	pub name: String,
	/// Modifiers after the name (`live`, `enter`, ...).
	pub modifiers: Vec<String>,
	/// Attribute value.
	pub value: String,
}

impl Directive {
	/// Parses an attribute; `None` if it is not a directive.
	pub fn parse(attribute: &str, value: &str) -> Option<Self> {
		let rest = attribute.strip_prefix(PREFIX)?;
		let mut parts = rest.split('.');
		let name = parts.next().filter(|name| !name.is_empty())?;
		Some(Self {
			name: name.to_string(),
			modifiers: parts.map(str::to_string).collect(),
			value: value.to_string(),
		})
	}

	/// Whether a modifier is present.
	pub fn has_modifier(&self, modifier: &str) -> bool {
		self.modifiers.iter().any(|candidate| candidate == modifier)
	}

	/// Parses the value as an expression.
	pub fn expression(&self) -> ClientResult<Expression> {
		Expression::parse(&self.value)
	}
}

/// Every directive on an element, in attribute order.
pub fn directives(attributes: &IndexMap<String, String>) -> Vec<Directive> {
	attributes
		.iter()
		.filter_map(|(name, value)| Directive::parse(name, value))
		.collect()
}

/// Which component an expression addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
	/// The component owning the element.
	Own,
	/// That component's parent (`$parent.method()`).
	Parent,
}

/// A method call expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
	/// Addressed component.
	pub target: Target,
	/// Method or magic action name.
	pub method: String,
	/// Arguments.
	pub params: Vec<serde_json::Value>,
}

impl Expression {
	/// Parses `method`, `method(args)` or `$parent.method(args)`.
	pub fn parse(source: &str) -> ClientResult<Self> {
		let trimmed = source.trim();
		let (target, call) = match trimmed.strip_prefix("$parent.") {
			Some(call) => (Target::Parent, call),
			None => (Target::Own, trimmed),
		};
		let (method, params) = match call.find('(') {
			Some(open) => {
				let Some(args) = call[open + 1..].strip_suffix(')') else {
					return Err(ClientError::directive(source, "unbalanced parentheses"));
				};
				let params: Vec<serde_json::Value> = json5::from_str(&format!("[{}]", args))
					.map_err(|error| ClientError::directive(source, error.to_string()))?;
				(call[..open].trim(), params)
			}
			None => (call, Vec::new()),
		};
		let valid = !method.is_empty()
			&& method
				.chars()
				.enumerate()
				.all(|(index, c)| c.is_ascii_alphanumeric() || c == '_' || (c == '$' && index == 0));
		if !valid {
			return Err(ClientError::directive(source, "invalid method name"));
		}
		Ok(Self {
			target,
			method: method.to_string(),
			params,
		})
	}

	/// Whether this is a client-side magic action such as `$set`.
	pub fn is_magic(&self) -> bool {
		self.method.starts_with('$')
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	#[case("wire:click", "save", "click", &[])]
	#[case("wire:model.live", "query", "model", &["live"])]
	#[case("wire:keydown.enter", "search", "keydown", &["enter"])]
	#[case("wire:submit.prevent", "save", "submit", &["prevent"])]
	fn test_parse_directive(
		#[case] attribute: &str,
		#[case] value: &str,
		#[case] name: &str,
		#[case] modifiers: &[&str],
	) {
		// Act
		let directive = Directive::parse(attribute, value).unwrap();

		// Assert
		assert_eq!(directive.name, name);
		assert_eq!(directive.modifiers, modifiers);
		assert_eq!(directive.value, value);
	}

	#[rstest]
	#[case("class")]
	#[case("wire:")]
	#[case("x-wire:click")]
	fn test_non_directives(#[case] attribute: &str) {
		// Act & Assert
		assert!(Directive::parse(attribute, "").is_none());
	}

	#[rstest]
	fn test_expression_without_arguments() {
		// Act
		let expression = Expression::parse("increment").unwrap();

		// Assert
		assert_eq!(expression.target, Target::Own);
		assert_eq!(expression.method, "increment");
		assert!(expression.params.is_empty());
	}

	#[rstest]
	fn test_expression_with_json5_arguments() {
		// Act
		let expression = Expression::parse(" add('milk', 2, {qty: 1},) ").unwrap();

		// Assert
		assert_eq!(expression.method, "add");
		assert_eq!(expression.params, vec![json!("milk"), json!(2), json!({"qty": 1})]);
	}

	#[rstest]
	fn test_parent_expression() {
		// Act
		let expression = Expression::parse("$parent.remove(3)").unwrap();

		// Assert
		assert_eq!(expression.target, Target::Parent);
		assert_eq!(expression.method, "remove");
		assert_eq!(expression.params, vec![json!(3)]);
	}

	#[rstest]
	fn test_magic_expression() {
		// Act
		let expression = Expression::parse("$set('open', true)").unwrap();

		// Assert
		assert!(expression.is_magic());
		assert_eq!(expression.params, vec![json!("open"), json!(true)]);
	}

	#[rstest]
	#[case("")]
	#[case("save(")]
	#[case("do-it()")]
	#[case("save(1 2)")]
	fn test_invalid_expressions(#[case] source: &str) {
		// Act
		let result = Expression::parse(source);

		// Assert
		assert!(matches!(result, Err(ClientError::Directive { .. })));
	}
}
