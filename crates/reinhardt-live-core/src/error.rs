//! Live component error types.
//!
//! Every failure in the hydrate → apply → render → dehydrate pipeline is a
//! [`LiveError`]. Errors fall into the kinds described by [`ErrorKind`]; only
//! validation errors are recovered inside the pipeline, everything else aborts
//! the request and is reported to the client as an [`ErrorEffect`].

use crate::validation::ErrorBag;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for live component operations.
pub type LiveResult<T> = Result<T, LiveError>;

/// Coarse classification of a [`LiveError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	/// Checksum mismatch or id/name tampering.
	Tamper,
	/// Call to a non-public method or write to a non-public property.
	Security,
	/// Field-level validation errors.
	Validation,
	/// Unknown component or model.
	NotFound,
	/// Value that cannot be synthesized or coerced.
	Type,
	/// Everything else.
	Internal,
}

/// Live component errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LiveError {
	/// The snapshot failed checksum verification or was structurally tampered with.
	#[error("corrupt component payload for component [{component}]")]
	CorruptPayload {
		/// Name claimed by the payload.
		component: String,
	},

	/// A client tried to write a property that is not public.
	#[error("cannot bind property [{property}] on component [{component}]: property is not public")]
	ProtectedPropertyBinding {
		/// Component name.
		component: String,
		/// Property path sent by the client.
		property: String,
	},

	/// A client tried to call a framework-owned method.
	#[error("unable to call method [{method}] on component [{component}]: method is not public")]
	NonPublicMethodCall {
		/// Component name.
		component: String,
		/// Requested method.
		method: String,
	},

	/// A client tried to call a method the component does not have.
	#[error("unable to call method [{method}]: not found on component [{component}]")]
	MethodNotFound {
		/// Component name.
		component: String,
		/// Requested method.
		method: String,
	},

	/// No component is registered under the given name.
	#[error("unable to find component: [{0}]")]
	ComponentNotFound(String),

	/// A public property holds a value no synthesizer can dehydrate.
	#[error(
		"property type not supported in component [{component}] for property [{property}]: {type_name}"
	)]
	UnsupportedPropertyType {
		/// Component name.
		component: String,
		/// Property name.
		property: String,
		/// Runtime type of the offending value.
		type_name: String,
	},

	/// A meta tag names a synthesizer that is not registered.
	#[error("no synthesizer registered for meta tag [{0}]")]
	UnsupportedType(String),

	/// Field-level validation failed.
	#[error("validation failed for {} field(s)", .0.len())]
	Validation(ErrorBag),

	/// A referenced model no longer exists.
	#[error("model [{class}] with key [{key}] not found")]
	ModelNotFound {
		/// Model class tag.
		class: String,
		/// Model key.
		key: String,
	},

	/// Nested model fields are only bindable when a rule exists for the path.
	#[error("cannot bind to model data without validation rule: [{path}] on component [{component}]")]
	CannotBindToModelDataWithoutValidationRule {
		/// Component name.
		component: String,
		/// Property path.
		path: String,
	},

	/// A property path could not be resolved.
	#[error("invalid property path [{0}]")]
	InvalidPath(String),

	/// A value had the wrong shape for its destination.
	#[error("type mismatch: expected {expected}, found {found}")]
	TypeMismatch {
		/// Expected type.
		expected: &'static str,
		/// Description of what was found.
		found: String,
	},

	/// A user hook or action reported a failure.
	#[error("component [{component}] failed in [{hook}]: {message}")]
	Hook {
		/// Component name.
		component: String,
		/// Hook or action name.
		hook: String,
		/// Error message.
		message: String,
	},

	/// A component definition is inconsistent.
	#[error("invalid definition for component [{component}]: {message}")]
	InvalidDefinition {
		/// Component name.
		component: String,
		/// What is wrong.
		message: String,
	},

	/// Rendering failed or produced unusable markup.
	#[error("render failed: {0}")]
	Render(String),

	/// Template engine error.
	#[error("template error: {0}")]
	Template(#[from] tera::Error),

	/// JSON encoding or decoding error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// The signing key could not be obtained.
	#[error("signing key unavailable: {0}")]
	MissingSigningKey(String),

	/// A query string could not be decoded or encoded.
	#[error("invalid query string: {0}")]
	Query(String),

	/// Settings are missing or invalid.
	#[error("invalid settings: {0}")]
	Settings(String),

	/// I/O error while loading configuration.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl LiveError {
	/// Builds a [`LiveError::Hook`] from inside an action or hook.
	pub fn hook(
		component: impl Into<String>,
		hook: impl Into<String>,
		message: impl Into<String>,
	) -> Self {
		Self::Hook {
			component: component.into(),
			hook: hook.into(),
			message: message.into(),
		}
	}

	/// Builds a [`LiveError::TypeMismatch`].
	pub fn mismatch(expected: &'static str, found: impl Into<String>) -> Self {
		Self::TypeMismatch {
			expected,
			found: found.into(),
		}
	}

	/// Classifies this error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::CorruptPayload { .. } => ErrorKind::Tamper,
			Self::ProtectedPropertyBinding { .. }
			| Self::NonPublicMethodCall { .. }
			| Self::CannotBindToModelDataWithoutValidationRule { .. } => ErrorKind::Security,
			Self::Validation(_) => ErrorKind::Validation,
			Self::MethodNotFound { .. }
			| Self::ComponentNotFound(_)
			| Self::ModelNotFound { .. } => ErrorKind::NotFound,
			Self::UnsupportedPropertyType { .. }
			| Self::UnsupportedType(_)
			| Self::TypeMismatch { .. }
			| Self::InvalidPath(_)
			| Self::Query(_) => ErrorKind::Type,
			_ => ErrorKind::Internal,
		}
	}

	/// HTTP-style status code for transports.
	pub fn status_code(&self) -> u16 {
		match self.kind() {
			ErrorKind::Tamper => 419,
			ErrorKind::Security => 403,
			ErrorKind::NotFound => 404,
			ErrorKind::Validation => 422,
			ErrorKind::Type | ErrorKind::Internal => 500,
		}
	}

	/// Client-facing description of this failure.
	///
	/// Tamper errors are reported generically.
	pub fn to_error_effect(&self) -> ErrorEffect {
		let message = match self.kind() {
			ErrorKind::Tamper => "corrupt component payload".to_string(),
			_ => self.to_string(),
		};
		ErrorEffect {
			status: self.status_code(),
			kind: self.kind(),
			message,
		}
	}
}

/// Error payload returned to the client when a request fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEffect {
	/// HTTP-style status.
	pub status: u16,
	/// Error classification.
	pub kind: ErrorKind,
	/// Human-readable message.
	pub message: String,
}
