//! Client runtime error types.

use reinhardt_live_core::error::{ErrorKind, LiveError};
use reinhardt_live_morph::MorphError;
use thiserror::Error;

/// Result type for client runtime operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Client runtime errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
	/// The request never produced a response.
	#[error("transport failed: {0}")]
	Transport(String),

	/// The server answered with an error effect.
	#[error("server rejected request ({status}): {message}")]
	Server {
		/// HTTP-style status.
		status: u16,
		/// Error classification.
		kind: ErrorKind,
		/// Client-facing message.
		message: String,
	},

	/// No registered component has this id.
	#[error("component [{0}] is not registered")]
	ComponentNotFound(String),

	/// A component root lacks a required attribute.
	#[error("component root is missing attribute [{0}]")]
	MissingAttribute(&'static str),

	/// A directive expression could not be parsed.
	#[error("invalid directive expression [{expression}]: {message}")]
	Directive {
		/// Source expression.
		expression: String,
		/// What is wrong.
		message: String,
	},

	/// `$parent` was used on a top-level component.
	#[error("component [{0}] has no parent")]
	NoParent(String),

	/// Morphing the component markup failed.
	#[error("morph failed: {0}")]
	Morph(#[from] MorphError),

	/// A snapshot or effect could not be decoded.
	#[error("live payload error: {0}")]
	Live(#[from] LiveError),

	/// JSON encoding or decoding error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl ClientError {
	/// Builds a [`ClientError::Directive`].
	pub fn directive(expression: impl Into<String>, message: impl Into<String>) -> Self {
		Self::Directive {
			expression: expression.into(),
			message: message.into(),
		}
	}
}
