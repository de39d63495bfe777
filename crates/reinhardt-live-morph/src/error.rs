//! Morph error types.

use thiserror::Error;

/// Result type for morph operations.
pub type MorphResult<T> = Result<T, MorphError>;

/// Errors raised while parsing markup or applying patches.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MorphError {
	/// Markup did not contain exactly one root element.
	#[error("expected a single root element, found {0}")]
	RootCount(usize),

	/// A patch path does not resolve in the target tree.
	#[error("patch path {0:?} does not resolve")]
	InvalidPath(Vec<usize>),

	/// An element-only patch targeted a text or comment node.
	#[error("node at {0:?} is not an element")]
	NotAnElement(Vec<usize>),

	/// A children patch kept an index the node does not have.
	#[error("children patch keeps index {index} but the node has {len} children")]
	InvalidKeep {
		/// Requested child index.
		index: usize,
		/// Actual child count.
		len: usize,
	},

	/// A node id no longer refers to a live node.
	#[error("node {0} is detached or removed")]
	StaleNode(usize),
}
