//! # Reinhardt Live Morph
//!
//! Markup diffing for live components. After every request the client gets
//! fresh markup for a component; instead of replacing the DOM it morphs the
//! existing tree into the new one, so unchanged nodes keep their identity
//! and state.
//!
//! ## Example
//!
//! ```
//! use reinhardt_live_morph::{Document, apply, diff, parse};
//!
//! let old = parse("<ul><li wire:key=\"a\">A</li></ul>").unwrap();
//! let new = parse("<ul><li wire:key=\"b\">B</li><li wire:key=\"a\">A</li></ul>").unwrap();
//!
//! let mut tree = old.clone();
//! apply(&mut tree, &diff(&old, &new)).unwrap();
//! assert_eq!(tree, new);
//!
//! let mut document = Document::parse("<p>0</p>");
//! let root = document.roots()[0];
//! document.morph(root, "<p>1</p>").unwrap();
//! assert_eq!(document.text_content(root), "1");
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod diff;
pub mod document;
pub mod error;
pub mod node;

pub use diff::{ChildOp, Patch, apply, diff};
pub use document::{Document, NodeId, NodeState};
pub use error::{MorphError, MorphResult};
pub use node::{Element, VNode, parse, parse_nodes};
