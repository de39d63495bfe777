//! # Reinhardt Live Client
//!
//! Client runtime for live components. It discovers server-rendered
//! component roots in a page, keeps a registry of their snapshots, turns
//! `wire:*` directives into actions, sends them in per-component batches
//! and morphs the returned markup into the page.
//!
//! The runtime is headless: the page is a
//! [`Document`](reinhardt_live_morph::Document) and user gestures are method
//! calls such as [`Runtime::click`] or [`Runtime::input`], so the same code
//! drives a browser binding or a test.
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_live_client::prelude::*;
//!
//! let runtime = Runtime::new(LocalTransport::new(manager.clone()));
//! let ids = runtime.load(&page_html)?;
//! runtime.wire(&ids[0])?.call("increment", vec![]).await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod directive;
pub mod error;
pub mod location;
pub mod registry;
pub mod runtime;
pub mod transport;
pub mod wire;

pub use error::{ClientError, ClientResult};
pub use runtime::{Runtime, RuntimeEvent};

/// Commonly used types.
pub mod prelude {
	pub use crate::directive::{Directive, Expression, Target};
	pub use crate::error::{ClientError, ClientResult};
	pub use crate::location::Location;
	pub use crate::registry::ComponentState;
	pub use crate::runtime::{Runtime, RuntimeEvent};
	pub use crate::transport::{LocalTransport, Transport};
	pub use crate::wire::Wire;
}
