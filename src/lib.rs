//! # Reinhardt Live
//!
//! Server-driven reactive components. A component is a Rust struct with
//! public properties and actions; the server renders it to HTML with its
//! state embedded as a signed snapshot, the browser sends back the snapshot
//! together with the actions the user triggered, and the server rebuilds the
//! component, applies the actions and answers with fresh markup and a new
//! snapshot.
//!
//! ## Feature Flags
//!
//! - `core` - Snapshot codec, synthesizers, integrity guard, action
//!   processor, nesting and the [`LiveManager`](core::LiveManager)
//! - `morph` - Markup diff/patch engine
//! - `client` - Headless client runtime (implies `core` and `morph`)
//! - `full` (default) - Everything
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use reinhardt_live::prelude::*;
//!
//! #[derive(Default)]
//! struct Counter {
//!     count: i64,
//! }
//!
//! impl Component for Counter {
//!     fn define(def: &mut Definition<Self>) {
//!         live_property!(def, count);
//!         def.action("increment", |counter, _args, _ctx| {
//!             counter.count += 1;
//!             Ok(())
//!         });
//!     }
//! }
//!
//! let manager = LiveManager::builder()
//!     .secret_key(std::env::var("LIVE_SECRET_KEY")?)
//!     .component::<Counter>("counter")
//!     .renderer(renderer)
//!     .build()?;
//!
//! let mounted = manager.mount("counter", Params::new())?;
//! ```

#![warn(missing_docs)]

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "core")]
pub mod core;
#[cfg(feature = "morph")]
pub mod morph;

/// Commonly used types from every enabled crate.
pub mod prelude {
	#[cfg(feature = "client")]
	pub use reinhardt_live_client::prelude::*;
	#[cfg(feature = "core")]
	pub use reinhardt_live_core::prelude::*;
	#[cfg(feature = "morph")]
	pub use reinhardt_live_morph::{Document, NodeId, Patch, diff};
}
