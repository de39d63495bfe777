//! # Reinhardt Live Core
//!
//! Server side of Reinhardt live components: stateful components whose public
//! state travels to the browser as a signed snapshot and comes back with a
//! batch of actions on every interaction.
//!
//! ## Request pipeline
//!
//! 1. **Hydrate**: verify the snapshot checksum, rebuild the component tree
//!    and restore every public property through the synthesizer registry.
//! 2. **Apply**: run property syncs, method calls and event dispatches in
//!    order, with per-property update hooks and validation.
//! 3. **Render**: render the template (mounting or reusing children).
//! 4. **Dehydrate**: serialize public state, sign it and embed the snapshot
//!    in the root element of the markup.
//!
//! ## Example
//!
//! ```ignore
//! use reinhardt_live_core::prelude::*;
//!
//! #[derive(Default)]
//! struct Counter {
//! 	count: i64,
//! }
//!
//! impl Component for Counter {
//! 	fn define(def: &mut Definition<Self>) {
//! 		live_property!(def, count);
//! 		def.action("increment", |counter, _args, _ctx| {
//! 			counter.count += 1;
//! 			Ok(())
//! 		});
//! 	}
//! }
//!
//! let manager = LiveManager::builder()
//! 	.secret_key(std::env::var("LIVE_SECRET")?)
//! 	.component::<Counter>("counter")
//! 	.renderer(TeraRenderer::from_glob("templates/**/*.html")?)
//! 	.build()?;
//! let mounted = manager.mount("counter", Params::new())?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod actions;
pub mod capabilities;
pub mod checksum;
pub mod component;
pub mod error;
pub mod keys;
pub mod manager;
pub mod model;
pub mod nesting;
pub mod protocol;
pub mod render;
pub mod services;
pub mod settings;
pub mod snapshot;
pub mod store;
pub mod synth;
pub mod testing;
pub mod url;
pub mod validation;
pub mod value;

/// Re-export commonly used types.
pub mod prelude {
	pub use crate::actions::{Action, ActionOutcome, ActionProcessor};
	pub use crate::capabilities::{ActionContext, Capabilities, DispatchedEvent};
	pub use crate::component::{
		ActionReturn, Args, Component, ComponentRegistry, Definition, Instance, Lifecycle, Params,
	};
	pub use crate::error::{ErrorEffect, ErrorKind, LiveError, LiveResult};
	pub use crate::keys::{EnvKeyProvider, SigningKeyProvider, StaticKeyProvider};
	pub use crate::manager::{LiveManager, LiveManagerBuilder, MountOptions, Mounted};
	pub use crate::model::{InMemoryModelRepository, Model, ModelRepository};
	pub use crate::protocol::{Effects, ErrorResponse, RequestPayload, ResponsePayload};
	pub use crate::render::{FnRenderer, RenderContext, TemplateRenderer, TeraRenderer, View};
	pub use crate::settings::LiveSettings;
	pub use crate::snapshot::{Fingerprint, Memo, Snapshot};
	pub use crate::synth::{Synthesizer, SynthesizerRegistry, Wireable};
	pub use crate::testing::LiveTest;
	pub use crate::url::UrlBinding;
	pub use crate::validation::{ErrorBag, FnValidator, Rules, Validator};
	pub use crate::value::{FromValue, IntoValue, Key, Value};
	pub use crate::{live_property, object_value};
}

pub use error::{LiveError, LiveResult};
pub use manager::LiveManager;
