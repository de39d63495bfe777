//! Live components.
//!
//! A component is a plain Rust type implementing [`Component`]. Its wire
//! surface is declared once, when the type is registered, by filling in a
//! [`Definition`]: which fields are public properties, which methods are
//! callable actions, which hooks run when a property changes, which events it
//! listens for. Nothing outside the definition is ever serialized or callable.
//!
//! ```
//! use reinhardt_live_core::component::{Component, Definition};
//! use reinhardt_live_core::live_property;
//!
//! #[derive(Default)]
//! struct Counter {
//! 	count: i64,
//! 	step: i64,
//! }
//!
//! impl Component for Counter {
//! 	fn define(def: &mut Definition<Self>) {
//! 		live_property!(def, count);
//! 		def.action("increment", |counter, _args, _ctx| {
//! 			counter.count += counter.step.max(1);
//! 			Ok(())
//! 		});
//! 	}
//! }
//! ```

mod definition;
mod erased;
mod instance;
mod registry;

pub use definition::{ActionReturn, Args, Definition, Params};
pub use instance::{ChildSlot, Instance};
pub use registry::{ComponentInfo, ComponentRegistry};

pub(crate) use erased::ErasedComponent;

/// A server-side live component.
pub trait Component: Default + Send + Sync + 'static {
	/// Declares the component's public surface.
	fn define(def: &mut Definition<Self>);
}

/// Method names owned by the framework. They are never callable from the
/// client unless the component itself declares an action of that name.
pub const FRAMEWORK_METHODS: &[&str] = &[
	"add_error",
	"boot",
	"call_method",
	"dehydrate",
	"dispatch",
	"dispatch_self",
	"dispatch_to",
	"dispatch_up",
	"emit",
	"fill",
	"get_errors",
	"get_id",
	"get_name",
	"hydrate",
	"id",
	"mount",
	"name",
	"redirect",
	"redirect_route",
	"render",
	"rendered",
	"rendering",
	"reset",
	"reset_errors",
	"reset_validation",
	"skip_render",
	"sync_input",
	"updated",
	"updating",
	"validate",
	"validate_only",
];

/// How a method name resolves against a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodAccess {
	/// Declared action.
	Public,
	/// Framework-owned or hook name.
	Internal,
	/// Unknown.
	Missing,
}

/// Batch and request lifecycle hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
	/// Every request, after the instance is created or hydrated.
	Boot,
	/// After hydration from a snapshot.
	Hydrate,
	/// Before the action batch.
	Updating,
	/// After the action batch.
	Updated,
	/// Before rendering.
	Rendering,
	/// Before dehydration.
	Dehydrate,
}

impl Lifecycle {
	/// Hook name used in diagnostics.
	pub fn as_str(&self) -> &'static str {
		match self {
			Lifecycle::Boot => "boot",
			Lifecycle::Hydrate => "hydrate",
			Lifecycle::Updating => "updating",
			Lifecycle::Updated => "updated",
			Lifecycle::Rendering => "rendering",
			Lifecycle::Dehydrate => "dehydrate",
		}
	}
}

pub(crate) fn is_internal_method(name: &str) -> bool {
	FRAMEWORK_METHODS.contains(&name)
		|| name.starts_with("updating_")
		|| name.starts_with("updated_")
		|| name.starts_with('$')
}
