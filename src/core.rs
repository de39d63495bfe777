//! Server-side pipeline module.
//!
//! Components, synthesizers, the snapshot codec, the integrity guard, the
//! action processor, nesting and the request manager.
//!
//! # Examples
//!
//! ```rust,no_run
//! # #[cfg(feature = "core")]
//! use reinhardt_live::core::manager::LiveManager;
//! # #[cfg(feature = "core")]
//! use reinhardt_live::core::snapshot::Snapshot;
//! ```

pub use reinhardt_live_core::*;
