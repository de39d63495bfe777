//! Markup diffing module.
//!
//! Parses component markup into trees, diffs them into patches and applies
//! the patches to a [`Document`] whose node ids survive the morph.

pub use reinhardt_live_morph::*;
