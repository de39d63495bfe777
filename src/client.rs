//! Client runtime module.
//!
//! Discovers component roots in a page, exposes [`Wire`](prelude::Wire)
//! proxies, batches actions per component and morphs responses into the
//! page.

pub use reinhardt_live_client::*;
