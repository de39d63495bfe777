//! Parent/child component trees.
//!
//! Children are mounted from inside a parent's render through
//! [`RenderContext::child`]. A child's id is derived from its parent's id and
//! its slot key, so re-rendering the parent keeps the same id and the client
//! can reuse the existing child. A child not mounted again during a parent
//! render is unmounted.

use crate::component::{ChildSlot, Instance, Params};
use crate::error::{LiveError, LiveResult};
use crate::manager::mount_instance;
use crate::render::{RenderContext, finalize, render_instance};
use crate::services::Services;
use crate::snapshot::{ChildEntry, Memo, Snapshot};
use crate::value::Value;
use indexmap::IndexMap;
use sha2::{Digest, Sha256};

/// Mounts children and carries their snapshots and bindings.
pub struct NestingCoordinator<'a> {
	services: &'a Services,
}

impl<'a> NestingCoordinator<'a> {
	/// Creates a coordinator over the shared services.
	pub fn new(services: &'a Services) -> Self {
		Self { services }
	}

	/// Deterministic child id for a slot holding component `name`. Swapping
	/// the component in a slot yields a new id.
	pub fn child_id(parent_id: &str, slot: &str, name: &str) -> String {
		let mut hasher = Sha256::new();
		hasher.update(slot.as_bytes());
		hasher.update([0u8]);
		hasher.update(name.as_bytes());
		let digest = hex::encode(hasher.finalize());
		format!("{}-{}", parent_id, &digest[..8])
	}

	/// Mounts `name` in `slot`, or reuses the child already there, and
	/// renders it.
	///
	/// A reused child keeps its state; `params` only apply to a fresh mount.
	/// With a binding, the parent's `outer` value is pushed into the child's
	/// modelable property before rendering.
	pub fn mount_child(
		&self,
		ctx: &mut RenderContext<'_>,
		name: &str,
		params: Params,
		slot: &str,
		binding: Option<&str>,
	) -> LiveResult<String> {
		if ctx.children.contains_key(slot) {
			return Err(LiveError::InvalidDefinition {
				component: ctx.name.to_string(),
				message: format!("child slot {:?} mounted twice in one render", slot),
			});
		}

		let reused = ctx
			.previous
			.shift_remove(slot)
			.filter(|existing| existing.instance.name == name);
		let mut child = match reused {
			Some(mut existing) => {
				tracing::debug!(
					component = %ctx.name,
					slot = %slot,
					child = %existing.instance.id,
					"reusing child"
				);
				existing.bindings.clear();
				existing.snapshot = None;
				existing
			}
			None => {
				let id = Self::child_id(ctx.id, slot, name);
				let mut instance =
					self.services
						.components()
						.instantiate(name, id, ctx.locale, ctx.path)?;
				mount_instance(&mut instance, &params, self.services, ctx.store)?;
				tracing::debug!(
					component = %ctx.name,
					slot = %slot,
					child = %instance.id,
					"mounted child"
				);
				ChildSlot::new(instance, IndexMap::new())
			}
		};

		if let Some(outer) = binding {
			let inner = child
				.instance
				.component
				.modelable()
				.ok_or_else(|| LiveError::InvalidDefinition {
					component: name.to_string(),
					message: "bound child has no modelable property".into(),
				})?
				.to_string();
			let value = lookup(outer, |property| ctx.state.get(property).cloned())?;
			child.instance.set(&inner, value)?;
			child.bindings.insert(outer.to_string(), inner);
		}

		child.instance.skip_render = false;
		let html = render_instance(&mut child.instance, self.services, ctx.store)?;
		let (snapshot, html) = finalize(&mut child.instance, html, self.services, ctx.store)?;
		child.snapshot = Some(snapshot);
		ctx.children.insert(slot.to_string(), child);
		html.ok_or_else(|| LiveError::Render(format!("child {:?} produced no markup", slot)))
	}

	/// Records a child's signed snapshot in its parent's memo.
	pub fn embed_child_snapshot(
		memo: &mut Memo,
		slot: &str,
		child: &Instance,
		bindings: &IndexMap<String, String>,
		snapshot: Snapshot,
	) {
		memo.children.insert(
			slot.to_string(),
			ChildEntry {
				id: child.id.clone(),
				name: child.name.clone(),
				bindings: bindings.clone(),
				snapshot: Some(Box::new(snapshot)),
			},
		);
	}

	/// Pushes each bound parent value into the child.
	pub fn apply_bindings(
		&self,
		parent: &Instance,
		child: &mut Instance,
		bindings: &IndexMap<String, String>,
	) -> LiveResult<()> {
		for (outer, inner) in bindings {
			let value = lookup(outer, |property| parent.get(property).ok())?;
			child.set(inner, value)?;
		}
		Ok(())
	}
}

/// Resolves a possibly dotted parent property path.
fn lookup(path: &str, get: impl Fn(&str) -> Option<Value>) -> LiveResult<Value> {
	let missing = || LiveError::InvalidPath(path.to_string());
	match path.split_once('.') {
		Some((property, rest)) => {
			let value = get(property).ok_or_else(missing)?;
			Ok(value.get_path(rest).cloned().unwrap_or_default())
		}
		None => get(path).ok_or_else(missing),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_child_id_is_deterministic() {
		// Act
		let first = NestingCoordinator::child_id("parent", "row-1", "item");
		let second = NestingCoordinator::child_id("parent", "row-1", "item");
		let other = NestingCoordinator::child_id("parent", "row-2", "item");
		let swapped = NestingCoordinator::child_id("parent", "row-1", "banner");

		// Assert
		assert_eq!(first, second);
		assert_ne!(first, other);
		assert_ne!(first, swapped);
		assert!(first.starts_with("parent-"));
		assert_eq!(first.len(), "parent-".len() + 8);
	}

	#[rstest]
	fn test_lookup_nested_path() {
		// Arrange
		let mut form = Value::empty_map();
		form.set_path("title", Value::String("Hi".into())).unwrap();

		// Act
		let value = lookup("form.title", |property| (property == "form").then(|| form.clone()));

		// Assert
		assert_eq!(value.unwrap(), Value::String("Hi".into()));
	}

	#[rstest]
	fn test_lookup_missing_property() {
		// Act
		let result = lookup("missing", |_| None);

		// Assert
		assert!(matches!(result, Err(LiveError::InvalidPath(_))));
	}
}
