//! Snapshots and the codec converting instances to and from them.
//!
//! A snapshot is the whole persisted identity of a component between
//! requests:
//!
//! ```json
//! {
//!   "fingerprint": {"id": "...", "name": "counter", "locale": "en", "path": "/"},
//!   "memo": {"data": {"count": 1}, "dataMeta": {}, "children": {}, "errors": {}},
//!   "checksum": "hex hmac"
//! }
//! ```

use crate::capabilities::Capabilities;
use crate::component::{ChildSlot, Instance};
use crate::error::{LiveError, LiveResult};
use crate::nesting::NestingCoordinator;
use crate::services::Services;
use crate::synth::{DehydrateContext, HydrateContext, Meta};
use crate::validation::ErrorBag;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity of a component instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
	/// Component id, unique within the page.
	pub id: String,
	/// Registered component name.
	pub name: String,
	/// Locale active when the component was mounted.
	pub locale: String,
	/// Path the component was mounted on.
	pub path: String,
}

/// Serialized state of a component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memo {
	/// Public property values in wire form.
	#[serde(default)]
	pub data: serde_json::Map<String, serde_json::Value>,
	/// Synthesizer metas for non-primitive properties.
	#[serde(default)]
	pub data_meta: BTreeMap<String, Meta>,
	/// Child components by slot.
	#[serde(default)]
	pub children: IndexMap<String, ChildEntry>,
	/// Field errors.
	#[serde(default)]
	pub errors: ErrorBag,
}

/// A child recorded in its parent's memo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildEntry {
	/// Child component id.
	pub id: String,
	/// Child component name.
	pub name: String,
	/// Parent property → child property bindings.
	#[serde(default, skip_serializing_if = "IndexMap::is_empty")]
	pub bindings: IndexMap<String, String>,
	/// The child's own signed snapshot.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub snapshot: Option<Box<Snapshot>>,
}

/// Fingerprint, memo and checksum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
	/// Identity.
	pub fingerprint: Fingerprint,
	/// State.
	pub memo: Memo,
	/// HMAC over fingerprint and memo.
	pub checksum: String,
}

impl Snapshot {
	/// JSON for the `wire:snapshot` attribute.
	pub fn to_attribute_json(&self) -> LiveResult<String> {
		Ok(serde_json::to_string(self)?)
	}

	/// Parses the `wire:snapshot` attribute.
	pub fn from_attribute_json(json: &str) -> LiveResult<Self> {
		Ok(serde_json::from_str(json)?)
	}

	/// Component id.
	pub fn id(&self) -> &str {
		&self.fingerprint.id
	}

	/// Component name.
	pub fn name(&self) -> &str {
		&self.fingerprint.name
	}

	/// Wire value of a property.
	pub fn data(&self, property: &str) -> Option<&serde_json::Value> {
		self.memo.data.get(property)
	}

	/// Child entry in a slot.
	pub fn child(&self, slot: &str) -> Option<&ChildEntry> {
		self.memo.children.get(slot)
	}
}

/// Converts instances to snapshots and back.
pub struct SnapshotCodec<'a> {
	services: &'a Services,
}

impl<'a> SnapshotCodec<'a> {
	/// Creates a codec over the shared services.
	pub fn new(services: &'a Services) -> Self {
		Self { services }
	}

	/// Serializes an instance and its children, then signs the result.
	pub fn dehydrate(&self, instance: &Instance) -> LiveResult<Snapshot> {
		let registry = self.services.synthesizers();
		let mut memo = Memo::default();
		for (property, value) in instance.public_values() {
			let ctx = DehydrateContext {
				registry,
				component: &instance.name,
				property: &property,
			};
			let (wire, meta) = registry.dehydrate_value(&value, &ctx)?;
			if let Some(meta) = meta {
				memo.data_meta.insert(property.clone(), meta);
			}
			memo.data.insert(property, wire);
		}
		memo.errors = instance.errors().clone();

		for (slot, child) in &instance.children {
			let snapshot = match &child.snapshot {
				Some(snapshot) => snapshot.clone(),
				None => self.dehydrate(&child.instance)?,
			};
			NestingCoordinator::embed_child_snapshot(
				&mut memo,
				slot,
				&child.instance,
				&child.bindings,
				snapshot,
			);
		}

		let fingerprint = instance.fingerprint();
		let checksum = self.services.checksum().sign(&fingerprint, &memo)?;
		tracing::debug!(
			component = %instance.name,
			id = %instance.id,
			properties = memo.data.len(),
			children = memo.children.len(),
			"dehydrated component"
		);
		Ok(Snapshot {
			fingerprint,
			memo,
			checksum,
		})
	}

	/// Verifies a snapshot and rebuilds its instance tree.
	///
	/// Bound child properties are overwritten with the parent's outer value
	/// after each child is hydrated, so the parent is authoritative.
	pub fn hydrate(&self, snapshot: &Snapshot) -> LiveResult<Instance> {
		self.services.checksum().verify_snapshot(snapshot)?;
		let fingerprint = &snapshot.fingerprint;
		let mut instance = self.services.components().instantiate(
			&fingerprint.name,
			&fingerprint.id,
			&fingerprint.locale,
			&fingerprint.path,
		)?;
		instance.caps = Capabilities::builder()
			.errors(snapshot.memo.errors.clone())
			.build();

		let registry = self.services.synthesizers();
		let ctx = HydrateContext {
			registry,
			models: self.services.models(),
		};
		for (property, wire) in &snapshot.memo.data {
			if !instance.component.has_property(property) {
				tracing::warn!(
					component = %fingerprint.name,
					property = %property,
					"dropping snapshot data for undeclared property"
				);
				continue;
			}
			let value =
				registry.hydrate_value(wire.clone(), snapshot.memo.data_meta.get(property), &ctx)?;
			instance.component.set_property(property, value)?;
		}

		let coordinator = NestingCoordinator::new(self.services);
		for (slot, entry) in &snapshot.memo.children {
			let Some(child_snapshot) = entry.snapshot.as_deref() else {
				tracing::warn!(
					component = %fingerprint.name,
					slot = %slot,
					"child entry without snapshot"
				);
				return Err(LiveError::CorruptPayload {
					component: fingerprint.name.clone(),
				});
			};
			if child_snapshot.fingerprint.id != entry.id
				|| child_snapshot.fingerprint.name != entry.name
			{
				tracing::warn!(
					component = %fingerprint.name,
					slot = %slot,
					"child snapshot does not match its signed entry"
				);
				return Err(LiveError::CorruptPayload {
					component: fingerprint.name.clone(),
				});
			}
			let mut child = self.hydrate(child_snapshot)?;
			coordinator.apply_bindings(&instance, &mut child, &entry.bindings)?;
			instance
				.children
				.insert(slot.clone(), ChildSlot::new(child, entry.bindings.clone()));
		}

		tracing::debug!(
			component = %fingerprint.name,
			id = %fingerprint.id,
			"hydrated component"
		);
		Ok(instance)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::component::{Component, Definition};
	use crate::live_property;
	use crate::manager::LiveManager;
	use crate::model::{InMemoryModelRepository, Model};
	use crate::render::FnRenderer;
	use crate::value::{Key, Value};
	use chrono::NaiveDate;
	use rstest::{fixture, rstest};
	use serde_json::json;
	use std::sync::Arc;

	#[derive(Default)]
	struct Profile {
		name: String,
		tags: Vec<String>,
		scores: IndexMap<String, i64>,
		born: Option<NaiveDate>,
		user: Option<Model>,
		secret: String,
	}

	impl Component for Profile {
		fn define(def: &mut Definition<Self>) {
			live_property!(def, name);
			live_property!(def, tags);
			live_property!(def, scores);
			live_property!(def, born);
			live_property!(def, user);
		}
	}

	#[fixture]
	fn manager() -> LiveManager {
		LiveManager::builder()
			.secret_key("0123456789abcdef0123456789abcdef")
			.component::<Profile>("profile")
			.renderer(FnRenderer::new(|_, _| Ok("<div></div>".to_string())))
			.build()
			.unwrap()
	}

	fn profile_instance(manager: &LiveManager) -> Instance {
		let mut instance = manager
			.services()
			.components()
			.instantiate("profile", "p1", "en", "/profile")
			.unwrap();
		let profile = instance.component_mut::<Profile>().unwrap();
		profile.name = "Ada".into();
		profile.tags = vec!["math".into(), "engines".into()];
		profile.scores.insert("b".into(), 2);
		profile.scores.insert("a".into(), 1);
		profile.born = NaiveDate::from_ymd_opt(1815, 12, 10);
		profile.user = Some(Model::new("user").with("email", "ada@example.com"));
		profile.secret = "hidden".into();
		instance
	}

	#[rstest]
	fn test_only_public_properties_are_serialized(manager: LiveManager) {
		// Arrange
		let instance = profile_instance(&manager);

		// Act
		let snapshot = SnapshotCodec::new(manager.services()).dehydrate(&instance).unwrap();

		// Assert
		let keys: Vec<&String> = snapshot.memo.data.keys().collect();
		assert_eq!(keys, vec!["name", "tags", "scores", "born", "user"]);
		assert!(!snapshot.to_attribute_json().unwrap().contains("hidden"));
	}

	#[rstest]
	fn test_dehydrate_is_deterministic(manager: LiveManager) {
		// Arrange
		let instance = profile_instance(&manager);
		let codec = SnapshotCodec::new(manager.services());

		// Act
		let first = codec.dehydrate(&instance).unwrap();
		let second = codec.dehydrate(&instance).unwrap();

		// Assert
		assert_eq!(
			serde_json::to_string(&first.memo).unwrap(),
			serde_json::to_string(&second.memo).unwrap()
		);
		assert_eq!(first.checksum, second.checksum);
	}

	#[rstest]
	fn test_round_trip_restores_state(manager: LiveManager) {
		// Arrange
		let instance = profile_instance(&manager);
		let codec = SnapshotCodec::new(manager.services());
		let snapshot = codec.dehydrate(&instance).unwrap();
		let text = snapshot.to_attribute_json().unwrap();

		// Act
		let restored = codec
			.hydrate(&Snapshot::from_attribute_json(&text).unwrap())
			.unwrap();

		// Assert
		let profile = restored.component::<Profile>().unwrap();
		assert_eq!(profile.name, "Ada");
		assert_eq!(profile.tags, vec!["math", "engines"]);
		assert_eq!(profile.scores.get("a"), Some(&1));
		assert_eq!(profile.born, NaiveDate::from_ymd_opt(1815, 12, 10));
		assert_eq!(
			profile.user.as_ref().and_then(|user| user.get("email")),
			Some(&Value::String("ada@example.com".into()))
		);
		assert_eq!(profile.secret, "");
		assert_eq!(restored.locale(), "en");
		assert_eq!(restored.path(), "/profile");
	}

	#[rstest]
	fn test_errors_survive_round_trip(manager: LiveManager) {
		// Arrange
		let mut instance = profile_instance(&manager);
		instance
			.caps
			.validation
			.errors_mut()
			.add("name", "too short");
		let codec = SnapshotCodec::new(manager.services());

		// Act
		let restored = codec.hydrate(&codec.dehydrate(&instance).unwrap()).unwrap();

		// Assert
		assert_eq!(restored.errors().first("name"), Some("too short"));
	}

	#[rstest]
	#[case::data(|snapshot: &mut Snapshot| { snapshot.memo.data.insert("name".into(), json!("Eve")); })]
	#[case::id(|snapshot: &mut Snapshot| snapshot.fingerprint.id.push('x'))]
	#[case::name(|snapshot: &mut Snapshot| snapshot.fingerprint.name = "admin".into())]
	#[case::meta(|snapshot: &mut Snapshot| { snapshot.memo.data_meta.remove("born"); })]
	fn test_tampering_is_rejected(manager: LiveManager, #[case] tamper: fn(&mut Snapshot)) {
		// Arrange
		let codec = SnapshotCodec::new(manager.services());
		let mut snapshot = codec.dehydrate(&profile_instance(&manager)).unwrap();

		// Act
		tamper(&mut snapshot);
		let result = codec.hydrate(&snapshot);

		// Assert
		assert!(matches!(result, Err(LiveError::CorruptPayload { .. })));
	}

	#[rstest]
	fn test_unknown_meta_tag_is_unsupported_type(manager: LiveManager) {
		// Arrange
		let codec = SnapshotCodec::new(manager.services());
		let mut snapshot = codec.dehydrate(&profile_instance(&manager)).unwrap();
		snapshot
			.memo
			.data_meta
			.insert("name".into(), Meta::new("geo"));
		snapshot.checksum = manager
			.services()
			.checksum()
			.sign(&snapshot.fingerprint, &snapshot.memo)
			.unwrap();

		// Act
		let result = codec.hydrate(&snapshot);

		// Assert
		assert!(matches!(result, Err(LiveError::UnsupportedType(tag)) if tag == "geo"));
	}

	#[rstest]
	fn test_absent_model_is_null(manager: LiveManager) {
		// Arrange
		let mut instance = profile_instance(&manager);
		instance.component_mut::<Profile>().unwrap().user = None;
		let codec = SnapshotCodec::new(manager.services());

		// Act
		let snapshot = codec.dehydrate(&instance).unwrap();

		// Assert
		assert_eq!(snapshot.data("user"), Some(&json!(null)));
		assert!(!snapshot.memo.data_meta.contains_key("user"));
	}

	#[rstest]
	fn test_deleted_model_fails_hydration() {
		// Arrange
		let repository = Arc::new(InMemoryModelRepository::new());
		let user = Model::persisted("user", 1_i64, IndexMap::new()).with("email", "ada@example.com");
		repository.insert(user.clone());
		let manager = LiveManager::builder()
			.secret_key("0123456789abcdef0123456789abcdef")
			.component::<Profile>("profile")
			.models(repository.clone())
			.renderer(FnRenderer::new(|_, _| Ok("<div></div>".to_string())))
			.build()
			.unwrap();
		let mut instance = profile_instance(&manager);
		instance.component_mut::<Profile>().unwrap().user = Some(user);
		let codec = SnapshotCodec::new(manager.services());
		let snapshot = codec.dehydrate(&instance).unwrap();
		repository.remove("user", &Key::Int(1));

		// Act
		let result = codec.hydrate(&snapshot);

		// Assert
		assert!(matches!(
			result,
			Err(LiveError::ModelNotFound { ref class, .. }) if class == "user"
		));
	}
}
