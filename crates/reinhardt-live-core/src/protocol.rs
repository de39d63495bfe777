//! Request and response payloads.

use crate::actions::Action;
use crate::capabilities::DispatchedEvent;
use crate::error::ErrorEffect;
use crate::snapshot::Snapshot;
use crate::url::UrlBinding;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Client → server: a snapshot and the actions to apply to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
	/// Last snapshot the client received.
	pub snapshot: Snapshot,
	/// Actions in the order they were issued.
	#[serde(default)]
	pub actions: Vec<Action>,
}

impl RequestPayload {
	/// Creates a payload.
	pub fn new(snapshot: Snapshot, actions: Vec<Action>) -> Self {
		Self { snapshot, actions }
	}
}

/// Server → client: the new snapshot and its effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePayload {
	/// Signed snapshot after the request.
	pub snapshot: Snapshot,
	/// Side effects for the client to apply.
	pub effects: Effects,
}

/// Side effects of a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Effects {
	/// New markup; absent when rendering was skipped.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub html: Option<String>,
	/// Where to navigate.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub redirect_to: Option<String>,
	/// Events for the client to route to other components.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub dispatched_events: Vec<DispatchedEvent>,
	/// Events the component listens for.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub listeners: Vec<String>,
	/// Method return values, in call order.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub returns: Vec<serde_json::Value>,
	/// Properties whose wire value changed or that the client wrote.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub dirty: Vec<String>,
	/// Properties the client mirrors in the query string.
	#[serde(default, skip_serializing_if = "IndexMap::is_empty")]
	pub url: IndexMap<String, UrlBinding>,
}

/// Body of a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// What went wrong.
	pub error: ErrorEffect,
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_empty_effects_serialize_to_empty_object() {
		// Act
		let json = serde_json::to_value(Effects::default()).unwrap();

		// Assert
		assert_eq!(json, json!({}));
	}

	#[rstest]
	fn test_effects_use_camel_case() {
		// Arrange
		let effects = Effects {
			redirect_to: Some("/done".into()),
			dispatched_events: vec![DispatchedEvent::new("saved", vec![])],
			..Effects::default()
		};

		// Act
		let json = serde_json::to_value(&effects).unwrap();

		// Assert
		assert_eq!(json["redirectTo"], json!("/done"));
		assert!(json.get("url").is_none());
		assert_eq!(json["dispatchedEvents"][0]["name"], json!("saved"));
	}

	#[rstest]
	fn test_request_actions_default_to_empty() {
		// Arrange
		let json = json!({
			"snapshot": {
				"fingerprint": {"id": "a", "name": "counter", "locale": "en", "path": "/"},
				"memo": {},
				"checksum": "x"
			}
		});

		// Act
		let payload: RequestPayload = serde_json::from_value(json).unwrap();

		// Assert
		assert!(payload.actions.is_empty());
		assert!(payload.snapshot.memo.data.is_empty());
	}
}
