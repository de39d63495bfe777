//! Snapshot integrity guard.
//!
//! A snapshot's checksum is an HMAC-SHA256 over the canonical bytes of its
//! fingerprint and memo, hex encoded. Canonical bytes are the JSON of the
//! fingerprint with sorted keys followed by the JSON of the memo with sorted
//! top-level keys. Child entries are reduced to `{id, name, bindings}`;
//! embedded child snapshots carry their own checksums and are verified when
//! they are hydrated.

use crate::error::{LiveError, LiveResult};
use crate::keys::SigningKeyProvider;
use crate::snapshot::{Fingerprint, Memo, Snapshot};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies snapshots.
#[derive(Clone)]
pub struct ChecksumManager {
	keys: Arc<dyn SigningKeyProvider>,
}

impl std::fmt::Debug for ChecksumManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ChecksumManager")
			.field("keys", &self.keys.name())
			.finish()
	}
}

impl ChecksumManager {
	/// Creates a manager over a key provider.
	pub fn new(keys: Arc<dyn SigningKeyProvider>) -> Self {
		Self { keys }
	}

	/// Computes the checksum of a fingerprint and memo.
	pub fn sign(&self, fingerprint: &Fingerprint, memo: &Memo) -> LiveResult<String> {
		let key = self.keys.signing_key()?;
		let mut mac = HmacSha256::new_from_slice(key.expose_secret())
			.map_err(|e| LiveError::MissingSigningKey(e.to_string()))?;
		mac.update(&canonical_bytes(fingerprint, memo)?);
		Ok(hex::encode(mac.finalize().into_bytes()))
	}

	/// Checks a checksum in constant time.
	pub fn verify(&self, checksum: &str, fingerprint: &Fingerprint, memo: &Memo) -> LiveResult<bool> {
		let expected = self.sign(fingerprint, memo)?;
		Ok(expected.as_bytes().ct_eq(checksum.as_bytes()).into())
	}

	/// Verifies a snapshot, failing with [`LiveError::CorruptPayload`].
	pub fn verify_snapshot(&self, snapshot: &Snapshot) -> LiveResult<()> {
		if self.verify(&snapshot.checksum, &snapshot.fingerprint, &snapshot.memo)? {
			Ok(())
		} else {
			tracing::warn!(
				component = %snapshot.fingerprint.name,
				id = %snapshot.fingerprint.id,
				"snapshot checksum mismatch"
			);
			Err(LiveError::CorruptPayload {
				component: snapshot.fingerprint.name.clone(),
			})
		}
	}
}

/// Canonical byte representation that the checksum covers.
pub fn canonical_bytes(fingerprint: &Fingerprint, memo: &Memo) -> LiveResult<Vec<u8>> {
	let fingerprint: BTreeMap<String, serde_json::Value> =
		match serde_json::to_value(fingerprint)? {
			serde_json::Value::Object(object) => object.into_iter().collect(),
			_ => BTreeMap::new(),
		};

	let children: serde_json::Map<String, serde_json::Value> = memo
		.children
		.iter()
		.map(|(slot, entry)| {
			(
				slot.clone(),
				serde_json::json!({
					"bindings": entry.bindings,
					"id": entry.id,
					"name": entry.name,
				}),
			)
		})
		.collect();
	let mut memo_fields: BTreeMap<&str, serde_json::Value> = BTreeMap::new();
	memo_fields.insert("children", serde_json::Value::Object(children));
	memo_fields.insert("data", serde_json::Value::Object(memo.data.clone()));
	memo_fields.insert("dataMeta", serde_json::to_value(&memo.data_meta)?);
	memo_fields.insert("errors", serde_json::to_value(&memo.errors)?);

	let mut bytes = serde_json::to_vec(&fingerprint)?;
	bytes.extend(serde_json::to_vec(&memo_fields)?);
	Ok(bytes)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::keys::StaticKeyProvider;
	use crate::snapshot::ChildEntry;
	use proptest::prelude::*;
	use rstest::{fixture, rstest};
	use serde_json::json;

	fn signing_manager() -> ChecksumManager {
		ChecksumManager::new(Arc::new(StaticKeyProvider::new(
			b"0123456789abcdef0123456789abcdef".to_vec(),
		)))
	}

	#[fixture]
	fn manager() -> ChecksumManager {
		signing_manager()
	}

	fn fingerprint() -> Fingerprint {
		Fingerprint {
			id: "abc123".into(),
			name: "counter".into(),
			locale: "en".into(),
			path: "/".into(),
		}
	}

	fn memo() -> Memo {
		let mut memo = Memo::default();
		memo.data.insert("count".into(), json!(1));
		memo.data.insert("label".into(), json!("clicks"));
		memo
	}

	#[rstest]
	fn test_sign_is_deterministic(manager: ChecksumManager) {
		// Act
		let first = manager.sign(&fingerprint(), &memo()).unwrap();
		let second = manager.sign(&fingerprint(), &memo()).unwrap();

		// Assert
		assert_eq!(first, second);
		assert_eq!(first.len(), 64);
	}

	#[rstest]
	fn test_verify_accepts_valid_checksum(manager: ChecksumManager) {
		// Arrange
		let checksum = manager.sign(&fingerprint(), &memo()).unwrap();

		// Act & Assert
		assert!(manager.verify(&checksum, &fingerprint(), &memo()).unwrap());
	}

	#[rstest]
	fn test_different_key_fails(manager: ChecksumManager) {
		// Arrange
		let other = ChecksumManager::new(Arc::new(StaticKeyProvider::new(
			b"fedcba9876543210fedcba9876543210".to_vec(),
		)));
		let checksum = other.sign(&fingerprint(), &memo()).unwrap();

		// Act & Assert
		assert!(!manager.verify(&checksum, &fingerprint(), &memo()).unwrap());
	}

	#[rstest]
	fn test_embedded_child_snapshot_is_excluded(manager: ChecksumManager) {
		// Arrange
		let mut with_child = memo();
		with_child.children.insert(
			"row-1".into(),
			ChildEntry {
				id: "abc123-1".into(),
				name: "row".into(),
				bindings: Default::default(),
				snapshot: None,
			},
		);
		let checksum = manager.sign(&fingerprint(), &with_child).unwrap();
		let mut refreshed = with_child.clone();
		refreshed.children["row-1"].snapshot = Some(Box::new(Snapshot {
			fingerprint: fingerprint(),
			memo: Memo::default(),
			checksum: "child".into(),
		}));

		// Act & Assert
		assert!(manager.verify(&checksum, &fingerprint(), &refreshed).unwrap());
	}

	#[rstest]
	fn test_child_identity_is_covered(manager: ChecksumManager) {
		// Arrange
		let mut with_child = memo();
		with_child.children.insert(
			"row-1".into(),
			ChildEntry {
				id: "abc123-1".into(),
				name: "row".into(),
				bindings: Default::default(),
				snapshot: None,
			},
		);
		let checksum = manager.sign(&fingerprint(), &with_child).unwrap();
		let mut tampered = with_child.clone();
		tampered.children["row-1"].name = "admin-row".into();

		// Act & Assert
		assert!(!manager.verify(&checksum, &fingerprint(), &tampered).unwrap());
	}

	#[rstest]
	fn test_verify_snapshot_reports_corrupt_payload(manager: ChecksumManager) {
		// Arrange
		let snapshot = Snapshot {
			fingerprint: fingerprint(),
			memo: memo(),
			checksum: "0".repeat(64),
		};

		// Act
		let result = manager.verify_snapshot(&snapshot);

		// Assert
		assert!(matches!(result, Err(LiveError::CorruptPayload { component }) if component == "counter"));
	}

	fn mutate(text: &str, index: usize, replacement: char) -> String {
		let mut chars: Vec<char> = text.chars().collect();
		let index = index % chars.len();
		if chars[index] == replacement {
			chars[index] = if replacement == 'x' { 'y' } else { 'x' };
		} else {
			chars[index] = replacement;
		}
		chars.into_iter().collect()
	}

	proptest! {
		#[test]
		fn test_tampered_data_is_detected(index in 0usize..64, replacement in "[a-z0-9]") {
			let manager = signing_manager();
			let checksum = manager.sign(&fingerprint(), &memo()).unwrap();
			let mut tampered = memo();
			let label = mutate("clicks", index, replacement.chars().next().unwrap());
			tampered.data.insert("label".into(), json!(label));
			prop_assert!(!manager.verify(&checksum, &fingerprint(), &tampered).unwrap());
		}

		#[test]
		fn test_tampered_count_is_detected(count in any::<i64>().prop_filter("changed", |c| *c != 1)) {
			let manager = signing_manager();
			let checksum = manager.sign(&fingerprint(), &memo()).unwrap();
			let mut tampered = memo();
			tampered.data.insert("count".into(), json!(count));
			prop_assert!(!manager.verify(&checksum, &fingerprint(), &tampered).unwrap());
		}

		#[test]
		fn test_tampered_fingerprint_is_detected(
			index in 0usize..64,
			replacement in "[a-z0-9]",
			field in 0usize..2,
		) {
			let manager = signing_manager();
			let checksum = manager.sign(&fingerprint(), &memo()).unwrap();
			let mut tampered = fingerprint();
			let replacement = replacement.chars().next().unwrap();
			if field == 0 {
				tampered.id = mutate(&tampered.id, index, replacement);
			} else {
				tampered.name = mutate(&tampered.name, index, replacement);
			}
			prop_assert!(!manager.verify(&checksum, &tampered, &memo()).unwrap());
		}
	}
}
