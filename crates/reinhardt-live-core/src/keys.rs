//! Signing key providers.

use crate::error::{LiveError, LiveResult};
use crate::settings::LiveSettings;
use secrecy::{ExposeSecret, SecretSlice};
use std::env;

/// Supplies the secret used to sign snapshots.
pub trait SigningKeyProvider: Send + Sync {
	/// Returns the signing key bytes.
	fn signing_key(&self) -> LiveResult<SecretSlice<u8>>;

	/// Provider name, for logs.
	fn name(&self) -> &str {
		"custom"
	}
}

/// Provider holding a fixed key in memory.
pub struct StaticKeyProvider {
	key: SecretSlice<u8>,
}

impl StaticKeyProvider {
	/// Wraps raw key bytes.
	pub fn new(key: impl Into<Vec<u8>>) -> Self {
		Self {
			key: SecretSlice::from(key.into()),
		}
	}

	/// Uses the key configured in settings.
	pub fn from_settings(settings: &LiveSettings) -> Self {
		Self::new(settings.secret_key().expose_secret().as_bytes().to_vec())
	}
}

impl std::fmt::Debug for StaticKeyProvider {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StaticKeyProvider")
			.field("key", &"[REDACTED]")
			.finish()
	}
}

impl SigningKeyProvider for StaticKeyProvider {
	fn signing_key(&self) -> LiveResult<SecretSlice<u8>> {
		if self.key.expose_secret().is_empty() {
			return Err(LiveError::MissingSigningKey("static key is empty".into()));
		}
		Ok(SecretSlice::from(self.key.expose_secret().to_vec()))
	}

	fn name(&self) -> &str {
		"static"
	}
}

/// Provider reading the key from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvKeyProvider {
	variable: String,
}

impl EnvKeyProvider {
	/// Reads from the given variable.
	pub fn new(variable: impl Into<String>) -> Self {
		Self {
			variable: variable.into(),
		}
	}
}

impl Default for EnvKeyProvider {
	fn default() -> Self {
		Self::new("REINHARDT_LIVE_SECRET_KEY")
	}
}

impl SigningKeyProvider for EnvKeyProvider {
	fn signing_key(&self) -> LiveResult<SecretSlice<u8>> {
		match env::var(&self.variable) {
			Ok(value) if !value.is_empty() => Ok(SecretSlice::from(value.into_bytes())),
			_ => Err(LiveError::MissingSigningKey(format!(
				"environment variable {} is not set",
				self.variable
			))),
		}
	}

	fn name(&self) -> &str {
		"env"
	}
}
