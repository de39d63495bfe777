//! Live component settings.
//!
//! Settings are layered: defaults, then an optional TOML document with a
//! `[live]` table, then `REINHARDT_LIVE_*` environment variables.
//!
//! ```toml
//! [live]
//! secret_key = "a long random string of at least 32 bytes"
//! default_locale = "en"
//! template_prefix = "live/"
//! asset_url = "/static/live.js"
//! render_on_redirect = false
//! ```

use crate::error::{LiveError, LiveResult};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::env;
use std::path::Path;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "REINHARDT_LIVE_";

/// Minimum accepted signing key length in bytes.
pub const MIN_SECRET_KEY_LEN: usize = 32;

/// Settings for the live component pipeline.
pub struct LiveSettings {
	secret_key: SecretString,
	/// Locale stamped into fingerprints when a mount does not set one.
	pub default_locale: String,
	/// Prefix joined with the component name to form the default template.
	pub template_prefix: String,
	/// Where the client script is served from.
	pub asset_url: String,
	/// Whether to render markup for responses that redirect.
	pub render_on_redirect: bool,
}

impl Default for LiveSettings {
	fn default() -> Self {
		Self {
			secret_key: SecretString::from(String::new()),
			default_locale: "en".to_string(),
			template_prefix: String::new(),
			asset_url: "/live/live.js".to_string(),
			render_on_redirect: false,
		}
	}
}

impl Clone for LiveSettings {
	fn clone(&self) -> Self {
		Self {
			secret_key: SecretString::from(self.secret_key.expose_secret().to_owned()),
			default_locale: self.default_locale.clone(),
			template_prefix: self.template_prefix.clone(),
			asset_url: self.asset_url.clone(),
			render_on_redirect: self.render_on_redirect,
		}
	}
}

impl std::fmt::Debug for LiveSettings {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LiveSettings")
			.field("secret_key", &"[REDACTED]")
			.field("default_locale", &self.default_locale)
			.field("template_prefix", &self.template_prefix)
			.field("asset_url", &self.asset_url)
			.field("render_on_redirect", &self.render_on_redirect)
			.finish()
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
	secret_key: Option<String>,
	default_locale: Option<String>,
	template_prefix: Option<String>,
	asset_url: Option<String>,
	render_on_redirect: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDocument {
	#[serde(default)]
	live: RawSettings,
}

impl LiveSettings {
	/// Starts a builder from defaults.
	pub fn builder() -> LiveSettingsBuilder {
		LiveSettingsBuilder::default()
	}

	/// Signing secret.
	pub fn secret_key(&self) -> &SecretString {
		&self.secret_key
	}

	/// Replaces the signing secret.
	pub fn set_secret_key(&mut self, key: impl Into<String>) {
		self.secret_key = SecretString::from(key.into());
	}

	/// Applies the `[live]` table of a TOML document over the defaults.
	pub fn from_toml_str(document: &str) -> LiveResult<Self> {
		let raw: RawDocument =
			toml::from_str(document).map_err(|e| LiveError::Settings(e.to_string()))?;
		let mut settings = Self::default();
		settings.apply_raw(raw.live);
		Ok(settings)
	}

	/// Reads a TOML document from disk.
	pub fn from_toml_file(path: impl AsRef<Path>) -> LiveResult<Self> {
		let document = std::fs::read_to_string(path)?;
		Self::from_toml_str(&document)
	}

	fn apply_raw(&mut self, raw: RawSettings) {
		if let Some(key) = raw.secret_key {
			self.set_secret_key(key);
		}
		if let Some(locale) = raw.default_locale {
			self.default_locale = locale;
		}
		if let Some(prefix) = raw.template_prefix {
			self.template_prefix = prefix;
		}
		if let Some(url) = raw.asset_url {
			self.asset_url = url;
		}
		if let Some(flag) = raw.render_on_redirect {
			self.render_on_redirect = flag;
		}
	}

	/// Applies `REINHARDT_LIVE_*` environment overrides.
	pub fn apply_env(mut self) -> LiveResult<Self> {
		let var = |name: &str| env::var(format!("{}{}", ENV_PREFIX, name)).ok();
		if let Some(key) = var("SECRET_KEY") {
			self.set_secret_key(key);
		}
		if let Some(locale) = var("DEFAULT_LOCALE") {
			self.default_locale = locale;
		}
		if let Some(prefix) = var("TEMPLATE_PREFIX") {
			self.template_prefix = prefix;
		}
		if let Some(url) = var("ASSET_URL") {
			self.asset_url = url;
		}
		if let Some(flag) = var("RENDER_ON_REDIRECT") {
			self.render_on_redirect = match flag.to_ascii_lowercase().as_str() {
				"1" | "true" | "yes" | "on" => true,
				"0" | "false" | "no" | "off" | "" => false,
				other => {
					return Err(LiveError::Settings(format!(
						"{}RENDER_ON_REDIRECT must be a boolean, got {:?}",
						ENV_PREFIX, other
					)));
				}
			};
		}
		Ok(self)
	}

	/// Checks the settings are usable.
	pub fn validate(&self) -> LiveResult<()> {
		let key_len = self.secret_key.expose_secret().len();
		if key_len < MIN_SECRET_KEY_LEN {
			return Err(LiveError::Settings(format!(
				"secret_key must be at least {} bytes, got {}",
				MIN_SECRET_KEY_LEN, key_len
			)));
		}
		if self.default_locale.trim().is_empty() {
			return Err(LiveError::Settings("default_locale must not be empty".into()));
		}
		Ok(())
	}
}

/// Builder for [`LiveSettings`].
#[derive(Debug, Default)]
pub struct LiveSettingsBuilder {
	settings: LiveSettings,
}

impl LiveSettingsBuilder {
	/// Sets the signing secret.
	pub fn secret_key(mut self, key: impl Into<String>) -> Self {
		self.settings.set_secret_key(key);
		self
	}

	/// Sets the default locale.
	pub fn default_locale(mut self, locale: impl Into<String>) -> Self {
		self.settings.default_locale = locale.into();
		self
	}

	/// Sets the template prefix.
	pub fn template_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.settings.template_prefix = prefix.into();
		self
	}

	/// Sets the client asset URL.
	pub fn asset_url(mut self, url: impl Into<String>) -> Self {
		self.settings.asset_url = url.into();
		self
	}

	/// Renders markup even when redirecting.
	pub fn render_on_redirect(mut self, flag: bool) -> Self {
		self.settings.render_on_redirect = flag;
		self
	}

	/// Validates and returns the settings.
	pub fn build(self) -> LiveResult<LiveSettings> {
		self.settings.validate()?;
		Ok(self.settings)
	}
}
