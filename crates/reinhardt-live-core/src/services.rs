//! Collaborators shared by every request.

use crate::checksum::ChecksumManager;
use crate::component::ComponentRegistry;
use crate::model::ModelRepository;
use crate::render::TemplateRenderer;
use crate::settings::LiveSettings;
use crate::synth::SynthesizerRegistry;
use crate::validation::Validator;
use std::sync::Arc;

/// Read-only services threaded through the pipeline.
#[derive(Clone)]
pub struct Services {
	pub(crate) components: Arc<ComponentRegistry>,
	pub(crate) synthesizers: Arc<SynthesizerRegistry>,
	pub(crate) renderer: Arc<dyn TemplateRenderer>,
	pub(crate) validator: Arc<dyn Validator>,
	pub(crate) models: Arc<dyn ModelRepository>,
	pub(crate) checksum: ChecksumManager,
	pub(crate) settings: Arc<LiveSettings>,
}

impl std::fmt::Debug for Services {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Services")
			.field("components", &self.components)
			.field("synthesizers", &self.synthesizers)
			.field("checksum", &self.checksum)
			.field("settings", &self.settings)
			.finish_non_exhaustive()
	}
}

impl Services {
	/// Registered components.
	pub fn components(&self) -> &ComponentRegistry {
		&self.components
	}

	/// Synthesizer registry.
	pub fn synthesizers(&self) -> &SynthesizerRegistry {
		&self.synthesizers
	}

	/// Template renderer.
	pub fn renderer(&self) -> &dyn TemplateRenderer {
		self.renderer.as_ref()
	}

	/// Application validator.
	pub fn validator(&self) -> &Arc<dyn Validator> {
		&self.validator
	}

	/// Model repository.
	pub fn models(&self) -> &dyn ModelRepository {
		self.models.as_ref()
	}

	/// Snapshot signer.
	pub fn checksum(&self) -> &ChecksumManager {
		&self.checksum
	}

	/// Settings.
	pub fn settings(&self) -> &LiveSettings {
		&self.settings
	}
}
