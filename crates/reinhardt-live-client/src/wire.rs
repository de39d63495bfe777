//! Reactive proxies.

use crate::error::ClientResult;
use crate::runtime::Runtime;
use reinhardt_live_core::actions::Action;
use reinhardt_live_core::snapshot::Snapshot;

/// Proxy over one component's public state.
///
/// Reads see local writes that have not been confirmed yet. Writes are
/// deferred: they join the next batch of the component, which goes out on
/// [`Wire::commit`] or with the next call.
#[derive(Debug, Clone)]
pub struct Wire<'r> {
	runtime: &'r Runtime,
	id: String,
}

impl<'r> Wire<'r> {
	pub(crate) fn new(runtime: &'r Runtime, id: String) -> Self {
		Self { runtime, id }
	}

	/// Component id.
	pub fn id(&self) -> &str {
		&self.id
	}

	/// Component name.
	pub fn name(&self) -> Option<String> {
		self.snapshot().map(|snapshot| snapshot.name().to_string())
	}

	/// Last confirmed snapshot.
	pub fn snapshot(&self) -> Option<Snapshot> {
		self.runtime.snapshot(&self.id)
	}

	/// Reads a property path.
	pub fn get(&self, path: &str) -> Option<serde_json::Value> {
		self.runtime.read(&self.id, path)
	}

	/// Writes a property path; bound parent properties follow.
	pub fn set(&self, path: &str, value: impl Into<serde_json::Value>) -> ClientResult<()> {
		self.runtime.write(&self.id, path, value.into())
	}

	/// Calls an action and commits.
	pub async fn call(&self, method: &str, params: Vec<serde_json::Value>) -> ClientResult<()> {
		self.runtime.enqueue(&self.id, Action::call(method, params))?;
		self.commit().await
	}

	/// Re-renders without changing state.
	pub async fn refresh(&self) -> ClientResult<()> {
		self.call("$refresh", Vec::new()).await
	}

	/// Flips a boolean property on the server.
	pub async fn toggle(&self, path: &str) -> ClientResult<()> {
		self.call("$toggle", vec![serde_json::Value::String(path.to_string())])
			.await
	}

	/// Broadcasts an event to listening components.
	pub async fn dispatch(&self, event: &str, params: Vec<serde_json::Value>) -> ClientResult<()> {
		self.runtime.dispatch(event, params).await
	}

	/// Sends pending writes and calls.
	pub async fn commit(&self) -> ClientResult<()> {
		self.runtime.commit(&self.id).await
	}

	/// Proxy over the parent component.
	pub fn parent(&self) -> Option<Wire<'r>> {
		let parent = self.runtime.parent_of(&self.id)?;
		Some(Wire::new(self.runtime, parent))
	}
}
