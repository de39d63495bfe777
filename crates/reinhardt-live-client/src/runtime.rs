//! The client runtime.
//!
//! [`Runtime`] owns the page [`Document`] and the [`ComponentRegistry`]
//! behind one lock that is never held across an `.await`. User gestures
//! become actions in a component's pending queue; [`Runtime::commit`] drains
//! the queue into a batch and sends it.
//!
//! Requests for one component go out one at a time, in commit order: each
//! batch takes a ticket when it is drained and waits until every earlier
//! ticket of that component has been answered. A batch carries the
//! snapshots of the component's descendants too, so it also takes a ticket
//! on each of them. Unrelated components do not wait for each other.
//!
//! The runtime also owns the page [`Location`]: after every applied response
//! the query string is rewritten from the URL-bound properties.

use crate::directive::{Directive, Expression, Target, directives};
use crate::error::{ClientError, ClientResult};
use crate::location::Location;
use crate::registry::{ComponentRegistry, ComponentState, Turns};
use crate::transport::Transport;
use crate::wire::Wire;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use parking_lot::Mutex;
use reinhardt_live_core::actions::Action;
use reinhardt_live_core::capabilities::DispatchedEvent;
use reinhardt_live_core::protocol::{RequestPayload, ResponsePayload};
use reinhardt_live_core::snapshot::Snapshot;
use reinhardt_live_morph::{Document, NodeId};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

const EVENT_CAPACITY: usize = 256;

/// Something observable that happened in the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
	/// A component was registered.
	ComponentMounted {
		/// Component id.
		id: String,
		/// Component name.
		name: String,
	},
	/// A component was removed.
	ComponentDestroyed {
		/// Component id.
		id: String,
	},
	/// A batch went out.
	RequestSent {
		/// Component id.
		id: String,
		/// Number of actions in the batch.
		actions: usize,
	},
	/// A response was applied.
	ResponseApplied {
		/// Component id.
		id: String,
		/// Properties the server reported as changed.
		dirty: Vec<String>,
	},
	/// A request failed; the last confirmed snapshot was kept.
	RequestFailed {
		/// Component id.
		id: String,
		/// Error message.
		message: String,
	},
	/// The server asked for navigation.
	Redirected {
		/// Target URL.
		url: String,
	},
	/// An event was routed to listeners.
	Dispatched {
		/// The event.
		event: DispatchedEvent,
	},
	/// The query string changed.
	UrlChanged {
		/// New path and query string.
		url: String,
		/// Whether a history entry was added.
		push: bool,
	},
}

/// Client runtime for one page.
#[derive(Clone)]
pub struct Runtime {
	inner: Arc<Inner>,
}

struct Inner {
	transport: Arc<dyn Transport>,
	state: Mutex<RuntimeState>,
	events: broadcast::Sender<RuntimeEvent>,
}

struct RuntimeState {
	document: Document,
	registry: ComponentRegistry,
	visible: bool,
	online: bool,
	redirect: Option<String>,
	location: Location,
}

impl std::fmt::Debug for Runtime {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.inner.state.lock();
		f.debug_struct("Runtime")
			.field("components", &state.registry.ids().collect::<Vec<_>>())
			.field("visible", &state.visible)
			.field("online", &state.online)
			.finish_non_exhaustive()
	}
}

/// A drained batch holding its place in the request order of its component
/// and of every descendant whose snapshot it carries.
struct Batch {
	actions: Vec<Action>,
	turns: Vec<Turn>,
}

/// One ticket of a batch.
struct Turn {
	ticket: u64,
	waiting: watch::Receiver<Turns>,
	guard: TurnGuard,
}

/// Marks a ticket finished when dropped, letting the next batch go.
struct TurnGuard {
	turns: Arc<watch::Sender<Turns>>,
	ticket: u64,
}

impl Drop for TurnGuard {
	fn drop(&mut self) {
		let ticket = self.ticket;
		self.turns.send_modify(|turns| turns.finish(ticket));
	}
}

impl Runtime {
	/// Creates a runtime with an empty page.
	pub fn new(transport: impl Transport + 'static) -> Self {
		let (events, _) = broadcast::channel(EVENT_CAPACITY);
		Self {
			inner: Arc::new(Inner {
				transport: Arc::new(transport),
				state: Mutex::new(RuntimeState {
					document: Document::new(),
					registry: ComponentRegistry::new(),
					visible: true,
					online: true,
					redirect: None,
					location: Location::default(),
				}),
				events,
			}),
		}
	}

	/// Loads a page at `/` and registers every component on it. Components
	/// of a previously loaded page are destroyed.
	pub fn load(&self, html: &str) -> ClientResult<Vec<String>> {
		self.load_at("/", html)
	}

	/// Loads a page served at `url`, whose query string seeds the URL-bound
	/// properties.
	pub fn load_at(&self, url: &str, html: &str) -> ClientResult<Vec<String>> {
		let document = Document::parse(html);
		let mut registry = ComponentRegistry::new();
		let ids = registry.discover(&document)?;
		let mut location = Location::parse(url)?;
		for id in &ids {
			location.track(&registry, id);
		}
		let mut events: Vec<RuntimeEvent> = Vec::new();
		{
			let mut state = self.inner.state.lock();
			let previous: Vec<String> = state.registry.ids().map(str::to_string).collect();
			events.extend(
				previous
					.into_iter()
					.map(|id| RuntimeEvent::ComponentDestroyed { id }),
			);
			events.extend(ids.iter().filter_map(|id| {
				registry.get(id).map(|entry| RuntimeEvent::ComponentMounted {
					id: id.clone(),
					name: entry.name().to_string(),
				})
			}));
			state.document = document;
			state.registry = registry;
			state.redirect = None;
			state.location = location;
		}
		tracing::info!(url = %url, components = ids.len(), "page loaded");
		self.emit_all(events);
		Ok(ids)
	}

	/// Subscribes to runtime events.
	pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
		self.inner.events.subscribe()
	}

	/// Registered component ids in discovery order.
	pub fn component_ids(&self) -> Vec<String> {
		self.inner
			.state
			.lock()
			.registry
			.ids()
			.map(str::to_string)
			.collect()
	}

	/// Lifecycle state of a component.
	pub fn state_of(&self, id: &str) -> Option<ComponentState> {
		self.inner.state.lock().registry.state_of(id)
	}

	/// Last confirmed snapshot of a component.
	pub fn snapshot(&self, id: &str) -> Option<Snapshot> {
		self.inner
			.state
			.lock()
			.registry
			.get(id)
			.map(|entry| entry.snapshot().clone())
	}

	/// Parent of a component.
	pub fn parent_of(&self, id: &str) -> Option<String> {
		self.inner
			.state
			.lock()
			.registry
			.get(id)
			.and_then(|entry| entry.parent().map(str::to_string))
	}

	/// Root element of a component.
	pub fn root(&self, id: &str) -> Option<NodeId> {
		self.inner.state.lock().registry.get(id).map(|entry| entry.root())
	}

	/// Current markup of a component.
	pub fn html(&self, id: &str) -> ClientResult<String> {
		let state = self.inner.state.lock();
		let root = state.registry.require(id)?.root();
		Ok(state.document.to_html(root)?)
	}

	/// Reads the document.
	pub fn with_document<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
		f(&self.inner.state.lock().document)
	}

	/// Mutates the document outside of a morph, as a browser would when the
	/// user focuses or scrolls.
	pub fn with_document_mut<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
		f(&mut self.inner.state.lock().document)
	}

	/// Proxy over a component.
	pub fn wire(&self, id: &str) -> ClientResult<Wire<'_>> {
		self.inner.state.lock().registry.require(id)?;
		Ok(Wire::new(self, id.to_string()))
	}

	/// Queues an action for the next commit of `id`.
	pub fn enqueue(&self, id: &str, action: Action) -> ClientResult<()> {
		let mut state = self.inner.state.lock();
		state.registry.require_mut(id)?.pending.push(action);
		Ok(())
	}

	/// Writes a property locally and queues its sync, following model
	/// bindings up to the parent.
	pub(crate) fn write(&self, id: &str, path: &str, value: serde_json::Value) -> ClientResult<()> {
		self.inner.state.lock().write(id, path, value)
	}

	/// Value of a property: a pending local write, else the snapshot.
	pub(crate) fn read(&self, id: &str, path: &str) -> Option<serde_json::Value> {
		let state = self.inner.state.lock();
		let entry = state.registry.get(id)?;
		if let Some(value) = entry.overlay.get(path) {
			return Some(value.clone());
		}
		lookup(&entry.snapshot().memo.data, path).cloned()
	}

	/// Sends the pending actions of `id` as one batch.
	///
	/// The queue is drained when this is called, not when the returned
	/// future is first polled. Resolves once the response is applied and any
	/// events it dispatched have been delivered.
	pub fn commit(&self, id: &str) -> BoxFuture<'static, ClientResult<()>> {
		let runtime = self.clone();
		let id = id.to_string();
		let prepared = self.prepare(&id);
		async move {
			match prepared? {
				Some(batch) => runtime.run_batch(id, batch).await,
				None => Ok(()),
			}
		}
		.boxed()
	}

	/// Commits every component with pending actions.
	pub async fn flush(&self) -> ClientResult<()> {
		let ids: Vec<String> = {
			let state = self.inner.state.lock();
			state
				.registry
				.ids()
				.filter(|id| {
					state
						.registry
						.get(id)
						.is_some_and(|entry| !entry.pending().is_empty())
				})
				.map(str::to_string)
				.collect()
		};
		first_error(join_all(ids.iter().map(|id| self.commit(id))).await)
	}

	/// Broadcasts an event to every listening component.
	pub async fn dispatch(&self, event: &str, params: Vec<serde_json::Value>) -> ClientResult<()> {
		let event = DispatchedEvent::new(event, params);
		let targets = self.inner.state.lock().deliver(&event, "");
		self.emit(RuntimeEvent::Dispatched { event });
		first_error(join_all(targets.iter().map(|id| self.commit(id))).await)
	}

	/// Runs an expression such as `save(1)` or `$set('open', true)` on a
	/// component.
	pub async fn run(&self, id: &str, expression: &str) -> ClientResult<()> {
		let expression = Expression::parse(expression)?;
		self.run_expression(id.to_string(), expression).await
	}

	/// A click on `node`.
	pub async fn click(&self, node: NodeId) -> ClientResult<()> {
		self.trigger(node, "click", None).await
	}

	/// A form submission.
	pub async fn submit(&self, node: NodeId) -> ClientResult<()> {
		self.trigger(node, "submit", None).await
	}

	/// A key press; `key` is a DOM key name such as `Enter` or `ArrowUp`.
	pub async fn keydown(&self, node: NodeId, key: &str) -> ClientResult<()> {
		self.trigger(node, "keydown", Some(key)).await
	}

	/// Typing into an input.
	pub async fn input(&self, node: NodeId, value: &str) -> ClientResult<()> {
		let live = {
			let mut state = self.inner.state.lock();
			state.document.set_value(node, value)?;
			let Some(model) = state.model_directive(node) else {
				return Ok(());
			};
			if model.has_modifier("lazy") || model.has_modifier("blur") {
				return Ok(());
			}
			let owner = state.owner(node)?;
			state.write(&owner, &model.value, serde_json::Value::String(value.to_string()))?;
			model.has_modifier("live").then_some(owner)
		};
		match live {
			Some(owner) => self.commit(&owner).await,
			None => Ok(()),
		}
	}

	/// A change event: syncs `wire:model.lazy` and runs `wire:change`.
	pub async fn change(&self, node: NodeId) -> ClientResult<()> {
		let lazy = {
			let mut state = self.inner.state.lock();
			state.sync_model(node, "lazy")?
		};
		if let Some(owner) = lazy {
			self.commit(&owner).await?;
		}
		self.trigger(node, "change", None).await
	}

	/// Focus leaving `node`: syncs `wire:model.blur`.
	pub async fn blur(&self, node: NodeId) -> ClientResult<()> {
		let synced = {
			let mut state = self.inner.state.lock();
			if state.document.focused() == Some(node) {
				state.document.blur();
			}
			state.sync_model(node, "blur")?
		};
		match synced {
			Some(owner) => self.commit(&owner).await,
			None => Ok(()),
		}
	}

	/// Records page visibility.
	pub fn set_visible(&self, visible: bool) {
		self.inner.state.lock().visible = visible;
	}

	/// Records connectivity.
	pub fn set_online(&self, online: bool) {
		let mut state = self.inner.state.lock();
		if state.online != online {
			tracing::info!(online, "connectivity changed");
		}
		state.online = online;
	}

	/// Whether loading indicators of `id` should show.
	pub fn is_loading(&self, id: &str) -> bool {
		self.inner.state.lock().is_loading(id)
	}

	/// Whether the page is offline.
	pub fn is_offline(&self) -> bool {
		!self.inner.state.lock().online
	}

	/// Whether `node` is displayed given its `wire:loading` and
	/// `wire:offline` directives.
	pub fn is_shown(&self, node: NodeId) -> bool {
		let state = self.inner.state.lock();
		let Some(attrs) = state.document.attrs(node) else {
			return false;
		};
		for directive in directives(attrs) {
			let active = match directive.name.as_str() {
				"offline" => !state.online,
				"loading" => state
					.owner(node)
					.is_ok_and(|owner| state.is_loading(&owner)),
				_ => continue,
			};
			return active != directive.has_modifier("remove");
		}
		true
	}

	/// Removes a component and its descendants from the registry.
	pub fn teardown(&self, id: &str) -> Vec<String> {
		let removed = {
			let mut state = self.inner.state.lock();
			let removed = state.registry.unregister(id);
			state.location.untrack(&removed);
			removed
		};
		self.emit_all(
			removed
				.iter()
				.map(|id| RuntimeEvent::ComponentDestroyed { id: id.clone() })
				.collect(),
		);
		removed
	}

	/// Last redirect the server asked for.
	pub fn redirect(&self) -> Option<String> {
		self.inner.state.lock().redirect.clone()
	}

	/// Current path and query string.
	pub fn url(&self) -> String {
		self.inner.state.lock().location.href().to_string()
	}

	/// Goes back one history entry: URL-bound properties take the values of
	/// the restored query string, or their initial values when it lacks
	/// them, and the affected components are committed. Returns `false` when
	/// there is no entry to go back to.
	pub async fn back(&self) -> ClientResult<bool> {
		let (url, ids) = {
			let mut state = self.inner.state.lock();
			let Some(restored) = state.location.back()? else {
				return Ok(false);
			};
			let mut ids: Vec<String> = Vec::new();
			for (id, property, value) in restored {
				state.write(&id, &property, value)?;
				if !ids.contains(&id) {
					ids.push(id);
				}
			}
			(state.location.href().to_string(), ids)
		};
		tracing::debug!(url = %url, components = ids.len(), "history entry restored");
		self.emit(RuntimeEvent::UrlChanged { url, push: false });
		first_error(join_all(ids.iter().map(|id| self.commit(id))).await)?;
		Ok(true)
	}

	fn prepare(&self, id: &str) -> ClientResult<Option<Batch>> {
		let mut state = self.inner.state.lock();
		let entry = state.registry.require_mut(id)?;
		if entry.pending.is_empty() {
			return Ok(None);
		}
		let actions = std::mem::take(&mut entry.pending);
		let mut ids = vec![id.to_string()];
		ids.extend(state.registry.descendants_of(id));
		let mut turns = Vec::with_capacity(ids.len());
		for id in &ids {
			let Some(entry) = state.registry.get_mut(id) else {
				continue;
			};
			let ticket = entry.next_ticket;
			entry.next_ticket += 1;
			turns.push(Turn {
				ticket,
				waiting: entry.turns.subscribe(),
				guard: TurnGuard {
					turns: Arc::clone(&entry.turns),
					ticket,
				},
			});
		}
		Ok(Some(Batch { actions, turns }))
	}

	async fn run_batch(&self, id: String, batch: Batch) -> ClientResult<()> {
		let Batch { actions, turns } = batch;
		let ticket = turns.first().map(|turn| turn.ticket).unwrap_or_default();
		let mut guards = Vec::with_capacity(turns.len());
		// Tickets are taken under one lock, so every batch sharing a component
		// with this one is either wholly before or wholly after it.
		for Turn {
			ticket,
			mut waiting,
			guard,
		} in turns
		{
			if waiting.wait_for(|turns| turns.served == ticket).await.is_err() {
				return Err(ClientError::Transport(format!(
					"request queue of component [{}] closed",
					id
				)));
			}
			guards.push(guard);
		}

		let snapshot = {
			let mut state = self.inner.state.lock();
			let Some(entry) = state.registry.get_mut(&id) else {
				tracing::debug!(id = %id, "component destroyed before its batch was sent");
				return Ok(());
			};
			entry.state = ComponentState::AwaitingResponse;
			state.registry.assemble(&id)?
		};
		let synced: Vec<(String, serde_json::Value)> = actions
			.iter()
			.filter_map(|action| match action {
				Action::PropertySync { path, value } => Some((path.clone(), value.clone())),
				_ => None,
			})
			.collect();
		tracing::debug!(id = %id, ticket, actions = actions.len(), "sending batch");
		self.emit(RuntimeEvent::RequestSent {
			id: id.clone(),
			actions: actions.len(),
		});

		let result = self
			.inner
			.transport
			.send(RequestPayload::new(snapshot, actions))
			.await;
		let applied = match result {
			Ok(response) => self.inner.state.lock().apply_response(&id, response, &synced),
			Err(error) => Err(error),
		};

		match applied {
			Ok((events, targets)) => {
				self.emit_all(events);
				drop(guards);
				for (target, result) in targets
					.iter()
					.zip(join_all(targets.iter().map(|target| self.commit(target))).await)
				{
					if let Err(error) = result {
						tracing::warn!(id = %target, error = %error, "event delivery failed");
					}
				}
				Ok(())
			}
			Err(error) => {
				{
					let mut state = self.inner.state.lock();
					if let Some(entry) = state.registry.get_mut(&id) {
						entry.state = ComponentState::Idle;
						entry.settle(&synced);
					}
				}
				tracing::warn!(id = %id, error = %error, "request failed");
				self.emit(RuntimeEvent::RequestFailed {
					id,
					message: error.to_string(),
				});
				Err(error)
			}
		}
	}

	async fn trigger(&self, node: NodeId, event: &str, key: Option<&str>) -> ClientResult<()> {
		let found = {
			let state = self.inner.state.lock();
			state.find_directive(node, event, key)?
		};
		match found {
			Some((owner, expression)) => self.run_expression(owner, expression).await,
			None => Ok(()),
		}
	}

	fn run_expression(
		&self,
		owner: String,
		expression: Expression,
	) -> BoxFuture<'static, ClientResult<()>> {
		let runtime = self.clone();
		async move {
			let id = match expression.target {
				Target::Own => owner,
				Target::Parent => runtime
					.parent_of(&owner)
					.ok_or(ClientError::NoParent(owner))?,
			};
			let Expression { method, params, .. } = expression;
			match method.as_str() {
				"$set" => {
					let mut params = params.into_iter();
					let (Some(serde_json::Value::String(path)), Some(value)) =
						(params.next(), params.next())
					else {
						return Err(ClientError::directive(method.as_str(), "expects a path and a value"));
					};
					runtime.write(&id, &path, value)?;
					runtime.commit(&id).await
				}
				"$commit" => runtime.commit(&id).await,
				"$dispatch" => {
					let mut params = params.into_iter();
					let Some(serde_json::Value::String(event)) = params.next() else {
						return Err(ClientError::directive(method.as_str(), "expects an event name"));
					};
					runtime.dispatch(&event, params.collect()).await
				}
				_ => {
					runtime.enqueue(&id, Action::call(method, params))?;
					runtime.commit(&id).await
				}
			}
		}
		.boxed()
	}

	fn emit(&self, event: RuntimeEvent) {
		// No subscribers is fine.
		let _ = self.inner.events.send(event);
	}

	fn emit_all(&self, events: Vec<RuntimeEvent>) {
		for event in events {
			self.emit(event);
		}
	}
}

impl RuntimeState {
	fn write(&mut self, id: &str, path: &str, value: serde_json::Value) -> ClientResult<()> {
		let mut target = Some((id.to_string(), path.to_string()));
		while let Some((id, path)) = target.take() {
			let entry = self.registry.require_mut(&id)?;
			entry.overlay.insert(path.clone(), value.clone());
			entry.pending.push(Action::sync(path.clone(), value.clone()));
			let parent_id = entry.parent.clone();
			target = parent_id.and_then(|parent_id| {
				let parent = self.registry.get(&parent_id)?;
				let slot = parent
					.snapshot()
					.memo
					.children
					.values()
					.find(|child| child.id == id)?;
				let outer = slot
					.bindings
					.iter()
					.find_map(|(outer, inner)| bound_path(outer, inner, &path))?;
				Some((parent_id, outer))
			});
		}
		Ok(())
	}

	fn owner(&self, node: NodeId) -> ClientResult<String> {
		self.registry
			.owner_of(&self.document, node)
			.ok_or_else(|| ClientError::ComponentNotFound(format!("owner of node {}", node)))
	}

	fn model_directive(&self, node: NodeId) -> Option<Directive> {
		directives(self.document.attrs(node)?)
			.into_iter()
			.find(|directive| directive.name == "model")
	}

	/// Writes the current value of a `wire:model.<modifier>` input.
	fn sync_model(&mut self, node: NodeId, modifier: &str) -> ClientResult<Option<String>> {
		let Some(model) = self.model_directive(node) else {
			return Ok(None);
		};
		if !model.has_modifier(modifier) {
			return Ok(None);
		}
		let value = self.document.value(node).unwrap_or_default().to_string();
		let owner = self.owner(node)?;
		self.write(&owner, &model.value, serde_json::Value::String(value))?;
		Ok(Some(owner))
	}

	/// Nearest element from `node` up to its component root carrying a
	/// matching directive.
	fn find_directive(
		&self,
		node: NodeId,
		event: &str,
		key: Option<&str>,
	) -> ClientResult<Option<(String, Expression)>> {
		let Some(owner) = self.registry.owner_of(&self.document, node) else {
			return Ok(None);
		};
		let boundary = self.registry.require(&owner)?.root();
		let mut current = Some(node);
		while let Some(element) = current {
			if let Some(attrs) = self.document.attrs(element) {
				let found = directives(attrs).into_iter().find(|directive| {
					directive.name == event && key.is_none_or(|key| key_matches(directive, key))
				});
				if let Some(directive) = found {
					return Ok(Some((owner, directive.expression()?)));
				}
			}
			if element == boundary {
				break;
			}
			current = self.document.parent(element);
		}
		Ok(None)
	}

	fn is_loading(&self, id: &str) -> bool {
		self.visible && self.registry.state_of(id) == Some(ComponentState::AwaitingResponse)
	}

	/// Listeners an event reaches from `source`.
	fn route(&self, event: &DispatchedEvent, source: &str) -> Vec<String> {
		let candidates: Vec<String> = if event.self_only {
			vec![source.to_string()]
		} else if let Some(name) = &event.to {
			self.registry
				.ids()
				.filter(|id| self.registry.get(id).is_some_and(|entry| entry.name() == name))
				.map(str::to_string)
				.collect()
		} else if event.up {
			self.registry.ancestors_of(source)
		} else {
			self.registry.ids().map(str::to_string).collect()
		};
		candidates
			.into_iter()
			.filter(|id| {
				self.registry
					.get(id)
					.is_some_and(|entry| entry.listens_to(&event.name))
			})
			.collect()
	}

	/// Queues the event on every listener it reaches; returns them.
	fn deliver(&mut self, event: &DispatchedEvent, source: &str) -> Vec<String> {
		let targets = self.route(event, source);
		for target in &targets {
			if let Some(entry) = self.registry.get_mut(target) {
				entry
					.pending
					.push(Action::fire(event.name.clone(), event.params.clone()));
			}
		}
		targets
	}

	fn apply_response(
		&mut self,
		id: &str,
		response: ResponsePayload,
		synced: &[(String, serde_json::Value)],
	) -> ClientResult<(Vec<RuntimeEvent>, Vec<String>)> {
		let ResponsePayload { snapshot, effects } = response;
		let Some(mut root) = self.registry.get(id).map(|entry| entry.root()) else {
			return Ok((Vec::new(), Vec::new()));
		};
		if let Some(html) = &effects.html {
			root = self.document.morph(root, html)?;
		}

		let entry = self.registry.require_mut(id)?;
		entry.root = root;
		entry.snapshot = snapshot;
		entry.listeners = effects.listeners.clone();
		entry.url = effects.url.clone();
		entry.state = ComponentState::Idle;
		entry.settle(synced);
		self.location.track(&self.registry, id);

		let mut events = Vec::new();
		if effects.html.is_some() {
			let (registered, destroyed) = self.registry.reconcile(&self.document, id)?;
			self.location.untrack(&destroyed);
			for registered in &registered {
				self.location.track(&self.registry, registered);
			}
			events.extend(registered.into_iter().filter_map(|id| {
				let name = self.registry.get(&id)?.name().to_string();
				Some(RuntimeEvent::ComponentMounted { id, name })
			}));
			events.extend(
				destroyed
					.into_iter()
					.map(|id| RuntimeEvent::ComponentDestroyed { id }),
			);
		} else {
			self.adopt_child_snapshots(id);
		}

		if let Some(url) = effects.redirect_to {
			tracing::info!(id = %id, url = %url, "redirect requested");
			self.redirect = Some(url.clone());
			events.push(RuntimeEvent::Redirected { url });
		}

		let mut targets: Vec<String> = Vec::new();
		for event in effects.dispatched_events {
			let source = event.source.clone().unwrap_or_else(|| id.to_string());
			for target in self.deliver(&event, &source) {
				if !targets.contains(&target) {
					targets.push(target);
				}
			}
			events.push(RuntimeEvent::Dispatched { event });
		}

		if let Some(push) = self.location.sync(&self.registry)? {
			let url = self.location.href().to_string();
			tracing::debug!(id = %id, url = %url, push, "query string updated");
			events.push(RuntimeEvent::UrlChanged { url, push });
		}

		events.push(RuntimeEvent::ResponseApplied {
			id: id.to_string(),
			dirty: effects.dirty,
		});
		Ok((events, targets))
	}

	/// Takes child snapshots from the memo when no markup came back.
	fn adopt_child_snapshots(&mut self, id: &str) {
		let Some(entry) = self.registry.get(id) else {
			return;
		};
		let children: Vec<(String, Snapshot)> = entry
			.snapshot()
			.memo
			.children
			.values()
			.filter_map(|child| Some((child.id.clone(), (**child.snapshot.as_ref()?).clone())))
			.collect();
		for (child_id, snapshot) in children {
			if let Some(child) = self.registry.get_mut(&child_id) {
				child.snapshot = snapshot;
			}
			self.adopt_child_snapshots(&child_id);
		}
	}
}

/// Maps a write to an inner child path onto the bound outer path.
fn bound_path(outer: &str, inner: &str, path: &str) -> Option<String> {
	if path == inner {
		return Some(outer.to_string());
	}
	let rest = path.strip_prefix(inner)?.strip_prefix('.')?;
	Some(format!("{}.{}", outer, rest))
}

/// Follows a dotted path through wire data.
fn lookup<'a>(
	data: &'a serde_json::Map<String, serde_json::Value>,
	path: &str,
) -> Option<&'a serde_json::Value> {
	let mut segments = path.split('.');
	let first = data.get(segments.next()?)?;
	segments.try_fold(first, |value, segment| match value {
		serde_json::Value::Object(map) => map.get(segment),
		serde_json::Value::Array(items) => items.get(segment.parse::<usize>().ok()?),
		_ => None,
	})
}

/// `ArrowUp` matches `keydown.arrow-up`; unmodified directives match any key.
fn key_matches(directive: &Directive, key: &str) -> bool {
	let keys: Vec<&String> = directive
		.modifiers
		.iter()
		.filter(|modifier| !matches!(modifier.as_str(), "prevent" | "stop"))
		.collect();
	if keys.is_empty() {
		return true;
	}
	let normalized = kebab_key(key);
	keys.iter().any(|modifier| **modifier == normalized)
}

fn kebab_key(key: &str) -> String {
	if key == " " {
		return "space".to_string();
	}
	let mut out = String::with_capacity(key.len() + 2);
	for (index, c) in key.chars().enumerate() {
		if c.is_ascii_uppercase() && index > 0 {
			out.push('-');
		}
		out.push(c.to_ascii_lowercase());
	}
	out
}

fn first_error(results: Vec<ClientResult<()>>) -> ClientResult<()> {
	results.into_iter().collect()
}
