//! Request transports.

use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use reinhardt_live_core::manager::LiveManager;
use reinhardt_live_core::protocol::{ErrorResponse, RequestPayload, ResponsePayload};
use std::sync::Arc;

/// Carries one request to the server and back.
#[async_trait]
pub trait Transport: Send + Sync {
	/// Sends a request and waits for its response.
	async fn send(&self, request: RequestPayload) -> ClientResult<ResponsePayload>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
	async fn send(&self, request: RequestPayload) -> ClientResult<ResponsePayload> {
		(**self).send(request).await
	}
}

/// In-process transport that serializes requests exactly like an HTTP
/// endpoint would and hands the bytes to a [`LiveManager`].
#[derive(Debug, Clone)]
pub struct LocalTransport {
	manager: Arc<LiveManager>,
}

impl LocalTransport {
	/// Wraps a manager.
	pub fn new(manager: Arc<LiveManager>) -> Self {
		Self { manager }
	}

	/// The wrapped manager.
	pub fn manager(&self) -> &LiveManager {
		&self.manager
	}
}

#[async_trait]
impl Transport for LocalTransport {
	async fn send(&self, request: RequestPayload) -> ClientResult<ResponsePayload> {
		let body = serde_json::to_vec(&request)?;
		let (status, response) = self.manager.handle_json(&body);
		if status == 200 {
			return Ok(serde_json::from_slice(&response)?);
		}
		let ErrorResponse { error } = serde_json::from_slice(&response)?;
		Err(ClientError::Server {
			status,
			kind: error.kind,
			message: error.message,
		})
	}
}
