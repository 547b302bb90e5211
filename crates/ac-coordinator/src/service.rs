//! Coordinator message service
//!
//! Runs the [`Coordinator`] as a task reachable only through messages.
//! Requests are handled one at a time in arrival order and each gets
//! exactly one response. Store changes made by anyone re-render the
//! focused page's badge.

use std::sync::Arc;

use ac_core::{MessageChannel, Request, Response};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::coordinator::Coordinator;
use crate::error::{CoordinatorError, Result};

const REQUEST_CHANNEL_CAPACITY: usize = 64;

type Envelope = (Request, oneshot::Sender<Response>);

/// Start the service. It stops once every handle is dropped.
pub fn spawn(coordinator: Arc<Coordinator>) -> (CoordinatorHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
    let task = tokio::spawn(run(coordinator, rx));
    (CoordinatorHandle { requests: tx }, task)
}

async fn run(coordinator: Arc<Coordinator>, mut requests: mpsc::Receiver<Envelope>) {
    let area = coordinator.store().area().to_string();
    let mut changes = coordinator.store().subscribe();
    let mut changes_open = true;

    if let Err(e) = coordinator.ensure_defaults().await {
        // Retried by the first request.
        warn!(error = %e, "Default seeding failed");
    }
    info!("Coordinator service started");

    loop {
        tokio::select! {
            // Drain store notifications before taking the next request.
            biased;

            change = changes.recv(), if changes_open => match change {
                Ok(change) => {
                    if change.affects_settings(&area) {
                        coordinator.refresh_indicator().await;
                    }
                }
                Err(RecvError::Lagged(_)) => {
                    coordinator.refresh_indicator().await;
                }
                Err(RecvError::Closed) => changes_open = false,
            },
            envelope = requests.recv() => {
                let Some((request, reply)) = envelope else {
                    break;
                };
                debug!(request = request.kind(), "Handling request");
                let response = coordinator.handle(request).await;
                // The caller may have given up waiting.
                let _ = reply.send(response);
            }
        }
    }

    info!("Coordinator service stopped");
}

/// Cloneable client of the coordinator service
#[derive(Clone)]
pub struct CoordinatorHandle {
    requests: mpsc::Sender<Envelope>,
}

impl CoordinatorHandle {
    pub async fn request(&self, request: Request) -> Result<Response> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send((request, tx))
            .await
            .map_err(|_| CoordinatorError::ServiceStopped)?;
        rx.await.map_err(|_| CoordinatorError::ServiceStopped)
    }

    /// Decode and answer a raw JSON message.
    pub async fn handle_json(&self, raw: Value) -> Response {
        match Request::from_json(raw) {
            Ok(request) => self.send(request).await,
            Err(e) => Response::failure(e.to_string()),
        }
    }
}

#[async_trait]
impl MessageChannel for CoordinatorHandle {
    async fn send(&self, request: Request) -> Response {
        match self.request(request).await {
            Ok(response) => response,
            Err(e) => Response::failure(e.code()),
        }
    }
}
