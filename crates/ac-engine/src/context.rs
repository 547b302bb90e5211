//! Page context runtime
//!
//! One tokio task per page. Store notifications, page events, the periodic
//! tick, the debounce deadline and control commands are all serialized
//! through a single `select!` loop, so scheduler transitions for a page never
//! run concurrently.

use std::sync::Arc;
use std::time::Duration;

use ac_core::{MessageChannel, Request, SettingsStore};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::overlay::overlay_text;
use crate::scheduler::{ActivationScheduler, ScanOutcome};
use crate::scope::{ObservableScope, ScopeEvent};
use crate::sync::ConfigSynchronizer;

const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// Control message for a running page context
#[derive(Debug)]
pub enum PageCommand {
    /// Reply with the page's current status
    Status(oneshot::Sender<ContentStatus>),
    /// Arm the debounce timer as if the page had changed
    Rescan,
    Shutdown,
}

/// Page-local status, as reported to control surfaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStatus {
    pub active: bool,
    pub dry_run: bool,
    pub last_activation_iso: Option<String>,
}

pub struct PageContext {
    scope: Arc<dyn ObservableScope>,
    sync: ConfigSynchronizer,
    scheduler: ActivationScheduler,
    channel: Arc<dyn MessageChannel>,
    tick_interval: Duration,
    outcomes: Option<mpsc::UnboundedSender<ScanOutcome>>,
}

impl PageContext {
    pub fn new(
        scope: Arc<dyn ObservableScope>,
        store: Arc<dyn SettingsStore>,
        channel: Arc<dyn MessageChannel>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            scope,
            sync: ConfigSynchronizer::new(store),
            scheduler: ActivationScheduler::new(),
            channel,
            tick_interval,
            outcomes: None,
        }
    }

    /// Forward every scan outcome to `tx`.
    pub fn with_outcomes(mut self, tx: mpsc::UnboundedSender<ScanOutcome>) -> Self {
        self.outcomes = Some(tx);
        self
    }

    pub fn spawn(self) -> PageHandle {
        let (commands, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let id = Uuid::new_v4();
        let task = tokio::spawn(self.run(id, rx));
        PageHandle { id, commands, task }
    }

    async fn run(mut self, id: Uuid, mut commands: mpsc::Receiver<PageCommand>) {
        // Subscribe before the first load so no change can slip in between.
        let mut store_rx = self.sync.subscribe();
        let mut scope_rx = self.scope.subscribe();
        let mut url = self.scope.url();

        info!(page = %id, url = %url, "Page context started");
        self.refresh(&url).await;

        let mut tick = tokio::time::interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut commands_open = true;
        let mut store_open = true;
        let mut scope_open = true;

        loop {
            if !commands_open && !store_open && !scope_open {
                break;
            }
            let deadline = self.scheduler.deadline();

            tokio::select! {
                command = commands.recv(), if commands_open => match command {
                    Some(PageCommand::Status(reply)) => {
                        let _ = reply.send(self.content_status());
                    }
                    Some(PageCommand::Rescan) => self.arm(),
                    Some(PageCommand::Shutdown) => break,
                    None => commands_open = false,
                },
                change = store_rx.recv(), if store_open => match change {
                    Ok(change) => {
                        if self.sync.is_relevant(&change) {
                            self.refresh(&url).await;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(page = %id, skipped, "Missed store notifications, reloading");
                        self.refresh(&url).await;
                    }
                    Err(RecvError::Closed) => store_open = false,
                },
                event = scope_rx.recv(), if scope_open => match event {
                    Ok(ScopeEvent::Mutation) => self.arm(),
                    Ok(ScopeEvent::Navigated { url: next }) => {
                        debug!(page = %id, url = %next, "Navigated");
                        url = next;
                        self.navigated(&url).await;
                    }
                    Err(RecvError::Lagged(_)) => {
                        let current = self.scope.url();
                        if current != url {
                            url = current;
                            self.navigated(&url).await;
                        } else {
                            self.refresh(&url).await;
                        }
                    }
                    Err(RecvError::Closed) => scope_open = false,
                },
                _ = tick.tick() => {
                    // Never push out a pending deadline.
                    if self.sync.state().active && self.scheduler.deadline().is_none() {
                        self.arm();
                    }
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.evaluate().await;
                }
            }
        }

        self.scheduler.cancel();
        self.scope.show_overlay(None);
        info!(page = %id, "Page context stopped");
    }

    /// Reload settings, then restart the debounce from now.
    async fn refresh(&mut self, url: &str) {
        self.sync.refresh(url).await;
        self.scheduler.cancel();
        self.update_overlay();
        self.arm();
    }

    /// A new document starts a fresh scan session.
    async fn navigated(&mut self, url: &str) {
        self.scheduler = ActivationScheduler::new();
        self.refresh(url).await;
    }

    fn arm(&mut self) {
        self.scheduler.trigger(Instant::now(), self.sync.debounce());
    }

    async fn evaluate(&mut self) {
        let outcome = self
            .scheduler
            .evaluate(Instant::now(), self.sync.state(), self.sync.settings(), self.scope.as_ref())
            .await;

        if let ScanOutcome::Activated(report) = &outcome {
            self.update_overlay();
            let response = self
                .channel
                .send(Request::ReportClick {
                    origin: report.origin.clone(),
                    label: Some(report.label.clone()),
                    at: Some(report.at.clone()),
                    dry_run: report.dry_run,
                })
                .await;
            if !response.ok {
                warn!(
                    origin = %report.origin,
                    error = response.error.as_deref().unwrap_or("unknown"),
                    "Activation report rejected"
                );
            }
        }

        if let Some(tx) = &self.outcomes {
            let _ = tx.send(outcome);
        }
    }

    fn update_overlay(&self) {
        let text = overlay_text(
            self.sync.state(),
            self.scheduler.session().last_activation_iso.as_deref(),
        );
        self.scope.show_overlay(text.as_deref());
    }

    fn content_status(&self) -> ContentStatus {
        let state = self.sync.state();
        ContentStatus {
            active: state.active,
            dry_run: state.dry_run,
            last_activation_iso: self.scheduler.session().last_activation_iso.clone(),
        }
    }
}

/// Handle to a spawned [`PageContext`]
pub struct PageHandle {
    id: Uuid,
    commands: mpsc::Sender<PageCommand>,
    task: JoinHandle<()>,
}

impl PageHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn status(&self) -> Result<ContentStatus> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(PageCommand::Status(tx))
            .await
            .map_err(|_| EngineError::ContextClosed)?;
        rx.await.map_err(|_| EngineError::ContextClosed)
    }

    pub async fn rescan(&self) -> Result<()> {
        self.commands
            .send(PageCommand::Rescan)
            .await
            .map_err(|_| EngineError::ContextClosed)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the context and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.commands.send(PageCommand::Shutdown).await;
        let _ = self.task.await;
    }
}
