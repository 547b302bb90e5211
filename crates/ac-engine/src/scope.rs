//! Observable scope
//!
//! The host capability a page context runs against: a document snapshot,
//! change notifications and the single activation side effect. Any host
//! that can provide these is substitutable; [`FixturePage`] is the
//! in-process implementation used by the `autoclick` binary and tests.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::dom::{Document, Element, PageFixture};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Change observed on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeEvent {
    /// Structure, attributes or text changed
    Mutation,
    /// The page moved to another URL
    Navigated { url: String },
}

#[async_trait]
pub trait ObservableScope: Send + Sync {
    /// Current page URL
    fn url(&self) -> String;

    /// Current page snapshot
    fn snapshot(&self) -> Document;

    fn subscribe(&self) -> broadcast::Receiver<ScopeEvent>;

    /// Perform the native activation on `element`.
    async fn activate(&self, element: &Element) -> ac_core::Result<()>;

    /// Show (`Some`) or remove (`None`) the page overlay.
    fn show_overlay(&self, _text: Option<&str>) {}
}

struct PageState {
    document: Document,
    activations: Vec<Element>,
    overlay: Option<String>,
    fail_with: Option<String>,
}

/// In-memory page backed by a [`Document`]
#[derive(Clone)]
pub struct FixturePage {
    state: Arc<Mutex<PageState>>,
    events: broadcast::Sender<ScopeEvent>,
}

impl FixturePage {
    pub fn new(document: Document) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(PageState {
                document,
                activations: Vec::new(),
                overlay: None,
                fail_with: None,
            })),
            events,
        }
    }

    pub fn from_fixture(fixture: PageFixture) -> Self {
        Self::new(fixture.into_document())
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        // State stays usable even if a holder panicked.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Edit the document in place and notify observers.
    pub fn mutate<F>(&self, f: F)
    where
        F: FnOnce(&mut Document),
    {
        f(&mut self.lock().document);
        let _ = self.events.send(ScopeEvent::Mutation);
    }

    /// Replace the document with a new page.
    pub fn navigate(&self, document: Document) {
        let url = document.url.clone();
        self.lock().document = document;
        let _ = self.events.send(ScopeEvent::Navigated { url });
    }

    /// Elements activated so far, oldest first.
    pub fn activations(&self) -> Vec<Element> {
        self.lock().activations.clone()
    }

    pub fn overlay(&self) -> Option<String> {
        self.lock().overlay.clone()
    }

    /// Make subsequent activations fail with `error` (or succeed again with `None`).
    pub fn fail_activations_with(&self, error: Option<String>) {
        self.lock().fail_with = error;
    }
}

#[async_trait]
impl ObservableScope for FixturePage {
    fn url(&self) -> String {
        self.lock().document.url.clone()
    }

    fn snapshot(&self) -> Document {
        self.lock().document.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<ScopeEvent> {
        self.events.subscribe()
    }

    async fn activate(&self, element: &Element) -> ac_core::Result<()> {
        let mut state = self.lock();
        if let Some(error) = &state.fail_with {
            return Err(ac_core::Error::ActivationFailure(error.clone()));
        }
        state.activations.push(element.clone());
        Ok(())
    }

    fn show_overlay(&self, text: Option<&str>) {
        self.lock().overlay = text.map(str::to_string);
    }
}
