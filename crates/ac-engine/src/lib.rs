//! ac-engine: Detection and Activation Engine
//!
//! Everything that runs inside one page: the element model, the container
//! container selectors, the eligibility filter, the debounce/cooldown scheduler,
//! the configuration synchronizer and the page-context task tying them
//! together.

pub mod context;
pub mod dom;
pub mod eligibility;
pub mod error;
pub mod overlay;
pub mod scheduler;
pub mod scope;
pub mod selector;
pub mod sync;

pub use context::{ContentStatus, PageCommand, PageContext, PageHandle};
pub use dom::{ComputedStyle, Document, Element, ElementId, ElementNode, PageFixture, Rect, Viewport};
pub use eligibility::{Candidate, ContainerScope, find_candidate};
pub use error::{EngineError, Result};
pub use overlay::overlay_text;
pub use scheduler::{ActivationReport, ActivationScheduler, Phase, ScanOutcome, ScanSession};
pub use scope::{FixturePage, ObservableScope, ScopeEvent};
pub use selector::SelectorList;
pub use sync::ConfigSynchronizer;
