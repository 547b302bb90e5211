//! Page contexts reporting to a running coordinator service.

use std::sync::Arc;
use std::time::Duration;

use ac_coordinator::{Coordinator, CoordinatorHandle};
use ac_core::{MemoryStore, MessageChannel, Origin, Request, SettingsStore, SqliteStore, StoreSnapshot};
use ac_engine::{Document, ElementNode, FixturePage, PageContext, Rect, ScanOutcome, Viewport};
use serde_json::json;
use tokio::sync::mpsc;

const URL: &str = "https://example.com/form";

fn page() -> FixturePage {
    let root = ElementNode::new("main").child(
        ElementNode::new("form").child(
            ElementNode::new("button")
                .text("Submit Form")
                .rect(Rect::new(40.0, 40.0, 160.0, 36.0)),
        ),
    );
    FixturePage::new(Document::new(URL, Viewport::default(), root))
}

fn live_settings() -> StoreSnapshot {
    json!({
        "global_enabled": true,
        "dry_run": false,
        "allowlist_patterns": ["https://example.com/*"],
        "activation_labels": ["Submit"],
        "cooldown_ms": 0
    })
    .as_object()
    .cloned()
    .unwrap()
}

fn start(
    store: Arc<dyn SettingsStore>,
    page: &FixturePage,
) -> (CoordinatorHandle, Arc<Coordinator>, mpsc::UnboundedReceiver<ScanOutcome>) {
    let coordinator = Arc::new(Coordinator::new(store.clone()));
    let (handle, _task) = ac_coordinator::spawn(coordinator.clone());
    let (tx, outcomes) = mpsc::unbounded_channel();
    PageContext::new(
        Arc::new(page.clone()),
        store,
        Arc::new(handle.clone()),
        Duration::from_secs(2),
    )
    .with_outcomes(tx)
    .spawn();
    (handle, coordinator, outcomes)
}

#[tokio::test(start_paused = true)]
async fn test_live_activation_recorded_by_origin() {
    let store = Arc::new(MemoryStore::with_values(live_settings()));
    let page = page();
    let (_handle, coordinator, mut outcomes) = start(store, &page);

    assert!(matches!(outcomes.recv().await.unwrap(), ScanOutcome::Activated(_)));
    assert_eq!(page.activations().len(), 1);

    let settings = coordinator.settings().await.unwrap();
    let origin = Origin::parse("https://example.com").unwrap();
    let record = settings.last_activation(&origin).unwrap();
    assert_eq!(record.label, "Submit Form");
    assert!(!record.dry_run);
}

#[tokio::test(start_paused = true)]
async fn test_global_switch_off_stops_page() {
    let mut values = live_settings();
    values.insert("global_enabled".to_string(), json!(false));
    let store = Arc::new(MemoryStore::with_values(values));
    let page = page();
    let (handle, _coordinator, mut outcomes) = start(store, &page);

    assert_eq!(outcomes.recv().await.unwrap(), ScanOutcome::Inactive);
    let response = handle
        .send(Request::GetTabStatus { url: URL.to_string() })
        .await;
    assert!(!response.status().unwrap().active);
    assert!(page.activations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_site_switch_reaches_page() {
    let store = Arc::new(MemoryStore::with_values(live_settings()));
    let page = page();
    let (handle, _coordinator, mut outcomes) = start(store, &page);
    assert!(matches!(outcomes.recv().await.unwrap(), ScanOutcome::Activated(_)));

    let response = handle
        .send(Request::SetSiteEnabled {
            origin: URL.to_string(),
            enabled: false,
        })
        .await;
    assert!(response.ok);

    // Anything scanned after the switch sees an inactive page.
    assert_eq!(outcomes.recv().await.unwrap(), ScanOutcome::Inactive);
    assert_eq!(page.activations().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sqlite_backed_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("autoclick.db"), "local").unwrap();
    store.set(live_settings()).await.unwrap();

    let page = page();
    let (_handle, coordinator, mut outcomes) = start(Arc::new(store), &page);
    assert!(matches!(outcomes.recv().await.unwrap(), ScanOutcome::Activated(_)));

    let settings = coordinator.settings().await.unwrap();
    assert_eq!(settings.last_activation_by_origin.len(), 1);
    assert_eq!(settings.debounce_ms, 250);
}
