//! End-to-end tests of the notification run against in-memory collaborators.
//!
//! ```bash
//! cargo test -p herald-engine --test notify_run
//! ```

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::json;
use uuid::Uuid;

use herald_common::types::{
    Endpoint, Item, ItemTranslation, Offer, RunState, RunStats, ScheduledRun, Subscriber,
    Subscription,
};
use herald_engine::store::{
    CatalogQuery, EndpointStore, ItemLoader, ProfileLoader, SubscriberResolver,
};
use herald_engine::{MessageComposer, NotifySchedule, RunLogger, SCHEDULE_NAME};
use herald_notifier::{PushError, PushTransport};

// ============================================================
// In-memory collaborators
// ============================================================

#[derive(Default)]
struct MemoryStore {
    offers: Vec<Offer>,
    subscriptions: Vec<Subscription>,
    subscribers: HashMap<Uuid, Subscriber>,
    items: HashMap<Uuid, Item>,
    cleared: Mutex<Vec<Uuid>>,
    offers_unavailable: bool,
    panic_on_profile: Option<Uuid>,
}

#[async_trait]
impl CatalogQuery for MemoryStore {
    async fn find_offers_by_date(&self, date: NaiveDate) -> anyhow::Result<Vec<Offer>> {
        if self.offers_unavailable {
            anyhow::bail!("connection refused");
        }
        Ok(self.offers.iter().filter(|o| o.date == date).cloned().collect())
    }
}

#[async_trait]
impl SubscriberResolver for MemoryStore {
    async fn find_notify_subscriptions_by_item(
        &self,
        item_id: Uuid,
    ) -> anyhow::Result<Vec<Subscription>> {
        Ok(self
            .subscriptions
            .iter()
            .filter(|s| s.item_id == item_id && s.notify)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProfileLoader for MemoryStore {
    async fn load_subscriber_with_endpoints(
        &self,
        subscriber_id: Uuid,
    ) -> anyhow::Result<Option<Subscriber>> {
        if self.panic_on_profile == Some(subscriber_id) {
            panic!("profile row is corrupt");
        }
        Ok(self.subscribers.get(&subscriber_id).cloned())
    }
}

#[async_trait]
impl ItemLoader for MemoryStore {
    async fn load_item_with_translations(&self, item_id: Uuid) -> anyhow::Result<Option<Item>> {
        Ok(self.items.get(&item_id).cloned())
    }
}

#[async_trait]
impl EndpointStore for MemoryStore {
    async fn clear_push_address(&self, endpoint_id: Uuid) -> anyhow::Result<()> {
        self.cleared.lock().unwrap().push(endpoint_id);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<(String, String, String)>>,
    failures: HashMap<String, &'static str>,
}

impl RecordingTransport {
    fn failing(failures: &[(&str, &'static str)]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failures: failures
                .iter()
                .map(|(addr, msg)| (addr.to_string(), *msg))
                .collect(),
        }
    }

    fn addresses(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(a, _, _)| a.clone()).collect()
    }

    fn bodies(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, _, b)| b.clone()).collect()
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn send(&self, addresses: &[String], title: &str, body: &str) -> Result<(), PushError> {
        for address in addresses {
            self.sent
                .lock()
                .unwrap()
                .push((address.clone(), title.to_string(), body.to_string()));
            if let Some(msg) = self.failures.get(address) {
                return Err(PushError::Service(msg.to_string()));
            }
        }
        Ok(())
    }
}

// ============================================================
// Fixtures
// ============================================================

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn endpoint(address: &str, updated_at: Option<DateTime<Utc>>) -> Endpoint {
    Endpoint {
        id: Uuid::new_v4(),
        push_token: Some(json!({"pushtokenObj": {"type": "expo", "data": address}})),
        updated_at,
    }
}

fn subscriber(location_id: Option<Uuid>, endpoints: Vec<Endpoint>) -> Subscriber {
    Subscriber {
        id: Uuid::new_v4(),
        language: Some("de".into()),
        location_id,
        endpoints,
    }
}

struct World {
    store: MemoryStore,
    canteen: Uuid,
    item_id: Uuid,
}

impl World {
    /// One dish ("Nudeln") offered tomorrow at one canteen.
    fn new() -> Self {
        Self::offered_in(1)
    }

    fn offered_in(days: u64) -> Self {
        let canteen = Uuid::new_v4();
        let item_id = Uuid::new_v4();
        let mut store = MemoryStore::default();
        store.offers.push(Offer {
            id: Uuid::new_v4(),
            item_id,
            location_id: canteen,
            date: today() + chrono::Days::new(days),
        });
        store.items.insert(
            item_id,
            Item {
                id: item_id,
                translations: vec![ItemTranslation {
                    language_code: "de".into(),
                    name: Some("Nudeln".into()),
                }],
            },
        );
        Self {
            store,
            canteen,
            item_id,
        }
    }

    fn subscribe(&mut self, subscriber: Subscriber) -> Uuid {
        let id = subscriber.id;
        self.store.subscriptions.push(Subscription {
            id: Uuid::new_v4(),
            subscriber_id: id,
            item_id: self.item_id,
            notify: true,
        });
        self.store.subscribers.insert(id, subscriber);
        id
    }
}

async fn run(
    store: MemoryStore,
    transport: RecordingTransport,
    days_ahead: u32,
) -> (ScheduledRun, MemoryStore, RecordingTransport) {
    let schedule = NotifySchedule::new(store, transport, MessageComposer::default());
    let report = schedule
        .run_from(today(), days_ahead, RunLogger::new(SCHEDULE_NAME))
        .await;
    let (store, transport) = schedule.into_parts();
    (report, store, transport)
}

fn stats(report: &ScheduledRun) -> RunStats {
    serde_json::from_value(report.result.clone()).unwrap()
}

// ============================================================
// Run report
// ============================================================

#[tokio::test]
async fn test_no_offers_still_succeeds() {
    let (report, _, transport) =
        run(MemoryStore::default(), RecordingTransport::default(), 1).await;

    assert_eq!(report.state, RunState::Success);
    assert_eq!(report.schedule, SCHEDULE_NAME);
    assert!(report.log.iter().any(|l| l.starts_with("Found 0 food offers")));
    assert_eq!(report.log.first().unwrap(), "Start food notify schedule");
    assert_eq!(report.log.last().unwrap(), "Finished");
    assert!(transport.addresses().is_empty());
}

#[tokio::test]
async fn test_storage_failure_seals_failed() {
    let store = MemoryStore {
        offers_unavailable: true,
        ..Default::default()
    };
    let (report, _, _) = run(store, RecordingTransport::default(), 1).await;

    assert_eq!(report.state, RunState::Failed);
    let last = report.log.last().unwrap();
    assert!(last.starts_with("Error: "));
    assert!(last.contains("connection refused"));
    assert!(report.finished_at.is_some());
}

#[tokio::test]
async fn test_panic_seals_failed() {
    let mut world = World::new();
    let canteen = world.canteen;
    let id = world.subscribe(subscriber(Some(canteen), vec![endpoint("tok-a", None)]));
    world.store.panic_on_profile = Some(id);

    let (report, _, transport) = run(world.store, RecordingTransport::default(), 1).await;

    assert_eq!(report.state, RunState::Failed);
    assert!(report.log.last().unwrap().contains("profile row is corrupt"));
    assert!(transport.addresses().is_empty());
}

// ============================================================
// Fan-out and filtering
// ============================================================

#[tokio::test]
async fn test_location_mismatch_is_not_notified() {
    let mut world = World::new();
    let canteen = world.canteen;
    world.subscribe(subscriber(Some(Uuid::new_v4()), vec![endpoint("tok-other", None)]));
    world.subscribe(subscriber(None, vec![endpoint("tok-none", None)]));
    world.subscribe(subscriber(Some(canteen), vec![endpoint("tok-here", None)]));

    let (report, _, transport) = run(world.store, RecordingTransport::default(), 1).await;

    assert_eq!(report.state, RunState::Success);
    assert_eq!(transport.addresses(), vec!["tok-here"]);
    let stats = stats(&report);
    assert_eq!(stats.subscriptions, 3);
    assert_eq!(stats.skipped_subscribers, 2);
    assert_eq!(stats.addresses_notified, 1);
}

#[tokio::test]
async fn test_missing_profile_is_skipped() {
    let mut world = World::new();
    let canteen = world.canteen;
    world.store.subscriptions.push(Subscription {
        id: Uuid::new_v4(),
        subscriber_id: Uuid::new_v4(),
        item_id: world.item_id,
        notify: true,
    });
    world.subscribe(subscriber(Some(canteen), vec![endpoint("tok-a", None)]));

    let (report, _, transport) = run(world.store, RecordingTransport::default(), 1).await;

    assert_eq!(report.state, RunState::Success);
    assert_eq!(transport.addresses(), vec!["tok-a"]);
    assert!(report.log.iter().any(|l| l.contains("not found, skipping")));
}

#[tokio::test]
async fn test_shared_token_sent_once_and_stale_endpoints_cleared() {
    let t = Utc::now();
    let oldest = endpoint("tok-shared", Some(t - Duration::days(30)));
    let middle = endpoint("tok-shared", Some(t - Duration::days(2)));
    let newest = endpoint("tok-shared", Some(t));
    let untokened = Endpoint {
        id: Uuid::new_v4(),
        push_token: None,
        updated_at: Some(t),
    };

    let mut world = World::new();
    let canteen = world.canteen;
    world.subscribe(subscriber(
        Some(canteen),
        vec![
            oldest.clone(),
            newest.clone(),
            untokened,
            middle.clone(),
            endpoint("tok-tablet", None),
        ],
    ));

    let (report, store, transport) = run(world.store, RecordingTransport::default(), 1).await;

    let mut addresses = transport.addresses();
    addresses.sort();
    assert_eq!(addresses, vec!["tok-shared", "tok-tablet"]);

    let cleared = store.cleared.lock().unwrap().clone();
    assert_eq!(cleared.len(), 2);
    assert!(cleared.contains(&oldest.id));
    assert!(cleared.contains(&middle.id));
    assert!(!cleared.contains(&newest.id));
    assert_eq!(stats(&report).endpoints_cleared, 2);
}

// ============================================================
// Dispatch failures
// ============================================================

#[tokio::test]
async fn test_dead_token_clears_every_endpoint_including_survivor() {
    let t = Utc::now();
    let older = endpoint("tok-dead", Some(t - Duration::hours(1)));
    let newer = endpoint("tok-dead", Some(t));

    let mut world = World::new();
    let canteen = world.canteen;
    world.subscribe(subscriber(Some(canteen), vec![older.clone(), newer.clone()]));

    let transport =
        RecordingTransport::failing(&[("tok-dead", "Failed to send notification: gone")]);
    let (report, store, _) = run(world.store, transport, 1).await;

    assert_eq!(report.state, RunState::Success);
    let cleared = store.cleared.lock().unwrap().clone();
    assert!(cleared.contains(&older.id));
    assert!(cleared.contains(&newer.id));
    let stats = stats(&report);
    assert_eq!(stats.dead_addresses, 1);
    assert_eq!(stats.endpoints_cleared, 2);
}

#[tokio::test]
async fn test_transient_failure_keeps_endpoints_and_continues() {
    let mut world = World::new();
    let canteen = world.canteen;
    let flaky = endpoint("tok-flaky", None);
    world.subscribe(subscriber(Some(canteen), vec![flaky]));
    world.subscribe(subscriber(Some(canteen), vec![endpoint("tok-fine", None)]));

    let transport = RecordingTransport::failing(&[("tok-flaky", "MessageRateExceeded")]);
    let (report, store, transport) = run(world.store, transport, 1).await;

    assert_eq!(report.state, RunState::Success);
    assert_eq!(transport.addresses(), vec!["tok-flaky", "tok-fine"]);
    assert!(store.cleared.lock().unwrap().is_empty());
    let stats = stats(&report);
    assert_eq!(stats.dispatch_failures, 1);
    assert_eq!(stats.addresses_notified, 1);
}

#[tokio::test]
async fn test_transient_failure_still_clears_stale_duplicates() {
    let t = Utc::now();
    let older = endpoint("tok-flaky", Some(t - Duration::days(3)));
    let newer = endpoint("tok-flaky", Some(t));

    let mut world = World::new();
    let canteen = world.canteen;
    world.subscribe(subscriber(Some(canteen), vec![older.clone(), newer.clone()]));

    let transport = RecordingTransport::failing(&[("tok-flaky", "MessageRateExceeded")]);
    let (report, store, transport) = run(world.store, transport, 1).await;

    assert_eq!(report.state, RunState::Success);
    assert_eq!(transport.addresses(), vec!["tok-flaky"]);
    let cleared = store.cleared.lock().unwrap().clone();
    assert_eq!(cleared, vec![older.id]);
    assert!(!cleared.contains(&newer.id));
    let stats = stats(&report);
    assert_eq!(stats.dispatch_failures, 1);
    assert_eq!(stats.dead_addresses, 0);
    assert_eq!(stats.endpoints_cleared, 1);
}

// ============================================================
// Message content
// ============================================================

#[tokio::test]
async fn test_date_phrase_depends_on_days_ahead() {
    for (days, expected) in [
        (0u32, "🍽 Heute: Nudeln"),
        (1, "🍽 Morgen: Nudeln"),
        (3, "🍽 22.10.2026: Nudeln"),
    ] {
        let mut world = World::offered_in(u64::from(days));
        let canteen = world.canteen;
        world.subscribe(subscriber(Some(canteen), vec![endpoint("tok", None)]));

        let (report, _, transport) = run(world.store, RecordingTransport::default(), days).await;

        assert_eq!(report.state, RunState::Success);
        assert_eq!(transport.bodies(), vec![expected.to_string()]);
    }
}

#[tokio::test]
async fn test_offers_of_other_days_are_ignored() {
    let mut world = World::offered_in(2);
    let canteen = world.canteen;
    world.subscribe(subscriber(Some(canteen), vec![endpoint("tok", None)]));

    let (report, _, transport) = run(world.store, RecordingTransport::default(), 1).await;

    assert_eq!(report.state, RunState::Success);
    assert_eq!(stats(&report).offers, 0);
    assert!(transport.addresses().is_empty());
}
