//! Storage collaborators consumed by the notification run.
//!
//! Each lookup is its own trait so tests can fake exactly what they need;
//! [`NotifyStore`] bundles them for the orchestrator.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use herald_common::types::{Item, Offer, Subscriber, Subscription};

#[async_trait]
pub trait CatalogQuery: Send + Sync {
    /// All offers scheduled for `date`.
    async fn find_offers_by_date(&self, date: NaiveDate) -> anyhow::Result<Vec<Offer>>;
}

#[async_trait]
pub trait SubscriberResolver: Send + Sync {
    /// Subscriptions for `item_id` whose notify flag is set.
    async fn find_notify_subscriptions_by_item(
        &self,
        item_id: Uuid,
    ) -> anyhow::Result<Vec<Subscription>>;
}

#[async_trait]
pub trait ProfileLoader: Send + Sync {
    /// A subscriber with all registered endpoints, `None` if it does not exist.
    async fn load_subscriber_with_endpoints(
        &self,
        subscriber_id: Uuid,
    ) -> anyhow::Result<Option<Subscriber>>;
}

#[async_trait]
pub trait ItemLoader: Send + Sync {
    /// An item with its translations, `None` if it does not exist.
    async fn load_item_with_translations(&self, item_id: Uuid) -> anyhow::Result<Option<Item>>;
}

#[async_trait]
pub trait EndpointStore: Send + Sync {
    /// Set the endpoint's push object to null. Clearing twice is a no-op.
    async fn clear_push_address(&self, endpoint_id: Uuid) -> anyhow::Result<()>;
}

/// Everything the notification run reads from or writes to storage.
pub trait NotifyStore:
    CatalogQuery + SubscriberResolver + ProfileLoader + ItemLoader + EndpointStore
{
}

impl<T> NotifyStore for T where
    T: CatalogQuery + SubscriberResolver + ProfileLoader + ItemLoader + EndpointStore
{
}
