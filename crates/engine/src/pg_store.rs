//! PostgreSQL implementation of the notification store.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use herald_common::types::{Endpoint, Item, ItemTranslation, Offer, Subscriber, Subscription};

use crate::store::{CatalogQuery, EndpointStore, ItemLoader, ProfileLoader, SubscriberResolver};

/// Store reading offers, feedbacks, profiles and devices from PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CatalogQuery for PgStore {
    async fn find_offers_by_date(&self, date: NaiveDate) -> anyhow::Result<Vec<Offer>> {
        let offers: Vec<Offer> = sqlx::query_as(
            r#"
            SELECT id, food_id AS item_id, canteen_id AS location_id, date
            FROM food_offers
            WHERE date = $1
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(offers)
    }
}

#[async_trait]
impl SubscriberResolver for PgStore {
    async fn find_notify_subscriptions_by_item(
        &self,
        item_id: Uuid,
    ) -> anyhow::Result<Vec<Subscription>> {
        let subs: Vec<Subscription> = sqlx::query_as(
            r#"
            SELECT id, profile_id AS subscriber_id, food_id AS item_id, notify
            FROM food_feedbacks
            WHERE food_id = $1
              AND notify = true
            "#,
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(subs)
    }
}

#[async_trait]
impl ProfileLoader for PgStore {
    async fn load_subscriber_with_endpoints(
        &self,
        subscriber_id: Uuid,
    ) -> anyhow::Result<Option<Subscriber>> {
        let profile: Option<(Uuid, Option<String>, Option<Uuid>)> =
            sqlx::query_as("SELECT id, language, canteen_id FROM profiles WHERE id = $1")
                .bind(subscriber_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some((id, language, location_id)) = profile else {
            return Ok(None);
        };

        let endpoints: Vec<Endpoint> = sqlx::query_as(
            r#"
            SELECT id, push_token_obj AS push_token, date_updated AS updated_at
            FROM devices
            WHERE profile_id = $1
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Subscriber {
            id,
            language,
            location_id,
            endpoints,
        }))
    }
}

#[async_trait]
impl ItemLoader for PgStore {
    async fn load_item_with_translations(&self, item_id: Uuid) -> anyhow::Result<Option<Item>> {
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM foods WHERE id = $1")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Ok(None);
        }

        let translations: Vec<ItemTranslation> = sqlx::query_as(
            "SELECT language_code, name FROM food_translations WHERE food_id = $1 ORDER BY id",
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Item {
            id: item_id,
            translations,
        }))
    }
}

#[async_trait]
impl EndpointStore for PgStore {
    async fn clear_push_address(&self, endpoint_id: Uuid) -> anyhow::Result<()> {
        let result = sqlx::query(
            "UPDATE devices SET push_token_obj = NULL WHERE id = $1 AND push_token_obj IS NOT NULL",
        )
        .bind(endpoint_id)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            endpoint_id = %endpoint_id,
            changed = result.rows_affected() > 0,
            "Cleared push token"
        );
        Ok(())
    }
}
