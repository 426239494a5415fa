//! Notification orchestrator: the scheduled meal notification run.
//!
//! For a target date it:
//! 1. Loads every offer of that day
//! 2. Resolves the subscriptions that asked to be notified about the offered item
//! 3. Keeps subscribers whose canteen is the offer's canteen
//! 4. Deduplicates their devices by push token and sends one push per token
//!
//! Whatever happens inside, [`NotifySchedule::run`] returns a sealed report.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use anyhow::Context;
use chrono::{Days, Local, NaiveDate};
use futures::FutureExt;

use herald_common::types::{Offer, RunState, RunStats, ScheduledRun};
use herald_notifier::PushTransport;

use crate::composer::MessageComposer;
use crate::dedup::{clear_redundant, dedupe};
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::run_log::RunLogger;
use crate::store::NotifyStore;

/// Name under which runs of this schedule are recorded.
pub const SCHEDULE_NAME: &str = "FoodNotifySchedule";

/// `today + days_ahead`, `None` if that leaves chrono's date range.
pub fn target_date(today: NaiveDate, days_ahead: u32) -> Option<NaiveDate> {
    today.checked_add_days(Days::new(u64::from(days_ahead)))
}

pub struct NotifySchedule<S, T> {
    store: S,
    dispatcher: Dispatcher<T>,
    composer: MessageComposer,
}

impl<S: NotifyStore, T: PushTransport> NotifySchedule<S, T> {
    pub fn new(store: S, transport: T, composer: MessageComposer) -> Self {
        Self {
            store,
            dispatcher: Dispatcher::new(transport),
            composer,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn transport(&self) -> &T {
        self.dispatcher.transport()
    }

    pub fn into_parts(self) -> (S, T) {
        (self.store, self.dispatcher.into_transport())
    }

    /// Notify about offers `days_ahead` days after today (local calendar).
    pub async fn run(&self, days_ahead: u32, logger: RunLogger) -> ScheduledRun {
        self.run_from(Local::now().date_naive(), days_ahead, logger)
            .await
    }

    /// Same as [`run`](Self::run) with an explicit `today`.
    pub async fn run_from(
        &self,
        today: NaiveDate,
        days_ahead: u32,
        mut logger: RunLogger,
    ) -> ScheduledRun {
        logger.append_log("Start food notify schedule").await;
        logger
            .append_log(format!("Notify about meals in {days_ahead} days"))
            .await;

        let mut stats = RunStats::default();
        let outcome = AssertUnwindSafe(self.notify(today, days_ahead, &mut logger, &mut stats))
            .catch_unwind()
            .await;

        let (state, last_line) = match outcome {
            Ok(Ok(())) => (RunState::Success, "Finished".to_string()),
            Ok(Err(e)) => (RunState::Failed, format!("Error: {e:#}")),
            Err(panic) => (
                RunState::Failed,
                format!("Error: {}", panic_message(panic.as_ref())),
            ),
        };
        logger.append_log(last_line).await;

        let result = serde_json::to_value(&stats).unwrap_or_default();
        logger.finish(state, result).await
    }

    async fn notify(
        &self,
        today: NaiveDate,
        days_ahead: u32,
        logger: &mut RunLogger,
        stats: &mut RunStats,
    ) -> anyhow::Result<()> {
        let date = target_date(today, days_ahead)
            .with_context(|| format!("{days_ahead} days after {today} is out of range"))?;
        logger
            .append_log(format!("Date to notify about: {date}"))
            .await;

        let offers = self
            .store
            .find_offers_by_date(date)
            .await
            .with_context(|| format!("failed to load food offers for {date}"))?;
        stats.offers = saturating_count(offers.len());
        logger
            .append_log(format!("Found {} food offers for {date}", offers.len()))
            .await;

        for offer in &offers {
            self.notify_offer(offer, date, days_ahead, logger, stats)
                .await?;
        }

        Ok(())
    }

    async fn notify_offer(
        &self,
        offer: &Offer,
        date: NaiveDate,
        days_ahead: u32,
        logger: &mut RunLogger,
        stats: &mut RunStats,
    ) -> anyhow::Result<()> {
        logger
            .append_log(format!("- Notify about food offer: {}", offer.id))
            .await;

        let item = self
            .store
            .load_item_with_translations(offer.item_id)
            .await
            .with_context(|| format!("failed to load food {}", offer.item_id))?;
        if item.is_none() {
            logger
                .append_log(format!(
                    "- Food {} not found, using a generic name",
                    offer.item_id
                ))
                .await;
        }
        logger
            .append_log(format!(
                "- Food offer is in canteen: {}",
                offer.location_id
            ))
            .await;

        let subscriptions = self
            .store
            .find_notify_subscriptions_by_item(offer.item_id)
            .await
            .with_context(|| format!("failed to load subscriptions for food {}", offer.item_id))?;
        logger
            .append_log(format!(
                "- Found {} food feedbacks for food {}",
                subscriptions.len(),
                offer.item_id
            ))
            .await;

        for subscription in subscriptions.iter().filter(|s| s.notify) {
            stats.subscriptions += 1;
            let profile_id = subscription.subscriber_id;
            logger
                .append_log(format!(
                    "-- Notify profile: {profile_id} about food: {}",
                    offer.item_id
                ))
                .await;

            let Some(subscriber) = self
                .store
                .load_subscriber_with_endpoints(profile_id)
                .await
                .with_context(|| format!("failed to load profile {profile_id}"))?
            else {
                logger
                    .append_log(format!("-- Profile {profile_id} not found, skipping"))
                    .await;
                stats.skipped_subscribers += 1;
                continue;
            };

            if subscriber.location_id != Some(offer.location_id) {
                logger
                    .append_log("-- Profile is not interested in this canteen")
                    .await;
                stats.skipped_subscribers += 1;
                continue;
            }
            logger
                .append_log("-- Profile is interested in this canteen")
                .await;

            let groups = dedupe(&subscriber.endpoints);
            if groups.is_empty() {
                logger
                    .append_log("-- Profile has no device with a push token")
                    .await;
                continue;
            }

            let message = self.composer.compose(
                item.as_ref(),
                subscriber.language.as_deref(),
                days_ahead,
                date,
            );

            for (address, group) in &groups {
                logger
                    .append_log(format!(
                        "--- Notify devices: {} about food: {}",
                        group.len(),
                        offer.item_id
                    ))
                    .await;

                let outcome = self
                    .dispatcher
                    .dispatch(address, &message, group, &self.store, logger)
                    .await;

                match outcome {
                    DispatchOutcome::Delivered => stats.addresses_notified += 1,
                    DispatchOutcome::Transient => stats.dispatch_failures += 1,
                    DispatchOutcome::AddressDead { cleared } => {
                        stats.dispatch_failures += 1;
                        stats.dead_addresses += 1;
                        stats.endpoints_cleared += cleared;
                        // Every endpoint of the group is already cleared.
                        continue;
                    }
                }

                stats.endpoints_cleared += clear_redundant(&self.store, group, logger).await;
            }
        }

        Ok(())
    }
}

/// Counter value for `len` items, capped at `u32::MAX`.
fn saturating_count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panic: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panic: {msg}")
    } else {
        "panic with a non-string payload".to_string()
    }
}
