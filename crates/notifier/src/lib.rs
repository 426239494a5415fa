//! Push delivery for meal notifications.
//!
//! The engine talks to a [`PushTransport`]; this crate ships the Expo HTTP
//! transport used in production and a dry-run transport that only logs.

pub mod dry_run;
pub mod error;
pub mod expo;

use std::sync::Arc;

use async_trait::async_trait;
use herald_common::config::AppConfig;

pub use dry_run::DryRunTransport;
pub use error::PushError;
pub use expo::ExpoPushTransport;

/// Black-box sender for push notifications.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Send one message with `title` and `body` to every address in `addresses`.
    async fn send(&self, addresses: &[String], title: &str, body: &str) -> Result<(), PushError>;
}

#[async_trait]
impl<T: PushTransport + ?Sized> PushTransport for Arc<T> {
    async fn send(&self, addresses: &[String], title: &str, body: &str) -> Result<(), PushError> {
        (**self).send(addresses, title, body).await
    }
}

/// Transport selected by configuration: dry-run when `PUSH_DRY_RUN` is set, Expo otherwise.
pub fn transport_from_config(config: &AppConfig) -> Result<Arc<dyn PushTransport>, PushError> {
    if config.push_dry_run {
        tracing::warn!("PUSH_DRY_RUN is set, notifications will only be logged");
        return Ok(Arc::new(DryRunTransport));
    }
    Ok(Arc::new(ExpoPushTransport::from_config(config)?))
}
