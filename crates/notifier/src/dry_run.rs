use async_trait::async_trait;

use crate::{PushError, PushTransport};

/// Transport that logs notifications instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct DryRunTransport;

#[async_trait]
impl PushTransport for DryRunTransport {
    async fn send(&self, addresses: &[String], title: &str, body: &str) -> Result<(), PushError> {
        tracing::info!(
            recipients = addresses.len(),
            title,
            body,
            "Dry run: notification not sent"
        );
        Ok(())
    }
}
