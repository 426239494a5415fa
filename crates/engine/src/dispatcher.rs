//! Dispatcher: one push per unique delivery address.
//!
//! A failure never escapes: a confirmed-dead address clears the push object
//! of every endpoint in its group (survivor included), anything else is
//! logged and the endpoints stay untouched.

use uuid::Uuid;

use herald_notifier::PushTransport;

use crate::composer::Message;
use crate::dedup::{EndpointGroup, clear_endpoints};
use crate::run_log::RunLogger;
use crate::store::EndpointStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    /// The transport confirmed the address is dead; `cleared` endpoints were reset.
    AddressDead { cleared: u32 },
    /// Any other failure; nothing was changed.
    Transient,
}

pub struct Dispatcher<T> {
    transport: T,
}

impl<T: PushTransport> Dispatcher<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send `message` to `address` and reconcile `group` on a dead address.
    pub async fn dispatch<S>(
        &self,
        address: &str,
        message: &Message,
        group: &EndpointGroup,
        store: &S,
        logger: &mut RunLogger,
    ) -> DispatchOutcome
    where
        S: EndpointStore + ?Sized,
    {
        let recipients = [address.to_string()];
        let err = match self
            .transport
            .send(&recipients, &message.title, &message.body)
            .await
        {
            Ok(()) => return DispatchOutcome::Delivered,
            Err(err) => err,
        };

        logger
            .append_log(format!("--- Error while sending push notification: {err}"))
            .await;

        if !err.is_address_dead() {
            tracing::warn!(error = %err, "Transient push failure, endpoints left untouched");
            return DispatchOutcome::Transient;
        }

        logger
            .append_log(format!(
                "--- Push token is no longer valid; removing it from {} endpoint(s)",
                group.len()
            ))
            .await;
        let ids: Vec<Uuid> = group.endpoints().iter().map(|e| e.id).collect();
        let cleared = clear_endpoints(store, &ids, "push token rejected", logger).await;

        DispatchOutcome::AddressDead { cleared }
    }
}
