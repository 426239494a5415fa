//! Endpoint deduplication by delivery address.
//!
//! Re-installing the app registers a new device while the old registration
//! keeps the same push token, so one phone can show up several times. Endpoints
//! are grouped by address, the most recently updated one survives, and the
//! push object of every other endpoint in the group is cleared.
//!
//! Choosing the survivor ([`dedupe`], [`select_survivor`]) is pure; clearing
//! ([`clear_redundant`]) is the only side effect.

use std::collections::BTreeMap;

use uuid::Uuid;

use herald_common::types::Endpoint;

use crate::run_log::RunLogger;
use crate::store::EndpointStore;

/// Endpoints sharing one delivery address.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointGroup {
    /// Endpoints in the order they were encountered.
    endpoints: Vec<Endpoint>,
    /// Index of the survivor within `endpoints`.
    survivor: usize,
}

impl EndpointGroup {
    fn new(endpoints: Vec<Endpoint>) -> Self {
        let survivor = select_survivor(&endpoints).unwrap_or_default();
        Self {
            endpoints,
            survivor,
        }
    }

    pub fn survivor(&self) -> &Endpoint {
        &self.endpoints[self.survivor]
    }

    /// Every endpoint except the survivor.
    pub fn redundant(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != self.survivor)
            .map(|(_, e)| e)
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Group endpoints by delivery address, dropping those without one.
pub fn dedupe(endpoints: &[Endpoint]) -> BTreeMap<String, EndpointGroup> {
    let mut by_address: BTreeMap<String, Vec<Endpoint>> = BTreeMap::new();
    for endpoint in endpoints {
        if let Some(address) = endpoint.delivery_address() {
            by_address
                .entry(address.to_string())
                .or_default()
                .push(endpoint.clone());
        }
    }

    by_address
        .into_iter()
        .map(|(address, group)| (address, EndpointGroup::new(group)))
        .collect()
}

/// Index of the most recently updated endpoint.
///
/// An endpoint without a timestamp is older than any timestamped one; on a
/// tie the first encountered wins. `None` only for an empty slice.
pub fn select_survivor(endpoints: &[Endpoint]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, endpoint) in endpoints.iter().enumerate() {
        match best {
            // Option orders None below Some, which is exactly the rule above.
            Some(b) if endpoint.updated_at <= endpoints[b].updated_at => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Clear the push object of every non-survivor in `group`.
///
/// Returns how many endpoints were cleared. Store failures are logged only.
pub async fn clear_redundant<S>(store: &S, group: &EndpointGroup, logger: &mut RunLogger) -> u32
where
    S: EndpointStore + ?Sized,
{
    if group.len() < 2 {
        return 0;
    }

    logger
        .append_log(format!(
            "--- {} endpoints share one push token; keeping endpoint {}",
            group.len(),
            group.survivor().id
        ))
        .await;

    let ids: Vec<Uuid> = group.redundant().map(|e| e.id).collect();
    clear_endpoints(store, &ids, "not the most recently updated endpoint", logger).await
}

/// Clear the push object of each endpoint in `ids`, logging every outcome.
pub(crate) async fn clear_endpoints<S>(
    store: &S,
    ids: &[Uuid],
    reason: &str,
    logger: &mut RunLogger,
) -> u32
where
    S: EndpointStore + ?Sized,
{
    let mut cleared = 0;
    for id in ids {
        match store.clear_push_address(*id).await {
            Ok(()) => {
                logger
                    .append_log(format!("--- Removed push token from endpoint {id}: {reason}"))
                    .await;
                cleared += 1;
            }
            Err(e) => {
                logger
                    .append_log(format!(
                        "--- Could not remove push token from endpoint {id}: {e:#}"
                    ))
                    .await;
            }
        }
    }
    cleared
}
