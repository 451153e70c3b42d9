//! Shared state handed to every resource and data source

use crate::api::Client;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct TritonProviderData {
    pub client: Arc<Client>,
    /// Serializes instance creation whenever affinity rules or locality
    /// hints are in play. Placement decisions made from stale state race
    /// with each other, so rule-carrying creates hold this across the
    /// provision call and the wait for the instance to come up.
    pub affinity_lock: Arc<Mutex<()>>,
}

impl TritonProviderData {
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
            affinity_lock: Arc::new(Mutex::new(())),
        }
    }
}
