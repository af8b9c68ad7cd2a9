use tokio::sync::broadcast;

use crate::auth::TokenService;
use crate::models::delivery::DeliveryEvent;
use crate::observability::metrics::Metrics;
use crate::store::Store;

pub struct AppState {
    pub store: Store,
    pub tokens: TokenService,
    pub delivery_events_tx: broadcast::Sender<DeliveryEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(store: Store, tokens: TokenService, event_buffer_size: usize) -> Self {
        let (delivery_events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));

        Self {
            store,
            tokens,
            delivery_events_tx,
            metrics: Metrics::new(),
        }
    }

    /// Fans an event out to websocket subscribers; no subscribers is fine.
    pub fn publish(&self, event: DeliveryEvent) {
        let _ = self.delivery_events_tx.send(event);
    }
}
