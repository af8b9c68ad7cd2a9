use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::engine::lifecycle::normalize_order_id;
use crate::models::delivery::DeliveryEvent;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    pub order_id: Option<String>,
}

impl FeedQuery {
    /// Normalized order id to follow, or `None` for the whole feed.
    fn order_filter(self) -> Option<String> {
        self.order_id
            .map(|raw| normalize_order_id(&raw))
            .filter(|id| !id.is_empty())
    }
}

fn wanted(filter: Option<&str>, event: &DeliveryEvent) -> bool {
    filter.is_none_or(|order_id| event.order_id == order_id)
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
) -> impl IntoResponse {
    let filter = query.order_filter();
    ws.on_upgrade(|socket| handle_socket(socket, state, filter))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, filter: Option<String>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.delivery_events_tx.subscribe();

    info!(order_id = ?filter, "delivery feed client connected");

    let send_task = tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "delivery feed client lagging, events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            if !wanted(filter.as_deref(), &event) {
                continue;
            }

            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize delivery event for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    let _aborted = finish_first(send_task, recv_task).await;

    info!("delivery feed client disconnected");
}

/// Waits for either task to end and aborts the other. Returns the aborted
/// task's handle.
async fn finish_first(
    mut send_task: JoinHandle<()>,
    mut recv_task: JoinHandle<()>,
) -> JoinHandle<()> {
    let send_done = tokio::select! {
        _ = &mut send_task => true,
        _ = &mut recv_task => false,
    };

    let remaining = if send_done { recv_task } else { send_task };
    remaining.abort();
    remaining
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{FeedQuery, finish_first, wanted};
    use crate::models::delivery::{DeliveryEvent, DeliveryStatus};

    fn event(order_id: &str) -> DeliveryEvent {
        DeliveryEvent {
            order_id: order_id.to_string(),
            status: DeliveryStatus::Booked,
            driver_id: None,
            at: Utc::now(),
        }
    }

    #[test]
    fn order_filter_is_normalized() {
        let query = FeedQuery {
            order_id: Some("  sd20261020abc123 ".to_string()),
        };
        assert_eq!(query.order_filter().as_deref(), Some("SD20261020ABC123"));

        let blank = FeedQuery {
            order_id: Some("   ".to_string()),
        };
        assert_eq!(blank.order_filter(), None);
    }

    #[test]
    fn unfiltered_feed_passes_everything() {
        assert!(wanted(None, &event("SD20261020AAAAAA")));
        assert!(wanted(Some("SD20261020AAAAAA"), &event("SD20261020AAAAAA")));
        assert!(!wanted(Some("SD20261020AAAAAA"), &event("SD20261020BBBBBB")));
    }

    #[tokio::test]
    async fn disconnect_stops_the_other_task() {
        let finished = tokio::spawn(async {});
        let stuck = tokio::spawn(std::future::pending::<()>());

        let remaining = finish_first(stuck, finished).await;
        assert!(remaining.await.unwrap_err().is_cancelled());
    }
}
