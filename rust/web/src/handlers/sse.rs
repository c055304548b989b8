use super::encounters::blocking;
use crate::errors::IntoErrorResponse;
use crate::events::{EventBus, EventSubscription, Notification};
use crate::services::{CombatService, ServiceError, TableService};
use crate::store::StoreError;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use warp::http;
use warp::reply::{self, Response};
use warp::sse;
use warp::Reply;

/// Streams notifications for an encounter or a table.
///
/// - **Method**: GET
/// - **Path**: `/api/channels/{channel_id}/events`
///
/// Each SSE event is named after the notification kind (`timeout_warning`,
/// `round_timeout_resolved`, `table_state`, ...) and carries its JSON body.
/// Delivery is best effort: a client that falls behind is dropped and should
/// reconnect, then re-fetch state.
pub async fn stream_events(
    channel_id: String,
    combat: Arc<CombatService>,
    tables: Arc<TableService>,
    bus: EventBus,
) -> Response {
    let lookup = channel_id.clone();
    let exists = blocking(move || channel_exists(&lookup, &combat, &tables)).await;
    if let Err(err) = exists {
        return err.into_http_response();
    }

    let subscription = bus.subscribe(channel_id);
    let stream = subscription_stream(subscription);
    let keep_alive = sse::keep_alive()
        .interval(Duration::from_secs(15))
        .text(":keep-alive\n");

    let reply = sse::reply(keep_alive.stream(stream));
    reply::with_header(reply, http::header::CACHE_CONTROL, "no-cache").into_response()
}

fn channel_exists(
    channel_id: &str,
    combat: &CombatService,
    tables: &TableService,
) -> Result<(), ServiceError> {
    match combat.get_round(channel_id) {
        Ok(_) => return Ok(()),
        Err(ServiceError::Store(StoreError::NotFound { .. })) => {}
        Err(err) => return Err(err),
    }
    tables.get_table(channel_id).map(|_| ())
}

fn subscription_stream(
    subscription: EventSubscription,
) -> impl tokio_stream::Stream<Item = Result<sse::Event, Infallible>> {
    let mut subscription = subscription;
    let (_, placeholder_rx) = mpsc::channel(1);
    let receiver = std::mem::replace(&mut subscription.receiver, placeholder_rx);
    // the subscription lives as long as the stream, then unsubscribes on drop
    let subscription = Arc::new(subscription);

    ReceiverStream::new(receiver).map(move |event| {
        let _keep_alive = Arc::clone(&subscription);
        Ok(render_event(&event))
    })
}

pub(crate) fn render_event(event: &Notification) -> sse::Event {
    match serde_json::to_string(event) {
        Ok(json) => sse::Event::default().event(event.kind()).data(json),
        Err(err) => {
            tracing::error!(kind = event.kind(), error = %err, "failed to serialize notification");
            let fallback = serde_json::json!({
                "type": "error",
                "message": format!("failed to serialize notification: {err}")
            })
            .to_string();
            sse::Event::default().event("error").data(fallback)
        }
    }
}
