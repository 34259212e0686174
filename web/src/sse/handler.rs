use crate::error::Result;
use async_stream::stream;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::Stream;
use log::*;
use service::AppState;
use sse::{Subscription, SubscriberId};
use std::convert::Infallible;

/// GET /listen/:identity
///
/// Streams every notification addressed to `identity`, or to the group of
/// the same name (a hospital key). A second connection with the same identity
/// takes over and this stream ends.
pub(crate) async fn listen(
    State(app_state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<impl IntoResponse> {
    debug!("Establishing SSE connection for identity {identity}");

    let subscription = app_state
        .sse_manager
        .subscribe(SubscriberId::from(identity.as_str()), Some(identity))
        .await?;

    Ok(event_stream(&app_state, subscription))
}

/// GET /events/patient/:hospital_key
///
/// Streams patient updates for one hospital. Each connection gets its own
/// identity, so any number of browsers can follow the same hospital.
pub(crate) async fn patient_events(
    State(app_state): State<AppState>,
    Path(hospital_key): Path<String>,
) -> Result<impl IntoResponse> {
    let subscription = app_state
        .sse_manager
        .subscribe_connection(hospital_key.clone())
        .await?;
    debug!(
        "Established SSE connection {} for hospital {hospital_key}",
        subscription.connection_id()
    );

    Ok(event_stream(&app_state, subscription))
}

fn event_stream(app_state: &AppState, subscription: Subscription) -> impl IntoResponse {
    let keep_alive = KeepAlive::new().interval(app_state.config.keep_alive_interval());

    (
        [(header::CONNECTION, "keep-alive")],
        Sse::new(relay(subscription)).keep_alive(keep_alive),
    )
}

// Ends when the hub drops the subscriber. When the client goes away axum drops
// the stream, and with it the subscription, which queues the unregister.
fn relay(mut subscription: Subscription) -> impl Stream<Item = std::result::Result<Event, Infallible>> {
    stream! {
        while let Some(payload) = subscription.recv().await {
            yield Ok(Event::default().data(frame_data(&payload)));
        }

        debug!(
            "SSE subscription {} ({}) ended by the hub",
            subscription.identity(),
            subscription.connection_id()
        );
    }
}

/// Payload text for one event: invalid UTF-8 is replaced and every line break
/// becomes `\n`, which the event framing turns into one `data:` line per line.
fn frame_data(payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload);
    if !text.contains('\r') {
        return text.into_owned();
    }

    text.replace("\r\n", "\n").replace('\r', "\n")
}
