use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::{
    dto::sse::ServerEvent,
    error::ServiceError,
    services::{
        public_service::{self, require_session},
        sse_events::{EVENT_INFO, EVENT_SESSION_SNAPSHOT},
    },
    state::SharedState,
};

/// Subscription to the event stream of one session.
pub struct SessionSubscription {
    /// PIN of the observed session.
    pub pin: String,
    /// Events sent before anything broadcast, in order.
    pub initial: Vec<ServerEvent>,
    /// Live events of the session.
    pub receiver: broadcast::Receiver<ServerEvent>,
}

/// Subscribe to a live session, capturing its current snapshot.
///
/// The receiver is registered before the snapshot is taken so no event
/// falls between the two; clients may see a change twice, never miss one.
pub async fn subscribe_session(
    state: &SharedState,
    pin: &str,
) -> Result<SessionSubscription, ServiceError> {
    let slot = require_session(state, pin)?;
    let receiver = slot.sse().subscribe();

    let degraded = state.is_degraded();
    let snapshot = slot
        .read_with_phase(|phase, game| {
            public_service::session_snapshot(state.config(), phase, game, degraded)
        })
        .await;

    let mut initial = vec![ServerEvent::new(
        Some(EVENT_INFO.to_string()),
        format!("session {} stream connected", slot.pin()),
    )];
    match ServerEvent::json(Some(EVENT_SESSION_SNAPSHOT.to_string()), &snapshot) {
        Ok(event) => initial.push(event),
        Err(err) => warn!(pin = %slot.pin(), error = %err, "failed to serialize session snapshot"),
    }

    Ok(SessionSubscription {
        pin: slot.pin().to_string(),
        initial,
        receiver,
    })
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

/// Convert a subscription into an SSE response, forwarding events until the
/// client disconnects or the session is dropped.
pub fn to_sse_stream(
    subscription: SessionSubscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let SessionSubscription {
        pin,
        initial,
        mut receiver,
    } = subscription;

    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(16);

    // forwarder task: replays the initial events, then reads from broadcast
    tokio::spawn(async move {
        for payload in initial {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // Skip lagged messages but keep the stream alive.
                            debug!(%pin, skipped, "SSE subscriber lagging");
                            continue;
                        }
                    }
                }
            }
        }

        info!(%pin, "session SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
