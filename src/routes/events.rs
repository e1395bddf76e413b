/**
 * Event Routes
 * Server-sent stream of dashboard change notifications
 */
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use std::convert::Infallible;
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    StreamExt,
};

use crate::auth::extract::AdminSession;
use crate::state::AppState;

/// GET /api/events - One SSE message per published dashboard event
pub async fn stream_events(
    session: AdminSession,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(actor = %session.identity.email, "event stream opened");

    let stream = BroadcastStream::new(state.auth.subscribe()).filter_map(|message| match message {
        Ok(event) => match Event::default().event(event.name()).json_data(&event) {
            Ok(sse) => Some(Ok::<Event, Infallible>(sse)),
            Err(e) => {
                tracing::error!(error = %e, "failed to encode dashboard event");
                None
            }
        },
        // A slow client missed events; tell it to re-fetch everything
        Err(BroadcastStreamRecvError::Lagged(missed)) => {
            tracing::warn!(missed, "event stream lagged");
            Some(Ok::<Event, Infallible>(
                Event::default().event("lagged").data(missed.to_string()),
            ))
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
