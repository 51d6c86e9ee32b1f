//! Stream SSE de eventos del ciclo de vida

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::{stream, Stream, StreamExt};

use crate::state::AppState;

const RETRY: Duration = Duration::from_millis(4000);
const HEARTBEAT: Duration = Duration::from_secs(15);

pub fn create_event_router() -> Router<AppState> {
    Router::new().route("/", get(stream_events))
}

async fn stream_events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // La suscripción vive dentro del stream: al cerrarse la conexión se suelta
    let subscription = state.events.add();
    log::info!("📡 Nueva conexión SSE ({} activas)", state.events.subscriber_count());

    let hello = stream::once(async { Ok(Event::default().event("ping").retry(RETRY).data("ok")) });

    let updates = subscription.filter_map(|event| async move {
        match Event::default().event(event.name()).json_data(&event.payload) {
            Ok(sse_event) => Some(Ok(sse_event)),
            Err(err) => {
                log::error!("Failed to serialize SSE payload for {}: {}", event.name(), err);
                None
            }
        }
    });

    Sse::new(hello.chain(updates)).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT)
            .event(Event::default().event("ping").data("keep-alive")),
    )
}
