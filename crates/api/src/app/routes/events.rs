//! Realtime stream for the dashboard (SSE).

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::Extension,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::get,
};
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/events", get(stream_events))
}

/// Lossy broadcast of projection updates and low-stock alerts. Slow readers
/// miss messages rather than applying backpressure to the write path.
pub async fn stream_events(
    Extension(services): Extension<Arc<AppServices>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.subscribe_realtime();

    let stream = BroadcastStream::new(rx).filter_map(|message| {
        let message = message.ok()?;
        let event = SseEvent::default()
            .event(message.topic.clone())
            .json_data(&message)
            .ok()?;
        Some(Ok(event))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
