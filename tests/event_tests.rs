mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use futures::StreamExt;
use tower::ServiceExt;

use common::{create_test_app, quote_body};

async fn next_frame(stream: &mut (impl futures::Stream<Item = Result<axum::body::Bytes, axum::Error>> + Unpin)) -> String {
    let chunk = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("timeout esperando evento SSE")
        .expect("stream SSE cerrado")
        .expect("error leyendo stream SSE");
    String::from_utf8(chunk.to_vec()).unwrap()
}

#[tokio::test]
async fn test_event_stream_delivers_lifecycle_events() {
    let app = create_test_app().await;

    let request = Request::builder().uri("/api/events").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );
    assert_eq!(app.state.events.subscriber_count(), 1);

    let mut stream = response.into_body().into_data_stream();
    let hello = next_frame(&mut stream).await;
    assert!(hello.contains("event: ping"));
    assert!(hello.contains("retry: 4000"));

    let created = app.post("/api/quotes", quote_body(1000)).await.json();
    let reference = created["file"].as_str().unwrap().trim_end_matches(".json").to_string();

    let frame = next_frame(&mut stream).await;
    assert!(frame.contains("event: quote.created"));
    assert!(frame.contains(&reference));
    assert!(frame.contains("\"state\":\"pending\""));

    app.delete(&format!("/api/quotes/{}", created["file"].as_str().unwrap())).await;
    let frame = next_frame(&mut stream).await;
    assert!(frame.contains("event: quote.deleted"));

    // Cerrar la conexión suelta la suscripción
    drop(stream);
    assert_eq!(app.state.events.subscriber_count(), 0);
}

#[tokio::test]
async fn test_event_stream_ends_on_shutdown() {
    let app = create_test_app().await;

    let request = Request::builder().uri("/api/events").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    let mut stream = response.into_body().into_data_stream();
    next_frame(&mut stream).await;

    app.state.events.clear();

    let end = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("el stream debería cerrarse");
    assert!(end.is_none());
}
