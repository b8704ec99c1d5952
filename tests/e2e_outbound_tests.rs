//! End-to-end tests for the resilient outbound client
#![cfg(unix)]

mod common;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use common::{TestServer, LIBRARY_SONG_ID};
use music_recommender_server::config::OutboundSettings;
use music_recommender_server::outbound::{OutboundError, RecommenderClient, RequestContext};
use music_recommender_server::telemetry::{FeedbackItem, FeedbackPayload};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

fn settings(base_url: &str, base_delay: Duration) -> OutboundSettings {
    OutboundSettings {
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(10),
        max_retries: 2,
        base_delay,
    }
}

/// Fails the first `failures` requests of every route with 503.
#[derive(Clone, Default)]
struct Flaky {
    failures: usize,
    seen: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl Flaky {
    fn record(&self, route: &str, headers: &HeaderMap) -> usize {
        let id = headers
            .get("x-correlation-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let mut seen = self.seen.lock().unwrap();
        seen.push((route.to_string(), id));
        seen.iter().filter(|(r, _)| r == route).count()
    }

    fn seen(&self) -> Vec<(String, Option<String>)> {
        self.seen.lock().unwrap().clone()
    }
}

async fn flaky_stats(State(flaky): State<Flaky>, headers: HeaderMap) -> impl IntoResponse {
    if flaky.record("stats", &headers) <= flaky.failures {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    Json(json!({
        "totalPredicciones": 7,
        "porGenero": [{ "genero": "jazz", "conteo": 7 }],
        "likesTotales": 0,
        "dislikesTotales": 0,
        "ratingPromedio": 0.0,
        "ratingsCount": 0,
        "topReproducciones": [],
        "topLikes": []
    }))
    .into_response()
}

async fn flaky_feedback(State(flaky): State<Flaky>, headers: HeaderMap) -> impl IntoResponse {
    if flaky.record("feedback", &headers) <= flaky.failures {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    Json(json!({ "ok": true })).into_response()
}

async fn spawn_flaky(flaky: Flaky) -> String {
    let app = Router::new()
        .route("/api/stats", get(flaky_stats))
        .route("/api/feedback", post(flaky_feedback))
        .with_state(flaky);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    base_url
}

#[tokio::test]
async fn test_client_round_trip_against_server() {
    let server = TestServer::spawn().await;
    let client = RecommenderClient::new(&settings(&server.base_url, Duration::from_millis(10))).unwrap();
    let ctx = RequestContext::new().with_correlation_id("e2e-round-trip");

    let result = client.recommend_song(LIBRARY_SONG_ID, &ctx).await.unwrap();
    assert_eq!(result.genre, "rock");
    assert_eq!(
        result.recommendations[0].audio_url.as_deref(),
        Some("/api/audio/rock.00001")
    );

    let feedback = FeedbackPayload {
        rating: Some(5),
        items: vec![FeedbackItem::vote(LIBRARY_SONG_ID, Some(true))],
        ..FeedbackPayload::new_session()
    };
    client.send_feedback(&feedback, &ctx).await.unwrap();

    let stats = client.stats(&ctx).await.unwrap();
    assert_eq!(stats.total_predictions, 1);
    assert_eq!(stats.total_likes, 1);
    assert_eq!(stats.average_rating, 5.0);
    assert_eq!(stats.top_liked[0].id, LIBRARY_SONG_ID);

    let health = client.health(&ctx).await.unwrap();
    assert!(health.is_ready());
}

#[tokio::test]
async fn test_client_reports_status_errors() {
    let server = TestServer::spawn().await;
    let client = RecommenderClient::new(&settings(&server.base_url, Duration::from_millis(10))).unwrap();

    let err = client
        .recommend_song("missing-song", &RequestContext::new())
        .await
        .unwrap_err();
    match err {
        OutboundError::Status { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("No audio found"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_reads_are_retried_with_one_correlation_id() {
    let flaky = Flaky {
        failures: 2,
        ..Default::default()
    };
    let base_url = spawn_flaky(flaky.clone()).await;
    let client = RecommenderClient::new(&settings(&base_url, Duration::from_millis(20))).unwrap();

    let start = Instant::now();
    let stats = client.stats(&RequestContext::new()).await.unwrap();
    assert_eq!(stats.total_predictions, 7);
    assert_eq!(stats.genre_counts[0].genre, "jazz");
    // 20ms then 40ms between the three attempts
    assert!(start.elapsed() >= Duration::from_millis(60));

    let seen = flaky.seen();
    assert_eq!(seen.len(), 3);
    let id = seen[0].1.clone().expect("correlation id sent");
    assert!(seen.iter().all(|(_, seen_id)| seen_id.as_deref() == Some(id.as_str())));
}

#[tokio::test]
async fn test_writes_are_not_retried() {
    let flaky = Flaky {
        failures: 1,
        ..Default::default()
    };
    let base_url = spawn_flaky(flaky.clone()).await;
    let client = RecommenderClient::new(&settings(&base_url, Duration::from_millis(10))).unwrap();

    let err = client
        .send_feedback(&FeedbackPayload::default(), &RequestContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, OutboundError::Status { status: 503, .. }));
    assert_eq!(flaky.seen().len(), 1);
}

#[tokio::test]
async fn test_connection_failures_are_retried_then_surfaced() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = RecommenderClient::new(&settings(&base_url, Duration::from_millis(10))).unwrap();
    let start = Instant::now();
    let err = client.stats(&RequestContext::new()).await.unwrap_err();

    assert!(err.is_transport(), "unexpected error: {:?}", err);
    assert!(start.elapsed() >= Duration::from_millis(30));
}

#[tokio::test]
async fn test_cancellation_interrupts_retry_wait() {
    let flaky = Flaky {
        failures: usize::MAX,
        ..Default::default()
    };
    let base_url = spawn_flaky(flaky.clone()).await;
    let client = RecommenderClient::new(&settings(&base_url, Duration::from_secs(30))).unwrap();

    let cancel = CancellationToken::new();
    let ctx = RequestContext::new().with_cancellation(cancel.clone());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let start = Instant::now();
    let err = client.stats(&ctx).await.unwrap_err();
    assert!(matches!(err, OutboundError::Cancelled));
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(flaky.seen().len(), 1);
}
