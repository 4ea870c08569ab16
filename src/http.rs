//! Read-only HTTP status server.
//!
//! Exposes connection health, client status, the spot history and the spot
//! searches as JSON. Invalid search arguments are answered with
//! `400 Bad Request` and an `{"error": ...}` body.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::info;

use crate::band;
use crate::client::{ClusterClient, ClusterStatus};
use crate::query::{
    MAX_SPOTS_PER_QUERY, RECENT_RESOURCE_COUNT, clamp_count, validate_band,
    validate_frequency_range,
};
use crate::spot::DxSpot;

/// Start the HTTP status server.
///
/// Serves until the process exits. Returns an error if the server fails to
/// bind to the port.
pub async fn start_http_server(
    port: u16,
    client: Arc<ClusterClient>,
) -> Result<(), std::io::Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = TcpListener::bind(addr).await?;
    info!("HTTP status server listening on http://{}/health", addr);

    axum::serve(listener, router(client))
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))
}

/// Build the router serving all status endpoints.
pub fn router(client: Arc<ClusterClient>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/spots/recent", get(recent_handler))
        .route("/spots/all", get(all_handler))
        .route("/spots/callsign/{call}", get(callsign_handler))
        .route("/spots/frequency", get(frequency_handler))
        .route("/spots/band/{band}", get(band_handler))
        .with_state(client)
}

/// Rejected request, rendered as a JSON error body.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
struct RecentParams {
    count: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct FrequencyParams {
    min: f64,
    max: f64,
    count: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct BandParams {
    region: Option<String>,
    count: Option<usize>,
}

/// Keep the newest matches, up to the per-query cap.
fn newest(mut spots: Vec<DxSpot>, count: Option<usize>) -> Vec<DxSpot> {
    let count = clamp_count(count.or(Some(MAX_SPOTS_PER_QUERY)));
    let skip = spots.len().saturating_sub(count);
    spots.drain(..skip);
    spots
}

/// Health payload with a summary of the cluster connection.
fn health_body(status: &ClusterStatus) -> Value {
    let info = status.connected.then(|| {
        json!({
            "host": status.host,
            "port": status.port,
            "callsign": status.callsign,
            "iaru_region": status.iaru_region,
            "cached_spots": status.cached_spots,
        })
    });

    json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "dx_cluster": {
            "connected": status.connected,
            "info": info,
        },
    })
}

async fn health_handler(State(client): State<Arc<ClusterClient>>) -> Json<Value> {
    Json(health_body(&client.status()))
}

async fn status_handler(State(client): State<Arc<ClusterClient>>) -> Json<ClusterStatus> {
    Json(client.status())
}

async fn recent_handler(
    State(client): State<Arc<ClusterClient>>,
    Query(params): Query<RecentParams>,
) -> Json<Vec<DxSpot>> {
    let count = clamp_count(params.count.or(Some(RECENT_RESOURCE_COUNT)));
    Json(client.recent(count))
}

async fn all_handler(State(client): State<Arc<ClusterClient>>) -> Json<Vec<DxSpot>> {
    Json(client.snapshot())
}

async fn callsign_handler(
    State(client): State<Arc<ClusterClient>>,
    Path(call): Path<String>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<DxSpot>> {
    Json(newest(client.by_callsign(&call), params.count))
}

async fn frequency_handler(
    State(client): State<Arc<ClusterClient>>,
    Query(params): Query<FrequencyParams>,
) -> Result<Json<Vec<DxSpot>>, ApiError> {
    if !validate_frequency_range(params.min, params.max) {
        return Err(ApiError::bad_request(format!(
            "Invalid frequency range: {} - {} kHz",
            params.min, params.max
        )));
    }
    Ok(Json(newest(
        client.by_frequency(params.min, params.max),
        params.count,
    )))
}

async fn band_handler(
    State(client): State<Arc<ClusterClient>>,
    Path(name): Path<String>,
    Query(params): Query<BandParams>,
) -> Result<Json<Vec<DxSpot>>, ApiError> {
    if !validate_band(&name) {
        return Err(ApiError::bad_request(format!(
            "Invalid band: {}. Valid bands: {}",
            name,
            band::bands().join(", ")
        )));
    }
    let spots = client.by_band(&name, params.region.as_deref());
    Ok(Json(newest(spots, params.count)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClusterClientConfig;

    fn make_spot(callsign: &str, frequency: f64) -> DxSpot {
        DxSpot {
            callsign: callsign.to_string(),
            frequency,
            spotter: "W1AW".to_string(),
            time: "1200Z".to_string(),
            comment: String::new(),
        }
    }

    fn client_with(spots: &[(&str, f64)]) -> Arc<ClusterClient> {
        let client = ClusterClient::new(ClusterClientConfig::with_callsign("W6JSV")).unwrap();
        let store = client.store();
        for (call, freq) in spots {
            store.append(make_spot(call, *freq));
        }
        Arc::new(client)
    }

    fn calls(spots: &[DxSpot]) -> Vec<&str> {
        spots.iter().map(|s| s.callsign.as_str()).collect()
    }

    fn client_with_spots(n: usize) -> Arc<ClusterClient> {
        let client = ClusterClient::new(ClusterClientConfig::with_callsign("W6JSV")).unwrap();
        let store = client.store();
        for i in 0..n {
            store.append(DxSpot {
                callsign: format!("K{i}ABC"),
                frequency: 14000.0 + i as f64,
                spotter: "W1AW".to_string(),
                time: "1200Z".to_string(),
                comment: String::new(),
            });
        }
        Arc::new(client)
    }

    #[test]
    fn test_health_body_disconnected() {
        let client = client_with_spots(3);
        let body = health_body(&client.status());
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["dx_cluster"]["connected"], false);
        assert!(body["dx_cluster"]["info"].is_null());
    }

    #[tokio::test]
    async fn test_recent_defaults_and_clamps() {
        let client = client_with_spots(150);

        let Json(spots) =
            recent_handler(State(Arc::clone(&client)), Query(RecentParams::default())).await;
        assert_eq!(spots.len(), RECENT_RESOURCE_COUNT);
        assert_eq!(spots.last().unwrap().callsign, "K149ABC");

        let Json(spots) = recent_handler(
            State(Arc::clone(&client)),
            Query(RecentParams { count: Some(500) }),
        )
        .await;
        assert_eq!(spots.len(), 100);
    }

    #[tokio::test]
    async fn test_all_and_status() {
        let client = client_with_spots(7);

        let Json(spots) = all_handler(State(Arc::clone(&client))).await;
        assert_eq!(spots.len(), 7);

        let Json(status) = status_handler(State(client)).await;
        assert_eq!(status.cached_spots, 7);
        assert_eq!(status.callsign, "W6JSV");
        assert!(!status.connected);
    }

    #[tokio::test]
    async fn test_callsign_search() {
        let client = client_with(&[("K1ABC", 14074.0), ("W6JSV", 7030.0), ("VK2ABC", 21074.0)]);

        let Json(spots) = callsign_handler(
            State(Arc::clone(&client)),
            Path("abc".to_string()),
            Query(SearchParams::default()),
        )
        .await;
        assert_eq!(calls(&spots), vec!["K1ABC", "VK2ABC"]);

        let Json(spots) = callsign_handler(
            State(client),
            Path("abc".to_string()),
            Query(SearchParams { count: Some(1) }),
        )
        .await;
        assert_eq!(calls(&spots), vec!["VK2ABC"]);
    }

    #[tokio::test]
    async fn test_callsign_search_is_capped() {
        let client = client_with_spots(150);
        let Json(spots) = callsign_handler(
            State(client),
            Path("k".to_string()),
            Query(SearchParams { count: Some(1000) }),
        )
        .await;
        assert_eq!(spots.len(), MAX_SPOTS_PER_QUERY);
        assert_eq!(spots.last().unwrap().callsign, "K149ABC");
    }

    #[tokio::test]
    async fn test_frequency_search() {
        let client = client_with(&[("LOW", 7000.0), ("MID", 7100.0), ("HIGH", 14074.0)]);

        let Json(spots) = frequency_handler(
            State(client),
            Query(FrequencyParams {
                min: 7000.0,
                max: 7200.0,
                count: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(calls(&spots), vec!["LOW", "MID"]);
    }

    #[tokio::test]
    async fn test_frequency_search_rejects_bad_range() {
        let client = client_with(&[("MID", 7100.0)]);

        for (min, max) in [(7200.0, 7000.0), (0.0, 7200.0), (7100.0, 7100.0)] {
            let err = frequency_handler(
                State(Arc::clone(&client)),
                Query(FrequencyParams {
                    min,
                    max,
                    count: None,
                }),
            )
            .await
            .unwrap_err();
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
            assert!(err.message.starts_with("Invalid frequency range"));
        }
    }

    #[tokio::test]
    async fn test_band_search_with_region() {
        let client = client_with(&[("A", 7100.0), ("B", 7250.0), ("C", 14074.0)]);

        let Json(spots) = band_handler(
            State(Arc::clone(&client)),
            Path("40m".to_string()),
            Query(BandParams::default()),
        )
        .await
        .unwrap();
        assert_eq!(calls(&spots), vec!["A", "B"]);

        let Json(spots) = band_handler(
            State(Arc::clone(&client)),
            Path("40m".to_string()),
            Query(BandParams {
                region: Some("1".to_string()),
                count: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(calls(&spots), vec!["A"]);

        // Unknown regions fall back to region 2.
        let Json(spots) = band_handler(
            State(client),
            Path("40m".to_string()),
            Query(BandParams {
                region: Some("9".to_string()),
                count: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(calls(&spots), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_band_search_rejects_unknown_band() {
        let client = client_with(&[("A", 27025.0)]);

        let err = band_handler(
            State(client),
            Path("11m".to_string()),
            Query(BandParams::default()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.starts_with("Invalid band: 11m"));
        assert!(err.message.contains("160m, 80m"));
        assert!(err.message.ends_with("6m, 2m"));
    }

    #[test]
    fn test_api_error_response() {
        let response = ApiError::bad_request("nope").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
