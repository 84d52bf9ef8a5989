use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use gismap_shared::{
    DrawLogEntry, DrawType, FeatureRecord, GeometryKind, LayerDetail, LayerSummary, Srid, measure,
};
use serde::{Deserialize, Serialize};

use crate::draw::{DrawStatus, Interaction};
use crate::error::ApiError;
use crate::state::AppState;
use crate::sync::{BoundaryLayerStatus, SyncOutcome};

#[derive(Debug, Deserialize)]
pub struct PlaceRequest {
    pub text: String,
    pub srid: u32,
}

pub async fn place_wkt(
    State(state): State<AppState>,
    Json(body): Json<PlaceRequest>,
) -> Result<Json<FeatureRecord>, ApiError> {
    Ok(Json(state.entry.place(&body.text, Srid(body.srid)).await?))
}

pub async fn remove_wkt(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<StatusCode, ApiError> {
    let kind = GeometryKind::from_tag(&kind)
        .ok_or_else(|| ApiError::bad_request(format!("unknown geometry kind `{kind}`")))?;
    if state.entry.remove(kind).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("no {} on the entry layer", kind.tag())))
    }
}

pub async fn clear_wkt(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.entry.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_boundaries(State(state): State<AppState>) -> Json<Vec<BoundaryLayerStatus>> {
    Json(state.boundaries.statuses())
}

/// Enables the layer and waits for its first fetch. A failed fetch still
/// leaves the layer enabled.
pub async fn enable_boundary(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<SyncOutcome>, ApiError> {
    Ok(Json(state.boundaries.enable(&name).await?))
}

pub async fn disable_boundary(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.boundaries.disable(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_layers(State(state): State<AppState>) -> Json<Vec<LayerSummary>> {
    Json(state.registry.read().await.summaries())
}

pub async fn get_layer(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<LayerDetail>, ApiError> {
    state
        .registry
        .read()
        .await
        .detail(&name)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("no layer named `{name}`")))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureMeasurement {
    pub id: Option<String>,
    pub kind: GeometryKind,
    pub length: f64,
    pub area: f64,
}

pub async fn measure_layer(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<FeatureMeasurement>>, ApiError> {
    let registry = state.registry.read().await;
    let layer = registry
        .find_by_name(&name)
        .ok_or_else(|| ApiError::not_found(format!("no layer named `{name}`")))?;
    let measurements = layer
        .features()
        .iter()
        .map(|feature| FeatureMeasurement {
            id: feature.id.clone(),
            kind: feature.geometry.kind(),
            length: measure::length(&feature.geometry),
            area: measure::area(&feature.geometry),
        })
        .collect();
    Ok(Json(measurements))
}

#[derive(Debug, Deserialize)]
pub struct DrawTypeBody {
    pub draw_type: DrawType,
}

pub async fn get_draw(State(state): State<AppState>) -> Json<DrawStatus> {
    Json(state.draw.status().await)
}

pub async fn put_draw_type(
    State(state): State<AppState>,
    Json(body): Json<DrawTypeBody>,
) -> Result<Json<Option<Interaction>>, ApiError> {
    Ok(Json(state.draw.start(body.draw_type).await?))
}

pub async fn stop_drawing(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.draw.stop().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct GestureBody {
    pub vertices: Vec<[f64; 2]>,
}

pub async fn complete_gesture(
    State(state): State<AppState>,
    Json(body): Json<GestureBody>,
) -> Result<Json<DrawLogEntry>, ApiError> {
    Ok(Json(state.draw.complete_gesture(&body.vertices).await?))
}

pub async fn get_draw_log(State(state): State<AppState>) -> Json<Vec<DrawLogEntry>> {
    Json(state.draw.log().await)
}

pub async fn clear_draw_log(State(state): State<AppState>) -> StatusCode {
    state.draw.clear_log().await;
    StatusCode::NO_CONTENT
}

pub async fn clear_draw_layer(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.draw.clear_layer().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request};
    use futures::future::BoxFuture;
    use gismap_shared::{BoundaryLayerConfig, BoundaryPayload, BoundaryQuery};
    use tower::ServiceExt;

    use super::*;
    use crate::config::MapConfig;
    use crate::sync::{BoundarySource, FetchError};

    struct OnePolygonSource;

    impl BoundarySource for OnePolygonSource {
        fn fetch<'a>(
            &'a self,
            layer: &'a BoundaryLayerConfig,
            _query: BoundaryQuery,
        ) -> BoxFuture<'a, Result<BoundaryPayload, FetchError>> {
            Box::pin(async move {
                if layer.name == "chome_layer" {
                    return Err(FetchError::Status {
                        status: 500,
                        body: serde_json::json!("upstream down"),
                    });
                }
                let polygon = gismap_shared::wkt::parse("POLYGON((0 0, 1 0, 1 1, 0 0))")
                    .map_err(|e| FetchError::Transport(e.to_string()))?;
                Ok(BoundaryPayload {
                    srid: None,
                    geometries: vec![polygon],
                })
            })
        }
    }

    fn app() -> (axum::Router, AppState) {
        let state =
            AppState::with_source(MapConfig::default(), Arc::new(OnePolygonSource)).expect("state");
        (crate::app::build_app(state.clone()), state)
    }

    fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn empty_request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn wkt_place_then_remove() {
        let (app, state) = app();

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/wkt",
                serde_json::json!({"text": "point (139.7 35.7)", "srid": 4326}),
            ))
            .await
            .expect("place");
        assert_eq!(response.status(), StatusCode::OK);
        let record = body_json(response).await;
        assert_eq!(record["id"], "POINT");
        assert_eq!(record["wkt"], "POINT(139.7 35.7)");

        let response = app
            .clone()
            .oneshot(empty_request(Method::DELETE, "/api/wkt/point"))
            .await
            .expect("remove");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(empty_request(Method::DELETE, "/api/wkt/point"))
            .await
            .expect("remove again");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            state.registry.read().await.find_by_name("wkt_layer").map(|l| l.len()),
            Some(0)
        );
    }

    #[tokio::test]
    async fn malformed_wkt_is_bad_request_with_error_body() {
        let (app, _) = app();
        let response = app
            .oneshot(json_request(
                Method::POST,
                "/api/wkt",
                serde_json::json!({"text": "POINT(a b)", "srid": 4326}),
            ))
            .await
            .expect("place");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().is_some_and(|e| e.contains("ordinate")));
    }

    #[tokio::test]
    async fn boundary_enable_disable_cycle() {
        let (app, state) = app();

        let response = app
            .clone()
            .oneshot(empty_request(Method::PUT, "/api/boundaries/city_layer"))
            .await
            .expect("enable");
        assert_eq!(response.status(), StatusCode::OK);
        let outcome = body_json(response).await;
        assert_eq!(outcome["outcome"], "applied");
        assert_eq!(outcome["features"], 1);
        assert!(state.boundaries.is_enabled("city_layer"));

        let response = app
            .clone()
            .oneshot(empty_request(Method::DELETE, "/api/boundaries/city_layer"))
            .await
            .expect("disable");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(!state.boundaries.is_enabled("city_layer"));

        let response = app
            .oneshot(empty_request(Method::PUT, "/api/boundaries/station_layer"))
            .await
            .expect("unknown");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn boundary_fetch_failure_is_bad_gateway() {
        let (app, state) = app();
        let response = app
            .oneshot(empty_request(Method::PUT, "/api/boundaries/chome_layer"))
            .await
            .expect("enable");
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(state.boundaries.is_enabled("chome_layer"));
    }

    #[tokio::test]
    async fn draw_flow_through_http() {
        let (app, _) = app();

        let response = app
            .clone()
            .oneshot(json_request(
                Method::PUT,
                "/api/draw/type",
                serde_json::json!({"draw_type": "Circle"}),
            ))
            .await
            .expect("start");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/draw/gesture",
                serde_json::json!({"vertices": [[0.0, 0.0], [1.0, 0.0]]}),
            ))
            .await
            .expect("gesture");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(empty_request(Method::GET, "/api/layers/draw_layer/measure"))
            .await
            .expect("measure");
        let measurements = body_json(response).await;
        let area = measurements[0]["area"].as_f64().expect("area");
        assert!((area - std::f64::consts::PI).abs() < 1e-12);

        let response = app
            .clone()
            .oneshot(empty_request(Method::GET, "/api/draw/log"))
            .await
            .expect("log");
        let log = body_json(response).await;
        assert_eq!(log.as_array().map(Vec::len), Some(1));
        assert_eq!(log[0]["kind"], "Circle");

        let response = app
            .oneshot(empty_request(Method::DELETE, "/api/draw/log"))
            .await
            .expect("clear log");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn stopping_the_session_removes_the_interaction() {
        let (app, state) = app();
        let response = app
            .clone()
            .oneshot(json_request(
                Method::PUT,
                "/api/draw/type",
                serde_json::json!({"draw_type": "Polygon"}),
            ))
            .await
            .expect("start");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(empty_request(Method::DELETE, "/api/draw/type"))
            .await
            .expect("stop");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(state.draw.status().await.draw_type, DrawType::None);

        let response = app
            .oneshot(json_request(
                Method::POST,
                "/api/draw/gesture",
                serde_json::json!({"vertices": [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]}),
            ))
            .await
            .expect("gesture");
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn gesture_without_draw_type_conflicts() {
        let (app, _) = app();
        let response = app
            .oneshot(json_request(
                Method::POST,
                "/api/draw/gesture",
                serde_json::json!({"vertices": [[0.0, 0.0]]}),
            ))
            .await
            .expect("gesture");
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn layer_listing_reports_counts() {
        let (app, state) = app();
        state
            .entry
            .place("LINESTRING(0 0, 1 1)", Srid::WGS84)
            .await
            .expect("place");

        let response = app
            .clone()
            .oneshot(empty_request(Method::GET, "/api/layers"))
            .await
            .expect("layers");
        let layers = body_json(response).await;
        assert_eq!(layers[0]["name"], "wkt_layer");
        assert_eq!(layers[0]["feature_count"], 1);

        let response = app
            .oneshot(empty_request(Method::GET, "/api/layers/nope"))
            .await
            .expect("missing layer");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
