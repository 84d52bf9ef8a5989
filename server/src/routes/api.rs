use std::fmt::Write as _;

use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use geo::Coord;
use gismap_shared::{
    BaseMap, GeometryKind, MapEvent, Projector, RawView, SessionSnapshot, Srid, ViewSnapshot,
    measure,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::{AppState, ObservabilitySnapshot};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let layer_count = state.registry.read().await.summaries().len();
    let observability = state.observability.snapshot();
    Json(serde_json::json!({
        "status": "ok",
        "working_srid": state.config.working_srid,
        "layers": layer_count,
        "view_version": state.viewport.current().version,
        "last_event_seq": state.events.last_seq(),
        "observability": {
            "view_changes_total": observability.view_changes_total,
            "boundary_fetches_total": observability.boundary_fetches_total,
            "boundary_fetch_failures_total": observability.boundary_fetch_failures_total,
            "stale_boundary_responses_total": observability.stale_boundary_responses_total,
            "draw_commits_total": observability.draw_commits_total,
            "wkt_parse_failures_total": observability.wkt_parse_failures_total,
        }
    }))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let layer_count = state.registry.read().await.summaries().len();
    let enabled_boundaries = state
        .boundaries
        .statuses()
        .iter()
        .filter(|status| status.enabled)
        .count();
    let observability = state.observability.snapshot();

    let body = render_prometheus_metrics(layer_count, enabled_boundaries, observability);

    (
        [
            (header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
}

fn render_prometheus_metrics(
    layer_count: usize,
    enabled_boundaries: usize,
    observability: ObservabilitySnapshot,
) -> String {
    let mut body = String::new();
    let gauges = [
        ("gismap_layers", "Overlay layers attached to the map.", layer_count),
        (
            "gismap_boundary_layers_enabled",
            "Boundary layers currently following the viewport.",
            enabled_boundaries,
        ),
    ];
    for (name, help, value) in gauges {
        let _ = writeln!(body, "# HELP {name} {help}");
        let _ = writeln!(body, "# TYPE {name} gauge");
        let _ = writeln!(body, "{name} {value}");
    }

    let counters = [
        (
            "gismap_view_changes_total",
            "Settled view changes observed.",
            observability.view_changes_total,
        ),
        (
            "gismap_boundary_fetches_total",
            "Boundary fetches issued.",
            observability.boundary_fetches_total,
        ),
        (
            "gismap_boundary_fetch_failures_total",
            "Boundary fetches that failed or could not be reprojected.",
            observability.boundary_fetch_failures_total,
        ),
        (
            "gismap_stale_boundary_responses_total",
            "Boundary responses discarded because a newer fetch was issued.",
            observability.stale_boundary_responses_total,
        ),
        (
            "gismap_draw_commits_total",
            "Draw gestures committed to the draw layer.",
            observability.draw_commits_total,
        ),
        (
            "gismap_wkt_parse_failures_total",
            "Geometry text rejected by the parser.",
            observability.wkt_parse_failures_total,
        ),
    ];
    for (name, help, value) in counters {
        let _ = writeln!(body, "# HELP {name} {help}");
        let _ = writeln!(body, "# TYPE {name} counter");
        let _ = writeln!(body, "{name} {value}");
    }

    body
}

pub async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session_snapshot().await)
}

pub async fn get_view(State(state): State<AppState>) -> Json<ViewSnapshot> {
    Json(state.viewport.current())
}

/// Settled view reported by the map. Boundary sync follows asynchronously.
pub async fn post_view(
    State(state): State<AppState>,
    Json(raw): Json<RawView>,
) -> Result<Json<ViewSnapshot>, ApiError> {
    let finite = raw.center.iter().all(|v| v.is_finite())
        && raw.zoom.is_finite()
        && [raw.extent.left, raw.extent.bottom, raw.extent.right, raw.extent.top]
            .iter()
            .all(|v| v.is_finite());
    if !finite {
        return Err(ApiError::bad_request("view values must be finite numbers"));
    }

    let snapshot = state.viewport.observe(raw);
    state.observability.record_view_change();
    state.events.publish(MapEvent::ViewChanged {
        seq: 0,
        view: snapshot,
    });
    Ok(Json(snapshot))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BaseMapBody {
    pub base_map: BaseMap,
}

pub async fn get_base_map(State(state): State<AppState>) -> Json<BaseMapBody> {
    Json(BaseMapBody {
        base_map: state.registry.read().await.base_map(),
    })
}

pub async fn put_base_map(
    State(state): State<AppState>,
    Json(body): Json<BaseMapBody>,
) -> Json<BaseMapBody> {
    let changed = state.registry.write().await.set_base_map(body.base_map);
    if changed {
        state.events.publish(MapEvent::BaseMapChanged {
            seq: 0,
            base_map: body.base_map,
        });
    }
    Json(body)
}

#[derive(Debug, Deserialize)]
pub struct MeasureRequest {
    pub wkt: String,
    pub srid: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Measurement {
    pub kind: GeometryKind,
    pub length: f64,
    pub area: f64,
}

/// Length and area of WKT, measured after moving it into the working SRID.
pub async fn post_measure(
    State(state): State<AppState>,
    Json(body): Json<MeasureRequest>,
) -> Result<Json<Measurement>, ApiError> {
    let source = body.srid.map(Srid).unwrap_or(state.config.working_srid);
    let geometry = Projector::new(state.config.working_srid).parse_text(&body.wkt, source)?;
    Ok(Json(Measurement {
        kind: geometry.kind(),
        length: measure::length(&geometry),
        area: measure::area(&geometry),
    }))
}

#[derive(Debug, Deserialize)]
pub struct DistanceRequest {
    pub a: [f64; 2],
    pub b: [f64; 2],
}

pub async fn post_distance(Json(body): Json<DistanceRequest>) -> Json<serde_json::Value> {
    let [ax, ay] = body.a;
    let [bx, by] = body.b;
    let distance = measure::distance(Coord { x: ax, y: ay }, Coord { x: bx, y: by });
    Json(serde_json::json!({ "distance": distance }))
}
