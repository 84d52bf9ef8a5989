use axum::Router;
use axum::routing::{get, post, put};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;

use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    let app = Router::new()
        .route("/api/events", get(routes::sse::map_events))
        .route("/api/health", get(routes::api::health))
        .route("/api/metrics", get(routes::api::metrics))
        .route("/api/session", get(routes::api::get_session))
        .route(
            "/api/view",
            get(routes::api::get_view).post(routes::api::post_view),
        )
        .route(
            "/api/basemap",
            get(routes::api::get_base_map).put(routes::api::put_base_map),
        )
        .route("/api/measure", post(routes::api::post_measure))
        .route("/api/measure/distance", post(routes::api::post_distance))
        .route(
            "/api/wkt",
            post(routes::layers::place_wkt).delete(routes::layers::clear_wkt),
        )
        .route(
            "/api/wkt/{kind}",
            axum::routing::delete(routes::layers::remove_wkt),
        )
        .route("/api/boundaries", get(routes::layers::list_boundaries))
        .route(
            "/api/boundaries/{name}",
            put(routes::layers::enable_boundary).delete(routes::layers::disable_boundary),
        )
        .route("/api/layers", get(routes::layers::list_layers))
        .route("/api/layers/{name}", get(routes::layers::get_layer))
        .route(
            "/api/layers/{name}/measure",
            get(routes::layers::measure_layer),
        )
        .route("/api/draw", get(routes::layers::get_draw))
        .route(
            "/api/draw/type",
            put(routes::layers::put_draw_type).delete(routes::layers::stop_drawing),
        )
        .route("/api/draw/gesture", post(routes::layers::complete_gesture))
        .route(
            "/api/draw/log",
            get(routes::layers::get_draw_log).delete(routes::layers::clear_draw_log),
        )
        .route(
            "/api/draw/layer",
            axum::routing::delete(routes::layers::clear_draw_layer),
        );

    // The map shell is served from its own origin.
    app.layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
