use futures::future::BoxFuture;
use gismap_shared::{BoundaryLayerConfig, BoundaryPayload, BoundaryQuery};

use crate::sync::{BoundarySource, FetchError};

/// Fetches boundary geometry from the address API over HTTP.
pub struct HttpBoundarySource {
    client: reqwest::Client,
}

impl HttpBoundarySource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl BoundarySource for HttpBoundarySource {
    fn fetch<'a>(
        &'a self,
        layer: &'a BoundaryLayerConfig,
        query: BoundaryQuery,
    ) -> BoxFuture<'a, Result<BoundaryPayload, FetchError>> {
        Box::pin(fetch_boundaries(&self.client, layer, query))
    }
}

async fn fetch_boundaries(
    client: &reqwest::Client,
    layer: &BoundaryLayerConfig,
    query: BoundaryQuery,
) -> Result<BoundaryPayload, FetchError> {
    let resp = client
        .get(&layer.url)
        .query(&query.query_pairs())
        .send()
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?;
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?;

    if !status.is_success() {
        let body = serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body));
        return Err(FetchError::Status {
            status: status.as_u16(),
            body,
        });
    }

    Ok(BoundaryPayload::from_json_str(&body)?)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::SocketAddr;

    use axum::Router;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use gismap_shared::{Extent, Geometry};

    use super::*;

    async fn spawn_upstream(app: Router) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind upstream listener");
        let addr = listener.local_addr().expect("listener address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve upstream");
        });
        (addr, handle)
    }

    fn query() -> BoundaryQuery {
        BoundaryQuery {
            zoom: 13.0,
            extent: Extent {
                left: 139.6,
                bottom: 35.6,
                right: 139.8,
                top: 35.8,
            },
        }
    }

    #[tokio::test]
    async fn sends_viewport_query_and_decodes_collection() {
        let app = Router::new().route(
            "/api/addr/city",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let expected = [
                    ("zoom", "13"),
                    ("boundary[left]", "139.6"),
                    ("boundary[bottom]", "35.6"),
                    ("boundary[right]", "139.8"),
                    ("boundary[top]", "35.8"),
                    ("format", "json"),
                ];
                let matches = params.len() == expected.len()
                    && expected
                        .iter()
                        .all(|(k, v)| params.get(*k).map(String::as_str) == Some(*v));
                if !matches {
                    return (StatusCode::BAD_REQUEST, format!("{params:?}"));
                }
                (
                    StatusCode::OK,
                    r#"{"type":"FeatureCollection","srid":4326,"features":[
                        {"type":"Feature","properties":{},"geometry":{"type":"Point","coordinates":[139.7,35.7]}}
                    ]}"#
                    .to_string(),
                )
            }),
        );
        let (addr, server) = spawn_upstream(app).await;
        let layer = BoundaryLayerConfig {
            name: "city_layer".to_string(),
            url: format!("http://{addr}/api/addr/city"),
        };

        let source = HttpBoundarySource::new(reqwest::Client::new());
        let payload = source.fetch(&layer, query()).await.expect("fetch succeeds");
        assert_eq!(payload.geometries.len(), 1);
        assert!(matches!(payload.geometries[0], Geometry::Point(_)));

        server.abort();
    }

    #[tokio::test]
    async fn non_success_status_carries_parsed_or_raw_body() {
        let app = Router::new()
            .route(
                "/json",
                get(|| async {
                    (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        r#"{"detail":"zoom out of range"}"#,
                    )
                }),
            )
            .route(
                "/text",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
            );
        let (addr, server) = spawn_upstream(app).await;
        let source = HttpBoundarySource::new(reqwest::Client::new());

        let json_layer = BoundaryLayerConfig {
            name: "pref_layer".to_string(),
            url: format!("http://{addr}/json"),
        };
        let err = source
            .fetch(&json_layer, query())
            .await
            .expect_err("422 rejects");
        assert_eq!(
            err,
            FetchError::Status {
                status: 422,
                body: serde_json::json!({"detail": "zoom out of range"}),
            }
        );

        let text_layer = BoundaryLayerConfig {
            name: "pref_layer".to_string(),
            url: format!("http://{addr}/text"),
        };
        let err = source
            .fetch(&text_layer, query())
            .await
            .expect_err("503 rejects");
        assert_eq!(
            err,
            FetchError::Status {
                status: 503,
                body: serde_json::Value::String("maintenance".to_string()),
            }
        );

        server.abort();
    }

    #[tokio::test]
    async fn undecodable_body_is_a_decode_error() {
        let app = Router::new().route("/bad", get(|| async { "not geojson" }));
        let (addr, server) = spawn_upstream(app).await;
        let layer = BoundaryLayerConfig {
            name: "chome_layer".to_string(),
            url: format!("http://{addr}/bad"),
        };
        let err = HttpBoundarySource::new(reqwest::Client::new())
            .fetch(&layer, query())
            .await
            .expect_err("decode fails");
        assert!(matches!(err, FetchError::Decode(_)));
        server.abort();
    }
}
