use std::time::Duration;

use gismap_shared::srid;
use gismap_shared::{BoundaryLayerConfig, Srid, ZoomLimits};
use tracing::warn;

pub const DEFAULT_WORKING_SRID: u32 = 4326;
pub const DEFAULT_PRECISION: u32 = 6;
pub const MAX_PRECISION: u32 = 12;
pub const DEFAULT_CENTER: [f64; 2] = [139.692101, 35.689634]; // Tokyo Metropolitan Government
pub const DEFAULT_ZOOM: f64 = 13.0;
pub const MIN_ZOOM: f64 = 5.0;
pub const MAX_ZOOM: f64 = 19.0;
pub const DEFAULT_VIEWPORT_SIZE: (u32, u32) = (1024, 500);

pub const DEFAULT_BOUNDARY_API_HOST: &str = "http://192.168.99.100:8005";
pub const BOUNDARY_LAYERS: [(&str, &str); 3] = [
    ("pref_layer", "/api/addr/pref"),
    ("city_layer", "/api/addr/city"),
    ("chome_layer", "/api/addr/chome"),
];

pub const WKT_LAYER: &str = "wkt_layer";
pub const DRAW_LAYER: &str = "draw_layer";

pub const SSE_KEEPALIVE_SECS: u64 = 15;
pub const DEFAULT_BROADCAST_BUFFER: usize = 256;
pub const DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_SERVER_PORT: u16 = 3000;

/// Map settings handed to each component at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct MapConfig {
    pub working_srid: Srid,
    pub precision: u32,
    pub initial_center: [f64; 2],
    pub initial_zoom: f64,
    pub zoom_limits: ZoomLimits,
    pub viewport_size: (u32, u32),
    pub boundary_layers: Vec<BoundaryLayerConfig>,
    pub event_buffer: usize,
    pub upstream_timeout: Duration,
    pub upstream_connect_timeout: Duration,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            working_srid: Srid(DEFAULT_WORKING_SRID),
            precision: DEFAULT_PRECISION,
            initial_center: DEFAULT_CENTER,
            initial_zoom: DEFAULT_ZOOM,
            zoom_limits: ZoomLimits {
                min: MIN_ZOOM,
                max: MAX_ZOOM,
            },
            viewport_size: DEFAULT_VIEWPORT_SIZE,
            boundary_layers: boundary_layer_table(DEFAULT_BOUNDARY_API_HOST),
            event_buffer: DEFAULT_BROADCAST_BUFFER,
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS),
            upstream_connect_timeout: Duration::from_secs(DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl MapConfig {
    pub fn from_env() -> Self {
        let zoom_limits = ZoomLimits {
            min: MIN_ZOOM,
            max: MAX_ZOOM,
        };
        Self {
            working_srid: working_srid(),
            precision: precision(),
            initial_center: initial_center(),
            initial_zoom: zoom_limits.clamp(initial_zoom()),
            zoom_limits,
            viewport_size: viewport_size(),
            boundary_layers: boundary_layer_table(&boundary_api_host()),
            event_buffer: sse_broadcast_buffer(),
            upstream_timeout: upstream_http_timeout(),
            upstream_connect_timeout: upstream_connect_timeout(),
        }
    }
}

pub fn boundary_layer_table(host: &str) -> Vec<BoundaryLayerConfig> {
    let host = host.trim_end_matches('/');
    BOUNDARY_LAYERS
        .iter()
        .map(|(name, path)| BoundaryLayerConfig {
            name: (*name).to_string(),
            url: format!("{host}{path}"),
        })
        .collect()
}

pub fn working_srid() -> Srid {
    let srid = std::env::var("GISMAP_WORKING_SRID")
        .ok()
        .and_then(|value| value.trim().parse::<u32>().ok())
        .map(Srid)
        .unwrap_or(Srid(DEFAULT_WORKING_SRID));
    if srid::is_known(srid) {
        srid
    } else {
        warn!(%srid, "unknown working SRID, falling back to EPSG:{DEFAULT_WORKING_SRID}");
        Srid(DEFAULT_WORKING_SRID)
    }
}

pub fn precision() -> u32 {
    std::env::var("GISMAP_PRECISION")
        .ok()
        .and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|value| *value <= MAX_PRECISION)
        .unwrap_or(DEFAULT_PRECISION)
}

pub fn initial_center() -> [f64; 2] {
    std::env::var("GISMAP_CENTER")
        .ok()
        .and_then(|value| parse_pair::<f64>(&value, ','))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| [x, y])
        .unwrap_or(DEFAULT_CENTER)
}

pub fn initial_zoom() -> f64 {
    std::env::var("GISMAP_ZOOM")
        .ok()
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(DEFAULT_ZOOM)
}

pub fn viewport_size() -> (u32, u32) {
    std::env::var("GISMAP_VIEWPORT_SIZE")
        .ok()
        .and_then(|value| parse_pair::<u32>(&value.to_ascii_lowercase(), 'x'))
        .filter(|(w, h)| *w > 0 && *h > 0)
        .unwrap_or(DEFAULT_VIEWPORT_SIZE)
}

pub fn boundary_api_host() -> String {
    std::env::var("BOUNDARY_API_HOST")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_BOUNDARY_API_HOST.to_string())
}

pub fn server_port() -> u16 {
    std::env::var("SERVER_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SERVER_PORT)
}

pub fn sse_broadcast_buffer() -> usize {
    std::env::var("SSE_BROADCAST_BUFFER")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_BROADCAST_BUFFER)
}

pub fn upstream_http_timeout() -> Duration {
    std::env::var("UPSTREAM_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS))
}

pub fn upstream_connect_timeout() -> Duration {
    std::env::var("UPSTREAM_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS))
}

fn parse_pair<T: std::str::FromStr>(value: &str, separator: char) -> Option<(T, T)> {
    let (a, b) = value.split_once(separator)?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}
