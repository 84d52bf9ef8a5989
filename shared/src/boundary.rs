//! Request/response contract of the boundary data endpoints.

use std::str::FromStr;

use geojson::GeoJson;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Geometry;
use crate::srid::Srid;
use crate::view::{Extent, MapView};

/// One entry of the static layer table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryLayerConfig {
    pub name: String,
    pub url: String,
}

/// Viewport parameters sent with every boundary fetch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryQuery {
    pub zoom: f64,
    pub extent: Extent,
}

impl BoundaryQuery {
    pub fn from_view(view: &MapView) -> Self {
        Self {
            zoom: view.zoom,
            extent: view.extent,
        }
    }

    /// Query pairs in wire order. Whole zoom levels print without a fraction.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("zoom", self.zoom.to_string()),
            ("boundary[left]", self.extent.left.to_string()),
            ("boundary[bottom]", self.extent.bottom.to_string()),
            ("boundary[right]", self.extent.right.to_string()),
            ("boundary[top]", self.extent.top.to_string()),
            ("format", "json".to_string()),
        ]
    }

    /// Unencoded query string, for logs.
    pub fn to_query_string(&self) -> String {
        self.query_pairs()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundaryDecodeError {
    #[error("payload is not GeoJSON: {0}")]
    Json(String),
    #[error("unsupported crs declaration `{0}`")]
    Crs(String),
    #[error("invalid geometry: {0}")]
    Geometry(String),
}

/// Decoded response: geometries in the SRID the server declared.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryPayload {
    pub srid: Option<Srid>,
    pub geometries: Vec<Geometry>,
}

impl BoundaryPayload {
    /// Declared SRID, or `default` when the server did not declare one.
    pub fn srid_or(&self, default: Srid) -> Srid {
        self.srid.unwrap_or(default)
    }

    /// Accepts a GeoJSON geometry, feature or feature collection. The source
    /// SRID is read from a top-level `srid` number or a named `crs` member.
    pub fn from_json_str(body: &str) -> Result<Self, BoundaryDecodeError> {
        let geojson =
            GeoJson::from_str(body).map_err(|e| BoundaryDecodeError::Json(e.to_string()))?;

        let (foreign, geometries) = match geojson {
            GeoJson::Geometry(geometry) => {
                let foreign = geometry.foreign_members.clone();
                (foreign, vec![geometry])
            }
            GeoJson::Feature(feature) => (feature.foreign_members, feature.geometry.into_iter().collect()),
            GeoJson::FeatureCollection(collection) => (
                collection.foreign_members,
                collection
                    .features
                    .into_iter()
                    .filter_map(|feature| feature.geometry)
                    .collect(),
            ),
        };

        let srid = match foreign.as_ref() {
            Some(members) => declared_srid(members)?,
            None => None,
        };

        let mut decoded = Vec::new();
        for geometry in geometries {
            convert(geometry, &mut decoded)?;
        }

        Ok(Self {
            srid,
            geometries: decoded,
        })
    }
}

fn declared_srid(
    members: &serde_json::Map<String, serde_json::Value>,
) -> Result<Option<Srid>, BoundaryDecodeError> {
    if let Some(value) = members.get("srid") {
        return value
            .as_u64()
            .and_then(|code| u32::try_from(code).ok())
            .map(|code| Some(Srid(code)))
            .ok_or_else(|| BoundaryDecodeError::Crs(value.to_string()));
    }

    let Some(crs) = members.get("crs") else {
        return Ok(None);
    };
    let name = crs
        .pointer("/properties/name")
        .and_then(|name| name.as_str())
        .ok_or_else(|| BoundaryDecodeError::Crs(crs.to_string()))?;
    parse_crs_name(name)
        .map(Some)
        .ok_or_else(|| BoundaryDecodeError::Crs(name.to_string()))
}

/// `EPSG:3857`, `urn:ogc:def:crs:EPSG::3857` and `urn:ogc:def:crs:OGC:1.3:CRS84`.
pub fn parse_crs_name(name: &str) -> Option<Srid> {
    if name.ends_with("CRS84") {
        return Some(Srid::WGS84);
    }
    let upper = name.to_ascii_uppercase();
    let code = upper
        .strip_prefix("EPSG:")
        .or_else(|| upper.strip_prefix("URN:OGC:DEF:CRS:EPSG::"))?;
    code.parse::<u32>().ok().map(Srid)
}

/// Geometry collections are flattened into their members.
fn convert(geometry: geojson::Geometry, out: &mut Vec<Geometry>) -> Result<(), BoundaryDecodeError> {
    let geometry = geo::Geometry::<f64>::try_from(geometry)
        .map_err(|e| BoundaryDecodeError::Geometry(e.to_string()))?;
    flatten(geometry, out);
    Ok(())
}

fn flatten(geometry: geo::Geometry<f64>, out: &mut Vec<Geometry>) {
    let geometry = match geometry {
        geo::Geometry::Point(p) => Geometry::Point(p),
        geo::Geometry::Line(line) => Geometry::LineString(line.into()),
        geo::Geometry::LineString(ls) => Geometry::LineString(ls),
        geo::Geometry::Polygon(poly) => Geometry::Polygon(poly),
        geo::Geometry::MultiPoint(mp) => Geometry::MultiPoint(mp),
        geo::Geometry::MultiLineString(mls) => Geometry::MultiLineString(mls),
        geo::Geometry::MultiPolygon(mpoly) => Geometry::MultiPolygon(mpoly),
        geo::Geometry::Rect(rect) => Geometry::Polygon(rect.to_polygon()),
        geo::Geometry::Triangle(triangle) => Geometry::Polygon(triangle.to_polygon()),
        geo::Geometry::GeometryCollection(collection) => {
            for member in collection {
                flatten(member, out);
            }
            return;
        }
    };
    out.push(geometry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeometryKind;

    #[test]
    fn query_encodes_zoom_extent_and_format() {
        let query = BoundaryQuery {
            zoom: 13.0,
            extent: Extent {
                left: 139.6,
                bottom: 35.6,
                right: 139.8,
                top: 35.8,
            },
        };
        assert_eq!(
            query.query_pairs(),
            vec![
                ("zoom", "13".to_string()),
                ("boundary[left]", "139.6".to_string()),
                ("boundary[bottom]", "35.6".to_string()),
                ("boundary[right]", "139.8".to_string()),
                ("boundary[top]", "35.8".to_string()),
                ("format", "json".to_string()),
            ]
        );
        assert_eq!(
            query.to_query_string(),
            "zoom=13&boundary[left]=139.6&boundary[bottom]=35.6&boundary[right]=139.8&boundary[top]=35.8&format=json"
        );
    }

    #[test]
    fn feature_collection_without_crs_has_no_declared_srid() {
        let body = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"name": "Shinjuku"},
                 "geometry": {"type": "Polygon", "coordinates": [[[139.68, 35.68], [139.72, 35.68], [139.72, 35.71], [139.68, 35.68]]]}},
                {"type": "Feature", "properties": {}, "geometry": null}
            ]
        }"#;
        let payload = BoundaryPayload::from_json_str(body).expect("payload should decode");
        assert_eq!(payload.srid, None);
        assert_eq!(payload.srid_or(Srid::WGS84), Srid::WGS84);
        assert_eq!(payload.geometries.len(), 1);
        assert_eq!(payload.geometries[0].kind(), GeometryKind::Polygon);
    }

    #[test]
    fn named_crs_and_srid_member_are_honoured() {
        let named = r#"{"type": "FeatureCollection", "features": [],
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}}}"#;
        let payload = BoundaryPayload::from_json_str(named).expect("named crs");
        assert_eq!(payload.srid, Some(Srid::WEB_MERCATOR));

        let member = r#"{"type": "Point", "coordinates": [15550408.9, 4257980.7], "srid": 3857}"#;
        let payload = BoundaryPayload::from_json_str(member).expect("srid member");
        assert_eq!(payload.srid, Some(Srid::WEB_MERCATOR));
        assert_eq!(payload.geometries.len(), 1);
    }

    #[test]
    fn geometry_collections_are_flattened() {
        let body = r#"{"type": "GeometryCollection", "geometries": [
            {"type": "Point", "coordinates": [139.7, 35.6]},
            {"type": "MultiLineString", "coordinates": [[[0, 0], [1, 1]], [[2, 2], [3, 3]]]}
        ]}"#;
        let payload = BoundaryPayload::from_json_str(body).expect("collection");
        let kinds: Vec<_> = payload.geometries.iter().map(Geometry::kind).collect();
        assert_eq!(kinds, vec![GeometryKind::Point, GeometryKind::MultiLineString]);
    }

    #[test]
    fn polygon_rings_keep_their_coordinates() {
        let body = r#"{"type": "Polygon", "coordinates": [
            [[0, 0], [10, 0], [10, 10], [0, 0]],
            [[2, 2], [4, 2], [4, 4], [2, 2]]
        ]}"#;
        let payload = BoundaryPayload::from_json_str(body).expect("polygon");
        let Geometry::Polygon(poly) = &payload.geometries[0] else {
            panic!("expected a polygon");
        };
        assert_eq!(poly.exterior().0.len(), 4);
        assert_eq!(poly.interiors().len(), 1);
        assert_eq!(poly.interiors()[0].0[1], geo::coord! { x: 4.0, y: 2.0 });
    }

    #[test]
    fn rejects_garbage_and_unknown_crs_names() {
        assert!(matches!(
            BoundaryPayload::from_json_str("<html>502</html>"),
            Err(BoundaryDecodeError::Json(_))
        ));
        let odd = r#"{"type": "FeatureCollection", "features": [],
            "crs": {"type": "name", "properties": {"name": "Tokyo datum"}}}"#;
        assert_eq!(
            BoundaryPayload::from_json_str(odd),
            Err(BoundaryDecodeError::Crs("Tokyo datum".to_string()))
        );
    }

    #[test]
    fn crs_names() {
        assert_eq!(parse_crs_name("EPSG:4326"), Some(Srid::WGS84));
        assert_eq!(parse_crs_name("urn:ogc:def:crs:OGC:1.3:CRS84"), Some(Srid::WGS84));
        assert_eq!(parse_crs_name("epsg:6677"), Some(Srid(6677)));
        assert_eq!(parse_crs_name("WGS84"), None);
    }
}
