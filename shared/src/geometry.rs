use geo::{
    Coord, LineString, MapCoords, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon,
};
use serde::{Deserialize, Serialize};

/// Shape kinds a layer can hold. `Circle` only comes out of a draw session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    Circle,
}

impl GeometryKind {
    /// Upper-case tag used both as the WKT keyword and as the feature id of
    /// manually entered geometries.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Point => "POINT",
            Self::LineString => "LINESTRING",
            Self::Polygon => "POLYGON",
            Self::MultiPoint => "MULTIPOINT",
            Self::MultiLineString => "MULTILINESTRING",
            Self::MultiPolygon => "MULTIPOLYGON",
            Self::Circle => "CIRCLE",
        }
    }

    /// Case-insensitive inverse of [`GeometryKind::tag`].
    pub fn from_tag(tag: &str) -> Option<Self> {
        let kind = match tag.to_ascii_uppercase().as_str() {
            "POINT" => Self::Point,
            "LINESTRING" => Self::LineString,
            "POLYGON" => Self::Polygon,
            "MULTIPOINT" => Self::MultiPoint,
            "MULTILINESTRING" => Self::MultiLineString,
            "MULTIPOLYGON" => Self::MultiPolygon,
            "CIRCLE" => Self::Circle,
            _ => return None,
        };
        Some(kind)
    }
}

/// Circle as a draw gesture leaves it: the pointer-down position and the
/// position the pointer was released at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: Coord<f64>,
    pub rim: Coord<f64>,
}

impl Circle {
    pub fn new(center: Coord<f64>, rim: Coord<f64>) -> Self {
        Self { center, rim }
    }

    pub fn first_coordinate(&self) -> Coord<f64> {
        self.center
    }

    pub fn last_coordinate(&self) -> Coord<f64> {
        self.rim
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point<f64>),
    LineString(LineString<f64>),
    Polygon(Polygon<f64>),
    MultiPoint(MultiPoint<f64>),
    MultiLineString(MultiLineString<f64>),
    MultiPolygon(MultiPolygon<f64>),
    Circle(Circle),
}

impl Geometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Self::Point(_) => GeometryKind::Point,
            Self::LineString(_) => GeometryKind::LineString,
            Self::Polygon(_) => GeometryKind::Polygon,
            Self::MultiPoint(_) => GeometryKind::MultiPoint,
            Self::MultiLineString(_) => GeometryKind::MultiLineString,
            Self::MultiPolygon(_) => GeometryKind::MultiPolygon,
            Self::Circle(_) => GeometryKind::Circle,
        }
    }

    /// Applies `f` to every coordinate, keeping the shape and the order of
    /// its coordinates.
    pub fn try_map_coords<E>(
        &self,
        f: impl Fn(Coord<f64>) -> Result<Coord<f64>, E> + Copy,
    ) -> Result<Self, E> {
        let mapped = match self {
            Self::Point(p) => Self::Point(p.try_map_coords(f)?),
            Self::LineString(ls) => Self::LineString(ls.try_map_coords(f)?),
            Self::Polygon(poly) => Self::Polygon(poly.try_map_coords(f)?),
            Self::MultiPoint(mp) => Self::MultiPoint(mp.try_map_coords(f)?),
            Self::MultiLineString(mls) => Self::MultiLineString(mls.try_map_coords(f)?),
            Self::MultiPolygon(mpoly) => Self::MultiPolygon(mpoly.try_map_coords(f)?),
            Self::Circle(c) => Self::Circle(Circle::new(f(c.center)?, f(c.rim)?)),
        };
        Ok(mapped)
    }

    /// Nested coordinate arrays in the shape a GeoJSON `coordinates` member
    /// would carry. A circle is reported as `[center, rim]`.
    pub fn coordinates(&self) -> Coordinates {
        match self {
            Self::Point(p) => Coordinates::Position(pair(p.0)),
            Self::LineString(ls) => Coordinates::Path(path(ls)),
            Self::Polygon(poly) => Coordinates::Rings(rings(poly)),
            Self::MultiPoint(mp) => Coordinates::Path(mp.iter().map(|p| pair(p.0)).collect()),
            Self::MultiLineString(mls) => Coordinates::Rings(mls.iter().map(path).collect()),
            Self::MultiPolygon(mpoly) => Coordinates::Polygons(mpoly.iter().map(rings).collect()),
            Self::Circle(c) => Coordinates::Path(vec![pair(c.center), pair(c.rim)]),
        }
    }

    pub fn to_record(&self) -> GeometryRecord {
        GeometryRecord {
            kind: self.kind(),
            coordinates: self.coordinates(),
        }
    }
}

fn pair(c: Coord<f64>) -> [f64; 2] {
    [c.x, c.y]
}

fn path(ls: &LineString<f64>) -> Vec<[f64; 2]> {
    ls.coords().map(|c| pair(*c)).collect()
}

fn rings(poly: &Polygon<f64>) -> Vec<Vec<[f64; 2]>> {
    std::iter::once(poly.exterior())
        .chain(poly.interiors())
        .map(path)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coordinates {
    Position([f64; 2]),
    Path(Vec<[f64; 2]>),
    Rings(Vec<Vec<[f64; 2]>>),
    Polygons(Vec<Vec<Vec<[f64; 2]>>>),
}

/// Serializable view of a geometry for API responses and the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryRecord {
    #[serde(rename = "type")]
    pub kind: GeometryKind,
    pub coordinates: Coordinates,
}
