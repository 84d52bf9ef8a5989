//! Planar metrics in the units of the working SRID.

use std::f64::consts::PI;

use geo::{Area, Coord, Distance, Euclidean, Length, Point, Polygon};

use crate::geometry::{Circle, Geometry};

pub fn distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    Euclidean.distance(Point::from(a), Point::from(b))
}

fn perimeter(poly: &Polygon<f64>) -> f64 {
    std::iter::once(poly.exterior())
        .chain(poly.interiors())
        .map(|ring| Euclidean.length(ring))
        .sum()
}

pub fn circle_radius(circle: &Circle) -> f64 {
    distance(circle.first_coordinate(), circle.last_coordinate())
}

/// Path length. Polygons report the length of all their rings and a circle
/// its circumference; points have no length.
pub fn length(geometry: &Geometry) -> f64 {
    match geometry {
        Geometry::Point(_) | Geometry::MultiPoint(_) => 0.0,
        Geometry::LineString(ls) => Euclidean.length(ls),
        Geometry::MultiLineString(mls) => Euclidean.length(mls),
        Geometry::Polygon(poly) => perimeter(poly),
        Geometry::MultiPolygon(mpoly) => mpoly.iter().map(perimeter).sum(),
        Geometry::Circle(circle) => 2.0 * PI * circle_radius(circle),
    }
}

/// Enclosed area. A drawn circle carries only its first and last
/// coordinates, so its area is `π·r²` with `r` the distance between them.
pub fn area(geometry: &Geometry) -> f64 {
    match geometry {
        Geometry::Circle(circle) => {
            let r = circle_radius(circle);
            PI * r * r
        }
        Geometry::Polygon(poly) => poly.unsigned_area(),
        Geometry::MultiPolygon(mpoly) => mpoly.unsigned_area(),
        Geometry::Point(_)
        | Geometry::MultiPoint(_)
        | Geometry::LineString(_)
        | Geometry::MultiLineString(_) => 0.0,
    }
}
