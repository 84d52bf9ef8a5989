use thiserror::Error;

use crate::geometry::Geometry;
use crate::srid::{ProjectionError, Srid, Transform, UnknownSridError};
use crate::wkt::{self, ParseError};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    UnknownSrid(#[from] UnknownSridError),
    #[error(transparent)]
    Projection(ProjectionError),
}

impl From<ProjectionError> for AdapterError {
    fn from(e: ProjectionError) -> Self {
        match e {
            ProjectionError::UnknownSrid(unknown) => Self::UnknownSrid(unknown),
            other => Self::Projection(other),
        }
    }
}

/// Moves externally authored geometries into the working SRID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projector {
    working: Srid,
}

impl Projector {
    pub fn new(working: Srid) -> Self {
        Self { working }
    }

    pub fn working_srid(&self) -> Srid {
        self.working
    }

    /// Parses WKT authored in `source` and returns it in the working SRID.
    /// The source SRID is checked before the text so that a configuration
    /// fault is reported even for malformed input.
    pub fn parse_text(&self, text: &str, source: Srid) -> Result<Geometry, AdapterError> {
        let transform = Transform::new(source, self.working)?;
        let geometry = wkt::parse(text)?;
        Ok(apply(&transform, &geometry)?)
    }
}

/// Reprojects every coordinate of `geometry`. Identity when `from == to`.
pub fn reproject(geometry: &Geometry, from: Srid, to: Srid) -> Result<Geometry, ProjectionError> {
    let transform = Transform::new(from, to)?;
    apply(&transform, geometry)
}

fn apply(transform: &Transform, geometry: &Geometry) -> Result<Geometry, ProjectionError> {
    if transform.is_identity() {
        return Ok(geometry.clone());
    }
    geometry.try_map_coords(|c| transform.apply(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Coordinates, GeometryKind};

    const ENTRY_SAMPLES: [&str; 6] = [
        "POINT(139.747216 35.683765)",
        "LINESTRING(139.643065 35.69208, 139.645866 35.649539, 139.677008 35.646858)",
        "POLYGON ((139.709936 35.706894, 139.709166 35.693608, 139.742922 35.692582, 139.742221 35.721827, 139.709936 35.706894))",
        "MULTIPOINT(139.687071 35.624254, 139.677865 35.613452, 139.690632 35.615023)",
        "MULTILINESTRING ((139.67137 35.698229, 139.667765 35.694206), (139.682676 35.712862, 139.673181 35.692381))",
        "MULTIPOLYGON (((139.647741 35.757756, 139.646938 35.748417, 139.661701 35.748138, 139.647741 35.757756)))",
    ];

    #[test]
    fn identity_reprojection_is_a_no_op() {
        let projector = Projector::new(Srid::WGS84);
        for text in ENTRY_SAMPLES {
            let parsed = projector.parse_text(text, Srid::WGS84).expect("sample should parse");
            let again = reproject(&parsed, Srid::WGS84, Srid::WGS84).expect("identity");
            assert_eq!(again, parsed, "{text}");
        }
    }

    #[test]
    fn parse_text_reprojects_into_working_srid() {
        let projector = Projector::new(Srid::WEB_MERCATOR);
        let geometry = projector
            .parse_text("POINT(180 0)", Srid::WGS84)
            .expect("point should project");
        let Coordinates::Position([x, y]) = geometry.coordinates() else {
            panic!("expected a position");
        };
        assert!((x - 20_037_508.342_789_244).abs() < 1e-6);
        assert!(y.abs() < 1e-6);
    }

    #[test]
    fn reprojection_preserves_kind_and_vertex_count() {
        let projector = Projector::new(Srid::WEB_MERCATOR);
        let line = projector
            .parse_text(ENTRY_SAMPLES[1], Srid::WGS84)
            .expect("line should project");
        assert_eq!(line.kind(), GeometryKind::LineString);
        let Coordinates::Path(path) = line.coordinates() else {
            panic!("expected a path");
        };
        assert_eq!(path.len(), 3);
        assert!(path[0][0] < path[1][0]);
    }

    #[test]
    fn unknown_source_srid_is_reported_before_parsing() {
        let projector = Projector::new(Srid::WGS84);
        let err = projector
            .parse_text("not wkt at all", Srid(9999))
            .expect_err("srid should be rejected");
        assert_eq!(err, AdapterError::UnknownSrid(UnknownSridError(Srid(9999))));
    }

    #[test]
    fn malformed_text_is_a_parse_error() {
        let projector = Projector::new(Srid::WGS84);
        let err = projector
            .parse_text("POINT(1 2", Srid::WGS84)
            .expect_err("text should be rejected");
        assert!(matches!(err, AdapterError::Parse(_)));
    }
}
