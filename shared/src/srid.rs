//! Spatial reference identifiers known to the viewer and the coordinate math
//! to move between each of them and WGS 84 longitude/latitude.

use std::fmt;
use std::f64::consts::FRAC_PI_4;

use geo::Coord;
use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric EPSG code naming a coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Srid(pub u32);

impl Srid {
    pub const WGS84: Self = Self(4326);
    pub const WEB_MERCATOR: Self = Self(3857);
}

impl fmt::Display for Srid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no transform is known for {0}")]
pub struct UnknownSridError(pub Srid);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error(transparent)]
    UnknownSrid(#[from] UnknownSridError),
    #[error("invalid projection definition for {srid}: {reason}")]
    Definition { srid: Srid, reason: String },
    #[error("coordinate ({x}, {y}) cannot be transformed: {reason}")]
    OutOfDomain { x: f64, y: f64, reason: String },
}

const EARTH_RADIUS_M: f64 = 6_378_137.0;
const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;
const GEOGRAPHIC_PROJ4: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// JGD2011 plane rectangular zones I..XIX as (origin latitude, central meridian).
const JGD2011_PLANE_ORIGINS: [(f64, f64); 19] = [
    (33.0, 129.5),
    (33.0, 131.0),
    (36.0, 132.0 + 1.0 / 6.0),
    (33.0, 133.5),
    (36.0, 134.0 + 1.0 / 3.0),
    (36.0, 136.0),
    (36.0, 137.0 + 1.0 / 6.0),
    (36.0, 138.5),
    (36.0, 139.0 + 5.0 / 6.0),
    (40.0, 140.0 + 5.0 / 6.0),
    (44.0, 140.25),
    (44.0, 142.25),
    (44.0, 144.25),
    (26.0, 142.0),
    (26.0, 127.5),
    (26.0, 124.0),
    (26.0, 131.0),
    (20.0, 136.0),
    (26.0, 154.0),
];

/// How coordinates of a reference system relate to WGS 84 lon/lat.
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialReference {
    /// Longitude/latitude in degrees. JGD2000/JGD2011 are treated as WGS 84.
    Geographic,
    /// Spherical Web Mercator metres.
    WebMercator,
    /// Projected system described by a PROJ.4 string.
    Proj4(String),
}

impl SpatialReference {
    pub fn lookup(srid: Srid) -> Result<Self, UnknownSridError> {
        let reference = match srid.0 {
            4326 | 4612 | 6668 => Self::Geographic,
            3857 | 900_913 => Self::WebMercator,
            code @ 32651..=32656 => Self::Proj4(format!(
                "+proj=utm +zone={} +datum=WGS84 +units=m +no_defs",
                code - 32600
            )),
            code @ 6669..=6687 => {
                let (lat_0, lon_0) = JGD2011_PLANE_ORIGINS[(code - 6669) as usize];
                Self::Proj4(format!(
                    "+proj=tmerc +lat_0={lat_0} +lon_0={lon_0} +k=0.9999 +x_0=0 +y_0=0 \
                     +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs"
                ))
            }
            _ => return Err(UnknownSridError(srid)),
        };
        Ok(reference)
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self, Self::Geographic)
    }
}

pub fn is_known(srid: Srid) -> bool {
    SpatialReference::lookup(srid).is_ok()
}

/// One leg of a transform, prepared once per geometry.
enum Stage {
    Geographic,
    WebMercator,
    Proj4 { geographic: Proj, projected: Proj },
}

impl Stage {
    fn prepare(srid: Srid) -> Result<Self, ProjectionError> {
        let stage = match SpatialReference::lookup(srid)? {
            SpatialReference::Geographic => Self::Geographic,
            SpatialReference::WebMercator => Self::WebMercator,
            SpatialReference::Proj4(definition) => {
                let build = |def: &str| {
                    Proj::from_proj_string(def).map_err(|e| ProjectionError::Definition {
                        srid,
                        reason: format!("{e:?}"),
                    })
                };
                Self::Proj4 {
                    geographic: build(GEOGRAPHIC_PROJ4)?,
                    projected: build(&definition)?,
                }
            }
        };
        Ok(stage)
    }

    fn to_lonlat(&self, c: Coord<f64>) -> Result<Coord<f64>, ProjectionError> {
        match self {
            Self::Geographic => Ok(c),
            Self::WebMercator => Ok(mercator_to_lonlat(c)),
            Self::Proj4 {
                geographic,
                projected,
            } => {
                let mut point = (c.x, c.y, 0.0);
                transform(projected, geographic, &mut point).map_err(|e| out_of_domain(c, e))?;
                Ok(Coord {
                    x: point.0.to_degrees(),
                    y: point.1.to_degrees(),
                })
            }
        }
    }

    fn from_lonlat(&self, c: Coord<f64>) -> Result<Coord<f64>, ProjectionError> {
        match self {
            Self::Geographic => Ok(c),
            Self::WebMercator => Ok(lonlat_to_mercator(c)),
            Self::Proj4 {
                geographic,
                projected,
            } => {
                let mut point = (c.x.to_radians(), c.y.to_radians(), 0.0);
                transform(geographic, projected, &mut point).map_err(|e| out_of_domain(c, e))?;
                Ok(Coord {
                    x: point.0,
                    y: point.1,
                })
            }
        }
    }
}

fn out_of_domain(c: Coord<f64>, e: impl fmt::Debug) -> ProjectionError {
    ProjectionError::OutOfDomain {
        x: c.x,
        y: c.y,
        reason: format!("{e:?}"),
    }
}

/// Coordinate transform between two SRIDs, going through WGS 84 lon/lat.
pub struct Transform {
    identity: bool,
    from: Stage,
    to: Stage,
}

impl Transform {
    pub fn new(from: Srid, to: Srid) -> Result<Self, ProjectionError> {
        Ok(Self {
            identity: from == to,
            from: Stage::prepare(from)?,
            to: Stage::prepare(to)?,
        })
    }

    pub fn is_identity(&self) -> bool {
        self.identity
    }

    pub fn apply(&self, c: Coord<f64>) -> Result<Coord<f64>, ProjectionError> {
        if self.identity {
            return Ok(c);
        }
        let out = self.to.from_lonlat(self.from.to_lonlat(c)?)?;
        if !out.x.is_finite() || !out.y.is_finite() {
            return Err(ProjectionError::OutOfDomain {
                x: c.x,
                y: c.y,
                reason: "result is not finite".to_string(),
            });
        }
        Ok(out)
    }
}

pub fn lonlat_to_mercator(c: Coord<f64>) -> Coord<f64> {
    let lat = c.y.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT).to_radians();
    Coord {
        x: EARTH_RADIUS_M * c.x.to_radians(),
        y: EARTH_RADIUS_M * (FRAC_PI_4 + lat / 2.0).tan().ln(),
    }
}

pub fn mercator_to_lonlat(c: Coord<f64>) -> Coord<f64> {
    Coord {
        x: (c.x / EARTH_RADIUS_M).to_degrees(),
        y: (2.0 * (c.y / EARTH_RADIUS_M).exp().atan() - 2.0 * FRAC_PI_4).to_degrees(),
    }
}

/// Width of the whole world in the units of `srid` (360 degrees or the
/// Mercator circumference), used to derive zoom-level resolutions.
pub fn world_width(srid: Srid) -> Result<f64, UnknownSridError> {
    match SpatialReference::lookup(srid)? {
        SpatialReference::Geographic => Ok(360.0),
        SpatialReference::WebMercator | SpatialReference::Proj4(_) => {
            Ok(2.0 * std::f64::consts::PI * EARTH_RADIUS_M)
        }
    }
}
