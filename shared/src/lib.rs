pub mod boundary;
pub mod events;
pub mod geometry;
pub mod measure;
pub mod projection;
pub mod session;
pub mod srid;
pub mod style;
pub mod view;
pub mod wkt;

pub use boundary::{BoundaryDecodeError, BoundaryLayerConfig, BoundaryPayload, BoundaryQuery};
pub use events::*;
pub use geometry::*;
pub use projection::{AdapterError, Projector, reproject};
pub use session::*;
pub use srid::{ProjectionError, Srid, UnknownSridError};
pub use style::LayerStyle;
pub use view::{Extent, MapView, RawView, ViewSnapshot, ZoomLimits};
pub use wkt::{ParseError, ParseErrorKind};
