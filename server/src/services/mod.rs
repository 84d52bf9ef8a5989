pub mod boundary_source;
pub mod view_listener;
