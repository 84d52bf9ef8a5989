pub mod api;
pub mod layers;
pub mod sse;
