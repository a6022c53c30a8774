mod api_models;
pub mod error;
mod extractors;
mod handlers;
mod middleware;
mod router;
pub mod session;

pub use router::router;
