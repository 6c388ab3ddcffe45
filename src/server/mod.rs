mod bridge;
mod consolidate;
pub mod dto;
mod redirects;
pub mod response;
mod router;
mod sites;
pub mod validation;

pub use router::{AppState, create_router};
