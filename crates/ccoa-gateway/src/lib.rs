//! HTTP surface for onboarding and chat, with CORS, rate limiting and a
//! health endpoint.

mod error;
mod handlers;
mod router;
mod server;

pub use error::{ApiError, GatewayError};
pub use router::build_router;
pub use server::{AppState, GatewayServer};
