//! HTTP front door.
//!
//! `POST /process` runs one pipeline per request and returns the record (or an
//! `{error, raw}` object). `GET /api/health` reports liveness. CORS is
//! permissive so browser frontends on any origin can call in.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer};
pub use types::ApiContext;
