//! Ingestion HTTP service.
//!
//! `ingestion_router()` returns a composable `Router`; `server` binds it
//! and hands back a handle with a shutdown channel.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use router::ingestion_router;
pub use server::{start_ingestion_server_on, IngestionServer};
pub use types::AppState;
