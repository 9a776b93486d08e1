pub mod api; // HTTP ingestion service
pub mod cli;
pub mod config;
pub mod gcp; // OAuth2 tokens + Vertex AI registry
pub mod ingest; // upload → PNG slices
pub mod inference; // staged slices → masks
pub mod logging;
pub mod png;
pub mod storage;
pub mod volume;
