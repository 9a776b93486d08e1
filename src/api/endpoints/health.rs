//! Liveness probe.

/// `GET /health`
pub async fn check() -> &'static str {
    "OK"
}
