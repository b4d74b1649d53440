//! REST API Server Module
//!
//! This module provides a REST API server for the wallet verifier, exposing
//! endpoints to open verification requests, query or cancel them, and inspect
//! the reconciler.
//!
//! Payment detection never goes through this API; it only reads and writes the
//! record store through the verification service.

// Generic shared code (envelope, rejections, CORS, health, monitor status, server)
mod generic;

// Verification request routes (open, status, cancel)
mod verification;

// Re-export ApiServer for convenience
pub use generic::ApiServer;
// Re-export ApiResponse for testing
#[allow(unused_imports)]
pub use generic::ApiResponse;
#[allow(unused_imports)]
pub use verification::VerificationRequest;
