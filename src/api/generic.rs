//! Generic API structures and handlers
//!
//! This module contains shared structures, helper functions, and generic API handlers
//! for the wallet verifier: the response envelope, custom rejections, the CORS filter,
//! the rejection handler and the server itself.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};
use warp::hyper::body::Bytes;
use warp::{http::{Method, StatusCode}, Filter, Rejection, Reply};

use crate::config::Config;
use crate::service::VerificationService;

// ============================================================================
// SHARED REQUEST/RESPONSE STRUCTURES
// ============================================================================

/// Standardized response structure for all API endpoints.
///
/// This structure provides a consistent response format for all API endpoints,
/// including success/error status and relevant data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was successful
    pub success: bool,
    /// Response data (if successful)
    pub data: Option<T>,
    /// Error message (if failed)
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

// ============================================================================
// GENERIC API HANDLERS
// ============================================================================

/// Handler for the monitor endpoint.
///
/// # Arguments
///
/// * `service` - The verification service owning the reconciler
///
/// # Returns
///
/// * `Ok(warp::Reply)` - JSON response with loop state, monitored count and cursor
pub async fn get_monitor_status_handler(
    service: VerificationService,
) -> Result<impl warp::Reply, warp::Rejection> {
    let status = service.reconciler().status().await;
    Ok(warp::reply::json(&ApiResponse::ok(status)))
}

// ============================================================================
// WARP FILTER HELPERS
// ============================================================================

/// Creates a warp filter that provides the verification service to handlers.
pub fn with_service(
    service: VerificationService,
) -> impl Filter<Extract = (VerificationService,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || service.clone())
}

// ============================================================================
// CUSTOM REJECTION TYPES
// ============================================================================

/// Custom rejection for JSON deserialization errors and malformed input
#[derive(Debug)]
pub struct JsonDeserializeError(pub String);

impl warp::reject::Reject for JsonDeserializeError {}

/// Custom rejection for requests that conflict with existing records
#[derive(Debug)]
pub struct ConflictError(pub String);

impl warp::reject::Reject for ConflictError {}

/// Custom rejection for missing records
#[derive(Debug)]
pub struct RecordNotFound(pub String);

impl warp::reject::Reject for RecordNotFound {}

// ============================================================================
// CORS CONFIGURATION
// ============================================================================

/// Creates a CORS filter based on the configured allowed origins.
fn create_cors_filter(allowed_origins: &[String]) -> warp::cors::Builder {
    let methods = vec![Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

    if allowed_origins.iter().any(|origin| origin == "*") {
        warp::cors()
            .allow_any_origin()
            .allow_methods(methods)
            .allow_headers(vec!["content-type"])
    } else {
        let origins: Vec<&str> = allowed_origins.iter().map(|s| s.as_str()).collect();
        warp::cors()
            .allow_origins(origins)
            .allow_methods(methods)
            .allow_headers(vec!["content-type"])
    }
}

// ============================================================================
// REJECTION HANDLER
// ============================================================================

/// Global rejection handler for all API routes.
///
/// Converts warp rejections into the standard envelope with an HTTP status code.
pub async fn handle_rejection(rej: Rejection) -> Result<impl Reply, std::convert::Infallible> {
    let (status, message) = if let Some(err) = rej.find::<JsonDeserializeError>() {
        (StatusCode::BAD_REQUEST, err.0.clone())
    } else if let Some(err) = rej.find::<ConflictError>() {
        (StatusCode::CONFLICT, err.0.clone())
    } else if let Some(err) = rej.find::<RecordNotFound>() {
        (StatusCode::NOT_FOUND, err.0.clone())
    } else if let Some(err) = rej.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid JSON: {}", err))
    } else if rej.is_not_found() {
        (StatusCode::NOT_FOUND, "Endpoint not found".to_string())
    } else if rej.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        error!("Unhandled rejection: {:?}", rej);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message),
        }),
        status,
    ))
}

// ============================================================================
// API SERVER IMPLEMENTATION
// ============================================================================

/// REST API server for the wallet verifier.
pub struct ApiServer {
    /// Service configuration
    config: Arc<Config>,
    /// Verification service shared with the event consumer
    service: VerificationService,
}

impl ApiServer {
    /// Creates a new API server.
    ///
    /// # Arguments
    ///
    /// * `config` - Service configuration
    /// * `service` - Verification service the routes operate on
    pub fn new(config: Config, service: VerificationService) -> Self {
        Self {
            config: Arc::new(config),
            service,
        }
    }

    /// Starts the API server and serves requests until the process stops.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Server stopped
    /// * `Err(anyhow::Error)` - Invalid listen address
    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting API server on {}:{}",
            self.config.api.host, self.config.api.port
        );

        let routes = self.create_routes();

        let addr: std::net::SocketAddr = format!("{}:{}", self.config.api.host, self.config.api.port)
            .parse()
            .context("Failed to parse API server address")?;

        warp::serve(routes).run(addr).await;

        Ok(())
    }

    /// Creates all API routes for the server.
    pub(crate) fn create_routes(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
        use super::verification;

        let service = self.service.clone();

        // Health check endpoint - returns service status
        let health = warp::path("health").and(warp::get()).map(|| {
            warp::reply::json(&ApiResponse::ok("Wallet Verifier is running".to_string()))
        });

        // GET /monitor - reconciler loop state
        let monitor = warp::path("monitor")
            .and(warp::path::end())
            .and(warp::get())
            .and(with_service(service.clone()))
            .and_then(get_monitor_status_handler);

        // POST /verifications - open a verification request
        let create_service = service.clone();
        let create = warp::path("verifications")
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::body::bytes())
            .and_then(move |body: Bytes| {
                let service = create_service.clone();
                async move {
                    let body_str = String::from_utf8_lossy(&body);
                    debug!("POST /verifications - Received body: {}", body_str);

                    match serde_json::from_slice::<verification::VerificationRequest>(&body) {
                        Ok(request) => verification::create_verification_handler(request, service).await,
                        Err(e) => {
                            error!("Verification request deserialization failed: {}. Body: {}", e, body_str);
                            Err(warp::reject::custom(JsonDeserializeError(format!("Invalid JSON: {}", e))))
                        }
                    }
                }
            });

        // GET /verifications/:user_id - verification status of a user
        let get_status = warp::path("verifications")
            .and(warp::path::param::<String>())
            .and(warp::path::end())
            .and(warp::get())
            .and(with_service(service.clone()))
            .and_then(verification::get_verification_handler);

        // DELETE /verifications/:user_id - cancel a pending request
        let cancel = warp::path("verifications")
            .and(warp::path::param::<String>())
            .and(warp::path::end())
            .and(warp::delete())
            .and(with_service(service))
            .and_then(verification::cancel_verification_handler);

        health
            .or(monitor)
            .or(create)
            .or(get_status)
            .or(cancel)
            .with(create_cors_filter(&self.config.api.cors_origins))
            .recover(handle_rejection)
    }

    /// Public method for testing - exposes routes for integration tests
    #[allow(dead_code)] // Used by tests
    pub fn test_routes(&self) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
        self.create_routes()
    }
}
