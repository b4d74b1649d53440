//! Verification request routes
//!
//! Handlers that open, query and cancel wallet verification requests on behalf of a
//! collaborator (chat bot, web frontend). Refusals map onto HTTP status codes: malformed
//! input is 400, a clash with another user's record is 409, a missing request is 404.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::generic::{ApiResponse, ConflictError, JsonDeserializeError, RecordNotFound};
use crate::service::{VerificationError, VerificationService};

/// Body of `POST /verifications`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub user_id: String,
    pub username: String,
    pub wallet_address: String,
    #[serde(default)]
    pub channel_id: Option<String>,
}

fn reject_verification_error(err: VerificationError) -> warp::Rejection {
    match err {
        VerificationError::InvalidAddress(_) => warp::reject::custom(JsonDeserializeError(err.to_string())),
        VerificationError::AlreadyPending { .. }
        | VerificationError::AddressPendingElsewhere(_)
        | VerificationError::AddressVerifiedElsewhere(_)
        | VerificationError::Store(_) => warp::reject::custom(ConflictError(err.to_string())),
    }
}

/// Handler for `POST /verifications`.
///
/// # Returns
///
/// * `Ok(warp::Reply)` - Payment instructions for the requested wallet
/// * `Err(warp::Rejection)` - Invalid input or conflicting records
pub async fn create_verification_handler(
    request: VerificationRequest,
    service: VerificationService,
) -> Result<impl warp::Reply, warp::Rejection> {
    if request.user_id.trim().is_empty() {
        return Err(warp::reject::custom(JsonDeserializeError(
            "user_id must not be empty".to_string(),
        )));
    }

    let instructions = service
        .request_verification(
            &request.user_id,
            &request.username,
            &request.wallet_address,
            request.channel_id,
        )
        .await
        .map_err(|e| {
            warn!("Verification request of user {} refused: {}", request.user_id, e);
            reject_verification_error(e)
        })?;

    Ok(warp::reply::json(&ApiResponse::ok(instructions)))
}

/// Handler for `GET /verifications/:user_id`.
pub async fn get_verification_handler(
    user_id: String,
    service: VerificationService,
) -> Result<impl warp::Reply, warp::Rejection> {
    let status = service.status(&user_id).await;
    Ok(warp::reply::json(&ApiResponse::ok(status)))
}

/// Handler for `DELETE /verifications/:user_id`.
pub async fn cancel_verification_handler(
    user_id: String,
    service: VerificationService,
) -> Result<impl warp::Reply, warp::Rejection> {
    match service.cancel(&user_id).await {
        Some(pending) => Ok(warp::reply::json(&ApiResponse::ok(pending))),
        None => Err(warp::reject::custom(RecordNotFound(format!(
            "No pending verification for user {}",
            user_id
        )))),
    }
}
