use axum::{Extension, Json, extract::State, response::IntoResponse};
use uuid::Uuid;

use kindred_types::api::Claims;

use crate::auth::{AppState, AppStateInner};
use crate::error::{ApiError, ApiResult};

pub async fn close_account(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    close_account_for(&state, claims.sub).await?;
    Ok(Json(serde_json::json!({
        "message": "Account closed successfully"
    })))
}

/// Account closure is a two-phase operation: the payment processor is not
/// transactional with the local database, so its calls cannot be rolled
/// back. Phase one runs the external cleanup (idempotent: an already-absent
/// subscription or customer counts as done) and records a durable marker.
/// Phase two deletes the local row, cascading to everything the user owns.
/// A crash between the phases is recovered by retrying: the marker skips
/// the processor calls.
async fn close_account_for(state: &AppStateInner, user_id: Uuid) -> ApiResult<()> {
    let uid = user_id.to_string();

    let user = state
        .db
        .get_user_by_id(&uid)?
        .ok_or(ApiError::NotFound("User not found"))?;

    if let Some(customer) = user.billing_customer_id.as_deref() {
        if !state.db.billing_cleanup_done(&uid)? {
            let subscriptions = state.billing.list_active_subscriptions(customer).await?;
            if let Some(subscription) = subscriptions.first() {
                state.billing.cancel_subscription(&subscription.id).await?;
            }
            state.billing.delete_customer(customer).await?;

            // Durable before the local delete is attempted.
            state.db.mark_billing_cleanup_done(&uid)?;
        }
    }

    if !state.db.delete_user(&uid)? {
        return Err(ApiError::NotFound("User not found"));
    }

    Ok(())
}
