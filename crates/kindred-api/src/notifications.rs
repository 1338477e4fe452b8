use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::error;
use uuid::Uuid;

use kindred_db::models::NotificationRow;
use kindred_types::api::{Claims, NotificationResponse};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::{parse_created_at, parse_uuid};

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let st = state.clone();
    let uid = claims.sub.to_string();

    let rows = tokio::task::spawn_blocking(move || st.db.list_notifications(&uid))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("join error: {}", e))
        })??;

    let notifications: Vec<NotificationResponse> =
        rows.into_iter().map(notification_response).collect();

    Ok(Json(notifications))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let row = state
        .db
        .mark_notification_read(&notification_id.to_string(), &claims.sub.to_string())?
        .ok_or(ApiError::NotFound("Notification not found"))?;

    Ok(Json(notification_response(row)))
}

fn notification_response(row: NotificationRow) -> NotificationResponse {
    NotificationResponse {
        id: parse_uuid(&row.id, "notification"),
        content: row.content,
        kind: row.kind,
        read: row.read,
        created_at: parse_created_at(&row.created_at, "notification"),
    }
}
