use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;
use uuid::Uuid;

use kindred_types::api::{
    Claims, FriendRequestResponse, FriendResponse, NotFriendResponse, PendingRequestResponse,
    RequestBadge, RespondFriendRequestRequest, SendFriendRequestRequest,
};
use kindred_types::models::{
    NOTIFY_FRIEND_ACCEPTED, NOTIFY_FRIEND_REQUEST, RequestStatus,
};
use kindred_types::tier::{Tier, limits_for};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::{parse_created_at, parse_uuid};

/// Send a friend request. Any existing request between the pair, in either
/// direction and any status, blocks a new one. The receiver is notified
/// after the request row has committed.
pub async fn send_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendFriendRequestRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.receiver_id == claims.sub {
        return Err(ApiError::Validation(
            "Cannot send a friend request to yourself".into(),
        ));
    }

    let sender = state
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or(ApiError::NotFound("User not found"))?;

    let request_id = Uuid::new_v4();
    let request = state
        .db
        .create_friend_request(
            &request_id.to_string(),
            &claims.sub.to_string(),
            &req.receiver_id.to_string(),
        )?
        .ok_or_else(|| ApiError::Conflict("Friend request already sent".into()))?;

    // Notify only after the request is durable.
    state.db.insert_notification(
        &Uuid::new_v4().to_string(),
        &req.receiver_id.to_string(),
        &format!("You have a new friend request from {}", sender.name),
        NOTIFY_FRIEND_REQUEST,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(request_response(&request)),
    ))
}

/// Accept or reject a pending request addressed to the caller. A request
/// that is absent, already resolved, or addressed to someone else reads
/// as not-found. Acceptance writes both friendship edges with the status
/// flip in one transaction; both parties are notified after commit.
pub async fn respond_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RespondFriendRequestRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.status == RequestStatus::Pending {
        return Err(ApiError::Validation(
            "Status must be accepted or rejected".into(),
        ));
    }

    let request = state
        .db
        .respond_to_request(
            &request_id.to_string(),
            &claims.sub.to_string(),
            req.status.as_str(),
        )?
        .ok_or(ApiError::NotFound("Friend request not found"))?;

    if req.status == RequestStatus::Accepted {
        let receiver_id = claims.sub.to_string();
        let names = state
            .db
            .display_names(&[receiver_id.clone(), request.sender_id.clone()])?;
        let sender_name = names.get(&request.sender_id).cloned().unwrap_or_default();
        let receiver_name = names.get(&receiver_id).cloned().unwrap_or_default();

        state.db.insert_notification(
            &Uuid::new_v4().to_string(),
            &receiver_id,
            &format!("You are now friends with {}", sender_name),
            NOTIFY_FRIEND_ACCEPTED,
        )?;
        state.db.insert_notification(
            &Uuid::new_v4().to_string(),
            &request.sender_id,
            &format!("{} has accepted your friend request", receiver_name),
            NOTIFY_FRIEND_ACCEPTED,
        )?;
    }

    Ok(Json(serde_json::json!({
        "message": format!("Friend request {}", req.status.as_str())
    })))
}

/// Pending requests addressed to the caller, newest first.
pub async fn list_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let rows = state.db.list_pending_requests(&claims.sub.to_string())?;

    let requests: Vec<PendingRequestResponse> = rows
        .into_iter()
        .map(|row| PendingRequestResponse {
            id: parse_uuid(&row.id, "friend request"),
            sender_id: parse_uuid(&row.sender_id, "friend request"),
            status: RequestStatus::parse(&row.status).unwrap_or(RequestStatus::Pending),
            name: row.name,
            username: row.username,
            avatar: row.avatar,
        })
        .collect();

    Ok(Json(requests))
}

/// Friends list, gated by tier. The tier comes from storage, not from the
/// token. Exactly at Basic the list is capped.
pub async fn list_friends(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let st = state.clone();
    let uid = claims.sub.to_string();

    let rows = tokio::task::spawn_blocking(move || {
        let tier: Tier = st
            .db
            .get_tier(&uid)?
            .ok_or(ApiError::NotFound("User not found"))?
            .parse()
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("{}", e)))?;

        let limits = limits_for(tier);
        if !limits.can_see_friends_list {
            return Err(ApiError::Forbidden(
                "Upgrade required to access friends list",
            ));
        }

        let mut rows = st.db.list_friends(&uid)?;
        if let Some(cap) = limits.friends_list_cap {
            rows.truncate(cap as usize);
        }
        Ok::<_, ApiError>(rows)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!("join error: {}", e))
    })??;

    let friends: Vec<FriendResponse> = rows
        .into_iter()
        .map(|row| FriendResponse {
            id: parse_uuid(&row.id, "friend"),
            name: row.name,
            username: row.username,
            avatar: row.avatar,
        })
        .collect();

    Ok(Json(friends))
}

/// Everyone the caller is not friends with, annotated with any
/// outstanding request between them. Open to all tiers.
pub async fn list_not_friends(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let st = state.clone();
    let uid = claims.sub.to_string();

    let rows = tokio::task::spawn_blocking(move || st.db.list_not_friends(&uid))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("join error: {}", e))
        })??;

    let users: Vec<NotFriendResponse> = rows
        .into_iter()
        .map(|row| {
            let badge = match (&row.request_status, &row.request_id) {
                (Some(status), Some(id)) => RequestStatus::parse(status).map(|status| {
                    RequestBadge {
                        status,
                        request_id: parse_uuid(id, "friend request"),
                    }
                }),
                _ => None,
            };
            NotFriendResponse {
                id: parse_uuid(&row.id, "user"),
                name: row.name,
                username: row.username,
                email: row.email,
                avatar: row.avatar,
                friend_request_status: badge,
            }
        })
        .collect();

    Ok(Json(users))
}

fn request_response(row: &kindred_db::models::FriendRequestRow) -> FriendRequestResponse {
    FriendRequestResponse {
        id: parse_uuid(&row.id, "friend request"),
        sender_id: parse_uuid(&row.sender_id, "friend request"),
        receiver_id: parse_uuid(&row.receiver_id, "friend request"),
        status: RequestStatus::parse(&row.status).unwrap_or(RequestStatus::Pending),
        created_at: parse_created_at(&row.created_at, "friend request"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use axum::response::Response;

    use kindred_billing::stub::StubGateway;
    use kindred_db::Database;
    use kindred_types::tier::InterestPolicy;

    use super::*;
    use crate::auth::AppStateInner;

    fn test_state() -> AppState {
        Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: "test-secret".into(),
            billing: Arc::new(StubGateway::default()),
            interest_policy: InterestPolicy::default(),
        })
    }

    fn add_user(state: &AppStateInner, name: &str, tier: &str) -> Uuid {
        let id = Uuid::new_v4();
        state
            .db
            .create_user(
                &id.to_string(),
                name,
                &format!("{}-{}", name.to_lowercase(), id.simple()),
                &format!("{}@example.com", id.simple()),
                "not-a-real-hash",
            )
            .unwrap();
        state
            .db
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE users SET payment_tier = ?1 WHERE id = ?2",
                    rusqlite::params![tier, id.to_string()],
                )?;
                Ok(())
            })
            .unwrap();
        id
    }

    fn befriend(state: &AppStateInner, a: Uuid, b: Uuid) {
        state
            .db
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO friendships (user_id, friend_id) VALUES (?1, ?2), (?2, ?1)",
                    rusqlite::params![a.to_string(), b.to_string()],
                )?;
                Ok(())
            })
            .unwrap();
    }

    fn claims_for(sub: Uuid) -> Claims {
        Claims {
            sub,
            username: "test".into(),
            exp: 0,
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn send(state: &AppState, sender: Uuid, receiver: Uuid) -> ApiResult<Response> {
        send_request(
            State(state.clone()),
            Extension(claims_for(sender)),
            Json(SendFriendRequestRequest {
                receiver_id: receiver,
            }),
        )
        .await
        .map(axum::response::IntoResponse::into_response)
    }

    #[tokio::test]
    async fn second_identical_request_is_a_conflict() {
        let state = test_state();
        let a = add_user(&state, "Alice", "Free");
        let b = add_user(&state, "Bob", "Free");

        let response = send(&state, a, b).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let second = send(&state, a, b).await;
        assert!(matches!(second, Err(ApiError::Conflict(_))));

        let rows: i64 = state
            .db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM friend_requests", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(rows, 1);

        // The receiver heard about it once.
        let inbox = state.db.list_notifications(&b.to_string()).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, "friend_request");
        assert!(inbox[0].content.contains("Alice"));
    }

    #[tokio::test]
    async fn sending_to_yourself_is_rejected() {
        let state = test_state();
        let a = add_user(&state, "Alice", "Free");

        let result = send(&state, a, a).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn acceptance_writes_edges_and_notifies_both_parties() {
        let state = test_state();
        let a = add_user(&state, "Alice", "Free");
        let b = add_user(&state, "Bob", "Free");

        send(&state, a, b).await.unwrap();
        let request_id = state
            .db
            .list_pending_requests(&b.to_string())
            .unwrap()
            .remove(0)
            .id;

        respond_request(
            State(state.clone()),
            Path(request_id.parse().unwrap()),
            Extension(claims_for(b)),
            Json(RespondFriendRequestRequest {
                status: RequestStatus::Accepted,
            }),
        )
        .await
        .unwrap();

        // Both directed edges exist.
        let a_friends = state.db.list_friends(&a.to_string()).unwrap();
        let b_friends = state.db.list_friends(&b.to_string()).unwrap();
        assert_eq!(a_friends.len(), 1);
        assert_eq!(b_friends.len(), 1);

        // One friend_accepted notification per participant, naming the
        // other party.
        let to_a = state.db.list_notifications(&a.to_string()).unwrap();
        let accepted_a: Vec<_> = to_a.iter().filter(|n| n.kind == "friend_accepted").collect();
        assert_eq!(accepted_a.len(), 1);
        assert!(accepted_a[0].content.contains("Bob"));

        let to_b = state.db.list_notifications(&b.to_string()).unwrap();
        let accepted_b: Vec<_> = to_b.iter().filter(|n| n.kind == "friend_accepted").collect();
        assert_eq!(accepted_b.len(), 1);
        assert!(accepted_b[0].content.contains("Alice"));
    }

    #[tokio::test]
    async fn responding_twice_is_not_found() {
        let state = test_state();
        let a = add_user(&state, "Alice", "Free");
        let b = add_user(&state, "Bob", "Free");

        send(&state, a, b).await.unwrap();
        let request_id: Uuid = state
            .db
            .list_pending_requests(&b.to_string())
            .unwrap()
            .remove(0)
            .id
            .parse()
            .unwrap();

        let respond = |status: RequestStatus| {
            respond_request(
                State(state.clone()),
                Path(request_id),
                Extension(claims_for(b)),
                Json(RespondFriendRequestRequest { status }),
            )
        };

        respond(RequestStatus::Rejected).await.unwrap();
        let second = respond(RequestStatus::Rejected).await;
        assert!(matches!(second, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn free_tier_cannot_see_friends_list() {
        let state = test_state();
        let a = add_user(&state, "Alice", "Free");

        let result = list_friends(State(state.clone()), Extension(claims_for(a))).await;
        assert!(matches!(result, Err(ApiError::Forbidden(_))));
    }

    #[tokio::test]
    async fn basic_tier_sees_at_most_ten_friends() {
        let state = test_state();
        let a = add_user(&state, "Alice", "Basic");
        for i in 0..15 {
            let friend = add_user(&state, &format!("Friend{}", i), "Free");
            befriend(&state, a, friend);
        }

        let response = list_friends(State(state.clone()), Extension(claims_for(a)))
            .await
            .unwrap()
            .into_response();
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn premium_tier_sees_every_friend() {
        let state = test_state();
        let a = add_user(&state, "Alice", "Premium");
        for i in 0..15 {
            let friend = add_user(&state, &format!("Friend{}", i), "Free");
            befriend(&state, a, friend);
        }

        let response = list_friends(State(state.clone()), Extension(claims_for(a)))
            .await
            .unwrap()
            .into_response();
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 15);
    }

    #[tokio::test]
    async fn not_friends_listing_is_open_to_free_tier() {
        let state = test_state();
        let a = add_user(&state, "Alice", "Free");
        let b = add_user(&state, "Bob", "Free");

        send(&state, a, b).await.unwrap();

        let response = list_not_friends(State(state.clone()), Extension(claims_for(a)))
            .await
            .unwrap()
            .into_response();
        let body = body_json(response).await;
        let listed = body.as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["friend_request_status"]["status"], "pending");
    }
}
