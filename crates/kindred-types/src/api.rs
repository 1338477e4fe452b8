use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::RequestStatus;
use crate::tier::Tier;

// -- JWT Claims --

/// Canonical claims definition, shared by the REST middleware and the
/// token mint in kindred-api.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Users / profile --

/// A user as returned to clients. The password hash never leaves storage.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub bio_visibility: bool,
    pub interests_visibility: bool,
    pub city: Option<String>,
    pub state: Option<String>,
    pub payment_tier: Tier,
}

/// Compact user card for listings (not-friends, user fetch).
#[derive(Debug, Serialize)]
pub struct UserCardResponse {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub bio_visibility: bool,
    pub interests_visibility: bool,
    pub city: Option<String>,
    pub state: Option<String>,
    pub payment_tier: Tier,
    pub interests: Vec<InterestResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub username: String,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub bio_visibility: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateAvatarRequest {
    pub avatar: String,
}

// -- Interests --

fn default_visibility() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateInterestRequest {
    pub category: String,
    #[serde(default = "default_visibility")]
    pub visibility: bool,
}

#[derive(Debug, Serialize)]
pub struct InterestResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category: String,
    pub visibility: bool,
    pub items: Vec<ItemResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddItemRequest {
    pub name: String,
    pub rating: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateItemRequest {
    pub rating: i64,
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: Uuid,
    pub name: String,
    pub rating: i64,
}

// -- Friends --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendFriendRequestRequest {
    pub receiver_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct FriendRequestResponse {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RespondFriendRequestRequest {
    pub status: RequestStatus,
}

/// Incoming pending request joined with the sender's card fields.
#[derive(Debug, Serialize)]
pub struct PendingRequestResponse {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub status: RequestStatus,
    pub name: String,
    pub username: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FriendResponse {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub avatar: Option<String>,
}

/// Outstanding request between the caller and a listed user, in either
/// direction, so clients can render pending/accepted/rejected badges.
#[derive(Debug, Serialize)]
pub struct RequestBadge {
    pub status: RequestStatus,
    pub request_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct NotFriendResponse {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub friend_request_status: Option<RequestBadge>,
}

// -- Notifications --

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

// -- Recommendations --

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationResponse {
    pub id: u32,
    pub category: String,
    pub item: String,
    pub description: String,
    pub rating: f32,
}
