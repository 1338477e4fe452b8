use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::error;
use uuid::Uuid;

use kindred_db::models::UserRow;
use kindred_types::api::{
    Claims, InterestResponse, ItemResponse, ProfileResponse, UpdateAvatarRequest,
    UpdateProfileRequest, UserCardResponse, UserResponse,
};
use kindred_types::tier::{InterestPolicy, Tier, limits_for};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::parse_uuid;

/// The authenticated user's profile, with interest categories and items
/// shaped by the configured visibility policy. The default policy returns
/// everything regardless of tier.
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let st = state.clone();
    let uid = claims.sub.to_string();

    // Run blocking DB reads off the async runtime
    let (user, interests) = tokio::task::spawn_blocking(move || {
        let user = st
            .db
            .get_user_by_id(&uid)?
            .ok_or(ApiError::NotFound("User not found"))?;

        let tier: Tier = user
            .payment_tier
            .parse()
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("{}", e)))?;

        let (category_cap, item_cap) = match st.interest_policy {
            InterestPolicy::Unrestricted => (None, None),
            InterestPolicy::Capped => {
                let limits = limits_for(tier);
                (limits.interest_category_cap, limits.items_per_category_cap)
            }
        };

        let interests = st.db.interests_with_items(&uid, category_cap, item_cap)?;
        Ok::<_, ApiError>((user, interests))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!("join error: {}", e))
    })??;

    let interests = interests
        .into_iter()
        .map(|(interest, items)| InterestResponse {
            id: parse_uuid(&interest.id, "interest"),
            user_id: parse_uuid(&interest.user_id, "interest"),
            category: interest.category,
            visibility: interest.visibility,
            items: items
                .into_iter()
                .map(|item| ItemResponse {
                    id: parse_uuid(&item.id, "item"),
                    name: item.name,
                    rating: item.rating,
                })
                .collect(),
        })
        .collect();

    let user = user_response(user)?;
    Ok(Json(ProfileResponse {
        id: user.id,
        name: user.name,
        username: user.username,
        email: user.email,
        avatar: user.avatar,
        bio: user.bio,
        bio_visibility: user.bio_visibility,
        interests_visibility: user.interests_visibility,
        city: user.city,
        state: user.state,
        payment_tier: user.payment_tier,
        interests,
    }))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    // Users edit their own profile only.
    if user_id != claims.sub {
        return Err(ApiError::Forbidden("Not authorized to edit this profile"));
    }

    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("Name is required".into()));
    }
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::Validation(
            "Username must be 3-32 characters".into(),
        ));
    }

    let updated = state.db.update_profile(
        &user_id.to_string(),
        &req.name,
        &req.username,
        req.bio.as_deref(),
        req.city.as_deref(),
        req.state.as_deref(),
        req.bio_visibility,
    );

    match updated {
        Ok(Some(row)) => Ok(Json(user_response(row)?)),
        Ok(None) => Err(ApiError::NotFound("User not found")),
        Err(e) if kindred_db::is_unique_violation(&e) => {
            Err(ApiError::Conflict("Username already taken".into()))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn update_avatar(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateAvatarRequest>,
) -> ApiResult<impl IntoResponse> {
    if user_id != claims.sub {
        return Err(ApiError::Forbidden("Not authorized to edit this profile"));
    }

    let row = state
        .db
        .update_avatar(&user_id.to_string(), &req.avatar)?
        .ok_or(ApiError::NotFound("User not found"))?;

    Ok(Json(user_response(row)?))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let card = state
        .db
        .get_user_card(&id.to_string())?
        .ok_or(ApiError::NotFound("User not found"))?;

    Ok(Json(UserCardResponse {
        id: parse_uuid(&card.id, "user"),
        name: card.name,
        username: card.username,
        email: card.email,
        avatar: card.avatar,
    }))
}

fn user_response(row: UserRow) -> ApiResult<UserResponse> {
    let tier: Tier = row
        .payment_tier
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("{}", e)))?;

    Ok(UserResponse {
        id: parse_uuid(&row.id, "user"),
        name: row.name,
        username: row.username,
        email: row.email,
        avatar: row.avatar,
        bio: row.bio,
        bio_visibility: row.bio_visibility,
        interests_visibility: row.interests_visibility,
        city: row.city,
        state: row.state,
        payment_tier: tier,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::to_bytes;

    use kindred_billing::stub::StubGateway;
    use kindred_db::Database;
    use kindred_types::api::Claims;

    use super::*;
    use crate::auth::AppStateInner;

    fn state_with_policy(policy: InterestPolicy) -> AppState {
        Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: "test-secret".into(),
            billing: Arc::new(StubGateway::default()),
            interest_policy: policy,
        })
    }

    fn add_user(state: &AppStateInner, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        state
            .db
            .create_user(
                &id.to_string(),
                name,
                &format!("{}-{}", name.to_lowercase(), &id.simple().to_string()[..8]),
                &format!("{}@example.com", id.simple()),
                "not-a-real-hash",
            )
            .unwrap();
        id
    }

    fn seed_interests(state: &AppStateInner, user_id: Uuid, categories: usize, items: usize) {
        for c in 0..categories {
            let category = Uuid::new_v4().to_string();
            state
                .db
                .insert_interest(&category, &user_id.to_string(), &format!("Category {}", c), true)
                .unwrap();
            for i in 0..items {
                state
                    .db
                    .insert_item_owned(
                        &Uuid::new_v4().to_string(),
                        &category,
                        &user_id.to_string(),
                        &format!("Item {}", i),
                        5,
                    )
                    .unwrap()
                    .unwrap();
            }
        }
    }

    fn claims_for(sub: Uuid) -> Claims {
        Claims {
            sub,
            username: "test".into(),
            exp: 0,
        }
    }

    async fn profile_interests(state: &AppState, user: Uuid) -> serde_json::Value {
        let response = get_profile(State(state.clone()), Extension(claims_for(user)))
            .await
            .unwrap()
            .into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        body["interests"].clone()
    }

    #[tokio::test]
    async fn unrestricted_policy_returns_everything_for_free_tier() {
        let state = state_with_policy(InterestPolicy::Unrestricted);
        let user = add_user(&state, "Ada");
        seed_interests(&state, user, 4, 6);

        let interests = profile_interests(&state, user).await;
        let categories = interests.as_array().unwrap();
        assert_eq!(categories.len(), 4);
        assert!(categories
            .iter()
            .all(|c| c["items"].as_array().unwrap().len() == 6));
    }

    #[tokio::test]
    async fn capped_policy_limits_free_tier_to_three_and_five() {
        let state = state_with_policy(InterestPolicy::Capped);
        let user = add_user(&state, "Ada");
        seed_interests(&state, user, 4, 6);

        let interests = profile_interests(&state, user).await;
        let categories = interests.as_array().unwrap();
        assert_eq!(categories.len(), 3);
        assert!(categories
            .iter()
            .all(|c| c["items"].as_array().unwrap().len() == 5));
    }

    #[tokio::test]
    async fn capped_policy_leaves_basic_tier_unrestricted() {
        let state = state_with_policy(InterestPolicy::Capped);
        let user = add_user(&state, "Ada");
        state
            .db
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE users SET payment_tier = 'Basic' WHERE id = ?1",
                    [user.to_string()],
                )?;
                Ok(())
            })
            .unwrap();
        seed_interests(&state, user, 4, 6);

        let interests = profile_interests(&state, user).await;
        assert_eq!(interests.as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn editing_another_users_profile_is_forbidden() {
        let state = state_with_policy(InterestPolicy::Unrestricted);
        let ada = add_user(&state, "Ada");
        let eve = add_user(&state, "Eve");

        let result = update_profile(
            State(state.clone()),
            Path(ada),
            Extension(claims_for(eve)),
            Json(UpdateProfileRequest {
                name: "Ada".into(),
                username: "hijacked".into(),
                bio: None,
                city: None,
                state: None,
                bio_visibility: true,
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Forbidden(_))));

        let avatar = update_avatar(
            State(state.clone()),
            Path(ada),
            Extension(claims_for(eve)),
            Json(UpdateAvatarRequest {
                avatar: "https://example.com/avatar.png".into(),
            }),
        )
        .await;
        assert!(matches!(avatar, Err(ApiError::Forbidden(_))));
    }

    #[tokio::test]
    async fn username_collision_on_update_is_a_conflict() {
        let state = state_with_policy(InterestPolicy::Unrestricted);
        let ada = add_user(&state, "Ada");
        let eve = add_user(&state, "Eve");
        let taken = state
            .db
            .get_user_by_id(&eve.to_string())
            .unwrap()
            .unwrap()
            .username;

        let result = update_profile(
            State(state.clone()),
            Path(ada),
            Extension(claims_for(ada)),
            Json(UpdateProfileRequest {
                name: "Ada".into(),
                username: taken,
                bio: None,
                city: None,
                state: None,
                bio_visibility: true,
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));
    }
}
