use axum::{Extension, Json, extract::State, response::IntoResponse};

use kindred_types::api::{Claims, RecommendationResponse};
use kindred_types::tier::{Tier, limits_for};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// Premium-gated. Content generation lives elsewhere; this serves a
/// placeholder list once the gate passes.
pub async fn list_recommendations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let tier: Tier = state
        .db
        .get_tier(&claims.sub.to_string())?
        .ok_or(ApiError::NotFound("User not found"))?
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("{}", e)))?;

    if !limits_for(tier).can_see_recommendations {
        return Err(ApiError::Forbidden(
            "Upgrade to Premium to access recommendations",
        ));
    }

    let recommendations = vec![RecommendationResponse {
        id: 1,
        category: "Books".to_string(),
        item: "The Hitchhiker's Guide to the Galaxy".to_string(),
        description: "A sci-fi comedy classic that matches your interest in \
                      humorous literature and space exploration."
            .to_string(),
        rating: 4.5,
    }];

    Ok(Json(recommendations))
}
