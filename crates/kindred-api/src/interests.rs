use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use kindred_types::api::{
    AddItemRequest, Claims, CreateInterestRequest, InterestResponse, ItemResponse,
    UpdateItemRequest,
};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::parse_uuid;

fn validate_rating(rating: i64) -> ApiResult<()> {
    if !(1..=10).contains(&rating) {
        return Err(ApiError::Validation(
            "Rating must be between 1 and 10".into(),
        ));
    }
    Ok(())
}

pub async fn create_interest(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateInterestRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.category.trim().is_empty() {
        return Err(ApiError::Validation("Category name is required".into()));
    }

    let id = Uuid::new_v4();
    state.db.insert_interest(
        &id.to_string(),
        &claims.sub.to_string(),
        req.category.trim(),
        req.visibility,
    )?;

    // New category starts with an empty items array.
    Ok((
        StatusCode::CREATED,
        Json(InterestResponse {
            id,
            user_id: claims.sub,
            category: req.category.trim().to_string(),
            visibility: req.visibility,
            items: vec![],
        }),
    ))
}

/// Any user's interest categories with their items. No tier shaping
/// applies to this listing.
pub async fn list_user_interests(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    if state.db.get_user_card(&user_id.to_string())?.is_none() {
        return Err(ApiError::NotFound("User not found"));
    }

    let interests: Vec<InterestResponse> = state
        .db
        .interests_with_items(&user_id.to_string(), None, None)?
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

    Ok(Json(interests))
}

pub async fn delete_interest(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let deleted = state
        .db
        .delete_interest_owned(&category_id.to_string(), &claims.sub.to_string())?;

    if !deleted {
        return Err(ApiError::NotFound("Interest category not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_item(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddItemRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Item name is required".into()));
    }
    validate_rating(req.rating)?;

    let item_id = Uuid::new_v4();
    let item = state
        .db
        .insert_item_owned(
            &item_id.to_string(),
            &category_id.to_string(),
            &claims.sub.to_string(),
            name,
            req.rating,
        )?
        .ok_or(ApiError::NotFound("Interest category not found"))?;

    Ok((
        StatusCode::CREATED,
        Json(ItemResponse {
            id: parse_uuid(&item.id, "item"),
            name: item.name,
            rating: item.rating,
        }),
    ))
}

pub async fn update_item(
    State(state): State<AppState>,
    Path((category_id, item_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateItemRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_rating(req.rating)?;

    let item = state
        .db
        .update_item_rating_owned(
            &category_id.to_string(),
            &claims.sub.to_string(),
            &item_id.to_string(),
            req.rating,
        )?
        .ok_or(ApiError::NotFound("Item not found"))?;

    Ok(Json(ItemResponse {
        id: parse_uuid(&item.id, "item"),
        name: item.name,
        rating: item.rating,
    }))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Path((category_id, item_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let owned = state.db.delete_item_owned(
        &category_id.to_string(),
        &claims.sub.to_string(),
        &item_id.to_string(),
    )?;

    if !owned {
        return Err(ApiError::NotFound("Interest category not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
