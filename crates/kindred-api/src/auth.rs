use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use kindred_billing::PaymentGateway;
use kindred_db::Database;
use kindred_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use kindred_types::tier::InterestPolicy;

use crate::error::{ApiError, ApiResult};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub billing: Arc<dyn PaymentGateway>,
    pub interest_policy: InterestPolicy,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    // Validate input
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("Name is required".into()));
    }
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::Validation(
            "Username must be 3-32 characters".into(),
        ));
    }
    if !req.email.contains('@') {
        return Err(ApiError::Validation("A valid email is required".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }

    if state.db.email_taken(&req.email)? {
        return Err(ApiError::Conflict("Email already in use".into()));
    }
    if state.db.username_taken(&req.username)? {
        return Err(ApiError::Conflict("Username already taken".into()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hash failed: {}", e)))?
        .to_string();

    let user_id = Uuid::new_v4();

    // The pre-checks race against concurrent signups; the UNIQUE
    // constraints are authoritative.
    if let Err(e) = state.db.create_user(
        &user_id.to_string(),
        &req.name,
        &req.username,
        &req.email,
        &password_hash,
    ) {
        if kindred_db::is_unique_violation(&e) {
            return Err(ApiError::Conflict("Email or username already in use".into()));
        }
        return Err(e.into());
    }

    let token = create_token(&state.jwt_secret, user_id, &req.username)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { user_id, token }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .db
        .get_user_by_email(&req.email)?
        .ok_or(ApiError::Unauthorized("Invalid email or password"))?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored hash unreadable: {}", e)))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized("Invalid email or password"))?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id: {}", e)))?;

    let token = create_token(&state.jwt_secret, user_id, &user.username)?;

    Ok(Json(LoginResponse {
        user_id,
        username: user.username,
        token,
    }))
}

pub(crate) fn create_token(secret: &str, user_id: Uuid, username: &str) -> ApiResult<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("token encode failed: {}", e)))?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    use kindred_billing::stub::StubGateway;

    use super::*;

    fn test_state() -> AppState {
        Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: "test-secret".into(),
            billing: Arc::new(StubGateway::default()),
            interest_policy: InterestPolicy::default(),
        })
    }

    fn signup(name: &str, username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.into(),
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn register_then_login_round_trips() {
        let state = test_state();

        let response = register(
            State(state.clone()),
            Json(signup("Ada", "ada", "ada@example.com", "correct horse")),
        )
        .await
        .unwrap()
        .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let login_ok = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "ada@example.com".into(),
                password: "correct horse".into(),
            }),
        )
        .await;
        assert!(login_ok.is_ok());
    }

    #[tokio::test]
    async fn taken_email_and_username_are_conflicts() {
        let state = test_state();
        register(
            State(state.clone()),
            Json(signup("Ada", "ada", "ada@example.com", "correct horse")),
        )
        .await
        .unwrap();

        let same_email = register(
            State(state.clone()),
            Json(signup("Eve", "eve", "ada@example.com", "password123")),
        )
        .await;
        assert!(matches!(same_email, Err(ApiError::Conflict(_))));

        let same_username = register(
            State(state.clone()),
            Json(signup("Eve", "ada", "eve@example.com", "password123")),
        )
        .await;
        assert!(matches!(same_username, Err(ApiError::Conflict(_))));
    }

    #[tokio::test]
    async fn bad_credentials_are_unauthorized() {
        let state = test_state();
        register(
            State(state.clone()),
            Json(signup("Ada", "ada", "ada@example.com", "correct horse")),
        )
        .await
        .unwrap();

        let wrong_password = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "ada@example.com".into(),
                password: "wrong horse".into(),
            }),
        )
        .await;
        assert!(matches!(wrong_password, Err(ApiError::Unauthorized(_))));

        let unknown_email = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "nobody@example.com".into(),
                password: "correct horse".into(),
            }),
        )
        .await;
        assert!(matches!(unknown_email, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn weak_passwords_are_rejected() {
        let state = test_state();
        let result = register(
            State(state.clone()),
            Json(signup("Ada", "ada", "ada@example.com", "short")),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }
}
