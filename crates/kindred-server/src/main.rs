use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use kindred_api::auth::{self, AppState, AppStateInner};
use kindred_api::middleware::require_auth;
use kindred_api::{account, friends, interests, notifications, profile, recommendations};
use kindred_billing::http::HttpGateway;
use kindred_types::tier::InterestPolicy;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kindred=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("KINDRED_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("KINDRED_DB_PATH").unwrap_or_else(|_| "kindred.db".into());
    let host = std::env::var("KINDRED_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("KINDRED_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let billing_url = std::env::var("KINDRED_BILLING_URL")
        .unwrap_or_else(|_| "https://api.stripe.com".into());
    let billing_secret = std::env::var("KINDRED_BILLING_SECRET").unwrap_or_default();
    let interest_policy = InterestPolicy::from_env_str(
        &std::env::var("KINDRED_INTEREST_POLICY").unwrap_or_default(),
    );

    // Init database
    let db = kindred_db::Database::open(&PathBuf::from(&db_path))?;

    // Payment processor gateway
    let billing = Arc::new(HttpGateway::new(billing_url, billing_secret)?);

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        billing,
        interest_policy,
    });

    // Routes
    let public_routes = Router::new()
        .route("/api/auth/signup", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/users/profile", get(profile::get_profile))
        .route("/api/users/{user_id}/profile", put(profile::update_profile))
        .route(
            "/api/users/{user_id}/profile-picture",
            put(profile::update_avatar),
        )
        .route("/api/users/close-account", post(account::close_account))
        .route("/api/users/not-friends", get(friends::list_not_friends))
        .route("/api/users/{user_id}", get(profile::get_user))
        .route(
            "/api/users/{user_id}/interests",
            get(interests::list_user_interests),
        )
        .route("/api/friends", get(friends::list_friends))
        .route("/api/friend-requests", post(friends::send_request))
        .route("/api/friend-requests", get(friends::list_requests))
        .route("/api/friend-requests/{id}", put(friends::respond_request))
        .route("/api/notifications", get(notifications::list_notifications))
        .route("/api/notifications/{id}", put(notifications::mark_read))
        .route("/api/interests", post(interests::create_interest))
        .route(
            "/api/interests/{category_id}",
            delete(interests::delete_interest),
        )
        .route(
            "/api/interests/{category_id}/items",
            post(interests::add_item),
        )
        .route(
            "/api/interests/{category_id}/items/{item_id}",
            put(interests::update_item),
        )
        .route(
            "/api/interests/{category_id}/items/{item_id}",
            delete(interests::delete_item),
        )
        .route(
            "/api/recommendations",
            get(recommendations::list_recommendations),
        )
        .layer(middleware::from_fn(require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Kindred server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
