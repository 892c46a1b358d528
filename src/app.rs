use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::handlers::{protected, public};
use crate::middleware::{inject_repositories, require_authentication};
use crate::state::AppState;

/// Build the full router. The store provider, token service and config all
/// come in through `state`; nothing is read from process globals.
pub fn app(state: AppState) -> Router {
    let api = &state.config.api;
    let timeout = TimeoutLayer::new(Duration::from_secs(api.request_timeout_secs));
    let body_limit = DefaultBodyLimit::max(api.max_request_size_bytes);
    let cors = cors_layer(&state.config.security.cors_origins);

    Router::new()
        .route("/health", get(public::health_get))
        .merge(public_routes(&state))
        .merge(user_routes(&state))
        .merge(post_routes(&state))
        .fallback(not_found)
        // Global middleware, outermost first
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(cors)
                .layer(timeout)
                .layer(body_limit),
        )
        .with_state(state)
}

/// Login and registration: store access, no token.
fn public_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/login", post(public::login_post))
        .route("/users", post(public::register_post))
        .route_layer(from_fn_with_state(state.clone(), inject_repositories))
}

/// Wrap protected routes so that authentication runs first and the store
/// handle is only acquired for an authenticated request.
fn protect(routes: Router<AppState>, state: &AppState) -> Router<AppState> {
    routes
        .route_layer(from_fn_with_state(state.clone(), inject_repositories))
        .route_layer(from_fn_with_state(state.clone(), require_authentication))
}

fn user_routes(state: &AppState) -> Router<AppState> {
    use protected::{follow, users};

    let routes = Router::new()
        .route("/users", get(users::list))
        .route(
            "/users/:id",
            get(users::get).put(users::put).delete(users::delete),
        )
        .route("/users/:id/follow", post(follow::follow))
        .route("/users/:id/unfollow", post(follow::unfollow))
        .route("/users/:id/followers", get(follow::followers))
        .route("/users/:id/following", get(follow::following))
        .route("/users/:id/update-password", post(users::update_password))
        .route("/users/:id/posts", get(users::posts));

    protect(routes, state)
}

fn post_routes(state: &AppState) -> Router<AppState> {
    use protected::posts;

    let routes = Router::new()
        .route("/posts", post(posts::create).get(posts::feed))
        .route(
            "/posts/:id",
            get(posts::get).put(posts::put).delete(posts::delete),
        )
        .route("/posts/:id/like", post(posts::like))
        .route("/posts/:id/unlike", post(posts::unlike));

    protect(routes, state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

fn request_span(request: &Request) -> tracing::Span {
    tracing::info_span!(
        "request",
        id = %Uuid::new_v4(),
        method = %request.method(),
        path = %request.uri().path(),
    )
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
