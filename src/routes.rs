use std::time::Duration;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use http::{Method, header};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{handlers, middleware_layer, repositories::Store, state::AppState};

/// Builds the application router.
///
/// Routes are grouped by the access they demand; each protected group carries
/// its gate as a `route_layer`, so unknown paths still answer 404.
pub fn build_router<S: Store>(state: AppState<S>) -> Router {
    let public_routes = Router::new()
        .route("/auth/sign-up", post(handlers::auth::sign_up::<S>))
        .route("/auth/sign-in", post(handlers::auth::sign_in::<S>))
        .route(
            "/auth/send-code-to-mail",
            post(handlers::auth::send_code_to_mail::<S>),
        )
        .route("/auth/verify-code", post(handlers::auth::verify_code::<S>))
        .route(
            "/auth/reset-password",
            post(handlers::auth::reset_password::<S>),
        )
        .route(
            "/api/session/refresh-token",
            post(handlers::session::refresh_token::<S>),
        )
        .route(
            "/api/session/validate-session",
            get(handlers::session::validate_session::<S>),
        )
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/sign-out", post(handlers::auth::sign_out::<S>))
        .route("/api/user/getAll", get(handlers::users::list_users::<S>))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth::<S>,
        ))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route(
            "/api/session/getAll",
            get(handlers::session::list_sessions::<S>),
        )
        .route("/api/user/promote", post(handlers::users::promote::<S>))
        .route("/api/user/demote", post(handlers::users::demote::<S>))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_admin::<S>,
        ))
        .with_state(state.clone());

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(Duration::from_secs(86400));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().level(Level::INFO))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(cors)
}
