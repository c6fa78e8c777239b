// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{comments, moderation},
    state::AppState,
    utils::jwt::{auth_middleware, moderator_middleware},
};

/// Assembles the main application router.
///
/// * Lesson routes: reading a thread is public, writing requires a login.
/// * Moderation routes: login plus a moderator/admin role.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let lesson_routes = Router::new()
        .route(
            "/{lesson_id}/comments",
            get(comments::list_comments)
                .merge(post(comments::create_comment).route_layer(auth.clone())),
        )
        // Protected lesson routes
        .merge(
            Router::new()
                .route(
                    "/{lesson_id}/comments/{comment_id}/replies",
                    post(comments::create_reply),
                )
                .route("/{lesson_id}/refresh", post(comments::refresh_comments))
                .layer(auth.clone()),
        );

    let moderation_routes = Router::new()
        .route("/queue", get(moderation::list_queue))
        .route("/approve", post(moderation::approve))
        .route("/reject", post(moderation::reject))
        // Double middleware protection: Auth first, then Moderator check
        .layer(middleware::from_fn(moderator_middleware))
        .layer(auth);

    Router::new()
        .nest("/api/lessons", lesson_routes)
        .nest("/api/moderation", moderation_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
