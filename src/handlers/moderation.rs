// src/handlers/moderation.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::moderation::{ModeratedNode, ModerationAction, ModerationFilters, ModerationTarget},
    thread::ThreadEngine,
    utils::jwt::{BearerToken, Claims},
};

/// Pending comments and replies, flattened depth-first.
/// Moderator only.
pub async fn list_queue(
    State(engine): State<Arc<ThreadEngine>>,
    Query(filters): Query<ModerationFilters>,
) -> Result<impl IntoResponse, AppError> {
    let items = engine.queue().refresh(filters).await?;
    Ok(Json(items))
}

/// Approve a comment (no `replyId`) or a reply.
/// Moderator only.
pub async fn approve(
    State(engine): State<Arc<ThreadEngine>>,
    Extension(claims): Extension<Claims>,
    Extension(token): Extension<BearerToken>,
    Json(target): Json<ModerationTarget>,
) -> Result<impl IntoResponse, AppError> {
    moderate(&engine, &claims, &token, target, ModerationAction::Approve).await
}

/// Reject a comment (no `replyId`) or a reply.
/// Moderator only.
pub async fn reject(
    State(engine): State<Arc<ThreadEngine>>,
    Extension(claims): Extension<Claims>,
    Extension(token): Extension<BearerToken>,
    Json(target): Json<ModerationTarget>,
) -> Result<impl IntoResponse, AppError> {
    moderate(&engine, &claims, &token, target, ModerationAction::Reject).await
}

async fn moderate(
    engine: &ThreadEngine,
    claims: &Claims,
    token: &BearerToken,
    target: ModerationTarget,
    action: ModerationAction,
) -> Result<Json<ModeratedNode>, AppError> {
    if target.comment_id.trim().is_empty() {
        return Err(AppError::BadRequest("commentId is required".to_string()));
    }

    let node = engine
        .moderate(&claims.actor(Some(token)), &target, action)
        .await?;

    Ok(Json(node))
}
