use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        comment::{CreateCommentRequest, CreateReplyRequest},
        view::ThreadView,
    },
    thread::ThreadEngine,
    utils::jwt::{BearerToken, Claims},
};

/// Lesson thread as the display layer renders it.
pub async fn list_comments(
    State(engine): State<Arc<ThreadEngine>>,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let thread = engine.thread(&lesson_id).await?;
    let tree = thread.tree();

    Ok(Json(ThreadView::build(
        &lesson_id,
        &tree,
        engine.max_reply_depth(),
    )))
}

/// Post a root comment on a lesson.
/// Requires: Login.
pub async fn create_comment(
    State(engine): State<Arc<ThreadEngine>>,
    Extension(claims): Extension<Claims>,
    Extension(token): Extension<BearerToken>,
    Path(lesson_id): Path<String>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let thread = engine.thread(&lesson_id).await?;
    let comment = thread
        .submit_comment(&claims.actor(Some(&token)), &payload.body)
        .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// Reply to a comment, or to one of its replies when `parentReplyId` is given.
/// Requires: Login.
pub async fn create_reply(
    State(engine): State<Arc<ThreadEngine>>,
    Extension(claims): Extension<Claims>,
    Extension(token): Extension<BearerToken>,
    Path((lesson_id, comment_id)): Path<(String, String)>,
    Json(payload): Json<CreateReplyRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let thread = engine.thread(&lesson_id).await?;
    let reply = thread
        .submit_reply(
            &claims.actor(Some(&token)),
            &comment_id,
            payload.parent_reply_id.as_deref(),
            &payload.body,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(reply)))
}

/// Pull a fresh copy of the lesson's tree from the comment server.
/// Requires: Login.
pub async fn refresh_comments(
    State(engine): State<Arc<ThreadEngine>>,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let thread = engine.thread(&lesson_id).await?;
    let tree = thread.refresh().await?;

    Ok(Json(ThreadView::build(
        &lesson_id,
        &tree,
        engine.max_reply_depth(),
    )))
}
