//! The comment server as seen from the thread engine.
//!
//! Storage lives behind this contract. [`HttpCommentApi`] talks to the real
//! server; [`MemoryCommentApi`] keeps everything in process for local runs
//! and tests.

pub mod http;
pub mod memory;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        comment::{RawComment, RawReply},
        moderation::{ModerationAction, ModerationFilters, ModerationQueueItem},
    },
};

pub use http::HttpCommentApi;
pub use memory::MemoryCommentApi;

/// Who is acting. Identity is established by the external auth service; the
/// bearer token, when present, is forwarded so the server applies its own policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub display_name: Option<String>,
    pub token: Option<String>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }
}

/// Create/list/moderate contract of the comment server.
#[async_trait]
pub trait CommentApi: Send + Sync {
    async fn create_comment(
        &self,
        actor: &Actor,
        lesson_id: &str,
        body: &str,
    ) -> Result<RawComment, AppError>;

    async fn create_reply(
        &self,
        actor: &Actor,
        comment_id: &str,
        parent_reply_id: Option<&str>,
        body: &str,
    ) -> Result<RawReply, AppError>;

    /// Full tree for a lesson.
    async fn list_comments(&self, lesson_id: &str) -> Result<Vec<RawComment>, AppError>;

    async fn moderate_comment(
        &self,
        actor: &Actor,
        comment_id: &str,
        action: ModerationAction,
    ) -> Result<RawComment, AppError>;

    async fn moderate_reply(
        &self,
        actor: &Actor,
        comment_id: &str,
        reply_id: &str,
        action: ModerationAction,
    ) -> Result<RawReply, AppError>;

    async fn list_pending_moderation_items(
        &self,
        filters: &ModerationFilters,
    ) -> Result<Vec<ModerationQueueItem>, AppError>;
}
