use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::comment::{Comment, ModerationStatus, Reply};

/// Read-only projection of a lesson's thread for the display layer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadView {
    pub lesson_id: String,
    pub max_depth: usize,
    pub comments: Vec<NodeView>,
}

/// A comment or reply annotated with its depth and whether a reply action is offered.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_reply_id: Option<String>,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub moderation_status: ModerationStatus,
    pub pending_moderation: bool,
    pub provisional: bool,
    pub depth: usize,
    pub can_reply: bool,
    pub replies: Vec<NodeView>,
}

impl ThreadView {
    pub fn build(lesson_id: &str, tree: &[Arc<Comment>], max_depth: usize) -> Self {
        Self {
            lesson_id: lesson_id.to_string(),
            max_depth,
            comments: tree
                .iter()
                .map(|comment| NodeView::from_comment(comment, max_depth))
                .collect(),
        }
    }
}

impl NodeView {
    fn from_comment(comment: &Comment, max_depth: usize) -> Self {
        Self {
            id: comment.id.clone(),
            parent_reply_id: None,
            user_id: comment.user_id.clone(),
            author_name: comment.author_name.clone(),
            body: comment.body.clone(),
            created_at: comment.created_at,
            moderation_status: comment.moderation.status(),
            pending_moderation: comment.moderation.pending_moderation(),
            provisional: comment.is_provisional(),
            depth: 0,
            can_reply: 0 < max_depth,
            replies: comment
                .replies
                .iter()
                .map(|reply| Self::from_reply(reply, 1, max_depth))
                .collect(),
        }
    }

    fn from_reply(reply: &Reply, depth: usize, max_depth: usize) -> Self {
        Self {
            id: reply.id.clone(),
            parent_reply_id: reply.parent_reply_id.clone(),
            user_id: reply.user_id.clone(),
            author_name: reply.author_name.clone(),
            body: reply.body.clone(),
            created_at: reply.created_at,
            moderation_status: reply.moderation.status(),
            pending_moderation: reply.moderation.pending_moderation(),
            provisional: reply.is_provisional(),
            depth,
            // Deeper replies still exist, they just can't be answered from here.
            can_reply: depth < max_depth,
            replies: reply
                .replies
                .iter()
                .map(|child| Self::from_reply(child, depth + 1, max_depth))
                .collect(),
        }
    }
}
