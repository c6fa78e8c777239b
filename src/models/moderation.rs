use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::comment::{Comment, ModerationStatus, Reply};

/// The two actions a moderator can take. There is deliberately no action
/// that leads back to `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    Approve,
    Reject,
}

impl ModerationAction {
    pub fn target_status(self) -> ModerationStatus {
        match self {
            Self::Approve => ModerationStatus::Approved,
            Self::Reject => ModerationStatus::Rejected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

/// Identifies a node: the root comment itself when `reply_id` is absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationTarget {
    pub comment_id: String,
    #[serde(default)]
    pub reply_id: Option<String>,
}

impl ModerationTarget {
    pub fn comment(comment_id: impl Into<String>) -> Self {
        Self {
            comment_id: comment_id.into(),
            reply_id: None,
        }
    }

    pub fn reply(comment_id: impl Into<String>, reply_id: impl Into<String>) -> Self {
        Self {
            comment_id: comment_id.into(),
            reply_id: Some(reply_id.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueItemType {
    Comment,
    Reply,
}

/// One row of the flattened moderation queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationQueueItem {
    #[serde(rename = "type")]
    pub item_type: QueueItemType,
    pub comment_id: String,
    #[serde(default)]
    pub reply_id: Option<String>,
    #[serde(default)]
    pub parent_reply_id: Option<String>,
    /// 0 for root comments, counted from the root for replies.
    pub depth: usize,
    #[serde(default)]
    pub lesson_id: Option<String>,
    #[serde(default)]
    pub lesson_title: Option<String>,
    #[serde(default)]
    pub course_title: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub author_name: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl ModerationQueueItem {
    pub fn target(&self) -> ModerationTarget {
        ModerationTarget {
            comment_id: self.comment_id.clone(),
            reply_id: self.reply_id.clone(),
        }
    }

    pub fn matches(&self, target: &ModerationTarget) -> bool {
        self.comment_id == target.comment_id && self.reply_id == target.reply_id
    }
}

/// Denormalized titles copied onto queue rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueContext {
    pub lesson_title: Option<String>,
    pub course_title: Option<String>,
}

/// Query parameters for the pending queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationFilters {
    #[serde(default)]
    pub lesson_id: Option<String>,
    #[serde(default, rename = "type")]
    pub item_type: Option<QueueItemType>,
}

impl ModerationFilters {
    pub fn admits(&self, item: &ModerationQueueItem) -> bool {
        let lesson_ok = match (&self.lesson_id, &item.lesson_id) {
            (Some(wanted), Some(actual)) => wanted == actual,
            (Some(_), None) => false,
            (None, _) => true,
        };
        let type_ok = self.item_type.is_none_or(|wanted| wanted == item.item_type);
        lesson_ok && type_ok
    }
}

/// The authoritative node returned by a moderation action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ModeratedNode {
    Comment(Arc<Comment>),
    Reply(Arc<Reply>),
}

impl ModeratedNode {
    pub fn status(&self) -> ModerationStatus {
        match self {
            Self::Comment(comment) => comment.status(),
            Self::Reply(reply) => reply.status(),
        }
    }
}
