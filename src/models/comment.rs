use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidateLength};

use crate::{error::AppError, utils::html::visible_text};

/// Prefix carried by ids fabricated on this side before the server confirms a node.
pub const PROVISIONAL_ID_PREFIX: &str = "temp-";

/// Approval state of a comment or reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ModerationStatus {
    pub fn is_pending(self) -> bool {
        self == ModerationStatus::Pending
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// Moderation fields shared by comments and replies.
///
/// Fields are private: `pending_moderation` is derived from `status` on every
/// construction, and the moderator/timestamp pair is only ever set together.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Moderation {
    #[serde(rename = "moderationStatus")]
    status: ModerationStatus,
    pending_moderation: bool,
    moderated_by_id: Option<String>,
    moderated_at: Option<DateTime<Utc>>,
}

impl Moderation {
    /// A node nobody has moderated yet.
    pub fn unmoderated(status: ModerationStatus) -> Self {
        Self {
            status,
            pending_moderation: status.is_pending(),
            moderated_by_id: None,
            moderated_at: None,
        }
    }

    /// A node that received a moderation action from `moderator_id` at `at`.
    pub fn moderated(status: ModerationStatus, moderator_id: String, at: DateTime<Utc>) -> Self {
        Self {
            status,
            pending_moderation: status.is_pending(),
            moderated_by_id: Some(moderator_id),
            moderated_at: Some(at),
        }
    }

    pub fn status(&self) -> ModerationStatus {
        self.status
    }

    pub fn pending_moderation(&self) -> bool {
        self.pending_moderation
    }

    pub fn moderated_by_id(&self) -> Option<&str> {
        self.moderated_by_id.as_deref()
    }

    pub fn moderated_at(&self) -> Option<DateTime<Utc>> {
        self.moderated_at
    }
}

/// A top-level comment attached to a lesson.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub lesson_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub moderation: Moderation,
    /// Newest first.
    pub replies: Vec<Arc<Reply>>,
}

impl Comment {
    pub fn is_provisional(&self) -> bool {
        self.id.starts_with(PROVISIONAL_ID_PREFIX)
    }

    pub fn status(&self) -> ModerationStatus {
        self.moderation.status()
    }

    /// Copy of this comment with a different reply list.
    pub fn with_replies(&self, replies: Vec<Arc<Reply>>) -> Comment {
        Comment {
            id: self.id.clone(),
            lesson_id: self.lesson_id.clone(),
            user_id: self.user_id.clone(),
            author_name: self.author_name.clone(),
            body: self.body.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            moderation: self.moderation.clone(),
            replies,
        }
    }
}

/// A reply to a root comment or to another reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: String,
    /// Id of the root comment of the tree this reply lives in.
    pub comment_id: String,
    /// Immediate parent reply; `None` for direct children of the root comment.
    pub parent_reply_id: Option<String>,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub moderation: Moderation,
    /// Newest first.
    pub replies: Vec<Arc<Reply>>,
}

impl Reply {
    pub fn is_provisional(&self) -> bool {
        self.id.starts_with(PROVISIONAL_ID_PREFIX)
    }

    pub fn status(&self) -> ModerationStatus {
        self.moderation.status()
    }

    /// Copy of this reply with a different reply list.
    pub fn with_replies(&self, replies: Vec<Arc<Reply>>) -> Reply {
        Reply {
            id: self.id.clone(),
            comment_id: self.comment_id.clone(),
            parent_reply_id: self.parent_reply_id.clone(),
            user_id: self.user_id.clone(),
            author_name: self.author_name.clone(),
            body: self.body.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            moderation: self.moderation.clone(),
            replies,
        }
    }
}

/// A comment as it arrives from the network. Everything except `body` may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawComment {
    #[serde(default, deserialize_with = "opaque_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "opaque_id")]
    pub lesson_id: Option<String>,
    #[serde(default, deserialize_with = "opaque_id")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    pub body: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub moderation_status: Option<ModerationStatus>,
    #[serde(default)]
    pub pending_moderation: Option<bool>,
    #[serde(default, deserialize_with = "opaque_id")]
    pub moderated_by_id: Option<String>,
    #[serde(default)]
    pub moderated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub replies: Option<Vec<RawReply>>,
}

/// A reply as it arrives from the network.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReply {
    #[serde(default, deserialize_with = "opaque_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "opaque_id")]
    pub comment_id: Option<String>,
    #[serde(default, deserialize_with = "opaque_id")]
    pub parent_reply_id: Option<String>,
    #[serde(default, deserialize_with = "opaque_id")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    pub body: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub moderation_status: Option<ModerationStatus>,
    #[serde(default)]
    pub pending_moderation: Option<bool>,
    #[serde(default, deserialize_with = "opaque_id")]
    pub moderated_by_id: Option<String>,
    #[serde(default)]
    pub moderated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub replies: Option<Vec<RawReply>>,
}

impl From<&Comment> for RawComment {
    fn from(comment: &Comment) -> Self {
        RawComment {
            id: Some(comment.id.clone()),
            lesson_id: Some(comment.lesson_id.clone()),
            user_id: Some(comment.user_id.clone()),
            author_name: comment.author_name.clone(),
            body: comment.body.clone(),
            created_at: Some(comment.created_at),
            updated_at: Some(comment.updated_at),
            moderation_status: Some(comment.moderation.status()),
            pending_moderation: Some(comment.moderation.pending_moderation()),
            moderated_by_id: comment.moderation.moderated_by_id.clone(),
            moderated_at: comment.moderation.moderated_at,
            replies: Some(comment.replies.iter().map(|r| RawReply::from(r.as_ref())).collect()),
        }
    }
}

impl From<&Reply> for RawReply {
    fn from(reply: &Reply) -> Self {
        RawReply {
            id: Some(reply.id.clone()),
            comment_id: Some(reply.comment_id.clone()),
            parent_reply_id: reply.parent_reply_id.clone(),
            user_id: Some(reply.user_id.clone()),
            author_name: reply.author_name.clone(),
            body: reply.body.clone(),
            created_at: Some(reply.created_at),
            updated_at: Some(reply.updated_at),
            moderation_status: Some(reply.moderation.status()),
            pending_moderation: Some(reply.moderation.pending_moderation()),
            moderated_by_id: reply.moderation.moderated_by_id.clone(),
            moderated_at: reply.moderation.moderated_at,
            replies: Some(reply.replies.iter().map(|r| RawReply::from(r.as_ref())).collect()),
        }
    }
}

/// Ids are opaque: the server may send them as strings or numbers.
fn opaque_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Text(String),
        Number(i64),
    }

    Ok(Option::<IdRepr>::deserialize(deserializer)?.map(|id| match id {
        IdRepr::Text(text) => text,
        IdRepr::Number(number) => number.to_string(),
    }))
}

/// Fills in defaults for a comment received from the network.
///
/// Never fails: a missing id becomes a local one, missing timestamps become now,
/// the moderation pair is made consistent and every reply is normalized with
/// its `commentId` pinned to this comment.
pub fn normalize_comment(raw: RawComment) -> Comment {
    let id = raw.id.filter(|id| !id.is_empty()).unwrap_or_else(local_id);
    let created_at = raw.created_at.unwrap_or_else(Utc::now);
    let updated_at = raw.updated_at.unwrap_or(created_at);
    let moderation = normalize_moderation(
        raw.moderation_status,
        raw.pending_moderation,
        raw.moderated_by_id,
        raw.moderated_at,
        updated_at,
    );

    let replies = raw
        .replies
        .unwrap_or_default()
        .into_iter()
        .map(|reply| Arc::new(normalize_reply_within(reply, &id, None)))
        .collect();

    Comment {
        lesson_id: raw.lesson_id.unwrap_or_default(),
        user_id: raw.user_id.unwrap_or_default(),
        author_name: raw.author_name,
        body: raw.body,
        created_at,
        updated_at,
        moderation,
        replies,
        id,
    }
}

/// Fills in defaults for a reply received on its own.
/// An absent `parentReplyId` means a direct child of the root comment.
pub fn normalize_reply(raw: RawReply) -> Reply {
    let comment_id = raw.comment_id.clone().unwrap_or_default();
    normalize_reply_within(raw, &comment_id, None)
}

fn normalize_reply_within(raw: RawReply, comment_id: &str, structural_parent: Option<&str>) -> Reply {
    let id = raw.id.filter(|id| !id.is_empty()).unwrap_or_else(local_id);
    let created_at = raw.created_at.unwrap_or_else(Utc::now);
    let updated_at = raw.updated_at.unwrap_or(created_at);
    let moderation = normalize_moderation(
        raw.moderation_status,
        raw.pending_moderation,
        raw.moderated_by_id,
        raw.moderated_at,
        updated_at,
    );
    let parent_reply_id = raw
        .parent_reply_id
        .or_else(|| structural_parent.map(str::to_string));

    let replies = raw
        .replies
        .unwrap_or_default()
        .into_iter()
        .map(|child| Arc::new(normalize_reply_within(child, comment_id, Some(&id))))
        .collect();

    Reply {
        comment_id: comment_id.to_string(),
        parent_reply_id,
        user_id: raw.user_id.unwrap_or_default(),
        author_name: raw.author_name,
        body: raw.body,
        created_at,
        updated_at,
        moderation,
        replies,
        id,
    }
}

fn normalize_moderation(
    status: Option<ModerationStatus>,
    pending: Option<bool>,
    moderated_by_id: Option<String>,
    moderated_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
) -> Moderation {
    // An explicit status wins over the denormalized flag.
    let status = status.unwrap_or(match pending {
        Some(true) => ModerationStatus::Pending,
        _ => ModerationStatus::Approved,
    });

    match moderated_by_id {
        Some(moderator_id) => {
            Moderation::moderated(status, moderator_id, moderated_at.unwrap_or(updated_at))
        }
        None => Moderation::unmoderated(status),
    }
}

fn local_id() -> String {
    format!("local-{}", Uuid::new_v4())
}

/// Generates the id of a provisional node.
pub fn provisional_id() -> String {
    format!("{}{}", PROVISIONAL_ID_PREFIX, Uuid::new_v4())
}

/// Trims a submitted body and checks it before anything is published.
///
/// Bodies are plain text and are stored as typed. A body is empty when no
/// visible text remains after markup is stripped; the length bound counts the
/// characters the user typed.
pub fn prepare_body(raw: &str, max_length: u64) -> Result<String, AppError> {
    let body = raw.trim().to_string();

    if visible_text(&body).trim().is_empty() {
        return Err(AppError::BadRequest("Body must not be empty".to_string()));
    }

    if !body.validate_length(Some(1), Some(max_length), None) {
        return Err(AppError::BadRequest(format!(
            "Body must be between 1 and {} characters",
            max_length
        )));
    }

    Ok(body)
}

/// DTO for posting a root comment.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(
        min = 1,
        max = 10000,
        message = "Comment must be between 1 and 10000 characters"
    ))]
    pub body: String,
}

/// DTO for posting a reply.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReplyRequest {
    #[validate(length(
        min = 1,
        max = 10000,
        message = "Reply must be between 1 and 10000 characters"
    ))]
    pub body: String,

    /// Optional: the reply being answered. Absent means a direct reply to the comment.
    #[serde(default)]
    pub parent_reply_id: Option<String>,
}
