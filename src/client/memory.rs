use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    client::{Actor, CommentApi},
    error::AppError,
    models::{
        comment::{
            Comment, Moderation, ModerationStatus, RawComment, RawReply, Reply, normalize_comment,
        },
        moderation::{ModerationAction, ModerationFilters, ModerationQueueItem, QueueContext},
    },
    thread::{moderation::{flatten_pending, transition}, tree},
};

/// In-process comment server.
///
/// Used when no `COMMENT_API_URL` is configured and as the collaborator in tests.
/// New nodes start `pending` unless the store was built with [`MemoryCommentApi::auto_approving`].
#[derive(Debug, Default)]
pub struct MemoryCommentApi {
    state: Mutex<MemoryState>,
    auto_approve: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    lessons: BTreeMap<String, Vec<Arc<Comment>>>,
    contexts: BTreeMap<String, QueueContext>,
    next_id: u64,
}

impl MemoryState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{}", prefix, self.next_id)
    }

    fn lesson_of(&self, comment_id: &str) -> Option<String> {
        self.lessons
            .iter()
            .find(|(_, tree)| tree::find_comment(tree, comment_id).is_some())
            .map(|(lesson_id, _)| lesson_id.clone())
    }
}

impl MemoryCommentApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose moderation policy approves everything on creation.
    pub fn auto_approving() -> Self {
        Self {
            auto_approve: true,
            ..Self::default()
        }
    }

    /// Titles copied onto this lesson's queue rows.
    pub fn set_lesson_context(&self, lesson_id: &str, context: QueueContext) {
        self.lock().contexts.insert(lesson_id.to_string(), context);
    }

    /// Loads comments for a lesson, replacing whatever was there.
    pub fn seed(&self, lesson_id: &str, comments: Vec<RawComment>) {
        let tree = comments
            .into_iter()
            .map(|mut raw| {
                raw.lesson_id = Some(lesson_id.to_string());
                Arc::new(normalize_comment(raw))
            })
            .collect();
        self.lock().lessons.insert(lesson_id.to_string(), tree);
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn initial_status(&self) -> ModerationStatus {
        if self.auto_approve {
            ModerationStatus::Approved
        } else {
            ModerationStatus::Pending
        }
    }
}

#[async_trait]
impl CommentApi for MemoryCommentApi {
    async fn create_comment(
        &self,
        actor: &Actor,
        lesson_id: &str,
        body: &str,
    ) -> Result<RawComment, AppError> {
        let mut state = self.lock();
        let now = Utc::now();
        let comment = Arc::new(Comment {
            id: state.next_id("c"),
            lesson_id: lesson_id.to_string(),
            user_id: actor.user_id.clone(),
            author_name: actor.display_name.clone(),
            body: body.to_string(),
            created_at: now,
            updated_at: now,
            moderation: Moderation::unmoderated(self.initial_status()),
            replies: Vec::new(),
        });

        let lesson = state.lessons.entry(lesson_id.to_string()).or_default();
        *lesson = tree::insert_comment(lesson, Arc::clone(&comment));

        Ok(RawComment::from(comment.as_ref()))
    }

    async fn create_reply(
        &self,
        actor: &Actor,
        comment_id: &str,
        parent_reply_id: Option<&str>,
        body: &str,
    ) -> Result<RawReply, AppError> {
        let mut state = self.lock();
        let lesson_id = state
            .lesson_of(comment_id)
            .ok_or(AppError::NotFound("Comment not found".to_string()))?;

        if let Some(parent_id) = parent_reply_id {
            if tree::find_reply(&state.lessons[&lesson_id], comment_id, parent_id).is_none() {
                return Err(AppError::NotFound("Parent reply not found".to_string()));
            }
        }

        let now = Utc::now();
        let reply = Arc::new(Reply {
            id: state.next_id("r"),
            comment_id: comment_id.to_string(),
            parent_reply_id: parent_reply_id.map(str::to_string),
            user_id: actor.user_id.clone(),
            author_name: actor.display_name.clone(),
            body: body.to_string(),
            created_at: now,
            updated_at: now,
            moderation: Moderation::unmoderated(self.initial_status()),
            replies: Vec::new(),
        });

        let lesson = state.lessons.entry(lesson_id).or_default();
        *lesson = tree::insert_reply(lesson, Arc::clone(&reply));

        Ok(RawReply::from(reply.as_ref()))
    }

    async fn list_comments(&self, lesson_id: &str) -> Result<Vec<RawComment>, AppError> {
        let state = self.lock();
        Ok(state
            .lessons
            .get(lesson_id)
            .map(|tree| tree.iter().map(|c| RawComment::from(c.as_ref())).collect())
            .unwrap_or_default())
    }

    async fn moderate_comment(
        &self,
        actor: &Actor,
        comment_id: &str,
        action: ModerationAction,
    ) -> Result<RawComment, AppError> {
        let mut state = self.lock();
        let lesson_id = state
            .lesson_of(comment_id)
            .ok_or(AppError::NotFound("Comment not found".to_string()))?;
        let lesson = state.lessons.entry(lesson_id).or_default();
        let current = tree::find_comment(lesson, comment_id)
            .ok_or(AppError::NotFound("Comment not found".to_string()))?;

        let status = transition(current.status(), action)?;
        let now = Utc::now();
        let mut updated = current.with_replies(current.replies.clone());
        updated.moderation = Moderation::moderated(status, actor.user_id.clone(), now);
        updated.updated_at = now;

        let updated = Arc::new(updated);
        *lesson = tree::replace_comment(lesson, comment_id, Arc::clone(&updated));
        Ok(RawComment::from(updated.as_ref()))
    }

    async fn moderate_reply(
        &self,
        actor: &Actor,
        comment_id: &str,
        reply_id: &str,
        action: ModerationAction,
    ) -> Result<RawReply, AppError> {
        let mut state = self.lock();
        let lesson_id = state
            .lesson_of(comment_id)
            .ok_or(AppError::NotFound("Comment not found".to_string()))?;
        let lesson = state.lessons.entry(lesson_id).or_default();
        let current = tree::find_reply(lesson, comment_id, reply_id)
            .ok_or(AppError::NotFound("Reply not found".to_string()))?;

        let status = transition(current.status(), action)?;
        let now = Utc::now();
        let mut updated = current.with_replies(current.replies.clone());
        updated.moderation = Moderation::moderated(status, actor.user_id.clone(), now);
        updated.updated_at = now;

        let updated = Arc::new(updated);
        *lesson = tree::replace_reply(lesson, reply_id, Arc::clone(&updated));
        Ok(RawReply::from(updated.as_ref()))
    }

    async fn list_pending_moderation_items(
        &self,
        filters: &ModerationFilters,
    ) -> Result<Vec<ModerationQueueItem>, AppError> {
        let state = self.lock();
        let empty = QueueContext::default();
        Ok(state
            .lessons
            .iter()
            .flat_map(|(lesson_id, tree)| {
                flatten_pending(tree, state.contexts.get(lesson_id).unwrap_or(&empty))
            })
            .filter(|item| filters.admits(item))
            .collect())
    }
}
