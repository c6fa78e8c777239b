use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::task::JoinSet;

use crate::{
    client::{Actor, CommentApi},
    error::AppError,
    models::comment::{
        Comment, Moderation, ModerationStatus, Reply, normalize_comment, normalize_reply,
        prepare_body, provisional_id,
    },
    thread::{
        cache::{ThreadCache, Tree},
        tree,
    },
};

/// Optimistic writes against one lesson's cached tree.
///
/// Each submission runs snapshot → propose → submit → reconcile or roll back →
/// settle, in that order. The provisional node is visible in the cache before
/// the server answers. A failed submit restores the snapshot wholesale; a
/// successful one swaps the provisional node for the server's node in place.
/// Either way a refresh is scheduled afterwards and its failure is only logged.
///
/// Two in-flight mutations on the same node are not merged: whichever
/// reconcile, rollback or refresh lands last wins until the next refresh.
pub struct ThreadController {
    lesson_id: String,
    api: Arc<dyn CommentApi>,
    cache: ThreadCache,
    max_body_length: u64,
    settling: Mutex<JoinSet<()>>,
}

impl std::fmt::Debug for ThreadController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadController")
            .field("lesson_id", &self.lesson_id)
            .field("max_body_length", &self.max_body_length)
            .finish_non_exhaustive()
    }
}

impl ThreadController {
    pub fn new(lesson_id: impl Into<String>, api: Arc<dyn CommentApi>, max_body_length: u64) -> Self {
        Self {
            lesson_id: lesson_id.into(),
            api,
            cache: ThreadCache::new(Vec::new()),
            max_body_length,
            settling: Mutex::new(JoinSet::new()),
        }
    }

    pub fn lesson_id(&self) -> &str {
        &self.lesson_id
    }

    pub fn cache(&self) -> &ThreadCache {
        &self.cache
    }

    pub fn tree(&self) -> Tree {
        self.cache.snapshot()
    }

    /// Re-fetches the lesson's full tree and publishes it.
    pub async fn refresh(&self) -> Result<Tree, AppError> {
        let comments = self.api.list_comments(&self.lesson_id).await?;
        let tree: Tree = Arc::new(
            comments
                .into_iter()
                .map(|raw| Arc::new(normalize_comment(raw)))
                .collect(),
        );
        self.cache.replace(Arc::clone(&tree));
        Ok(tree)
    }

    /// Posts a root comment. Returns the server's comment.
    pub async fn submit_comment(
        self: &Arc<Self>,
        actor: &Actor,
        body: &str,
    ) -> Result<Arc<Comment>, AppError> {
        let body = prepare_body(body, self.max_body_length)?;

        let snapshot = self.cache.snapshot();
        let now = Utc::now();
        let provisional = Arc::new(Comment {
            id: provisional_id(),
            lesson_id: self.lesson_id.clone(),
            user_id: actor.user_id.clone(),
            author_name: actor.display_name.clone(),
            body: body.clone(),
            created_at: now,
            updated_at: now,
            moderation: Moderation::unmoderated(ModerationStatus::Pending),
            replies: Vec::new(),
        });
        let temp_id = provisional.id.clone();
        self.cache.update(|current| tree::insert_comment(current, provisional));

        let result = match self.api.create_comment(actor, &self.lesson_id, &body).await {
            Ok(raw) => {
                let mut confirmed = normalize_comment(raw);
                if confirmed.lesson_id.is_empty() {
                    confirmed.lesson_id = self.lesson_id.clone();
                }
                let confirmed = Arc::new(confirmed);
                self.cache.update(|current| {
                    tree::replace_comment(current, &temp_id, Arc::clone(&confirmed))
                });
                tracing::debug!(
                    lesson_id = %self.lesson_id,
                    temp_id = %temp_id,
                    comment_id = %confirmed.id,
                    "comment reconciled"
                );
                Ok(confirmed)
            }
            Err(err) => {
                tracing::warn!(
                    lesson_id = %self.lesson_id,
                    error = %err,
                    "comment submit failed, rolling back"
                );
                self.cache.replace(snapshot);
                Err(err)
            }
        };

        self.settle();
        result
    }

    /// Posts a reply under `comment_id`, either directly (`parent_reply_id == None`)
    /// or under another reply. Returns the server's reply.
    pub async fn submit_reply(
        self: &Arc<Self>,
        actor: &Actor,
        comment_id: &str,
        parent_reply_id: Option<&str>,
        body: &str,
    ) -> Result<Arc<Reply>, AppError> {
        let body = prepare_body(body, self.max_body_length)?;

        let snapshot = self.cache.snapshot();
        let now = Utc::now();
        let provisional = Arc::new(Reply {
            id: provisional_id(),
            comment_id: comment_id.to_string(),
            parent_reply_id: parent_reply_id.map(str::to_string),
            user_id: actor.user_id.clone(),
            author_name: actor.display_name.clone(),
            body: body.clone(),
            created_at: now,
            updated_at: now,
            moderation: Moderation::unmoderated(ModerationStatus::Pending),
            replies: Vec::new(),
        });
        let temp_id = provisional.id.clone();
        self.cache.update(|current| tree::insert_reply(current, provisional));

        let result = match self
            .api
            .create_reply(actor, comment_id, parent_reply_id, &body)
            .await
        {
            Ok(raw) => {
                let mut confirmed = normalize_reply(raw);
                if confirmed.comment_id.is_empty() {
                    confirmed.comment_id = comment_id.to_string();
                }
                let confirmed = Arc::new(confirmed);
                self.cache.update(|current| {
                    tree::replace_reply(current, &temp_id, Arc::clone(&confirmed))
                });
                tracing::debug!(
                    comment_id,
                    temp_id = %temp_id,
                    reply_id = %confirmed.id,
                    "reply reconciled"
                );
                Ok(confirmed)
            }
            Err(err) => {
                tracing::warn!(
                    comment_id,
                    parent_reply_id = ?parent_reply_id,
                    error = %err,
                    "reply submit failed, rolling back"
                );
                self.cache.replace(snapshot);
                Err(err)
            }
        };

        self.settle();
        result
    }

    /// Waits for every background refresh scheduled so far.
    pub async fn settled(&self) {
        let mut tasks = std::mem::take(
            &mut *self.settling.lock().unwrap_or_else(PoisonError::into_inner),
        );
        while tasks.join_next().await.is_some() {}
    }

    /// Schedules the post-mutation refresh. Runs after reconcile/rollback has
    /// already been published.
    fn settle(self: &Arc<Self>) {
        let controller = Arc::clone(self);
        let mut tasks = self.settling.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            if let Err(err) = controller.refresh().await {
                tracing::warn!(
                    lesson_id = %controller.lesson_id,
                    error = %err,
                    "settle refresh failed"
                );
            }
        });
    }
}
