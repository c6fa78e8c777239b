use std::sync::{Arc, Mutex, PoisonError};

use tokio::{sync::watch, task::JoinSet};

use crate::{
    client::{Actor, CommentApi},
    error::AppError,
    models::{
        comment::{normalize_comment, normalize_reply},
        moderation::{
            ModeratedNode, ModerationAction, ModerationFilters, ModerationQueueItem,
            ModerationTarget,
        },
    },
};

pub type QueueSnapshot = Arc<Vec<ModerationQueueItem>>;

/// The reviewers' queue of pending comments and replies.
///
/// Actions remove their row right away and put the whole pre-action list back
/// if the server refuses. Every action is followed by a background refresh,
/// which is what finally decides whether a row is gone.
pub struct ModerationQueue {
    api: Arc<dyn CommentApi>,
    items: watch::Sender<QueueSnapshot>,
    filters: Mutex<ModerationFilters>,
    settling: Mutex<JoinSet<()>>,
}

impl ModerationQueue {
    pub fn new(api: Arc<dyn CommentApi>) -> Self {
        let (items, _) = watch::channel(QueueSnapshot::default());
        Self {
            api,
            items,
            filters: Mutex::new(ModerationFilters::default()),
            settling: Mutex::new(JoinSet::new()),
        }
    }

    pub fn items(&self) -> QueueSnapshot {
        Arc::clone(&self.items.borrow())
    }

    pub fn filters(&self) -> ModerationFilters {
        self.filters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-seeds the queue from the server with `filters`, which become the
    /// filters used by later background refreshes.
    pub async fn refresh(&self, filters: ModerationFilters) -> Result<QueueSnapshot, AppError> {
        *self.filters.lock().unwrap_or_else(PoisonError::into_inner) = filters.clone();
        let items = Arc::new(self.api.list_pending_moderation_items(&filters).await?);
        self.items.send_replace(Arc::clone(&items));
        Ok(items)
    }

    /// Replaces the queue contents, e.g. with a locally computed projection.
    pub fn replace(&self, items: Vec<ModerationQueueItem>) {
        self.items.send_replace(Arc::new(items));
    }

    /// Sends `action` for `target` to the server.
    ///
    /// The row disappears immediately; on failure the queue is restored to the
    /// snapshot taken before the request and the error is returned.
    pub async fn moderate(
        self: &Arc<Self>,
        actor: &Actor,
        target: &ModerationTarget,
        action: ModerationAction,
    ) -> Result<ModeratedNode, AppError> {
        let snapshot = self.items();
        self.items.send_modify(|items| {
            *items = Arc::new(
                items
                    .iter()
                    .filter(|item| !item.matches(target))
                    .cloned()
                    .collect(),
            );
        });

        let result = match target.reply_id.as_deref() {
            None => self
                .api
                .moderate_comment(actor, &target.comment_id, action)
                .await
                .map(|raw| ModeratedNode::Comment(Arc::new(normalize_comment(raw)))),
            Some(reply_id) => self
                .api
                .moderate_reply(actor, &target.comment_id, reply_id, action)
                .await
                .map(|raw| {
                    let mut reply = normalize_reply(raw);
                    if reply.comment_id.is_empty() {
                        reply.comment_id = target.comment_id.clone();
                    }
                    ModeratedNode::Reply(Arc::new(reply))
                }),
        };

        match &result {
            Ok(node) => tracing::info!(
                comment_id = %target.comment_id,
                reply_id = ?target.reply_id,
                status = node.status().as_str(),
                "moderation applied"
            ),
            Err(err) => {
                tracing::warn!(
                    comment_id = %target.comment_id,
                    reply_id = ?target.reply_id,
                    action = action.as_str(),
                    error = %err,
                    "moderation failed, restoring queue"
                );
                self.items.send_replace(snapshot);
            }
        }

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

    fn settle(self: &Arc<Self>) {
        let queue = Arc::clone(self);
        let mut tasks = self.settling.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let filters = queue.filters();
            if let Err(err) = queue.refresh(filters).await {
                tracing::warn!(error = %err, "moderation queue refresh failed");
            }
        });
    }
}
