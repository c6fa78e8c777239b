use std::sync::Arc;

use moka::future::Cache;

use crate::{
    client::{Actor, CommentApi},
    config::Config,
    error::AppError,
    models::moderation::{ModeratedNode, ModerationAction, ModerationTarget},
    thread::{controller::ThreadController, queue::ModerationQueue, tree},
};

/// Per-lesson controllers plus the shared moderation queue.
///
/// Loaded lessons live in a bounded cache. Entries expire after the configured
/// TTL and the least used are evicted past the capacity; either way the lesson
/// is seeded from the server again on its next use.
pub struct ThreadEngine {
    api: Arc<dyn CommentApi>,
    max_body_length: u64,
    max_reply_depth: usize,
    threads: Cache<String, Arc<ThreadController>>,
    queue: Arc<ModerationQueue>,
}

impl ThreadEngine {
    pub fn new(api: Arc<dyn CommentApi>, config: &Config) -> Self {
        let threads = Cache::builder()
            .max_capacity(config.thread_cache_capacity)
            .time_to_live(config.thread_cache_ttl)
            .build();

        Self {
            queue: Arc::new(ModerationQueue::new(Arc::clone(&api))),
            api,
            max_body_length: config.max_body_length,
            max_reply_depth: config.max_reply_depth,
            threads,
        }
    }

    pub fn max_reply_depth(&self) -> usize {
        self.max_reply_depth
    }

    pub fn queue(&self) -> &Arc<ModerationQueue> {
        &self.queue
    }

    /// The controller for `lesson_id`, seeded from the server on first use.
    ///
    /// Concurrent first uses of the same lesson share one seeding fetch. A
    /// failed fetch caches nothing.
    pub async fn thread(&self, lesson_id: &str) -> Result<Arc<ThreadController>, AppError> {
        self.threads
            .try_get_with_by_ref(lesson_id, async {
                let thread = Arc::new(ThreadController::new(
                    lesson_id,
                    Arc::clone(&self.api),
                    self.max_body_length,
                ));
                thread.refresh().await?;
                tracing::info!(lesson_id, "lesson thread loaded");
                Ok::<_, AppError>(thread)
            })
            .await
            .map_err(|err| err.as_ref().clone())
    }

    /// Number of lessons currently held, after pending evictions are applied.
    pub async fn cached_lessons(&self) -> u64 {
        self.threads.run_pending_tasks().await;
        self.threads.entry_count()
    }

    /// Approves or rejects a comment or reply.
    ///
    /// The server decides whether the transition is allowed; the cached status
    /// may be stale. On success the server's node replaces the cached one in
    /// every loaded lesson that holds it.
    pub async fn moderate(
        &self,
        actor: &Actor,
        target: &ModerationTarget,
        action: ModerationAction,
    ) -> Result<ModeratedNode, AppError> {
        let node = self.queue.moderate(actor, target, action).await?;
        self.apply_moderated(&node);
        Ok(node)
    }

    /// Waits for the background refreshes of every loaded lesson and the queue.
    pub async fn settled(&self) {
        let threads: Vec<_> = self.threads.iter().map(|(_, thread)| thread).collect();
        for thread in threads {
            thread.settled().await;
        }
        self.queue.settled().await;
    }

    fn apply_moderated(&self, node: &ModeratedNode) {
        // Lesson ids on server nodes are optional, so look the node up instead.
        for (_, thread) in self.threads.iter() {
            let snapshot = thread.tree();
            match node {
                ModeratedNode::Comment(comment) => {
                    if tree::find_comment(&snapshot, &comment.id).is_some() {
                        thread.cache().update(|current| {
                            tree::replace_comment(current, &comment.id, Arc::clone(comment))
                        });
                        tracing::debug!(
                            lesson_id = thread.lesson_id(),
                            comment_id = %comment.id,
                            "moderated comment applied"
                        );
                    }
                }
                ModeratedNode::Reply(reply) => {
                    if tree::find_reply(&snapshot, &reply.comment_id, &reply.id).is_some() {
                        thread.cache().update(|current| {
                            tree::replace_reply(current, &reply.id, Arc::clone(reply))
                        });
                        tracing::debug!(
                            lesson_id = thread.lesson_id(),
                            reply_id = %reply.id,
                            "moderated reply applied"
                        );
                    }
                }
            }
        }
    }
}
