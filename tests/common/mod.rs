// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use comment_engine::{
    client::{Actor, CommentApi, MemoryCommentApi},
    config::Config,
    error::AppError,
    models::{
        comment::{
            Comment, ModerationStatus, RawComment, RawReply, Reply, normalize_comment,
            normalize_reply,
        },
        moderation::{ModerationAction, ModerationFilters, ModerationQueueItem},
    },
    thread::ThreadEngine,
};
use tokio::sync::Notify;

/// In-memory comment server that can hold create calls open and inject failures.
#[derive(Default)]
pub struct TestApi {
    pub store: MemoryCommentApi,
    pub fail_creates: AtomicBool,
    pub fail_moderation: AtomicBool,
    pub fail_lists: AtomicBool,
    pub create_calls: AtomicUsize,
    pub moderation_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    /// Created comments come back without a lesson id, as some servers send them.
    pub strip_lesson_ids: AtomicBool,
    paused: AtomicBool,
    lists_paused: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl TestApi {
    pub fn new(store: MemoryCommentApi) -> Arc<Self> {
        Arc::new(Self {
            store,
            ..Self::default()
        })
    }

    /// The next create call will wait for `release()` after signalling that it arrived.
    pub fn pause_creates(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Like `pause_creates`, for the next list call only.
    pub fn pause_lists(&self) {
        self.lists_paused.store(true, Ordering::SeqCst);
    }

    pub async fn wait_until_submitted(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.release.notify_one();
    }

    async fn gate(&self) -> Result<(), AppError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.paused.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(AppError::Upstream("injected create failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CommentApi for TestApi {
    async fn create_comment(
        &self,
        actor: &Actor,
        lesson_id: &str,
        body: &str,
    ) -> Result<RawComment, AppError> {
        self.gate().await?;
        let mut raw = self.store.create_comment(actor, lesson_id, body).await?;
        if self.strip_lesson_ids.load(Ordering::SeqCst) {
            raw.lesson_id = None;
        }
        Ok(raw)
    }

    async fn create_reply(
        &self,
        actor: &Actor,
        comment_id: &str,
        parent_reply_id: Option<&str>,
        body: &str,
    ) -> Result<RawReply, AppError> {
        self.gate().await?;
        self.store
            .create_reply(actor, comment_id, parent_reply_id, body)
            .await
    }

    async fn list_comments(&self, lesson_id: &str) -> Result<Vec<RawComment>, AppError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.lists_paused.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(AppError::Upstream("injected list failure".to_string()));
        }
        self.store.list_comments(lesson_id).await
    }

    async fn moderate_comment(
        &self,
        actor: &Actor,
        comment_id: &str,
        action: ModerationAction,
    ) -> Result<RawComment, AppError> {
        self.moderation_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_moderation.load(Ordering::SeqCst) {
            return Err(AppError::Upstream("injected moderation failure".to_string()));
        }
        self.store.moderate_comment(actor, comment_id, action).await
    }

    async fn moderate_reply(
        &self,
        actor: &Actor,
        comment_id: &str,
        reply_id: &str,
        action: ModerationAction,
    ) -> Result<RawReply, AppError> {
        self.moderation_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_moderation.load(Ordering::SeqCst) {
            return Err(AppError::Upstream("injected moderation failure".to_string()));
        }
        self.store
            .moderate_reply(actor, comment_id, reply_id, action)
            .await
    }

    async fn list_pending_moderation_items(
        &self,
        filters: &ModerationFilters,
    ) -> Result<Vec<ModerationQueueItem>, AppError> {
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(AppError::Upstream("injected list failure".to_string()));
        }
        self.store.list_pending_moderation_items(filters).await
    }
}

pub fn engine_with(api: Arc<TestApi>) -> ThreadEngine {
    ThreadEngine::new(api, &Config::default())
}

pub fn learner() -> Actor {
    Actor {
        user_id: "u1".to_string(),
        display_name: Some("Ada".to_string()),
        token: None,
    }
}

pub fn moderator() -> Actor {
    Actor::new("mod1")
}

pub fn raw_comment(id: &str, status: ModerationStatus, replies: Vec<RawReply>) -> RawComment {
    RawComment {
        id: Some(id.to_string()),
        lesson_id: Some("L1".to_string()),
        user_id: Some("u2".to_string()),
        body: format!("comment {}", id),
        moderation_status: Some(status),
        replies: Some(replies),
        ..RawComment::default()
    }
}

pub fn raw_reply(
    id: &str,
    comment_id: &str,
    parent_reply_id: Option<&str>,
    status: ModerationStatus,
    replies: Vec<RawReply>,
) -> RawReply {
    RawReply {
        id: Some(id.to_string()),
        comment_id: Some(comment_id.to_string()),
        parent_reply_id: parent_reply_id.map(str::to_string),
        user_id: Some("u3".to_string()),
        body: format!("reply {}", id),
        moderation_status: Some(status),
        replies: Some(replies),
        ..RawReply::default()
    }
}

pub fn comment(id: &str, replies: Vec<RawReply>) -> Arc<Comment> {
    Arc::new(normalize_comment(raw_comment(
        id,
        ModerationStatus::Approved,
        replies,
    )))
}

pub fn reply(id: &str, comment_id: &str, parent_reply_id: Option<&str>) -> Arc<Reply> {
    Arc::new(normalize_reply(raw_reply(
        id,
        comment_id,
        parent_reply_id,
        ModerationStatus::Approved,
        Vec::new(),
    )))
}
