// tests/controller_tests.rs

mod common;

use std::sync::{Arc, atomic::Ordering};

use comment_engine::{
    client::MemoryCommentApi,
    error::AppError,
    models::comment::{Moderation, ModerationStatus, Reply},
    thread::tree,
};

use common::{TestApi, engine_with, learner, raw_comment, raw_reply};

#[tokio::test]
async fn comment_is_visible_before_the_server_answers() {
    let api = TestApi::new(MemoryCommentApi::auto_approving());
    let engine = engine_with(Arc::clone(&api));
    let thread = engine.thread("L1").await.expect("thread loads");
    assert!(thread.tree().is_empty());

    let actor = learner();
    api.pause_creates();
    let (result, ()) = tokio::join!(thread.submit_comment(&actor, "Great lesson!"), async {
        api.wait_until_submitted().await;

        let tree = thread.tree();
        assert_eq!(tree.len(), 1);
        assert!(tree[0].is_provisional());
        assert_eq!(tree[0].body, "Great lesson!");
        assert_eq!(tree[0].status(), ModerationStatus::Pending);
        assert!(tree[0].moderation.pending_moderation());
        assert_eq!(tree[0].author_name.as_deref(), Some("Ada"));

        api.release();
    });

    let confirmed = result.expect("submit succeeds");
    assert_eq!(confirmed.id, "c1");
    assert!(!confirmed.moderation.pending_moderation());

    let tree = thread.tree();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].id, "c1");
    assert!(!tree[0].is_provisional());

    thread.settled().await;
    assert_eq!(thread.tree()[0].id, "c1");
}

#[tokio::test]
async fn nested_reply_lands_under_its_parent_reply() {
    let store = MemoryCommentApi::new();
    store.seed(
        "L1",
        vec![raw_comment(
            "c1",
            ModerationStatus::Approved,
            vec![raw_reply("r1", "c1", None, ModerationStatus::Approved, Vec::new())],
        )],
    );
    let api = TestApi::new(store);
    let engine = engine_with(Arc::clone(&api));
    let thread = engine.thread("L1").await.expect("thread loads");

    let actor = learner();
    api.pause_creates();
    let (result, ()) = tokio::join!(
        thread.submit_reply(&actor, "c1", Some("r1"), "I agree"),
        async {
            api.wait_until_submitted().await;

            let tree = thread.tree();
            let provisional = &tree[0].replies[0].replies[0];
            assert!(provisional.is_provisional());
            assert_eq!(provisional.parent_reply_id.as_deref(), Some("r1"));
            assert_eq!(provisional.status(), ModerationStatus::Pending);

            api.release();
        }
    );

    let confirmed = result.expect("submit succeeds");
    assert_eq!(confirmed.parent_reply_id.as_deref(), Some("r1"));

    let tree = thread.tree();
    let r1 = &tree[0].replies[0];
    assert_eq!(r1.replies.len(), 1);
    assert_eq!(r1.replies[0].id, confirmed.id);
    assert!(r1.replies[0].moderation.pending_moderation());
}

#[tokio::test]
async fn failed_submit_restores_the_snapshot() {
    let store = MemoryCommentApi::new();
    store.seed("L1", vec![raw_comment("c1", ModerationStatus::Approved, Vec::new())]);
    let api = TestApi::new(store);
    let engine = engine_with(Arc::clone(&api));
    let thread = engine.thread("L1").await.expect("thread loads");

    let snapshot = thread.tree();
    api.fail_creates.store(true, Ordering::SeqCst);

    let err = thread
        .submit_reply(&learner(), "c1", None, "lost words")
        .await
        .expect_err("server refuses");
    assert!(matches!(err, AppError::Upstream(_)));
    assert!(Arc::ptr_eq(&thread.tree(), &snapshot));

    let err = thread
        .submit_comment(&learner(), "also lost")
        .await
        .expect_err("server refuses");
    assert!(matches!(err, AppError::Upstream(_)));
    assert!(Arc::ptr_eq(&thread.tree(), &snapshot));
}

#[tokio::test]
async fn reconcile_keeps_children_added_while_in_flight() {
    let store = MemoryCommentApi::new();
    store.seed("L1", vec![raw_comment("c1", ModerationStatus::Approved, Vec::new())]);
    let api = TestApi::new(store);
    let engine = engine_with(Arc::clone(&api));
    let thread = engine.thread("L1").await.expect("thread loads");

    let actor = learner();
    api.pause_creates();
    let (result, ()) = tokio::join!(thread.submit_reply(&actor, "c1", None, "parent"), async {
        api.wait_until_submitted().await;

        let temp_id = thread.tree()[0].replies[0].id.clone();
        let child = Arc::new(Reply {
            id: "temp-child".to_string(),
            comment_id: "c1".to_string(),
            parent_reply_id: Some(temp_id),
            user_id: "u9".to_string(),
            author_name: None,
            body: "child".to_string(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            moderation: Moderation::unmoderated(ModerationStatus::Pending),
            replies: Vec::new(),
        });
        thread
            .cache()
            .update(|current| tree::insert_reply(current, child));

        api.release();
    });

    let confirmed = result.expect("submit succeeds");

    // Checked before the background refresh gets a chance to run.
    let tree = thread.tree();
    let parent = &tree[0].replies[0];
    assert_eq!(parent.id, confirmed.id);
    assert!(!parent.is_provisional());
    assert_eq!(parent.replies.len(), 1);
    assert_eq!(parent.replies[0].id, "temp-child");
}

#[tokio::test]
async fn invalid_body_publishes_nothing() {
    let api = TestApi::new(MemoryCommentApi::new());
    let engine = engine_with(Arc::clone(&api));
    let thread = engine.thread("L1").await.expect("thread loads");
    let snapshot = thread.tree();

    let err = thread
        .submit_comment(&learner(), "   <b></b>  ")
        .await
        .expect_err("blank body");
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = thread
        .submit_comment(&learner(), &"x".repeat(1001))
        .await
        .expect_err("too long");
    assert!(matches!(err, AppError::BadRequest(_)));

    assert!(Arc::ptr_eq(&thread.tree(), &snapshot));
    assert_eq!(api.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_settle_refresh_does_not_fail_the_submit() {
    let api = TestApi::new(MemoryCommentApi::new());
    let engine = engine_with(Arc::clone(&api));
    let thread = engine.thread("L1").await.expect("thread loads");

    api.fail_lists.store(true, Ordering::SeqCst);
    let confirmed = thread
        .submit_comment(&learner(), "still counts")
        .await
        .expect("submit succeeds");
    thread.settled().await;

    // One list for the initial load, one for the failed settle.
    assert_eq!(api.list_calls.load(Ordering::SeqCst), 2);
    assert_eq!(thread.tree()[0].id, confirmed.id);
}

#[tokio::test]
async fn settle_refresh_adopts_the_server_tree() {
    let store = MemoryCommentApi::new();
    store.seed("L1", vec![raw_comment("c1", ModerationStatus::Approved, Vec::new())]);
    let api = TestApi::new(store);
    let engine = engine_with(Arc::clone(&api));
    let thread = engine.thread("L1").await.expect("thread loads");

    // Someone else comments through the server directly.
    api.store.seed(
        "L1",
        vec![
            raw_comment("c9", ModerationStatus::Approved, Vec::new()),
            raw_comment("c1", ModerationStatus::Approved, Vec::new()),
        ],
    );

    thread
        .submit_reply(&learner(), "c1", None, "hello")
        .await
        .expect("submit succeeds");
    thread.settled().await;

    let tree = thread.tree();
    let ids: Vec<_> = tree.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["c9", "c1"]);
    assert_eq!(tree[1].replies.len(), 1);
}

#[tokio::test]
async fn concurrent_replies_to_different_comments_both_survive() {
    let store = MemoryCommentApi::new();
    store.seed(
        "L1",
        vec![
            raw_comment("c1", ModerationStatus::Approved, Vec::new()),
            raw_comment("c2", ModerationStatus::Approved, Vec::new()),
        ],
    );
    let api = TestApi::new(store);
    let engine = engine_with(Arc::clone(&api));
    let thread = engine.thread("L1").await.expect("thread loads");

    let actor = learner();
    let (first, second) = tokio::join!(
        thread.submit_reply(&actor, "c1", None, "on c1"),
        thread.submit_reply(&actor, "c2", None, "on c2"),
    );
    let first = first.expect("first reply");
    let second = second.expect("second reply");

    let tree = thread.tree();
    assert_eq!(tree[0].replies[0].id, first.id);
    assert_eq!(tree[1].replies[0].id, second.id);
}

#[tokio::test]
async fn confirmed_comment_without_lesson_id_keeps_the_thread_lesson() {
    let api = TestApi::new(MemoryCommentApi::new());
    let engine = engine_with(Arc::clone(&api));
    let thread = engine.thread("L1").await.expect("thread loads");

    api.strip_lesson_ids.store(true, Ordering::SeqCst);
    let confirmed = thread
        .submit_comment(&learner(), "where am I?")
        .await
        .expect("submit succeeds");

    assert_eq!(confirmed.lesson_id, "L1");
    assert_eq!(thread.tree()[0].lesson_id, "L1");
}
