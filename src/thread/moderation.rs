//! Moderation lifecycle and the reviewer-facing projection of a tree.

use std::sync::Arc;

use crate::{
    error::AppError,
    models::{
        comment::{Comment, ModerationStatus, Reply},
        moderation::{ModerationAction, ModerationQueueItem, QueueContext, QueueItemType},
    },
};

/// Allowed moves: pending → approved | rejected, rejected → approved,
/// approved → rejected. Nothing leads back to pending.
pub fn can_transition(from: ModerationStatus, to: ModerationStatus) -> bool {
    use ModerationStatus::*;
    matches!(
        (from, to),
        (Pending, Approved) | (Pending, Rejected) | (Rejected, Approved) | (Approved, Rejected)
    )
}

/// Status a node ends up in after `action`, or `Conflict` if the move is not allowed.
pub fn transition(
    current: ModerationStatus,
    action: ModerationAction,
) -> Result<ModerationStatus, AppError> {
    let next = action.target_status();
    if can_transition(current, next) {
        Ok(next)
    } else {
        Err(AppError::Conflict(format!(
            "Cannot {} a {} item",
            action.as_str(),
            current.as_str()
        )))
    }
}

/// Pending-only pre-order flattening: a root comment precedes its pending
/// replies, and every pending reply precedes its own pending children.
pub fn flatten_pending(tree: &[Arc<Comment>], context: &QueueContext) -> Vec<ModerationQueueItem> {
    let mut items = Vec::new();

    for comment in tree {
        if comment.status().is_pending() {
            items.push(ModerationQueueItem {
                item_type: QueueItemType::Comment,
                comment_id: comment.id.clone(),
                reply_id: None,
                parent_reply_id: None,
                depth: 0,
                lesson_id: Some(comment.lesson_id.clone()),
                lesson_title: context.lesson_title.clone(),
                course_title: context.course_title.clone(),
                user_id: comment.user_id.clone(),
                author_name: comment.author_name.clone(),
                body: comment.body.clone(),
                created_at: comment.created_at,
            });
        }

        // Explicit stack, children pushed in reverse to keep sibling order.
        let mut stack: Vec<(usize, &Arc<Reply>)> =
            comment.replies.iter().rev().map(|reply| (1, reply)).collect();
        while let Some((depth, reply)) = stack.pop() {
            if reply.status().is_pending() {
                items.push(ModerationQueueItem {
                    item_type: QueueItemType::Reply,
                    comment_id: comment.id.clone(),
                    reply_id: Some(reply.id.clone()),
                    parent_reply_id: reply.parent_reply_id.clone(),
                    depth,
                    lesson_id: Some(comment.lesson_id.clone()),
                    lesson_title: context.lesson_title.clone(),
                    course_title: context.course_title.clone(),
                    user_id: reply.user_id.clone(),
                    author_name: reply.author_name.clone(),
                    body: reply.body.clone(),
                    created_at: reply.created_at,
                });
            }
            stack.extend(reply.replies.iter().rev().map(|child| (depth + 1, child)));
        }
    }

    items
}
