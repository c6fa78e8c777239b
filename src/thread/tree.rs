//! Non-destructive edits of a lesson's comment tree.
//!
//! Every function takes the current list of root comments and returns a new
//! list. Root comments other than the addressed one are returned as the same
//! `Arc`, and inside the addressed comment only the nodes on the path from the
//! root to the edited node are rebuilt; every other subtree is shared.

use std::sync::Arc;

use crate::models::comment::{Comment, Reply};

/// Prepends a new root comment (newest first).
pub fn insert_comment(tree: &[Arc<Comment>], comment: Arc<Comment>) -> Vec<Arc<Comment>> {
    prepend(tree, comment)
}

/// Inserts `reply` as the first child of its parent.
///
/// Direct replies (`parent_reply_id == None`) go to the front of the root
/// comment's replies. A reply whose parent cannot be found in the comment's
/// subtree is inserted at the root level of that comment instead of being
/// dropped.
pub fn insert_reply(tree: &[Arc<Comment>], reply: Arc<Reply>) -> Vec<Arc<Comment>> {
    let comment_id = reply.comment_id.clone();
    let parent_id = reply.parent_reply_id.clone();

    map_comment(tree, &comment_id, |comment| {
        let replies = match parent_id {
            None => prepend(&comment.replies, reply),
            Some(parent_id) => match find_path(&comment.replies, &parent_id) {
                Some((path, _)) => rebuild_along(&comment.replies, &path, |parent| {
                    Arc::new(parent.with_replies(prepend(&parent.replies, reply)))
                }),
                None => {
                    tracing::warn!(
                        comment_id = %comment.id,
                        parent_reply_id = %parent_id,
                        reply_id = %reply.id,
                        "orphaned reply: parent not found, inserting at comment root"
                    );
                    prepend(&comment.replies, reply)
                }
            },
        };
        Arc::new(comment.with_replies(replies))
    })
}

/// Replaces the reply with id `target_id` by `incoming`, keeping its position.
///
/// The root comment is taken from `incoming.comment_id`. If `incoming` carries
/// no replies of its own, the replaced node's replies are kept. A missing
/// target leaves the tree unchanged.
pub fn replace_reply(
    tree: &[Arc<Comment>],
    target_id: &str,
    incoming: Arc<Reply>,
) -> Vec<Arc<Comment>> {
    let comment_id = incoming.comment_id.clone();

    map_comment(tree, &comment_id, |comment| {
        match find_path(&comment.replies, target_id) {
            Some((path, _)) => {
                let replies = rebuild_along(&comment.replies, &path, |old| {
                    if incoming.replies.is_empty() && !old.replies.is_empty() {
                        Arc::new(incoming.with_replies(old.replies.clone()))
                    } else {
                        incoming
                    }
                });
                Arc::new(comment.with_replies(replies))
            }
            None => {
                tracing::debug!(
                    comment_id = %comment.id,
                    target_id,
                    "stale reply replace ignored: target not in tree"
                );
                Arc::clone(comment)
            }
        }
    })
}

/// Replaces the root comment with id `target_id` by `incoming`, keeping its position
/// and, if `incoming` has no replies, the replaced comment's replies.
pub fn replace_comment(
    tree: &[Arc<Comment>],
    target_id: &str,
    incoming: Arc<Comment>,
) -> Vec<Arc<Comment>> {
    if !tree.iter().any(|comment| comment.id == target_id) {
        tracing::debug!(target_id, "stale comment replace ignored: target not in tree");
    }

    map_comment(tree, target_id, |old| {
        if incoming.replies.is_empty() && !old.replies.is_empty() {
            Arc::new(incoming.with_replies(old.replies.clone()))
        } else {
            incoming
        }
    })
}

pub fn find_comment<'a>(tree: &'a [Arc<Comment>], comment_id: &str) -> Option<&'a Arc<Comment>> {
    tree.iter().find(|comment| comment.id == comment_id)
}

pub fn find_reply<'a>(
    tree: &'a [Arc<Comment>],
    comment_id: &str,
    reply_id: &str,
) -> Option<&'a Arc<Reply>> {
    let comment = find_comment(tree, comment_id)?;
    find_path(&comment.replies, reply_id).map(|(_, reply)| reply)
}

/// Applies `edit` to the first root comment whose id matches; shares the rest.
fn map_comment<F>(tree: &[Arc<Comment>], comment_id: &str, edit: F) -> Vec<Arc<Comment>>
where
    F: FnOnce(&Arc<Comment>) -> Arc<Comment>,
{
    let mut edit = Some(edit);
    tree.iter()
        .map(|comment| match edit.take_if(|_| comment.id == comment_id) {
            Some(edit) => edit(comment),
            None => Arc::clone(comment),
        })
        .collect()
}

/// Pre-order search for `target_id`. Returns the sibling index at every level
/// from `roots` down to the match, plus the match itself.
///
/// Iterative so that structurally deep threads cannot exhaust the stack.
fn find_path<'a>(roots: &'a [Arc<Reply>], target_id: &str) -> Option<(Vec<usize>, &'a Arc<Reply>)> {
    // (siblings, index of the next sibling to visit)
    let mut stack: Vec<(&'a [Arc<Reply>], usize)> = vec![(roots, 0)];

    while let Some(frame) = stack.last_mut() {
        let (siblings, next) = *frame;
        if next >= siblings.len() {
            stack.pop();
            continue;
        }
        frame.1 += 1;

        let node = &siblings[next];
        if node.id == target_id {
            let path = stack.iter().map(|(_, next)| next - 1).collect();
            return Some((path, node));
        }
        if !node.replies.is_empty() {
            stack.push((node.replies.as_slice(), 0));
        }
    }

    None
}

/// Rebuilds the nodes on `path` bottom-up after replacing the node at its end.
fn rebuild_along<F>(roots: &[Arc<Reply>], path: &[usize], edit: F) -> Vec<Arc<Reply>>
where
    F: FnOnce(&Arc<Reply>) -> Arc<Reply>,
{
    let Some((&last, _)) = path.split_last() else {
        return roots.to_vec();
    };

    // levels[k] holds the siblings that path[k] indexes into.
    let mut levels: Vec<&[Arc<Reply>]> = Vec::with_capacity(path.len());
    let mut current = roots;
    for &index in path {
        levels.push(current);
        current = current[index].replies.as_slice();
    }

    let mut replaced = edit(&levels[path.len() - 1][last]);
    for depth in (1..path.len()).rev() {
        let mut siblings = levels[depth].to_vec();
        siblings[path[depth]] = replaced;
        let parent = &levels[depth - 1][path[depth - 1]];
        replaced = Arc::new(parent.with_replies(siblings));
    }

    let mut top = roots.to_vec();
    top[path[0]] = replaced;
    top
}

fn prepend<T>(items: &[Arc<T>], first: Arc<T>) -> Vec<Arc<T>> {
    let mut out = Vec::with_capacity(items.len() + 1);
    out.push(first);
    out.extend(items.iter().cloned());
    out
}
