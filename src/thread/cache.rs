use std::sync::Arc;

use tokio::sync::watch;

use crate::models::comment::Comment;

/// An immutable snapshot of a lesson's root comments.
pub type Tree = Arc<Vec<Arc<Comment>>>;

/// The single shared cell holding a lesson's current tree.
///
/// Readers always see a whole snapshot. Writers replace the snapshot with the
/// output of a pure function while holding the channel's lock, so two
/// mutations on different comments cannot lose each other's edits.
#[derive(Debug)]
pub struct ThreadCache {
    cell: watch::Sender<Tree>,
}

impl ThreadCache {
    pub fn new(initial: Vec<Arc<Comment>>) -> Self {
        let (cell, _) = watch::channel(Arc::new(initial));
        Self { cell }
    }

    /// Current snapshot. Cheap: clones one `Arc`.
    pub fn snapshot(&self) -> Tree {
        Arc::clone(&self.cell.borrow())
    }

    /// Publishes `mutate(current)` atomically and returns the published snapshot.
    pub fn update<F>(&self, mutate: F) -> Tree
    where
        F: FnOnce(&[Arc<Comment>]) -> Vec<Arc<Comment>>,
    {
        let mut published = Tree::default();
        self.cell.send_modify(|tree| {
            *tree = Arc::new(mutate(tree.as_slice()));
            published = Arc::clone(tree);
        });
        published
    }

    /// Replaces the whole tree, e.g. with a rollback snapshot or a fresh fetch.
    pub fn replace(&self, tree: Tree) {
        self.cell.send_replace(tree);
    }
}
