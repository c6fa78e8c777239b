//! The nested comment/reply engine: pure tree edits, the per-lesson cache,
//! optimistic submissions and the moderation workflow.

pub mod cache;
pub mod controller;
pub mod engine;
pub mod moderation;
pub mod queue;
pub mod tree;

pub use cache::{ThreadCache, Tree};
pub use controller::ThreadController;
pub use engine::ThreadEngine;
pub use queue::ModerationQueue;
