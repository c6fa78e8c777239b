// src/models/mod.rs

pub mod comment;
pub mod moderation;
pub mod view;
