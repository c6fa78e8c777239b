use std::sync::Arc;

use crate::config::Config;
use crate::thread::ThreadEngine;
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ThreadEngine>,
    pub config: Config,
}

impl FromRef<AppState> for Arc<ThreadEngine> {
    fn from_ref(state: &AppState) -> Self {
        state.engine.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
