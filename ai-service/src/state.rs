//! Application state for the ai service.

use std::sync::Arc;

use crate::executor::QueryExecutor;
use crate::generator::SqlGenerator;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<dyn SqlGenerator>,
    pub executor: Arc<dyn QueryExecutor>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(generator: Arc<dyn SqlGenerator>, executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            generator,
            executor,
        }
    }
}
