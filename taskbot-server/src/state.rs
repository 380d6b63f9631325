//! Shared application state for the HTTP server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskbot::executor::Executor;
use taskbot::io::config::TaskbotConfig;
use taskbot::io::tabletop::TableTopSim;

/// Shared state accessible from all request handlers.
///
/// One simulator backs every request; the mutex serializes runs so each
/// execution sees an exclusive environment.
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<Mutex<Executor<TableTopSim>>>,
    /// Wall-clock budget per run.
    pub timeout: Duration,
    /// Extra attempts per run.
    pub retries: u32,
}

impl AppState {
    pub fn new(config: &TaskbotConfig) -> Self {
        let executor = Executor::new(TableTopSim::new(config.scene.clone()))
            .with_smoother(config.smoother.clone());
        Self {
            executor: Arc::new(Mutex::new(executor)),
            timeout: config.executor.timeout(),
            retries: config.executor.retries,
        }
    }
}
