// Progress events for long-running actions, keyed by a correlation ID

use tracing::{error, info};

pub trait ActionLogger: Send + Sync {
    fn step(&self, action_id: &str, step: &str);
    fn log(&self, action_id: &str, message: &str);
    fn error(&self, action_id: &str, message: &str);
    fn progress(&self, action_id: &str, percent: u8);
}

/// Forwards action events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingActionLogger;

impl ActionLogger for TracingActionLogger {
    fn step(&self, action_id: &str, step: &str) {
        info!(action_id, step, "action step");
    }

    fn log(&self, action_id: &str, message: &str) {
        info!(action_id, "{}", message);
    }

    fn error(&self, action_id: &str, message: &str) {
        error!(action_id, "{}", message);
    }

    fn progress(&self, action_id: &str, percent: u8) {
        info!(action_id, percent, "action progress");
    }
}
