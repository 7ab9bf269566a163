use log::{debug, error, info, warn};

/// Logger that tags every record with the observation file it concerns.
#[derive(Debug, Clone)]
pub struct LogManager {
    context: String,
}

impl LogManager {
    pub fn new() -> Self {
        Self {
            context: String::from("compcore"),
        }
    }

    pub fn for_file(name: impl Into<String>) -> Self {
        Self {
            context: name.into(),
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn record(&self, message: &str) {
        info!("[{}] {}", self.context, message);
    }

    pub fn warn(&self, message: &str) {
        warn!("[{}] {}", self.context, message);
    }

    pub fn error(&self, message: &str) {
        error!("[{}] {}", self.context, message);
    }

    pub fn debug(&self, message: &str) {
        debug!("[{}] {}", self.context, message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}
