use std::time::Duration;

use booter::Bind;

/// Configuration for the `heartbeat` module.
#[derive(Debug, Clone, Bind)]
pub struct HeartbeatConfig {
    pub label: String,
    pub interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            label: "heartbeat".to_owned(),
            interval: Duration::from_secs(1),
        }
    }
}

/// Configuration for the `reporter` module.
#[derive(Debug, Clone, Bind)]
pub struct ReporterConfig {
    pub every: Duration,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            every: Duration::from_secs(5),
        }
    }
}
