//! Demo modules: `heartbeat` counts beats on a tokio task, `reporter` logs the
//! count of the heartbeat handed to it. Both need an entered tokio runtime
//! to start.

pub mod config;
pub mod module;
mod ticker;

pub use config::{HeartbeatConfig, ReporterConfig};
pub use module::{Heartbeat, Reporter};

use booter::FactoryRegistry;

pub const HEARTBEAT_ID: &str = "heartbeat";
pub const REPORTER_ID: &str = "reporter";

/// Registers both factories. Returns `false` if either id was already taken.
pub fn register(registry: &FactoryRegistry) -> bool {
    let heartbeat =
        registry.register_typed(HEARTBEAT_ID, HeartbeatConfig::default, Heartbeat::new);
    let reporter = registry.register_typed(REPORTER_ID, ReporterConfig::default, Reporter::new);
    heartbeat && reporter
}
