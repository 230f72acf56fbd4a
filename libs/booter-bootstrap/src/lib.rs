//! Process entry glue for booter-based binaries: boot flags, boot log,
//! pid file, daemonisation and the signal-driven run loop.

#[cfg(unix)]
mod daemon;
pub mod flags;
pub mod launcher;
pub mod logging;

pub use flags::*;
pub use launcher::*;
pub use logging::*;
