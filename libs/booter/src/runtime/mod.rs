mod booter;
pub mod global;
pub mod signals;

pub use booter::{Booter, Hook, ModuleState};
pub use signals::{Signal, SignalNotifier};
