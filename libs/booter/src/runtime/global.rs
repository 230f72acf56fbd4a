//! Process-wide booter, for code that has no handle of its own.
//!
//! A launcher installs its booter with [`set_default`] before calling
//! [`Booter::startup`], so modules can already reach it from `start`.
//! Every accessor is a no-op (or `None`) while nothing is installed.

use std::any::Any;
use std::io;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::Definition;
use crate::contracts::{Module, ModuleRef};

use super::booter::Booter;
use super::signals::Signal;

static DEFAULT: RwLock<Option<Booter>> = parking_lot::const_rwlock(None);

/// Installs `booter` as the process-wide booter, replacing any previous one.
pub fn set_default(booter: &Booter) {
    if DEFAULT.write().replace(booter.clone()).is_some() {
        tracing::debug!("replaced the default booter");
    }
}

/// Removes and returns the process-wide booter.
pub fn take_default() -> Option<Booter> {
    DEFAULT.write().take()
}

pub fn current() -> Option<Booter> {
    DEFAULT.read().clone()
}

/// Wakes the default booter's [`Booter::wait_signal`]; `false` when there is
/// no default booter or nobody waits.
pub fn notify_signal() -> bool {
    current().is_some_and(|booter| booter.notify_signal())
}

/// Waits on the default booter. `Ok(None)` when none is installed.
pub async fn wait_signal() -> io::Result<Option<Signal>> {
    match current() {
        Some(booter) => booter.wait_signal().await.map(Some),
        None => Ok(None),
    }
}

/// Shuts the default booter down, if any, and exits the process.
pub fn shutdown_and_exit(code: i32) -> ! {
    match current() {
        Some(booter) => booter.shutdown_and_exit(code),
        None => std::process::exit(code),
    }
}

/// Returns `false` when no booter is installed; the hook is dropped.
pub fn add_shutdown_hook<F>(hook: F) -> bool
where
    F: Fn() + Send + Sync + 'static,
{
    match current() {
        Some(booter) => {
            booter.add_shutdown_hook(hook);
            true
        }
        None => false,
    }
}

pub fn get_definition(id: &str) -> Option<Definition> {
    current().and_then(|booter| booter.get_definition(id).cloned())
}

pub fn get_instance(id: &str) -> Option<ModuleRef> {
    current().and_then(|booter| booter.get_instance(id))
}

pub fn get_instance_as<T: Module>(id: &str) -> Option<Arc<T>> {
    current().and_then(|booter| booter.get_instance_as::<T>(id))
}

pub fn get_config(id: &str) -> Option<Arc<dyn Any + Send + Sync>> {
    current().and_then(|booter| booter.get_config(id))
}

pub fn get_config_as<C: Any + Send + Sync>(id: &str) -> Option<Arc<C>> {
    current().and_then(|booter| booter.get_config_as::<C>(id))
}
