use std::any::Any;
use std::sync::Arc;

use crate::bind::Bind;

/// Shared handle to a live module instance.
pub type ModuleRef = Arc<dyn Module>;

/// Upcast helper so `Arc<dyn Module>` can be downcast to its concrete type.
pub trait AsAny: Any + Send + Sync {
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Injection could not be applied to the target module.
#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    #[error("no injection point named {0:?}")]
    UnknownPoint(String),
    #[error("injection point {point:?} expects {expected}")]
    TypeMismatch { point: String, expected: &'static str },
}

/// A bootable module.
///
/// `start` must return promptly after launching any background work, and
/// `stop` must block until that work has quiesced.
pub trait Module: AsAny {
    fn start(&self) -> anyhow::Result<()>;

    fn stop(&self);

    /// Receives `source`, a module whose definition declares
    /// `inject "<this module>" "<point>" {}`. Runs after every module exists
    /// and before any of them starts.
    fn inject(&self, point: &str, source: &ModuleRef) -> Result<(), InjectError> {
        let _ = source;
        Err(InjectError::UnknownPoint(point.to_owned()))
    }
}

/// Downcasts a module handle to its concrete type, keeping identity.
pub fn downcast_module<T: Module>(module: &ModuleRef) -> Option<Arc<T>> {
    module.clone().as_any_arc().downcast::<T>().ok()
}

/// Typed configuration object produced by a factory.
pub trait ModuleConfig: Bind + Any + Send + Sync {
    /// Short type name used as the root of binder error paths.
    fn type_name(&self) -> &'static str;

    fn into_any(self: Box<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Bind + Any + Send + Sync> ModuleConfig for T {
    fn type_name(&self) -> &'static str {
        crate::bind::short_type_name::<T>()
    }

    fn into_any(self: Box<Self>) -> Arc<dyn Any + Send + Sync> {
        Arc::from(self as Box<dyn Any + Send + Sync>)
    }
}
