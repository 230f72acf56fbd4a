use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::config::Definition;
use crate::contracts::{downcast_module, Module, ModuleRef};
use crate::errors::BootError;
use crate::registry::{FactoryError, FactoryRegistry};

use super::signals::{self, Signal, SignalNotifier};

/// Callback run once before the first module starts or before the last one stops.
pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// Lifecycle state of a booted module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    None,
    Starting,
    Run,
    Stopping,
    Stop,
}

struct Wrapper {
    definition: Definition,
    instance: ModuleRef,
    config: Arc<dyn Any + Send + Sync>,
    state: Mutex<ModuleState>,
}

impl Wrapper {
    fn id(&self) -> &str {
        &self.definition.id
    }

    fn set_state(&self, state: ModuleState) {
        *self.state.lock() = state;
    }
}

struct Inner {
    definitions: Vec<Definition>,
    registry: Arc<FactoryRegistry>,
    /// Set once, after every enabled module has been created.
    wrappers: OnceLock<Vec<Wrapper>>,
    started: AtomicBool,
    stopped: AtomicBool,
    startup_hooks: Vec<Hook>,
    shutdown_hooks: Mutex<Vec<Hook>>,
    signals: SignalNotifier,
}

/// Owns the module instances of one process and drives their lifecycle.
///
/// Clones share the same modules, so a clone can be handed to other threads
/// (see [`crate::runtime::global`]) while the owner waits for a signal.
#[derive(Clone)]
pub struct Booter {
    inner: Arc<Inner>,
}

impl fmt::Debug for Booter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modules: Vec<(&str, ModuleState)> = self
            .wrappers()
            .iter()
            .map(|w| (w.id(), *w.state.lock()))
            .collect();
        f.debug_struct("Booter")
            .field("definitions", &self.inner.definitions.len())
            .field("modules", &modules)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

impl Booter {
    /// `definitions` must already be sorted by priority.
    pub fn new(definitions: Vec<Definition>, registry: Arc<FactoryRegistry>) -> Self {
        Self::with_hooks(definitions, registry, Vec::new(), Vec::new())
    }

    pub(crate) fn with_hooks(
        definitions: Vec<Definition>,
        registry: Arc<FactoryRegistry>,
        startup_hooks: Vec<Hook>,
        shutdown_hooks: Vec<Hook>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                definitions,
                registry,
                wrappers: OnceLock::new(),
                started: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                startup_hooks,
                shutdown_hooks: Mutex::new(shutdown_hooks),
                signals: SignalNotifier::default(),
            }),
        }
    }

    fn wrappers(&self) -> &[Wrapper] {
        self.inner.wrappers.get().map(Vec::as_slice).unwrap_or_default()
    }

    /// Instantiates, injects and starts every enabled module, in priority order.
    ///
    /// Runs at most once per booter, even when the first attempt fails. A
    /// start failure aborts the sequence; modules that already started keep
    /// running until [`Booter::shutdown`].
    pub fn startup(&self) -> Result<(), BootError> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(BootError::AlreadyStarted);
        }

        tracing::info!("Phase: instantiate");
        let wrappers = self.instantiate()?;
        self.inner
            .wrappers
            .set(wrappers)
            .map_err(|_| BootError::AlreadyStarted)?;

        tracing::info!("Phase: inject");
        self.inject()?;

        tracing::info!("Phase: start");
        self.start()
    }

    fn instantiate(&self) -> Result<Vec<Wrapper>, BootError> {
        let mut wrappers = Vec::new();
        for def in &self.inner.definitions {
            if def.disabled {
                tracing::debug!(module = %def.id, "module disabled, skipping");
                continue;
            }
            let factory = self
                .inner
                .registry
                .lookup(&def.id)
                .ok_or_else(|| BootError::FactoryNotFound(def.id.clone()))?;

            let mut config = factory.new_config();
            if !def.config.is_null() {
                let type_name = config.type_name();
                config
                    .bind(type_name, &def.config)
                    .map_err(|source| BootError::Bind {
                        id: def.id.clone(),
                        type_name,
                        source,
                    })?;
            }
            let config = config.into_any();

            let instance = factory.new_instance(config.clone()).map_err(|err| match err {
                FactoryError::InvalidConfigType { expected } => BootError::InvalidConfigType {
                    id: def.id.clone(),
                    expected,
                },
                FactoryError::Create(source) => BootError::ModCreateFailed {
                    id: def.id.clone(),
                    source,
                },
            })?;

            tracing::debug!(
                module = %def.id,
                name = %def.name,
                priority = def.priority,
                "module created"
            );
            wrappers.push(Wrapper {
                definition: def.clone(),
                instance,
                config,
                state: Mutex::new(ModuleState::None),
            });
        }
        Ok(wrappers)
    }

    /// Finds an instantiated module by name first, then by id.
    fn find_target(&self, target: &str) -> Option<&Wrapper> {
        let wrappers = self.wrappers();
        wrappers
            .iter()
            .find(|w| w.definition.name == target)
            .or_else(|| wrappers.iter().find(|w| w.definition.id == target))
    }

    /// Hands each declaring module to the target named by its `inject` blocks.
    fn inject(&self) -> Result<(), BootError> {
        for wrapper in self.wrappers() {
            for inject in &wrapper.definition.injects {
                let target = self.find_target(&inject.target).ok_or_else(|| {
                    BootError::InjectTargetNotFound {
                        module: wrapper.id().to_owned(),
                        target: inject.target.clone(),
                    }
                })?;
                target
                    .instance
                    .inject(&inject.field_name, &wrapper.instance)
                    .map_err(|source| BootError::InjectFieldInaccessible {
                        module: wrapper.id().to_owned(),
                        target: inject.target.clone(),
                        field: inject.field_name.clone(),
                        source,
                    })?;
                tracing::debug!(
                    module = %wrapper.id(),
                    target = %target.id(),
                    field = %inject.field_name,
                    "injected"
                );
            }
        }
        Ok(())
    }

    fn start(&self) -> Result<(), BootError> {
        for wrapper in self.wrappers() {
            wrapper.set_state(ModuleState::Starting);
        }
        for hook in &self.inner.startup_hooks {
            hook();
        }
        for wrapper in self.wrappers() {
            tracing::info!(module = %wrapper.id(), "Starting module");
            wrapper
                .instance
                .start()
                .map_err(|source| BootError::ModStartFailed {
                    id: wrapper.definition.id.clone(),
                    source,
                })?;
            wrapper.set_state(ModuleState::Run);
        }
        Ok(())
    }

    /// Adds a hook to run at the beginning of [`Booter::shutdown`]. Hooks
    /// added once shutdown has begun never run.
    pub fn add_shutdown_hook<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.shutdown_hooks.lock().push(Arc::new(hook));
    }

    /// Runs shutdown hooks, then stops modules in reverse start order.
    /// A panicking hook or module is logged and skipped. Only the first call
    /// has an effect.
    pub fn shutdown(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            tracing::debug!("shutdown already done");
            return;
        }
        tracing::info!("Phase: stop");
        for wrapper in self.wrappers() {
            wrapper.set_state(ModuleState::Stopping);
        }
        let hooks = self.inner.shutdown_hooks.lock().clone();
        for hook in &hooks {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| hook())) {
                tracing::warn!(error = %panic_message(payload.as_ref()), "Shutdown hook panicked");
            }
        }
        for wrapper in self.wrappers().iter().rev() {
            tracing::info!(module = %wrapper.id(), "Stopping module");
            let instance = &wrapper.instance;
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| instance.stop())) {
                tracing::warn!(
                    module = %wrapper.definition.id,
                    error = %panic_message(payload.as_ref()),
                    "Failed to stop module"
                );
            }
            wrapper.set_state(ModuleState::Stop);
        }
    }

    pub fn shutdown_and_exit(&self, code: i32) -> ! {
        self.shutdown();
        std::process::exit(code)
    }

    /// Waits for Ctrl+C, SIGTERM, or a [`SignalNotifier::notify`].
    pub async fn wait_signal(&self) -> std::io::Result<Signal> {
        signals::wait_signal(&self.inner.signals).await
    }

    pub fn notifier(&self) -> SignalNotifier {
        self.inner.signals.clone()
    }

    /// Wakes a pending [`Booter::wait_signal`]; `false` when nobody waits.
    pub fn notify_signal(&self) -> bool {
        self.inner.signals.notify()
    }

    pub fn definitions(&self) -> &[Definition] {
        &self.inner.definitions
    }

    pub fn get_definition(&self, id: &str) -> Option<&Definition> {
        self.inner.definitions.iter().find(|d| d.id == id)
    }

    fn wrapper(&self, id: &str) -> Option<&Wrapper> {
        self.wrappers().iter().find(|w| w.id() == id)
    }

    pub fn get_instance(&self, id: &str) -> Option<ModuleRef> {
        self.wrapper(id).map(|w| w.instance.clone())
    }

    pub fn get_instance_as<T: Module>(&self, id: &str) -> Option<Arc<T>> {
        self.wrapper(id).and_then(|w| downcast_module::<T>(&w.instance))
    }

    pub fn get_config(&self, id: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.wrapper(id).map(|w| w.config.clone())
    }

    pub fn get_config_as<C: Any + Send + Sync>(&self, id: &str) -> Option<Arc<C>> {
        self.get_config(id).and_then(|c| c.downcast::<C>().ok())
    }

    pub fn state(&self, id: &str) -> Option<ModuleState> {
        self.wrapper(id).map(|w| *w.state.lock())
    }
}
