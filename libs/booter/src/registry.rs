//! Factory registry: module id to config and instance constructors.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::bind::short_type_name;
use crate::contracts::{Module, ModuleConfig, ModuleRef};

#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("invalid config type, expected {expected}")]
    InvalidConfigType { expected: &'static str },
    #[error(transparent)]
    Create(#[from] anyhow::Error),
}

type NewConfigFn = dyn Fn() -> Box<dyn ModuleConfig> + Send + Sync;
type NewInstanceFn =
    dyn Fn(Arc<dyn Any + Send + Sync>) -> Result<ModuleRef, FactoryError> + Send + Sync;

/// Constructors registered for one module id.
pub struct Factory {
    id: String,
    new_config: Box<NewConfigFn>,
    new_instance: Box<NewInstanceFn>,
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory").field("id", &self.id).finish()
    }
}

impl Factory {
    pub fn new<C, I>(id: impl Into<String>, new_config: C, new_instance: I) -> Self
    where
        C: Fn() -> Box<dyn ModuleConfig> + Send + Sync + 'static,
        I: Fn(Arc<dyn Any + Send + Sync>) -> Result<ModuleRef, FactoryError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            id: id.into(),
            new_config: Box::new(new_config),
            new_instance: Box::new(new_instance),
        }
    }

    /// Typed constructor pair; the instance constructor only ever sees a `C`.
    pub fn typed<C, M, NC, NI>(id: impl Into<String>, new_config: NC, new_instance: NI) -> Self
    where
        C: ModuleConfig,
        M: Module,
        NC: Fn() -> C + Send + Sync + 'static,
        NI: Fn(&C) -> anyhow::Result<M> + Send + Sync + 'static,
    {
        Self::new(
            id,
            move || Box::new(new_config()) as Box<dyn ModuleConfig>,
            move |config: Arc<dyn Any + Send + Sync>| {
                let config = config
                    .downcast::<C>()
                    .map_err(|_| FactoryError::InvalidConfigType {
                        expected: short_type_name::<C>(),
                    })?;
                let module = new_instance(&*config)?;
                Ok(Arc::new(module) as ModuleRef)
            },
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn new_config(&self) -> Box<dyn ModuleConfig> {
        (self.new_config)()
    }

    pub fn new_instance(
        &self,
        config: Arc<dyn Any + Send + Sync>,
    ) -> Result<ModuleRef, FactoryError> {
        (self.new_instance)(config)
    }
}

/// Shared map of registered factories. The first registration of an id wins.
#[derive(Default)]
pub struct FactoryRegistry {
    factories: Mutex<HashMap<String, Arc<Factory>>>,
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used by the bootstrap entry point.
    pub fn global() -> Arc<FactoryRegistry> {
        static GLOBAL: OnceLock<Arc<FactoryRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(FactoryRegistry::new())).clone()
    }

    /// Returns `false` when the id was already taken; the existing factory stays.
    pub fn register(&self, factory: Factory) -> bool {
        let mut factories = self.factories.lock();
        if factories.contains_key(&factory.id) {
            tracing::debug!(module = %factory.id, "factory already registered, ignoring duplicate");
            return false;
        }
        factories.insert(factory.id.clone(), Arc::new(factory));
        true
    }

    pub fn register_typed<C, M, NC, NI>(
        &self,
        id: impl Into<String>,
        new_config: NC,
        new_instance: NI,
    ) -> bool
    where
        C: ModuleConfig,
        M: Module,
        NC: Fn() -> C + Send + Sync + 'static,
        NI: Fn(&C) -> anyhow::Result<M> + Send + Sync + 'static,
    {
        self.register(Factory::typed(id, new_config, new_instance))
    }

    pub fn unregister(&self, id: &str) -> Option<Arc<Factory>> {
        self.factories.lock().remove(id)
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<Factory>> {
        self.factories.lock().get(id).cloned()
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.factories.lock().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::{Bind, BindError};
    use crate::value::Value;

    #[derive(Default)]
    struct Conf {
        tag: String,
    }

    impl Bind for Conf {
        fn bind(&mut self, path: &str, value: &Value) -> Result<(), BindError> {
            self.tag.bind(path, value)
        }
    }

    struct Noop(String);

    impl Module for Noop {
        fn start(&self) -> anyhow::Result<()> {
            Ok(())
        }

        fn stop(&self) {}
    }

    fn noop_factory(id: &str, tag: &'static str) -> Factory {
        Factory::typed(
            id,
            move || Conf { tag: tag.into() },
            |c: &Conf| Ok(Noop(c.tag.clone())),
        )
    }

    #[test]
    fn first_registration_wins() {
        let registry = FactoryRegistry::new();
        assert!(registry.register(noop_factory("m", "first")));
        assert!(!registry.register(noop_factory("m", "second")));

        let factory = registry.lookup("m").unwrap();
        let config = factory.new_config().into_any();
        let module = factory.new_instance(config).unwrap();
        let noop = crate::contracts::downcast_module::<Noop>(&module).unwrap();
        assert_eq!(noop.0, "first");
    }

    #[test]
    fn typed_factory_rejects_foreign_config() {
        let factory = noop_factory("m", "x");
        let err = factory.new_instance(Arc::new(42_u32)).err().expect("expected error");
        assert!(matches!(err, FactoryError::InvalidConfigType { expected: "Conf" }));
    }

    #[test]
    fn unregister_and_ids() {
        let registry = FactoryRegistry::new();
        registry.register(noop_factory("b", "x"));
        registry.register(noop_factory("a", "x"));
        assert_eq!(registry.ids(), ["a", "b"]);
        assert!(registry.unregister("a").is_some());
        assert!(registry.lookup("a").is_none());
        assert!(registry.unregister("a").is_none());
    }

    #[test]
    fn concurrent_registration_keeps_one_factory_per_id() {
        let registry = Arc::new(FactoryRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry.register(noop_factory(&format!("m{}", i % 4), "x"))
                })
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 4);
        assert_eq!(registry.ids().len(), 4);
    }
}
