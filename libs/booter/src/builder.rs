use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::{
    self, Definition, EvalContext, Function, ProcessInfo, DEFAULT_CONFIG_SUFFIX,
};
use crate::errors::BootError;
use crate::registry::FactoryRegistry;
use crate::runtime::{Booter, Hook};
use crate::value::Value;

/// Collects functions, variables, hooks and a config source, and produces
/// [`Booter`]s. Each build yields an independent booter.
pub struct Builder {
    registry: Arc<FactoryRegistry>,
    functions: BTreeMap<String, Function>,
    variables: BTreeMap<String, Value>,
    startup_hooks: Vec<Hook>,
    shutdown_hooks: Vec<Hook>,
    suffix: String,
    process: ProcessInfo,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new(FactoryRegistry::global())
    }
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("variables", &self.variables)
            .field("startup_hooks", &self.startup_hooks.len())
            .field("shutdown_hooks", &self.shutdown_hooks.len())
            .field("suffix", &self.suffix)
            .field("process", &self.process)
            .finish()
    }
}

impl Builder {
    pub fn new(registry: Arc<FactoryRegistry>) -> Self {
        Self {
            registry,
            functions: BTreeMap::new(),
            variables: BTreeMap::new(),
            startup_hooks: Vec::new(),
            shutdown_hooks: Vec::new(),
            suffix: DEFAULT_CONFIG_SUFFIX.to_owned(),
            process: ProcessInfo::from_env(),
        }
    }

    pub fn registry(&self) -> &Arc<FactoryRegistry> {
        &self.registry
    }

    /// Adds or replaces an expression function, built-ins included.
    pub fn set_function(&mut self, name: impl Into<String>, function: Function) -> &mut Self {
        self.functions.insert(name.into(), function);
        self
    }

    /// Adds or replaces a top-level variable. Only scalars are accepted.
    pub fn set_variable(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<&mut Self, BootError> {
        let name = name.into();
        let value = value.into();
        if !value.is_scalar() {
            return Err(BootError::UnsupportedType {
                name,
                found: value.type_name(),
            });
        }
        self.variables.insert(name, value);
        Ok(self)
    }

    pub fn add_startup_hook<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.startup_hooks.push(Arc::new(hook));
        self
    }

    pub fn add_shutdown_hook<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shutdown_hooks.push(Arc::new(hook));
        self
    }

    /// Suffix of the files picked up by [`Builder::build_with_dir`], e.g. `.hcl`.
    pub fn set_config_file_suffix(&mut self, suffix: impl Into<String>) -> &mut Self {
        self.suffix = suffix.into();
        self
    }

    pub fn config_file_suffix(&self) -> &str {
        &self.suffix
    }

    pub fn set_version_string(&mut self, version: impl Into<String>) -> &mut Self {
        self.process.version = version.into();
        self
    }

    pub fn set_pname(&mut self, pname: impl Into<String>) -> &mut Self {
        self.process.pname = pname.into();
        self
    }

    /// Argument vector seen by `flag()`, `arg()` and `arglen()`, program name included.
    pub fn set_args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.process.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn process_info(&self) -> &ProcessInfo {
        &self.process
    }

    /// Built-in functions, then user functions and variables on top.
    pub fn eval_context(&self) -> EvalContext {
        let mut ctx = EvalContext::new();
        let process = Arc::new(self.process.clone());
        for (name, function) in config::default_functions(&process) {
            ctx.set_function(name, function);
        }
        for (name, function) in &self.functions {
            ctx.set_function(name.clone(), function.clone());
        }
        for (name, value) in &self.variables {
            ctx.set_variable(name.clone(), value.clone());
        }
        ctx
    }

    pub fn build(&self, mut definitions: Vec<Definition>) -> Booter {
        definitions.sort_by_key(|d| d.priority);
        Booter::with_hooks(
            definitions,
            self.registry.clone(),
            self.startup_hooks.clone(),
            self.shutdown_hooks.clone(),
        )
    }

    pub fn build_with_content(&self, content: &str) -> Result<Booter, BootError> {
        let definitions = config::load_definitions(content, &self.eval_context())?;
        Ok(self.build(definitions))
    }

    pub fn build_with_files<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Booter, BootError> {
        let definitions = config::load_definition_files(paths, &self.eval_context())?;
        Ok(self.build(definitions))
    }

    pub fn build_with_dir(&self, dir: impl AsRef<Path>) -> Result<Booter, BootError> {
        let definitions =
            config::load_definition_dir(dir.as_ref(), &self.suffix, &self.eval_context())?;
        Ok(self.build(definitions))
    }
}
