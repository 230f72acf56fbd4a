//! # Booter - Declarative Module Booter
//!
//! Boots a process from HCL-like module definitions.
//!
//! ## Features
//!
//! - **Declarative**: `module "<id>" { ... }` blocks describe which modules run
//! - **Typed config**: `#[derive(Bind)]` projects evaluated config onto plain structs
//! - **Injection**: `inject "<target>" "<point>" {}` hands the declaring module to its target
//!   before anything starts
//! - **Ordered lifecycle**: instantiate, inject, start by priority; stop in reverse
//! - **Process-wide handle**: [`runtime::global`] reaches the launched booter from anywhere
//!
//! ## Basic Example
//!
//! ```rust,ignore
//! use booter::{Bind, Builder, FactoryRegistry, Module};
//! use std::sync::Arc;
//!
//! #[derive(Default, Bind)]
//! pub struct EchoConf {
//!     pub greeting: String,
//! }
//!
//! pub struct Echo(String);
//!
//! impl Module for Echo {
//!     fn start(&self) -> anyhow::Result<()> {
//!         tracing::info!(greeting = %self.0, "echo started");
//!         Ok(())
//!     }
//!     fn stop(&self) {}
//! }
//!
//! let registry = Arc::new(FactoryRegistry::new());
//! registry.register_typed("echo", EchoConf::default, |c: &EchoConf| Ok(Echo(c.greeting.clone())));
//!
//! let booter = Builder::new(registry).build_with_content(r#"
//! module "echo" {
//!   config {
//!     greeting = "hello ${env("USER", "there")}"
//!   }
//! }
//! "#)?;
//! booter.startup()?;
//! ```

// Derive output refers to `::booter::...`, which must also resolve inside this crate.
extern crate self as booter;

pub mod bind;
pub mod builder;
pub mod cli;
pub mod config;
pub mod contracts;
pub mod errors;
pub mod paths;
pub mod registry;
pub mod runtime;
pub mod value;

pub use bind::{Bind, BindError};
pub use builder::Builder;
pub use config::{ConfigError, Definition, EvalContext, Function, InjectionDef, ProcessInfo};
pub use contracts::{downcast_module, InjectError, Module, ModuleConfig, ModuleRef};
pub use errors::BootError;
pub use registry::{Factory, FactoryError, FactoryRegistry};
pub use runtime::{global, Booter, Hook, ModuleState, Signal, SignalNotifier};
pub use value::{Number, Value};
