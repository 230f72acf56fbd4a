//! Configuration language: syntax, evaluation, and module definitions.

pub mod definitions;
pub mod eval;
pub mod functions;
pub mod parser;
pub mod syntax;

use std::path::PathBuf;

pub use definitions::{
    load_definition_dir, load_definition_files, load_definitions, parse_definitions, Definition,
    InjectionDef, CONTENT_FILE_NAME, DEFAULT_CONFIG_SUFFIX,
};
pub use eval::{EvalContext, EvalError};
pub use functions::{default_functions, Arity, Function, FunctionError, ProcessInfo};
pub use syntax::Location;

/// Failure to read, parse or evaluate configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{location}: {message}")]
    Syntax { location: Location, message: String },
    #[error("{location}: {source}")]
    Eval {
        location: Location,
        #[source]
        source: EvalError,
    },
    #[error("{location}: {message}")]
    Schema { location: Location, message: String },
}

impl ConfigError {
    pub fn location(&self) -> Option<&Location> {
        match self {
            ConfigError::Read { .. } => None,
            ConfigError::Syntax { location, .. }
            | ConfigError::Eval { location, .. }
            | ConfigError::Schema { location, .. } => Some(location),
        }
    }
}
