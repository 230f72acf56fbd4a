use crate::bind::BindError;
use crate::config::ConfigError;
use crate::contracts::InjectError;

/// Everything that can abort building or starting a [`Booter`](crate::Booter).
#[derive(Debug, thiserror::Error)]
pub enum BootError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("variable {name:?}: unsupported type {found}, expected a scalar")]
    UnsupportedType { name: String, found: &'static str },

    #[error("module {id}: bind {type_name}: {source}")]
    Bind {
        id: String,
        type_name: &'static str,
        #[source]
        source: BindError,
    },

    #[error("factory for module {0} not found")]
    FactoryNotFound(String),

    #[error("module {id}: invalid config type, expected {expected}")]
    InvalidConfigType { id: String, expected: &'static str },

    #[error("module {id}: create failed")]
    ModCreateFailed {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("module {module}: inject into {target}, not found")]
    InjectTargetNotFound { module: String, target: String },

    #[error("module {module}: cannot inject into {target}.{field}: {source}")]
    InjectFieldInaccessible {
        module: String,
        target: String,
        field: String,
        #[source]
        source: InjectError,
    },

    #[error("module {id}: start failed")]
    ModStartFailed {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("booter already started")]
    AlreadyStarted,
}

impl BootError {
    /// Id of the module the error is about, when there is one.
    pub fn module_id(&self) -> Option<&str> {
        match self {
            BootError::Bind { id, .. }
            | BootError::InvalidConfigType { id, .. }
            | BootError::ModCreateFailed { id, .. }
            | BootError::ModStartFailed { id, .. }
            | BootError::FactoryNotFound(id) => Some(id),
            BootError::InjectTargetNotFound { module, .. }
            | BootError::InjectFieldInaccessible { module, .. } => Some(module),
            BootError::Config(_)
            | BootError::UnsupportedType { .. }
            | BootError::AlreadyStarted => None,
        }
    }
}
