//! Error types for the sandbox context.

use std::path::PathBuf;
use thiserror::Error;

/// Message thrown inside the isolate when `$rootElement` is requested from an
/// injector that has not been bootstrapped. Matched when mapping JS errors.
pub(crate) const ROOT_ELEMENT_NOT_READY: &str =
    "$rootElement is not available until the injector is bootstrapped";

#[derive(Debug, Error)]
pub enum ContextError {
    /// A referenced script could not be read.
    #[error("failed to load '{reference}': {source}")]
    Load {
        reference: String,
        #[source]
        source: anyhow::Error,
    },

    /// A script or framework call threw inside the environment.
    #[error("error executing '{label}': {source}")]
    Execution {
        label: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{}", ROOT_ELEMENT_NOT_READY)]
    RootElementNotReady,

    /// Framework accessor used before the framework script was run.
    #[error("global '{global}' is not defined in this context - run the framework source first")]
    FrameworkMissing { global: &'static str },

    #[error("handle belongs to a different context")]
    ForeignHandle,

    #[error("cannot convert value of '{label}': {message}")]
    Conversion { label: String, message: String },

    #[error("rejected scope values: {0}")]
    Sanitize(String),

    /// `ContextConfig::script_root` is missing or not a directory.
    #[error("invalid script root '{}': {source}", .root.display())]
    ScriptRoot {
        root: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to create execution environment: {0}")]
    Runtime(String),
}

impl ContextError {
    /// Map an execution failure, recognising the not-bootstrapped marker.
    pub(crate) fn execution(label: impl Into<String>, source: anyhow::Error) -> Self {
        if source.to_string().contains(ROOT_ELEMENT_NOT_READY) {
            return ContextError::RootElementNotReady;
        }
        ContextError::Execution {
            label: label.into(),
            source,
        }
    }

    pub fn is_load(&self) -> bool {
        matches!(self, ContextError::Load { .. })
    }

    pub fn is_execution(&self) -> bool {
        matches!(self, ContextError::Execution { .. })
    }
}

pub type Result<T> = std::result::Result<T, ContextError>;
