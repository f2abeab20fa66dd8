/// Convenience result type used across brushwork.
pub type BrushworkResult<T> = Result<T, BrushworkError>;

/// Top-level error taxonomy used by pipeline, loader, and lifecycle APIs.
#[derive(thiserror::Error, Debug)]
pub enum BrushworkError {
    /// Structural misuse of the chaining API (a caller bug, never retried).
    #[error("malformed pipeline: `{operation}` {reason}")]
    MalformedPipeline {
        /// Name of the chained operation that was rejected.
        operation: &'static str,
        /// Why the operation is not allowed at this position.
        reason: &'static str,
    },

    /// A pipeline with no steps was resolved.
    #[error("empty pipeline: a pipeline needs a source before it can be resolved")]
    EmptyPipeline,

    /// A blend step was declared with no inputs.
    #[error("empty blend inputs: a blend needs at least one input")]
    EmptyBlendInputs,

    /// A graph sink operation failed while building nodes.
    #[error("resource resolution failed during `{operation}`")]
    ResourceResolutionFailed {
        /// Graph sink operation that failed.
        operation: &'static str,
        /// Underlying failure reported by the sink.
        #[source]
        cause: anyhow::Error,
    },

    /// The final realize step failed.
    #[error("native realize failed")]
    NativeRealizeFailed {
        /// Underlying failure reported by the sink.
        #[source]
        cause: anyhow::Error,
    },

    /// Invalid user-provided parameters.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors when serializing or deserializing descriptors or configuration.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BrushworkError {
    /// Build a [`BrushworkError::MalformedPipeline`] value.
    pub fn malformed(operation: &'static str, reason: &'static str) -> Self {
        Self::MalformedPipeline { operation, reason }
    }

    /// Build a [`BrushworkError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`BrushworkError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Wrap a sink failure raised by `operation`.
    pub fn resolution(operation: &'static str, cause: anyhow::Error) -> Self {
        Self::ResourceResolutionFailed { operation, cause }
    }
}

impl From<serde_json::Error> for BrushworkError {
    fn from(err: serde_json::Error) -> Self {
        Self::serde(err.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
