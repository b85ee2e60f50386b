//! Error taxonomy for a remap run.
//!
//! Only [`RemapError::Schema`] is recoverable: the pipeline skips the offending
//! batch and carries on. Every other variant aborts the run and leaves any
//! partially written output in place.

use std::io;

use thiserror::Error;

pub type RemapResult<T> = std::result::Result<T, RemapError>;

#[derive(Debug, Error)]
pub enum RemapError {
    /// Missing mapping source, unresolvable columns, invalid settings.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A batch does not carry the identifier column. `batch` is zero-based.
    #[error("schema error in batch {}: {message}", .batch + 1)]
    Schema { batch: usize, message: String },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{context}")]
    Csv {
        context: String,
        #[source]
        source: csv::Error,
    },
}

impl RemapError {
    pub fn configuration(message: impl Into<String>) -> Self {
        RemapError::Configuration {
            message: message.into(),
        }
    }

    pub fn schema(batch: usize, message: impl Into<String>) -> Self {
        RemapError::Schema {
            batch,
            message: message.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        RemapError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn csv(context: impl Into<String>, source: csv::Error) -> Self {
        RemapError::Csv {
            context: context.into(),
            source,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, RemapError::Schema { .. })
    }
}

/// Attaches a human readable context to I/O and CSV failures, mirroring
/// `anyhow::Context` for the typed error.
pub trait ErrorContext<T> {
    fn context_with<F, S>(self, context: F) -> RemapResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ErrorContext<T> for std::result::Result<T, io::Error> {
    fn context_with<F, S>(self, context: F) -> RemapResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| RemapError::io(context(), source))
    }
}

impl<T> ErrorContext<T> for std::result::Result<T, csv::Error> {
    fn context_with<F, S>(self, context: F) -> RemapResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| RemapError::csv(context(), source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_schema_errors_are_recoverable() {
        assert!(RemapError::schema(3, "missing id").is_recoverable());
        assert!(!RemapError::configuration("no mapping").is_recoverable());
        let io_err = RemapError::io("Reading input", io::Error::other("boom"));
        assert!(!io_err.is_recoverable());
    }

    #[test]
    fn messages_name_the_batch() {
        let err = RemapError::schema(7, "identifier column 'id' is missing");
        assert_eq!(
            err.to_string(),
            "schema error in batch 8: identifier column 'id' is missing"
        );
    }
}
