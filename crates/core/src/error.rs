use thiserror::Error;

/// Result type for bindweave operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bindweave operations
#[derive(Error, Debug)]
pub enum Error {
    /// A required type has no binding and cannot be auto-bound
    #[error("Incomplete binding for {subject}: {message}")]
    Incomplete { subject: String, message: String },

    /// A structural rule was violated (duplicate bindings, child factory mismatch, cycles)
    #[error("Invalid declaration {subject}: {message}")]
    Invalid { subject: String, message: String },

    /// An internal invariant did not hold
    #[error("Internal error: {0}")]
    Internal(String),

    /// Several independent failures collected during one unit of work
    #[error("{} independent failures: {}", .0.len(), join_errors(.0))]
    Aggregate(Vec<Error>),

    /// Malformed input (type names, qualifiers)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metadata documents that could not be decoded
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Creates an incomplete-binding error
    pub fn incomplete(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Incomplete {
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid-declaration error
    pub fn invalid(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Creates an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Creates an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Creates a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a metadata error
    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::Metadata(msg.into())
    }

    /// Adds context to any error
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Wraps a batch of errors, unwrapping the single-error case
    pub fn aggregate(mut errors: Vec<Error>) -> Self {
        if errors.len() == 1 {
            if let Some(error) = errors.pop() {
                return error;
            }
        }
        Self::Aggregate(errors)
    }

    /// Number of leaf failures carried by this error
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Aggregate(errors) => errors.iter().map(Error::leaf_count).sum(),
            _ => 1,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::with_context(context, e))
    }
}
