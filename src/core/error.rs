use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on '{location}': {message}")]
    Io { location: String, message: String },

    #[error("Encoding error on '{location}': {message}")]
    Encoding { location: String, message: String },

    #[error("Index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Unable to find loader for '{0}'")]
    UnsupportedFormat(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl StoreError {
    pub(crate) fn io(location: &str, context: &str, err: impl std::fmt::Display) -> Self {
        Self::Io {
            location: location.to_string(),
            message: format!("{}: {}", context, err),
        }
    }

    pub(crate) fn encoding(location: &str, context: &str, err: impl std::fmt::Display) -> Self {
        Self::Encoding {
            location: location.to_string(),
            message: format!("{}: {}", context, err),
        }
    }

    /// Location of the backing file this error refers to, if any.
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Io { location, .. } | Self::Encoding { location, .. } => Some(location),
            Self::UnsupportedFormat(location) => Some(location),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
