use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Registration not found: {id}")]
    NotFound { id: String },

    #[error("Source not found: {id}")]
    SourceNotFound { id: String },

    #[error("Registration {id} is already validated")]
    AlreadyValidated { id: String },

    #[error("Missing field for provisioning: {field}")]
    MissingField { field: String },

    #[error("No messageset with short name '{short_name}'")]
    UnknownMessageset { short_name: String },

    #[error("Storage error: {0}")]
    Storage(#[source] BoxError),

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl RegistrationError {
    /// Wrap a store failure, keeping it reachable through `source()`.
    pub fn storage(err: impl Into<BoxError>) -> Self {
        RegistrationError::Storage(err.into())
    }
}

pub type Result<T> = std::result::Result<T, RegistrationError>;
