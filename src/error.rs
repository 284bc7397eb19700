use thiserror::Error;

/// Application error taxonomy
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad numeric or structural input (invalid target size, duration, bitrates)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Inspector call failed or returned incomplete track data
    #[error("inspection failed: {0}")]
    Inspection(String),

    /// Audio track selection and configured bitrates do not line up
    #[error("configuration mismatch: {0}")]
    ConfigurationMismatch(String),

    /// An invoked external tool failed or exited non-zero
    #[error("external tool failed: {0}")]
    ExternalTool(String),

    /// Configuration file problem
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for AppError {
    fn from(e: toml::de::Error) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for AppError {
    fn from(e: toml::ser::Error) -> Self {
        AppError::Config(e.to_string())
    }
}
