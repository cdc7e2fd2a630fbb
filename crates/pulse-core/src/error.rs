use thiserror::Error;

#[derive(Debug, Error)]
pub enum PulseError {
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PulseError {
    /// Short, stable error code for log fields.
    pub fn code(&self) -> &'static str {
        match self {
            PulseError::Config(_) => "CONFIG_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, PulseError>;
