pub mod gemini;
pub mod mock;

use std::fmt;

use crate::service::ShotAnalyst;

#[derive(Clone, Debug)]
pub enum ProviderConfig {
    Gemini(gemini::GeminiConfig),
    Mock(mock::MockConfig),
}

impl ProviderConfig {
    pub fn build(self) -> Result<Box<dyn ShotAnalyst>, ProviderError> {
        match self {
            ProviderConfig::Gemini(config) => {
                Ok(Box::new(gemini::GeminiAnalyst::new(config)?))
            }
            ProviderConfig::Mock(config) => Ok(Box::new(mock::MockAnalyst::new(config))),
        }
    }
}

#[derive(Debug)]
pub enum ProviderError {
    Configuration(String),
    Authentication(String),
    RateLimited(String),
    Transport(String),
    InvalidResponse(String),
    Other(String),
}

impl ProviderError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        ProviderError::Configuration(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        ProviderError::Transport(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        ProviderError::InvalidResponse(msg.into())
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Configuration(msg)
            | ProviderError::Authentication(msg)
            | ProviderError::RateLimited(msg)
            | ProviderError::Transport(msg)
            | ProviderError::InvalidResponse(msg)
            | ProviderError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ProviderError {}
