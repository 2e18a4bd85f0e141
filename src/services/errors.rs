use thiserror::Error;

use crate::providers::ProviderError;

pub const QUOTA_MESSAGE: &str =
    "You have exceeded your API quota. Please check your plan and billing details on ai.google.dev.";
pub const GENERIC_MESSAGE: &str = "An unexpected error occurred. Please try again.";
pub const NO_IMAGES_MESSAGE: &str = "The model did not return any image data. Try a different prompt.";

/// Errors surfaced to the user by a studio. `Display` is the user-facing text.
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: &'static str,
    },

    #[error("{}", QUOTA_MESSAGE)]
    QuotaExceeded(#[source] ProviderError),

    #[error("{}", GENERIC_MESSAGE)]
    Backend(#[source] ProviderError),

    #[error("{}", NO_IMAGES_MESSAGE)]
    NoImages,

    #[error("A request is already in progress.")]
    Busy,
}

impl StudioError {
    pub fn validation(field: &'static str, message: &'static str) -> Self {
        StudioError::Validation { field, message }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, StudioError::Validation { .. })
    }
}

impl From<ProviderError> for StudioError {
    fn from(err: ProviderError) -> Self {
        if err.is_quota() {
            StudioError::QuotaExceeded(err)
        } else {
            StudioError::Backend(err)
        }
    }
}
