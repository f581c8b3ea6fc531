use thiserror::Error;

use crate::domain::Vendor;

/// Failure of a single vendor call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("device unreachable: {0}")]
    Unreachable(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl AdapterError {
    pub fn unreachable(detail: impl Into<String>) -> Self {
        Self::Unreachable(detail.into())
    }

    pub fn invalid_response(detail: impl Into<String>) -> Self {
        Self::InvalidResponse(detail.into())
    }

    pub fn rate_limited(detail: impl Into<String>) -> Self {
        Self::RateLimited(detail.into())
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::Unauthorized(detail.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("hue {0} is outside 0..=65535")]
    HueOutOfRange(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{vendor} adapter '{adapter}' failed: {error}")]
pub struct VendorFailure {
    pub vendor: Vendor,
    pub adapter: String,
    pub error: AdapterError,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("no light adapters are registered")]
    NoAdapters,
    #[error("{} adapter(s) failed: {}", .0.len(), summarize(.0))]
    PartialFailure(Vec<VendorFailure>),
}

impl ControllerError {
    /// Failures carried by a partial failure; empty for fatal errors.
    pub fn failures(&self) -> &[VendorFailure] {
        match self {
            Self::PartialFailure(failures) => failures,
            Self::NoAdapters => &[],
        }
    }
}

fn summarize(failures: &[VendorFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
#[path = "tests/error_tests.rs"]
mod tests;
