//! Error types for the EC2 image service.

use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use thiserror::Error;

/// Error code EC2 returns when a dry run would have succeeded.
pub(super) const DRY_RUN_OPERATION: &str = "DryRunOperation";

/// Errors raised by a regional EC2 client.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Ec2ServiceError {
    /// The API rejected the request with an error code.
    #[error("{operation} failed with {code}: {message}")]
    Api {
        /// EC2 operation name.
        operation: &'static str,
        /// Error code returned by EC2 (for example `AuthFailure`).
        code: String,
        /// Error message returned by EC2.
        message: String,
    },
    /// The request never produced an API response (network, timeout, ...).
    #[error("{operation} failed: {message}")]
    Transport {
        /// EC2 operation name.
        operation: &'static str,
        /// Rendered error chain.
        message: String,
    },
    /// A successful response lacked a field the service relies on.
    #[error("{operation} response missing {field}")]
    MissingField {
        /// EC2 operation name.
        operation: &'static str,
        /// Missing field name.
        field: &'static str,
    },
}

impl Ec2ServiceError {
    /// Converts an SDK error, keeping the EC2 error code when present.
    pub(super) fn from_sdk<E, R>(operation: &'static str, err: &SdkError<E, R>) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        match err.code() {
            Some(code) => Self::Api {
                operation,
                code: code.to_owned(),
                message: err.message().unwrap_or_default().to_owned(),
            },
            None => Self::Transport {
                operation,
                message: DisplayErrorContext(err).to_string(),
            },
        }
    }

    /// Returns `true` when EC2 reported that a dry run would have succeeded.
    #[must_use]
    pub fn is_dry_run_success(&self) -> bool {
        matches!(self, Self::Api { code, .. } if code == DRY_RUN_OPERATION)
    }
}

/// Treats the `DryRunOperation` error as success.
pub(super) fn tolerate_dry_run<T>(
    result: Result<T, Ec2ServiceError>,
) -> Result<Option<T>, Ec2ServiceError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_dry_run_success() => Ok(None),
        Err(err) => Err(err),
    }
}
