//! Error types for the Tessera worker-pool compiler
//!
//! Errors are structured with fields to aid debugging in production.
//! Each variant carries the context needed to act on it: the image identity
//! that could not be resolved, the status kind that failed to decode, the
//! pool whose bounds are invalid.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for Tessera operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Machine image could not be resolved from configuration or persisted status
    #[error("could not find machine image for {name}/{version}/{profile} neither in controller configuration nor in worker status")]
    ImageNotFound {
        /// Logical image name (e.g., "ubuntu")
        name: String,
        /// Logical image version
        version: String,
        /// Cloud profile the image is looked up for
        profile: String,
    },

    /// Persisted provider status is malformed or has the wrong schema
    #[error("could not decode {kind}: {message}")]
    StatusDecode {
        /// Kind of status being decoded (e.g., "WorkerStatus")
        kind: String,
        /// Description of what failed
        message: String,
    },

    /// A provider-scoped resource required by a machine class is absent
    #[error("missing provider resource {resource}: {message}")]
    MissingProviderResource {
        /// Resource that is missing (e.g., "security group")
        resource: String,
        /// Description of what was expected
        message: String,
    },

    /// Kubernetes version cannot be reduced to major.minor
    #[error("invalid kubernetes version {version:?}: {message}")]
    InvalidVersion {
        /// The version string as given
        version: String,
        /// Why it was rejected
        message: String,
    },

    /// Cloud credentials secret is incomplete
    #[error("invalid credentials in secret {secret}: {message}")]
    Credentials {
        /// Secret reference as namespace/name
        secret: String,
        /// Description of what's missing
        message: String,
    },

    /// Validation error for worker pools
    #[error("validation error for pool {pool}: {message}")]
    Validation {
        /// Name of the pool with invalid configuration
        pool: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "pools[0].maximum")
        field: Option<String>,
    },

    /// Controller configuration could not be loaded
    #[error("configuration error [{path}]: {message}")]
    Config {
        /// Path of the configuration file (or "inline")
        path: String,
        /// Description of what failed
        message: String,
    },

    /// The caller's cancellation signal fired while waiting on I/O
    #[error("operation cancelled [{context}]")]
    Cancelled {
        /// Operation that was interrupted (e.g., "credentials")
        context: String,
    },
}

impl Error {
    /// Create an image-not-found error for the given identity
    pub fn image_not_found(
        name: impl Into<String>,
        version: impl Into<String>,
        profile: impl Into<String>,
    ) -> Self {
        Self::ImageNotFound {
            name: name.into(),
            version: version.into(),
            profile: profile.into(),
        }
    }

    /// Create a status decode error for the given status kind
    pub fn status_decode(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::StatusDecode {
            kind: kind.into(),
            message: msg.into(),
        }
    }

    /// Create a missing provider resource error
    pub fn missing_provider_resource(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::MissingProviderResource {
            resource: resource.into(),
            message: msg.into(),
        }
    }

    /// Create an invalid version error
    pub fn invalid_version(version: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidVersion {
            version: version.into(),
            message: msg.into(),
        }
    }

    /// Create a credentials error for a secret reference
    pub fn credentials(secret: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Credentials {
            secret: secret.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error with the given message
    ///
    /// For simple validation errors without pool context.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            pool: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with pool context
    pub fn validation_for(pool: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            pool: pool.into(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with pool context and field path
    pub fn validation_for_field(
        pool: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            pool: pool.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a configuration error
    pub fn config(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(context: impl Into<String>) -> Self {
        Self::Cancelled {
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Configuration, validation and decode errors need a fix to the inputs
    /// and are not retryable. A missing provider resource may appear once the
    /// infrastructure controller has written its status.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => {
                // Don't retry on 4xx errors (forbidden, not found, etc.)
                !matches!(
                    source,
                    kube::Error::Api(ae) if (400..500).contains(&ae.code)
                )
            }
            Error::ImageNotFound { .. } => false,
            Error::StatusDecode { .. } => false,
            Error::MissingProviderResource { .. } => true,
            Error::InvalidVersion { .. } => false,
            Error::Credentials { .. } => false,
            Error::Validation { .. } => false,
            Error::Config { .. } => false,
            Error::Cancelled { .. } => true,
        }
    }

    /// Get the pool name if this error is associated with a specific pool
    pub fn pool(&self) -> Option<&str> {
        match self {
            Error::Validation { pool, .. } => Some(pool),
            _ => None,
        }
    }
}
