//! Common types for Tessera: CRDs, errors, configuration and telemetry

#![deny(missing_docs)]

pub mod config;
pub mod crd;
pub mod error;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Secret key holding the kubeconfig of the infrastructure cluster
pub const CREDENTIALS_KUBECONFIG_KEY: &str = "kubeconfig";

/// Secret key holding the namespace machines are created in
pub const CREDENTIALS_NAMESPACE_KEY: &str = "namespace";

/// Secret key holding machine user data inside a machine class secret
pub const CLOUD_CONFIG_KEY: &str = "cloudConfig";
