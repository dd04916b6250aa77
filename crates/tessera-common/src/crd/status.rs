//! Provider status documents persisted between reconciliations
//!
//! `WorkerStatus` carries the image ledger; `InfrastructureStatus` carries the
//! zone-scoped resources written by the infrastructure controller.

use serde::{Deserialize, Serialize};

/// API version of the provider status documents
pub const STATUS_API_VERSION: &str = "worker.tessera.dev/v1alpha1";

/// Kind of the persisted image ledger document
pub const WORKER_STATUS_KIND: &str = "WorkerStatus";

/// Kind of the infrastructure status document
pub const INFRASTRUCTURE_STATUS_KIND: &str = "InfrastructureStatus";

/// Security group purpose for worker nodes
pub const PURPOSE_NODES: &str = "nodes";

/// A machine image resolved to a provider-specific identifier
///
/// Identity is `(name, version, cloud_profile)`; a ledger holds at most one
/// record per identity.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedImage {
    /// Logical image name
    pub name: String,
    /// Logical image version
    pub version: String,
    /// Cloud profile the image was resolved for
    pub cloud_profile: String,
    /// Provider image identifier
    pub image: String,
}

impl ResolvedImage {
    /// Returns true if this record has the given identity
    pub fn matches(&self, name: &str, version: &str, cloud_profile: &str) -> bool {
        self.name == name && self.version == version && self.cloud_profile == cloud_profile
    }

    /// Returns true if both records share an identity (image id ignored)
    pub fn same_identity(&self, other: &ResolvedImage) -> bool {
        self.matches(&other.name, &other.version, &other.cloud_profile)
    }
}

/// Persisted worker provider status
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    /// API version of this document
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    /// Kind of this document
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    /// Machine images used by the worker's pools
    #[serde(default)]
    pub machine_images: Vec<ResolvedImage>,
}

impl WorkerStatus {
    /// Create a typed status document holding the given images
    pub fn new(machine_images: Vec<ResolvedImage>) -> Self {
        Self {
            api_version: STATUS_API_VERSION.to_string(),
            kind: WORKER_STATUS_KIND.to_string(),
            machine_images,
        }
    }
}

/// Security group created by the infrastructure controller
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroup {
    /// What the group is used for (e.g., "nodes")
    pub purpose: String,
    /// Provider name of the group
    pub name: String,
}

/// Node-level infrastructure data
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    /// SSH key pair name registered with the provider
    #[serde(default)]
    pub key_name: String,
}

/// Network infrastructure data
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    /// Provider network identifier
    #[serde(default)]
    pub id: String,
}

/// Infrastructure provider status
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureStatus {
    /// API version of this document
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    /// Kind of this document
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    /// Security groups
    #[serde(default)]
    pub security_groups: Vec<SecurityGroup>,
    /// Node data
    #[serde(default)]
    pub node: NodeStatus,
    /// Network data
    #[serde(default)]
    pub networks: NetworkStatus,
}

impl InfrastructureStatus {
    /// Find the first security group with the given purpose
    pub fn security_group(&self, purpose: &str) -> Option<&SecurityGroup> {
        self.security_groups.iter().find(|g| g.purpose == purpose)
    }
}
