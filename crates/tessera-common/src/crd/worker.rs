//! Worker Custom Resource Definition
//!
//! A Worker describes the compute pools of one cluster. Each pool spans one
//! or more availability zones and is compiled into one machine deployment
//! per zone.

use std::collections::{BTreeMap, HashSet};

use k8s_openapi::api::core::v1::{SecretReference, Taint};
use k8s_openapi::apimachinery::pkg::runtime::RawExtension;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use k8s_openapi::ByteString;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Specification for a Worker
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "extensions.tessera.dev",
    version = "v1alpha1",
    kind = "Worker",
    plural = "workers",
    status = "WorkerObjectStatus",
    namespaced,
    printcolumn = r#"{"name":"Region","type":"string","jsonPath":".spec.region"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSpec {
    /// Region the cluster's machines are created in
    pub region: String,

    /// Secret holding the provider credentials
    pub secret_ref: SecretReference,

    /// Status written by the infrastructure controller (networks, security groups, keys)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure_provider_status: Option<RawExtension>,

    /// Worker pools, compiled in this order
    #[serde(default)]
    pub pools: Vec<WorkerPool>,
}

/// Status of a Worker
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerObjectStatus {
    /// Provider status persisted by the previous reconciliation (the image ledger)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_status: Option<RawExtension>,
}

/// Logical machine image reference of a pool
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PoolImage {
    /// Logical image name (e.g., "ubuntu")
    pub name: String,
    /// Logical image version (e.g., "22.04")
    pub version: String,
}

/// A named group of nodes sharing machine type, image and scaling bounds
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerPool {
    /// Pool name, unique within the Worker
    pub name: String,

    /// Provider machine type (e.g., "large")
    pub machine_type: String,

    /// Symbolic OS image
    pub machine_image: PoolImage,

    /// Minimum number of machines across all zones
    pub minimum: i32,

    /// Maximum number of machines across all zones
    pub maximum: i32,

    /// Surge tolerance during rolling updates (absolute or percentage)
    pub max_surge: IntOrString,

    /// Unavailability tolerance during rolling updates (absolute or percentage)
    pub max_unavailable: IntOrString,

    /// Cloud-init user data passed to every machine
    #[serde(default)]
    #[schemars(with = "String")]
    pub user_data: ByteString,

    /// Availability zones, in the order deployments are emitted
    pub zones: Vec<String>,

    /// Labels applied to nodes of this pool
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Annotations applied to nodes of this pool
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Taints applied to nodes of this pool
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<Taint>,
}

impl WorkerPool {
    /// Validate scaling bounds, tolerances and zones
    ///
    /// Zone distribution needs at least one zone and non-negative bounds
    /// with `maximum >= minimum`. Surge and unavailability must not be
    /// negative.
    pub fn validate(&self) -> Result<(), Error> {
        if self.name.is_empty() {
            return Err(Error::validation("pool name cannot be empty"));
        }
        if self.zones.is_empty() {
            return Err(Error::validation_for_field(
                &self.name,
                "zones",
                "pool must span at least one zone",
            ));
        }
        if self.minimum < 0 {
            return Err(Error::validation_for_field(
                &self.name,
                "minimum",
                format!("minimum must not be negative, got {}", self.minimum),
            ));
        }
        if self.maximum < self.minimum {
            return Err(Error::validation_for_field(
                &self.name,
                "maximum",
                format!(
                    "maximum ({}) must be greater than or equal to minimum ({})",
                    self.maximum, self.minimum
                ),
            ));
        }
        self.check_tolerance("maxSurge", &self.max_surge)?;
        self.check_tolerance("maxUnavailable", &self.max_unavailable)?;
        Ok(())
    }

    fn check_tolerance(&self, field: &str, value: &IntOrString) -> Result<(), Error> {
        let shown = match value {
            IntOrString::Int(v) if *v < 0 => v.to_string(),
            IntOrString::String(s) if s.trim_start().starts_with('-') => s.clone(),
            _ => return Ok(()),
        };
        Err(Error::validation_for_field(
            &self.name,
            field,
            format!("{field} must not be negative, got {shown}"),
        ))
    }

    /// User data as UTF-8 text for the machine class secret
    pub fn user_data_text(&self) -> Result<&str, Error> {
        std::str::from_utf8(&self.user_data.0).map_err(|e| {
            Error::validation_for_field(&self.name, "userData", format!("not valid UTF-8: {e}"))
        })
    }
}

/// Validate every pool and reject pool names used twice
///
/// Deployment names are derived from the pool name, so a repeated name
/// would make two pools claim the same deployments.
pub fn validate_pools(pools: &[WorkerPool]) -> Result<(), Error> {
    let mut seen = HashSet::new();
    for pool in pools {
        pool.validate()?;
        if !seen.insert(pool.name.as_str()) {
            return Err(Error::validation_for(
                &pool.name,
                "pool name is used by more than one pool",
            ));
        }
    }
    Ok(())
}
