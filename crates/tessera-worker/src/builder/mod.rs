//! Provider-specific machine class builders
//!
//! The compiler is provider-agnostic; each provider implements
//! [`MachineClassBuilder`] to assemble the class fields for one zone of a
//! pool.
//!
//! # Supported Providers
//!
//! - [`KubeVirtClassBuilder`] - virtual machines in a KubeVirt cluster
//! - [`OpenStackClassBuilder`] - OpenStack instances

mod kubevirt;
mod openstack;

pub use kubevirt::KubeVirtClassBuilder;
pub use openstack::OpenStackClassBuilder;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tessera_common::crd::{InfrastructureStatus, ResolvedImage, WorkerPool};
use tessera_common::{
    Error, Result, CLOUD_CONFIG_KEY, CREDENTIALS_KUBECONFIG_KEY, CREDENTIALS_NAMESPACE_KEY,
};

use crate::class_spec::ClassSpec;
use crate::credentials::Credentials;

/// Class field holding the machine secret
pub const SECRET_FIELD: &str = "secret";

/// Supported machine class providers
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// KubeVirt virtual machines
    #[default]
    KubeVirt,
    /// OpenStack instances
    OpenStack,
}

impl std::str::FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "kubevirt" => Ok(Self::KubeVirt),
            "openstack" => Ok(Self::OpenStack),
            _ => Err(Error::validation(format!(
                "invalid provider: {s}, expected one of: kubevirt, openstack"
            ))),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KubeVirt => write!(f, "kubevirt"),
            Self::OpenStack => write!(f, "openstack"),
        }
    }
}

/// Inputs for building the class of one zone of one pool
#[derive(Clone, Copy, Debug)]
pub struct ClassInput<'a> {
    /// Cluster namespace, used in generated tags
    pub namespace: &'a str,
    /// Region machines are created in
    pub region: &'a str,
    /// Zone this class is for
    pub zone: &'a str,
    /// Pool being compiled
    pub pool: &'a WorkerPool,
    /// Resolved pool image
    pub image: &'a ResolvedImage,
    /// Pod network of the cluster
    pub pod_network_cidr: Option<&'a str>,
    /// Decoded infrastructure status, if the Worker carries one
    pub infrastructure: Option<&'a InfrastructureStatus>,
}

/// Assembles provider machine class fields
///
/// `build` returns every field that determines machine identity; the result
/// is fingerprinted. `attach_credentials` adds fields that must not roll
/// machines when they change and runs after fingerprinting.
pub trait MachineClassBuilder: Send + Sync {
    /// Kind of the machine class objects this builder produces
    fn class_kind(&self) -> &'static str;

    /// Build the fingerprinted class fields for one zone
    fn build(&self, input: &ClassInput<'_>) -> Result<ClassSpec>;

    /// Add credential fields to a fingerprinted class
    fn attach_credentials(&self, spec: &mut ClassSpec);
}

/// Create a class builder for the given provider
pub fn create_builder(kind: ProviderKind, credentials: Credentials) -> Box<dyn MachineClassBuilder> {
    match kind {
        ProviderKind::KubeVirt => Box::new(KubeVirtClassBuilder::new(credentials)),
        ProviderKind::OpenStack => Box::new(OpenStackClassBuilder::new(credentials)),
    }
}

/// Tags marking a machine as a node of the cluster in `namespace`
pub(crate) fn node_tags(namespace: &str) -> Value {
    let mut tags = Map::new();
    tags.insert(format!("kubernetes.io-cluster-{namespace}"), json!("1"));
    tags.insert("kubernetes.io-role-node".to_string(), json!("1"));
    Value::Object(tags)
}

/// Secret field with the pool's user data
pub(crate) fn user_data_secret(pool: &WorkerPool) -> Result<Value> {
    let mut secret = Map::new();
    secret.insert(
        CLOUD_CONFIG_KEY.to_string(),
        Value::String(pool.user_data_text()?.to_string()),
    );
    Ok(Value::Object(secret))
}

/// Add kubeconfig and namespace to the class secret
pub(crate) fn attach_kubeconfig_secret(spec: &mut ClassSpec, credentials: &Credentials) {
    if !spec.contains(SECRET_FIELD) {
        spec.insert(SECRET_FIELD, json!({}));
    }
    if let Some(Value::Object(secret)) = spec.get_mut(SECRET_FIELD) {
        secret.insert(
            CREDENTIALS_KUBECONFIG_KEY.to_string(),
            Value::String(credentials.kubeconfig().to_string()),
        );
        secret.insert(
            CREDENTIALS_NAMESPACE_KEY.to_string(),
            Value::String(credentials.namespace().to_string()),
        );
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;

    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
    use k8s_openapi::ByteString;
    use tessera_common::crd::{PoolImage, ResolvedImage, WorkerPool};

    pub fn pool() -> WorkerPool {
        WorkerPool {
            name: "pool-1".to_string(),
            machine_type: "large".to_string(),
            machine_image: PoolImage {
                name: "ubuntu".to_string(),
                version: "1".to_string(),
            },
            minimum: 5,
            maximum: 10,
            max_surge: IntOrString::Int(3),
            max_unavailable: IntOrString::Int(2),
            user_data: ByteString(b"#cloud-config".to_vec()),
            zones: vec!["eu-de-1a".to_string(), "eu-de-1b".to_string()],
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            taints: vec![],
        }
    }

    pub fn image() -> ResolvedImage {
        ResolvedImage {
            name: "ubuntu".to_string(),
            version: "1".to_string(),
            cloud_profile: "kubevirt".to_string(),
            image: "img-123".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parses_case_insensitively() {
        assert_eq!("kubevirt".parse::<ProviderKind>().unwrap(), ProviderKind::KubeVirt);
        assert_eq!("OpenStack".parse::<ProviderKind>().unwrap(), ProviderKind::OpenStack);
        assert!("aws".parse::<ProviderKind>().is_err());
        assert_eq!(ProviderKind::OpenStack.to_string(), "openstack");
    }

    #[test]
    fn test_create_builder_selects_class_kind() {
        let creds = Credentials::new("kc", "vms");
        assert_eq!(
            create_builder(ProviderKind::KubeVirt, creds.clone()).class_kind(),
            "KubeVirtMachineClass"
        );
        assert_eq!(
            create_builder(ProviderKind::OpenStack, creds).class_kind(),
            "OpenStackMachineClass"
        );
    }

    #[test]
    fn test_node_tags_name_the_cluster() {
        let tags = node_tags("shoot--foo--bar");
        assert_eq!(tags["kubernetes.io-cluster-shoot--foo--bar"], "1");
        assert_eq!(tags["kubernetes.io-role-node"], "1");
    }

    #[test]
    fn test_credentials_are_merged_into_existing_secret() {
        let mut spec = ClassSpec::new().with(SECRET_FIELD, json!({"cloudConfig": "cc"}));
        attach_kubeconfig_secret(&mut spec, &Credentials::new("kc", "vms"));

        let secret = spec.get(SECRET_FIELD).unwrap();
        assert_eq!(secret["cloudConfig"], "cc");
        assert_eq!(secret["kubeconfig"], "kc");
        assert_eq!(secret["namespace"], "vms");
    }
}
