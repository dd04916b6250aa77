//! OpenStack machine classes
//!
//! In addition to the common fields, OpenStack classes reference resources the
//! infrastructure controller created: the SSH key pair, the network and the
//! security group for worker nodes.

use serde_json::{json, Value};
use tessera_common::crd::{InfrastructureStatus, PURPOSE_NODES};
use tessera_common::{Error, Result};

use super::{
    attach_kubeconfig_secret, node_tags, user_data_secret, ClassInput, MachineClassBuilder,
    SECRET_FIELD,
};
use crate::class_spec::ClassSpec;
use crate::credentials::Credentials;

/// Builds `OpenStackMachineClass` fields
#[derive(Clone, Debug)]
pub struct OpenStackClassBuilder {
    credentials: Credentials,
}

impl OpenStackClassBuilder {
    /// Create a builder attaching `credentials` to every class
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

fn infrastructure<'a>(input: &ClassInput<'a>) -> Result<&'a InfrastructureStatus> {
    input.infrastructure.ok_or_else(|| {
        Error::missing_provider_resource(
            "infrastructure status",
            "worker has no infrastructure provider status",
        )
    })
}

impl MachineClassBuilder for OpenStackClassBuilder {
    fn class_kind(&self) -> &'static str {
        "OpenStackMachineClass"
    }

    fn build(&self, input: &ClassInput<'_>) -> Result<ClassSpec> {
        let infra = infrastructure(input)?;

        let nodes_group = infra.security_group(PURPOSE_NODES).ok_or_else(|| {
            Error::missing_provider_resource(
                "security group",
                format!("no security group with purpose {PURPOSE_NODES:?}"),
            )
        })?;
        if infra.node.key_name.is_empty() {
            return Err(Error::missing_provider_resource(
                "key pair",
                "infrastructure status has no node key name",
            ));
        }
        if infra.networks.id.is_empty() {
            return Err(Error::missing_provider_resource(
                "network",
                "infrastructure status has no network id",
            ));
        }

        let mut spec = ClassSpec::new();
        spec.insert("region", input.region)
            .insert("availabilityZone", input.zone)
            .insert("machineType", input.pool.machine_type.as_str())
            .insert("imageName", input.image.image.as_str())
            .insert("keyName", infra.node.key_name.as_str())
            .insert("networkID", infra.networks.id.as_str())
            .insert("securityGroups", json!([nodes_group.name]))
            .insert("tags", node_tags(input.namespace))
            .insert(SECRET_FIELD, user_data_secret(input.pool)?);
        if let Some(cidr) = input.pod_network_cidr {
            spec.insert("podNetworkCidr", Value::String(cidr.to_string()));
        }
        Ok(spec)
    }

    fn attach_credentials(&self, spec: &mut ClassSpec) {
        attach_kubeconfig_secret(spec, &self.credentials);
    }
}
