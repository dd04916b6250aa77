//! KubeVirt machine classes

use serde_json::Value;
use tessera_common::Result;

use super::{
    attach_kubeconfig_secret, node_tags, user_data_secret, ClassInput, MachineClassBuilder,
    SECRET_FIELD,
};
use crate::class_spec::ClassSpec;
use crate::credentials::Credentials;

/// Builds `KubeVirtMachineClass` fields
#[derive(Clone, Debug)]
pub struct KubeVirtClassBuilder {
    credentials: Credentials,
}

impl KubeVirtClassBuilder {
    /// Create a builder attaching `credentials` to every class
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl MachineClassBuilder for KubeVirtClassBuilder {
    fn class_kind(&self) -> &'static str {
        "KubeVirtMachineClass"
    }

    fn build(&self, input: &ClassInput<'_>) -> Result<ClassSpec> {
        let mut spec = ClassSpec::new();
        spec.insert("region", input.region)
            .insert("availabilityZone", input.zone)
            .insert("machineType", input.pool.machine_type.as_str())
            .insert("imageName", input.image.image.as_str())
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
