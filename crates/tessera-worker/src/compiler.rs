//! PoolCompiler - expands worker pools into per-zone deployments and classes
//!
//! The compiler is a pure function of its inputs: the same pools, version
//! marker and context always produce the same deployments, classes and
//! ledger. Any failure aborts the whole compile; no partial plan is returned.
//!
//! ```rust,ignore
//! let compiled = PoolCompiler::new(&context, &version, &resolver, builder.as_ref())
//!     .compile(&worker.spec.pools)?;
//! ```

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Taint;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::Serialize;
use serde_json::{json, Value};
use tessera_common::crd::{validate_pools, InfrastructureStatus, WorkerPool, WorkerStatus};
use tessera_common::Result;
use tracing::{debug, info};

use crate::builder::{ClassInput, MachineClassBuilder};
use crate::class_spec::{ClassSpec, NAME_FIELD};
use crate::distribute::{distribute, distribute_int_or_percent};
use crate::fingerprint::{fingerprint, VersionMarker};
use crate::images::{ImageLedger, ImageResolver};

/// Cluster-wide inputs shared by every pool
#[derive(Clone, Debug, Default)]
pub struct CompileContext {
    /// Cluster namespace, prefix of every deployment name
    pub namespace: String,
    /// Region machines are created in
    pub region: String,
    /// Cloud profile images are resolved for
    pub cloud_profile: String,
    /// Pod network of the cluster
    pub pod_network_cidr: Option<String>,
    /// Decoded infrastructure status
    pub infrastructure: Option<InfrastructureStatus>,
}

/// Desired capacity of one zone of one pool
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineDeployment {
    /// `<namespace>-<pool>-z<n>`
    pub name: String,
    /// Machine class the deployment's machines are created from
    pub class_name: String,
    /// Secret holding the class's credentials and user data
    pub secret_name: String,
    /// Pool this deployment belongs to
    pub pool: String,
    /// Zone of this deployment
    pub zone: String,
    /// Minimum machines in this zone
    pub minimum: i32,
    /// Maximum machines in this zone
    pub maximum: i32,
    /// Surge tolerance in this zone
    pub max_surge: IntOrString,
    /// Unavailability tolerance in this zone
    pub max_unavailable: IntOrString,
    /// Node labels
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Node annotations
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Node taints
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<Taint>,
}

/// A named, fingerprinted machine class
#[derive(Clone, Debug, PartialEq)]
pub struct MachineClass {
    /// `<deployment>-<fingerprint>`
    pub name: String,
    /// Provider class kind (e.g., "KubeVirtMachineClass")
    pub kind: String,
    /// Class fields, credentials included
    pub spec: ClassSpec,
}

impl MachineClass {
    /// Class as chart values: its fields plus `name`
    pub fn to_value(&self) -> Value {
        let mut spec = self.spec.clone();
        spec.insert(NAME_FIELD, self.name.as_str());
        spec.into()
    }
}

/// Output of one compile call
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompiledWorker {
    /// Deployments in pool order, then zone order
    pub deployments: Vec<MachineDeployment>,
    /// Classes, parallel to `deployments`
    pub classes: Vec<MachineClass>,
    /// Previously persisted images followed by images new to this compile
    pub images: ImageLedger,
}

impl CompiledWorker {
    /// Values for the machine class chart
    pub fn machine_class_chart_values(&self) -> Value {
        json!({
            "machineClasses": self.classes.iter().map(MachineClass::to_value).collect::<Vec<_>>(),
        })
    }

    /// Provider status to persist on the Worker
    pub fn worker_status(&self) -> WorkerStatus {
        self.images.to_status()
    }

    /// Deployments of one pool
    pub fn deployments_for_pool<'a>(
        &'a self,
        pool: &'a str,
    ) -> impl Iterator<Item = &'a MachineDeployment> + 'a {
        self.deployments.iter().filter(move |d| d.pool == pool)
    }
}

/// Deployment name for the zone at `zone_index`
pub fn deployment_name(namespace: &str, pool: &str, zone_index: usize) -> String {
    format!("{}-{}-z{}", namespace, pool, zone_index + 1)
}

/// Compiles worker pools into machine deployments and classes
pub struct PoolCompiler<'a> {
    context: &'a CompileContext,
    version: &'a VersionMarker,
    resolver: &'a ImageResolver<'a>,
    builder: &'a dyn MachineClassBuilder,
}

impl<'a> PoolCompiler<'a> {
    /// Create a compiler with all of its collaborators
    pub fn new(
        context: &'a CompileContext,
        version: &'a VersionMarker,
        resolver: &'a ImageResolver<'a>,
        builder: &'a dyn MachineClassBuilder,
    ) -> Self {
        Self {
            context,
            version,
            resolver,
            builder,
        }
    }

    /// Compile `pools` in order
    pub fn compile(&self, pools: &[WorkerPool]) -> Result<CompiledWorker> {
        validate_pools(pools)?;

        // Earlier entries keep their position; identities used now take the current id
        let mut compiled = CompiledWorker {
            images: self.resolver.persisted().clone(),
            ..Default::default()
        };

        for pool in pools {
            self.compile_pool(pool, &mut compiled)?;
        }

        info!(
            namespace = %self.context.namespace,
            pools = pools.len(),
            deployments = compiled.deployments.len(),
            images = compiled.images.len(),
            version = %self.version,
            "compiled worker pools"
        );
        Ok(compiled)
    }

    fn compile_pool(&self, pool: &WorkerPool, out: &mut CompiledWorker) -> Result<()> {
        let image = self.resolver.resolve(
            &pool.machine_image.name,
            &pool.machine_image.version,
            &self.context.cloud_profile,
        )?;
        out.images.refresh(image.clone());

        let zone_count = pool.zones.len();
        for (i, zone) in pool.zones.iter().enumerate() {
            let name = deployment_name(&self.context.namespace, &pool.name, i);

            let mut spec = self.builder.build(&ClassInput {
                namespace: &self.context.namespace,
                region: &self.context.region,
                zone,
                pool,
                image: &image,
                pod_network_cidr: self.context.pod_network_cidr.as_deref(),
                infrastructure: self.context.infrastructure.as_ref(),
            })?;
            let class_name = format!("{}-{}", name, fingerprint(&spec, self.version));
            self.builder.attach_credentials(&mut spec);

            let deployment = MachineDeployment {
                name,
                class_name: class_name.clone(),
                secret_name: class_name.clone(),
                pool: pool.name.clone(),
                zone: zone.clone(),
                minimum: distribute(i, pool.minimum, zone_count),
                maximum: distribute(i, pool.maximum, zone_count),
                max_surge: distribute_int_or_percent(i, &pool.max_surge, zone_count, pool.maximum),
                max_unavailable: distribute_int_or_percent(
                    i,
                    &pool.max_unavailable,
                    zone_count,
                    pool.minimum,
                ),
                labels: pool.labels.clone(),
                annotations: pool.annotations.clone(),
                taints: pool.taints.clone(),
            };
            debug!(
                pool = %pool.name,
                zone = %zone,
                deployment = %deployment.name,
                class = %class_name,
                minimum = deployment.minimum,
                maximum = deployment.maximum,
                "compiled machine deployment"
            );

            out.deployments.push(deployment);
            out.classes.push(MachineClass {
                name: class_name,
                kind: self.builder.class_kind().to_string(),
                spec,
            });
        }
        Ok(())
    }
}
