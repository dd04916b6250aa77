//! WorkerDelegate - I/O around the pure pool compiler
//!
//! The delegate gathers what a compile needs from the Worker and its
//! collaborators: credentials from the secret store, decoded infrastructure
//! status, the persisted image ledger and the version marker. It holds no
//! compiled state; every call returns fresh results.

use std::sync::Arc;

use tessera_common::config::ControllerConfiguration;
use tessera_common::crd::{Worker, INFRASTRUCTURE_STATUS_KIND, WORKER_STATUS_KIND};
use tessera_common::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::builder::{create_builder, ProviderKind};
use crate::compiler::{CompileContext, CompiledWorker, PoolCompiler};
use crate::credentials::{secret_key, Credentials, SecretStore};
use crate::decode::{raw_extension_bytes, JsonStatusDecoder, StatusDecoder};
use crate::fingerprint::VersionMarker;
use crate::images::ImageResolver;

/// Cluster properties that are not part of the Worker
#[derive(Clone, Debug, Default)]
pub struct ClusterInfo {
    /// Control-plane Kubernetes version (e.g., "1.29.4")
    pub kubernetes_version: String,
    /// Pod network CIDR
    pub pod_network_cidr: Option<String>,
}

/// Compiles Worker resources for one provider
pub struct WorkerDelegate {
    secrets: Arc<dyn SecretStore>,
    decoder: Arc<dyn StatusDecoder>,
    config: Arc<ControllerConfiguration>,
    provider: ProviderKind,
    cloud_profile: String,
}

impl WorkerDelegate {
    /// Create a delegate decoding status documents as JSON
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        config: Arc<ControllerConfiguration>,
        provider: ProviderKind,
        cloud_profile: impl Into<String>,
    ) -> Self {
        Self {
            secrets,
            decoder: Arc::new(JsonStatusDecoder),
            config,
            provider,
            cloud_profile: cloud_profile.into(),
        }
    }

    /// Use a different status decoder
    pub fn with_decoder(mut self, decoder: Arc<dyn StatusDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Compile the Worker's pools
    ///
    /// Only the secret fetch waits on I/O; it is abandoned with
    /// `Error::Cancelled` when `cancel` fires.
    pub async fn compile(
        &self,
        worker: &Worker,
        cluster: &ClusterInfo,
        cancel: &CancellationToken,
    ) -> Result<CompiledWorker> {
        let namespace = worker
            .metadata
            .namespace
            .clone()
            .filter(|ns| !ns.is_empty())
            .ok_or_else(|| Error::validation("worker has no namespace"))?;
        let version = VersionMarker::from_kubernetes_version(&cluster.kubernetes_version)?;

        let credentials = self.fetch_credentials(worker, cancel).await?;

        let infrastructure = match &worker.spec.infrastructure_provider_status {
            Some(raw) => {
                let bytes = raw_extension_bytes(raw, INFRASTRUCTURE_STATUS_KIND)?;
                Some(self.decoder.decode_infrastructure_status(&bytes)?)
            }
            None => None,
        };

        let persisted = worker
            .status
            .as_ref()
            .and_then(|s| s.provider_status.as_ref())
            .map(|raw| raw_extension_bytes(raw, WORKER_STATUS_KIND))
            .transpose()?;
        let resolver =
            ImageResolver::new(&self.config, persisted.as_deref(), self.decoder.as_ref())?;

        let context = CompileContext {
            namespace,
            region: worker.spec.region.clone(),
            cloud_profile: self.cloud_profile.clone(),
            pod_network_cidr: cluster.pod_network_cidr.clone(),
            infrastructure,
        };
        let builder = create_builder(self.provider, credentials);

        let compiled = PoolCompiler::new(&context, &version, &resolver, builder.as_ref())
            .compile(&worker.spec.pools)?;

        info!(
            namespace = %context.namespace,
            provider = %self.provider,
            deployments = compiled.deployments.len(),
            "worker compiled"
        );
        Ok(compiled)
    }

    async fn fetch_credentials(
        &self,
        worker: &Worker,
        cancel: &CancellationToken,
    ) -> Result<Credentials> {
        let reference = &worker.spec.secret_ref;
        let secret = secret_key(reference);
        debug!(secret = %secret, "reading provider credentials");

        let data = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::cancelled("credentials")),
            data = self.secrets.get(reference) => data?,
        };
        Credentials::from_secret_data(&secret, &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{MockSecretStore, SecretData, StaticSecretStore};
    use k8s_openapi::api::core::v1::SecretReference;
    use k8s_openapi::apimachinery::pkg::runtime::RawExtension;
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
    use k8s_openapi::ByteString;
    use serde_json::json;
    use std::collections::BTreeMap;
    use tessera_common::crd::{PoolImage, WorkerObjectStatus, WorkerPool, WorkerSpec};

    const CONFIG: &str = r#"
machineImages:
  - name: ubuntu
    version: "1"
    cloudProfiles:
      - {name: kubevirt, image: img-123}
      - {name: openstack, image: os-img-1}
"#;

    fn worker() -> Worker {
        let mut worker = Worker::new(
            "worker",
            WorkerSpec {
                region: "eu-de-1".to_string(),
                secret_ref: SecretReference {
                    name: Some("cloudprovider".to_string()),
                    namespace: Some("shoot--foo--bar".to_string()),
                },
                infrastructure_provider_status: None,
                pools: vec![WorkerPool {
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
                }],
            },
        );
        worker.metadata.namespace = Some("shoot--foo--bar".to_string());
        worker
    }

    fn cluster() -> ClusterInfo {
        ClusterInfo {
            kubernetes_version: "1.2.3".to_string(),
            pod_network_cidr: Some("100.96.0.0/11".to_string()),
        }
    }

    fn secrets() -> Arc<dyn SecretStore> {
        Arc::new(StaticSecretStore::new().with_secret(
            "shoot--foo--bar",
            "cloudprovider",
            [("kubeconfig", "kc"), ("namespace", "vms")],
        ))
    }

    fn delegate(secrets: Arc<dyn SecretStore>, provider: ProviderKind) -> WorkerDelegate {
        let config = Arc::new(ControllerConfiguration::from_yaml(CONFIG).unwrap());
        WorkerDelegate::new(secrets, config, provider, provider.to_string())
    }

    // =========================================================================
    // Story Tests: Reconciling a Worker
    // =========================================================================

    #[tokio::test]
    async fn story_worker_compiles_with_fetched_credentials() {
        let compiled = delegate(secrets(), ProviderKind::KubeVirt)
            .compile(&worker(), &cluster(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(compiled.deployments.len(), 2);
        assert_eq!(compiled.deployments[0].name, "shoot--foo--bar-pool-1-z1");
        assert_eq!(compiled.classes[0].spec.get("secret").unwrap()["namespace"], "vms");
        assert_eq!(compiled.worker_status().machine_images[0].image, "img-123");
    }

    /// Story: An image removed from configuration resolves from the Worker's status
    #[tokio::test]
    async fn story_persisted_status_keeps_old_images_resolvable() {
        let mut worker = worker();
        worker.spec.pools[0].machine_image.version = "0.9".to_string();
        worker.status = Some(WorkerObjectStatus {
            provider_status: Some(RawExtension(json!({
                "kind": "WorkerStatus",
                "machineImages": [
                    {"name": "ubuntu", "version": "0.9", "cloudProfile": "kubevirt", "image": "img-old"}
                ]
            }))),
        });

        let compiled = delegate(secrets(), ProviderKind::KubeVirt)
            .compile(&worker, &cluster(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(compiled.classes[0].spec.get("imageName").unwrap(), "img-old");
    }

    #[tokio::test]
    async fn story_openstack_uses_infrastructure_status() {
        let mut worker = worker();
        worker.spec.infrastructure_provider_status = Some(RawExtension(json!({
            "kind": "InfrastructureStatus",
            "securityGroups": [{"purpose": "nodes", "name": "sg-nodes"}],
            "node": {"keyName": "ssh-key"},
            "networks": {"id": "net-1"}
        })));

        let compiled = delegate(secrets(), ProviderKind::OpenStack)
            .compile(&worker, &cluster(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(compiled.classes[0].kind, "OpenStackMachineClass");
        assert_eq!(compiled.classes[0].spec.get("imageName").unwrap(), "os-img-1");
        assert_eq!(compiled.classes[0].spec.get("securityGroups").unwrap()[0], "sg-nodes");
    }

    // =========================================================================
    // Story Tests: Failures
    // =========================================================================

    /// Story: Cancellation wins over a secret store that never answers
    #[tokio::test]
    async fn story_cancelled_secret_fetch() {
        let mut store = MockSecretStore::new();
        store.expect_get().returning(|_| {
            // The fetch future is never polled once cancellation is observed
            Ok(SecretData::new())
        });

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = delegate(Arc::new(store), ProviderKind::KubeVirt)
            .compile(&worker(), &cluster(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled { ref context } if context == "credentials"));
    }

    /// Story: Infrastructure status without a nodes security group fails the compile
    #[tokio::test]
    async fn story_openstack_without_nodes_security_group() {
        let mut worker = worker();
        worker.spec.infrastructure_provider_status = Some(RawExtension(json!({
            "kind": "InfrastructureStatus",
            "securityGroups": [{"purpose": "bastion", "name": "sg-bastion"}],
            "node": {"keyName": "ssh-key"},
            "networks": {"id": "net-1"}
        })));

        let err = delegate(secrets(), ProviderKind::OpenStack)
            .compile(&worker, &cluster(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MissingProviderResource { ref resource, .. } if resource == "security group"
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn story_incomplete_secret_is_rejected() {
        let mut store = MockSecretStore::new();
        store
            .expect_get()
            .times(1)
            .returning(|_| Ok(SecretData::new()));

        let err = delegate(Arc::new(store), ProviderKind::KubeVirt)
            .compile(&worker(), &cluster(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Credentials { .. }));
    }

    #[tokio::test]
    async fn story_invalid_version_fails_before_io() {
        let mut store = MockSecretStore::new();
        store.expect_get().never();

        let cluster = ClusterInfo {
            kubernetes_version: "invalid".to_string(),
            ..cluster()
        };
        let err = delegate(Arc::new(store), ProviderKind::KubeVirt)
            .compile(&worker(), &cluster, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidVersion { .. }));
    }

    #[tokio::test]
    async fn story_corrupt_persisted_status_is_reported() {
        let mut worker = worker();
        worker.status = Some(WorkerObjectStatus {
            provider_status: Some(RawExtension(serde_json::Value::Null)),
        });

        let err = delegate(secrets(), ProviderKind::KubeVirt)
            .compile(&worker, &cluster(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StatusDecode { .. }));
    }

    #[tokio::test]
    async fn test_worker_without_namespace_is_rejected() {
        let mut worker = worker();
        worker.metadata.namespace = None;

        let err = delegate(secrets(), ProviderKind::KubeVirt)
            .compile(&worker, &cluster(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }
}
