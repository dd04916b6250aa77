//! Compile command
//!
//! Reads a Worker document and the controller configuration, compiles the
//! Worker's pools and prints the deployments, the machine class chart values
//! and the provider status to persist.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, ValueEnum};
use kube::Client;
use serde::Serialize;
use tessera_common::config::ControllerConfiguration;
use tessera_common::crd::{Worker, WorkerStatus};
use tessera_worker::{
    ClusterInfo, CompiledWorker, KubeSecretStore, MachineDeployment, ProviderKind, SecretStore,
    StaticSecretStore, WorkerDelegate, DEFAULT_SECRET_NAMESPACE,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::read_file;
use crate::{Error, Result};

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Worker document (YAML or JSON)
    #[arg(long, short = 'w')]
    pub worker: PathBuf,

    /// Controller configuration with the machine image mapping
    #[arg(long, short = 'c')]
    pub config: PathBuf,

    /// YAML map with the referenced secret's keys (kubeconfig, namespace)
    #[arg(long, conflicts_with = "secrets_from_cluster")]
    pub credentials: Option<PathBuf>,

    /// Read the referenced secret from the current kube context instead
    #[arg(long)]
    pub secrets_from_cluster: bool,

    /// Machine class provider
    #[arg(long, default_value = "kubevirt")]
    pub provider: ProviderKind,

    /// Cloud profile images are resolved for (defaults to the provider name)
    #[arg(long)]
    pub cloud_profile: Option<String>,

    /// Control-plane Kubernetes version
    #[arg(long)]
    pub kubernetes_version: String,

    /// Pod network CIDR of the cluster
    #[arg(long)]
    pub pod_network: Option<String>,

    /// Output format
    #[arg(long, short = 'o', value_enum, default_value_t = OutputFormat::Yaml)]
    pub output: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

/// Everything a compile produces, as printed
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompileOutput<'a> {
    machine_deployments: &'a [MachineDeployment],
    machine_class_values: serde_json::Value,
    provider_status: WorkerStatus,
}

pub async fn run(args: CompileArgs) -> Result<()> {
    let worker = load_worker(&args.worker)?;
    let config = ControllerConfiguration::load(&args.config)?;

    let secrets: Arc<dyn SecretStore> = if args.secrets_from_cluster {
        Arc::new(KubeSecretStore::new(Client::try_default().await?))
    } else {
        Arc::new(static_secrets(&worker, args.credentials.as_deref())?)
    };

    let cloud_profile = args
        .cloud_profile
        .clone()
        .unwrap_or_else(|| args.provider.to_string());
    let delegate = WorkerDelegate::new(secrets, Arc::new(config), args.provider, cloud_profile);
    let cluster = ClusterInfo {
        kubernetes_version: args.kubernetes_version.clone(),
        pod_network_cidr: args.pod_network.clone(),
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling compile");
            on_signal.cancel();
        }
    });

    let compiled = delegate.compile(&worker, &cluster, &cancel).await?;
    print!("{}", render(&compiled, args.output)?);
    Ok(())
}

fn load_worker(path: &Path) -> Result<Worker> {
    let content = read_file(path)?;
    // YAML is a superset of JSON
    let worker: Worker = serde_yaml::from_str(&content)
        .map_err(|e| Error::invalid_worker(path, e.to_string()))?;
    debug!(
        worker = worker.metadata.name.as_deref().unwrap_or_default(),
        pools = worker.spec.pools.len(),
        "loaded worker"
    );
    Ok(worker)
}

fn static_secrets(worker: &Worker, credentials: Option<&Path>) -> Result<StaticSecretStore> {
    let reference = &worker.spec.secret_ref;
    let namespace = reference
        .namespace
        .as_deref()
        .unwrap_or(DEFAULT_SECRET_NAMESPACE);
    let name = reference.name.as_deref().unwrap_or_default();

    let data: BTreeMap<String, String> = match credentials {
        Some(path) => serde_yaml::from_str(&read_file(path)?)?,
        None => BTreeMap::new(),
    };
    Ok(StaticSecretStore::new().with_secret(namespace, name, data))
}

fn render(compiled: &CompiledWorker, format: OutputFormat) -> Result<String> {
    let output = CompileOutput {
        machine_deployments: &compiled.deployments,
        machine_class_values: compiled.machine_class_chart_values(),
        provider_status: compiled.worker_status(),
    };
    Ok(match format {
        OutputFormat::Yaml => serde_yaml::to_string(&output)?,
        OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(&output)?),
    })
}
