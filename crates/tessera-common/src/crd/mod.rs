//! Kubernetes-facing resource definitions for Tessera
//!
//! The `Worker` custom resource and the provider status documents that are
//! persisted in it between reconciliations.

mod status;
mod worker;

pub use status::{
    InfrastructureStatus, NetworkStatus, NodeStatus, ResolvedImage, SecurityGroup, WorkerStatus,
    INFRASTRUCTURE_STATUS_KIND, PURPOSE_NODES, STATUS_API_VERSION, WORKER_STATUS_KIND,
};
pub use worker::{validate_pools, PoolImage, Worker, WorkerObjectStatus, WorkerPool, WorkerSpec};
