//! Worker-pool compiler for Tessera
//!
//! Turns the pools of a `Worker` into per-zone machine deployments and
//! fingerprinted, provider-specific machine classes, resolving symbolic
//! machine images along the way and keeping a ledger of the images in use.
//!
//! The compilation itself ([`PoolCompiler`]) is synchronous and pure;
//! [`WorkerDelegate`] wraps it with credential fetching and status decoding.

pub mod builder;
pub mod class_spec;
pub mod compiler;
pub mod credentials;
pub mod decode;
pub mod delegate;
pub mod distribute;
pub mod fingerprint;
pub mod images;

pub use builder::{
    create_builder, KubeVirtClassBuilder, MachineClassBuilder, OpenStackClassBuilder, ProviderKind,
};
pub use class_spec::ClassSpec;
pub use compiler::{CompileContext, CompiledWorker, MachineClass, MachineDeployment, PoolCompiler};
pub use credentials::{
    Credentials, KubeSecretStore, SecretStore, StaticSecretStore, DEFAULT_SECRET_NAMESPACE,
};
pub use decode::{JsonStatusDecoder, StatusDecoder};
pub use delegate::{ClusterInfo, WorkerDelegate};
pub use distribute::{distribute, distribute_int_or_percent};
pub use fingerprint::{fingerprint, VersionMarker};
pub use images::{ImageLedger, ImageResolver};
