//! Provider credentials and the secret stores they are read from
//!
//! The Worker references a secret holding the kubeconfig of the
//! infrastructure cluster and the namespace machines are created in.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Secret, SecretReference};
use k8s_openapi::ByteString;
use kube::{Api, Client};
#[cfg(test)]
use mockall::automock;
use tessera_common::{Error, Result, CREDENTIALS_KUBECONFIG_KEY, CREDENTIALS_NAMESPACE_KEY};
use tracing::debug;

/// Raw key/value data of a secret
pub type SecretData = BTreeMap<String, ByteString>;

/// Namespace used when a secret reference does not name one
pub const DEFAULT_SECRET_NAMESPACE: &str = "default";

/// Credentials for the infrastructure cluster
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    kubeconfig: String,
    namespace: String,
}

impl Credentials {
    /// Create credentials from their parts
    pub fn new(kubeconfig: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kubeconfig: kubeconfig.into(),
            namespace: namespace.into(),
        }
    }

    /// Extract credentials from secret data
    ///
    /// Both `kubeconfig` and `namespace` must be present and non-empty.
    /// `secret` names the secret in error messages.
    pub fn from_secret_data(secret: &str, data: &SecretData) -> Result<Self> {
        Ok(Self {
            kubeconfig: required_key(secret, data, CREDENTIALS_KUBECONFIG_KEY)?,
            namespace: required_key(secret, data, CREDENTIALS_NAMESPACE_KEY)?,
        })
    }

    /// Kubeconfig of the infrastructure cluster
    pub fn kubeconfig(&self) -> &str {
        &self.kubeconfig
    }

    /// Namespace machines are created in
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("kubeconfig", &"<redacted>")
            .field("namespace", &self.namespace)
            .finish()
    }
}

fn required_key(secret: &str, data: &SecretData, key: &str) -> Result<String> {
    let value = data
        .get(key)
        .ok_or_else(|| Error::credentials(secret, format!("missing key {key:?}")))?;
    if value.0.is_empty() {
        return Err(Error::credentials(secret, format!("key {key:?} may not be empty")));
    }
    String::from_utf8(value.0.clone())
        .map_err(|_| Error::credentials(secret, format!("key {key:?} is not valid UTF-8")))
}

/// `namespace/name` of a secret reference, for logs and errors
pub fn secret_key(reference: &SecretReference) -> String {
    format!(
        "{}/{}",
        reference
            .namespace
            .as_deref()
            .unwrap_or(DEFAULT_SECRET_NAMESPACE),
        reference.name.as_deref().unwrap_or_default()
    )
}

/// Source of secret data
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the data of the referenced secret
    async fn get(&self, reference: &SecretReference) -> Result<SecretData>;
}

/// Secret store backed by the Kubernetes API
pub struct KubeSecretStore {
    client: Client,
}

impl KubeSecretStore {
    /// Create a store reading secrets through `client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get(&self, reference: &SecretReference) -> Result<SecretData> {
        let name = reference
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::credentials(secret_key(reference), "secret reference has no name"))?;
        let namespace = reference
            .namespace
            .as_deref()
            .unwrap_or(DEFAULT_SECRET_NAMESPACE);

        debug!(namespace, name, "fetching credentials secret");
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api.get(name).await?;
        Ok(secret.data.unwrap_or_default())
    }
}

/// In-memory secret store
#[derive(Clone, Debug, Default)]
pub struct StaticSecretStore {
    secrets: BTreeMap<String, SecretData>,
}

impl StaticSecretStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret
    pub fn insert(&mut self, namespace: &str, name: &str, data: SecretData) {
        self.secrets.insert(format!("{namespace}/{name}"), data);
    }

    /// Builder form of [`StaticSecretStore::insert`] taking string values
    pub fn with_secret<K, V>(
        mut self,
        namespace: &str,
        name: &str,
        data: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let data = data
            .into_iter()
            .map(|(k, v)| (k.into(), ByteString(v.into().into_bytes())))
            .collect();
        self.insert(namespace, name, data);
        self
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get(&self, reference: &SecretReference) -> Result<SecretData> {
        let key = secret_key(reference);
        self.secrets
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::credentials(key, "secret not found"))
    }
}
