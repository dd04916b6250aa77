//! Controller configuration
//!
//! The static image mapping consulted first when resolving a pool's machine
//! image. Loaded from YAML:
//!
//! ```yaml
//! apiVersion: worker.tessera.dev/v1alpha1
//! kind: ControllerConfiguration
//! machineImages:
//!   - name: ubuntu
//!     version: "22.04"
//!     cloudProfiles:
//!       - name: kubevirt
//!         image: img-123
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Controller configuration document
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ControllerConfiguration {
    /// API version of this document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Kind of this document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Logical image to provider image mappings
    #[serde(default)]
    pub machine_images: Vec<MachineImageMapping>,
}

/// Provider images of one logical image version
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineImageMapping {
    /// Logical image name
    pub name: String,
    /// Logical image version
    pub version: String,
    /// Provider image per cloud profile
    #[serde(default)]
    pub cloud_profiles: Vec<CloudProfileImage>,
}

/// Provider image for one cloud profile
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CloudProfileImage {
    /// Cloud profile name
    pub name: String,
    /// Provider image identifier
    pub image: String,
}

impl ControllerConfiguration {
    /// Parse and validate a configuration document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::parse(yaml, "inline")
    }

    /// Read, parse and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(&display, format!("failed to read: {e}")))?;
        Self::parse(&content, &display)
    }

    fn parse(yaml: &str, origin: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(origin, format!("failed to parse: {e}")))?;
        config.validate_from(origin)?;
        Ok(config)
    }

    /// Check that every mapping is complete and identities are unique
    pub fn validate(&self) -> Result<()> {
        self.validate_from("inline")
    }

    fn validate_from(&self, origin: &str) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(Error::config(origin, msg)) };
        let mut seen = HashSet::new();
        for (i, mapping) in self.machine_images.iter().enumerate() {
            if mapping.name.is_empty() {
                return invalid(format!("machineImages[{i}].name cannot be empty"));
            }
            if mapping.version.is_empty() {
                return invalid(format!("machineImages[{i}].version cannot be empty"));
            }
            for (j, profile) in mapping.cloud_profiles.iter().enumerate() {
                if profile.name.is_empty() || profile.image.is_empty() {
                    return invalid(format!(
                        "machineImages[{i}].cloudProfiles[{j}] needs a name and an image"
                    ));
                }
                let identity = (
                    mapping.name.as_str(),
                    mapping.version.as_str(),
                    profile.name.as_str(),
                );
                if !seen.insert(identity) {
                    return invalid(format!(
                        "duplicate machine image {}/{}/{}",
                        mapping.name, mapping.version, profile.name
                    ));
                }
            }
        }
        Ok(())
    }

    /// Look up the provider image for `(name, version, cloud_profile)`
    ///
    /// The first matching mapping wins.
    pub fn find_image_for_cloud_profile(
        &self,
        name: &str,
        version: &str,
        cloud_profile: &str,
    ) -> Option<&str> {
        self.machine_images
            .iter()
            .filter(|m| m.name == name && m.version == version)
            .flat_map(|m| m.cloud_profiles.iter())
            .find(|p| p.name == cloud_profile)
            .map(|p| p.image.as_str())
    }
}
