//! Class fingerprints and version markers
//!
//! A machine class is named `<deployment>-<fingerprint>`. The fingerprint is a
//! truncated SHA-256 over the canonical class encoding and the cluster's
//! major.minor version, so any relevant change produces a new class name and
//! downstream rollout replaces the pool's machines.

use std::fmt;
use std::fmt::Write;

use aws_lc_rs::digest;
use tessera_common::{Error, Result};

use crate::class_spec::{ClassSpec, NAME_FIELD};

/// Number of digest bytes kept in a fingerprint (16 hex characters)
const FINGERPRINT_BYTES: usize = 8;

/// Major.minor of the cluster's control-plane version
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VersionMarker(String);

impl VersionMarker {
    /// Reduce a Kubernetes version to `major.minor`
    ///
    /// Accepts `1.2`, `1.2.3`, `v1.2.3` and pre-release or build suffixes
    /// such as `1.2.3-rc.1`.
    pub fn from_kubernetes_version(version: &str) -> Result<Self> {
        let trimmed = version.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let core = trimmed
            .split(['-', '+'])
            .next()
            .unwrap_or_default();

        let parts: Vec<&str> = core.split('.').collect();
        if !(2..=3).contains(&parts.len()) {
            return Err(Error::invalid_version(
                version,
                "expected major.minor or major.minor.patch",
            ));
        }

        let mut numbers = Vec::with_capacity(parts.len());
        for part in &parts {
            let n: u64 = part.parse().map_err(|_| {
                Error::invalid_version(version, format!("{part:?} is not a number"))
            })?;
            numbers.push(n);
        }

        Ok(Self(format!("{}.{}", numbers[0], numbers[1])))
    }

    /// The marker text, e.g. `"1.2"`
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint of a class spec under a version marker
///
/// The `name` field, if present, is excluded.
pub fn fingerprint(spec: &ClassSpec, version: &VersionMarker) -> String {
    let canonical = if spec.contains(NAME_FIELD) {
        let mut unnamed = spec.clone();
        unnamed.remove(NAME_FIELD);
        unnamed.canonical_bytes()
    } else {
        spec.canonical_bytes()
    };

    let mut ctx = digest::Context::new(&digest::SHA256);
    ctx.update(version.as_str().as_bytes());
    ctx.update(&[0]);
    ctx.update(&canonical);
    let hash = ctx.finish();

    hash.as_ref()[..FINGERPRINT_BYTES]
        .iter()
        .fold(String::with_capacity(FINGERPRINT_BYTES * 2), |mut s, b| {
            let _ = write!(s, "{:02x}", b);
            s
        })
}
