//! Machine image resolution and the image ledger
//!
//! A pool names its image symbolically (`ubuntu`, `22.04`). The resolver maps
//! it to a provider image id by consulting the controller configuration first
//! and the ledger persisted by the previous reconciliation second, so a pool
//! whose image was later removed from configuration keeps resolving.

use tessera_common::config::ControllerConfiguration;
use tessera_common::crd::{ResolvedImage, WorkerStatus};
use tessera_common::{Error, Result};
use tracing::{debug, warn};

use crate::decode::StatusDecoder;

/// De-duplicated, insertion-ordered record of resolved images
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageLedger {
    images: Vec<ResolvedImage>,
}

impl ImageLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an image unless one with the same identity is already present
    ///
    /// Returns true if the image was appended.
    pub fn record(&mut self, image: ResolvedImage) -> bool {
        if self.images.iter().any(|existing| existing.same_identity(&image)) {
            return false;
        }
        self.images.push(image);
        true
    }

    /// Record an image, replacing the image id of an existing identity in place
    ///
    /// Returns true if the image was appended.
    pub fn refresh(&mut self, image: ResolvedImage) -> bool {
        match self
            .images
            .iter_mut()
            .find(|existing| existing.same_identity(&image))
        {
            Some(existing) => {
                existing.image = image.image;
                false
            }
            None => {
                self.images.push(image);
                true
            }
        }
    }

    /// Find the record for an identity
    pub fn find(&self, name: &str, version: &str, cloud_profile: &str) -> Option<&ResolvedImage> {
        self.images
            .iter()
            .find(|image| image.matches(name, version, cloud_profile))
    }

    /// Recorded images in insertion order
    pub fn images(&self) -> &[ResolvedImage] {
        &self.images
    }

    /// Number of recorded images
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Status document to persist for the next reconciliation
    pub fn to_status(&self) -> WorkerStatus {
        WorkerStatus::new(self.images.clone())
    }
}

impl FromIterator<ResolvedImage> for ImageLedger {
    fn from_iter<I: IntoIterator<Item = ResolvedImage>>(iter: I) -> Self {
        let mut ledger = Self::new();
        for image in iter {
            ledger.record(image);
        }
        ledger
    }
}

/// Layered lookup of provider image ids
pub struct ImageResolver<'a> {
    config: &'a ControllerConfiguration,
    persisted: ImageLedger,
}

impl<'a> ImageResolver<'a> {
    /// Create a resolver from configuration and the persisted ledger bytes
    ///
    /// The persisted status is decoded up front; a decode failure is returned
    /// as-is. `None` means no status has been persisted yet.
    pub fn new(
        config: &'a ControllerConfiguration,
        persisted_status: Option<&[u8]>,
        decoder: &dyn StatusDecoder,
    ) -> Result<Self> {
        let persisted = match persisted_status {
            Some(raw) => decoder
                .decode_worker_status(raw)?
                .machine_images
                .into_iter()
                .collect(),
            None => ImageLedger::new(),
        };
        Ok(Self::with_ledger(config, persisted))
    }

    /// Create a resolver from configuration and an already decoded ledger
    pub fn with_ledger(config: &'a ControllerConfiguration, persisted: ImageLedger) -> Self {
        Self { config, persisted }
    }

    /// Resolve `(name, version, cloud_profile)` to a provider image
    ///
    /// Configuration wins over the persisted ledger.
    pub fn resolve(&self, name: &str, version: &str, cloud_profile: &str) -> Result<ResolvedImage> {
        if let Some(image) = self
            .config
            .find_image_for_cloud_profile(name, version, cloud_profile)
        {
            debug!(name, version, cloud_profile, image, "resolved machine image from configuration");
            return Ok(ResolvedImage {
                name: name.to_string(),
                version: version.to_string(),
                cloud_profile: cloud_profile.to_string(),
                image: image.to_string(),
            });
        }

        if let Some(image) = self.persisted.find(name, version, cloud_profile) {
            warn!(
                name,
                version,
                cloud_profile,
                image = %image.image,
                "machine image not in configuration, using persisted worker status"
            );
            return Ok(image.clone());
        }

        Err(Error::image_not_found(name, version, cloud_profile))
    }

    /// The decoded persisted ledger
    pub fn persisted(&self) -> &ImageLedger {
        &self.persisted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{JsonStatusDecoder, MockStatusDecoder};

    fn image(name: &str, version: &str, profile: &str, id: &str) -> ResolvedImage {
        ResolvedImage {
            name: name.to_string(),
            version: version.to_string(),
            cloud_profile: profile.to_string(),
            image: id.to_string(),
        }
    }

    fn config() -> ControllerConfiguration {
        ControllerConfiguration::from_yaml(
            r#"
machineImages:
  - name: ubuntu
    version: "1"
    cloudProfiles:
      - {name: kubevirt, image: img-123}
"#,
        )
        .unwrap()
    }

    // =========================================================================
    // Story Tests: Ledger
    // =========================================================================

    #[test]
    fn story_ledger_keeps_first_record_per_identity() {
        let mut ledger = ImageLedger::new();
        assert!(ledger.record(image("ubuntu", "1", "p", "img-1")));
        assert!(ledger.record(image("ubuntu", "2", "p", "img-2")));
        assert!(!ledger.record(image("ubuntu", "1", "p", "img-other")));
        assert!(ledger.record(image("ubuntu", "1", "q", "img-3")));

        let ids: Vec<_> = ledger.images().iter().map(|i| i.image.as_str()).collect();
        assert_eq!(ids, vec!["img-1", "img-2", "img-3"]);
    }

    /// Story: A new image id for a known identity updates the entry where it stands
    #[test]
    fn story_refresh_keeps_position_and_takes_new_id() {
        let mut ledger: ImageLedger = vec![
            image("debian", "12", "p", "img-a"),
            image("ubuntu", "1", "p", "img-stale"),
        ]
        .into_iter()
        .collect();

        assert!(!ledger.refresh(image("ubuntu", "1", "p", "img-123")));
        assert!(ledger.refresh(image("ubuntu", "2", "p", "img-456")));

        let ids: Vec<_> = ledger.images().iter().map(|i| i.image.as_str()).collect();
        assert_eq!(ids, vec!["img-a", "img-123", "img-456"]);
    }

    #[test]
    fn test_collecting_dedupes() {
        let ledger: ImageLedger = vec![
            image("a", "1", "p", "x"),
            image("a", "1", "p", "y"),
            image("b", "1", "p", "z"),
        ]
        .into_iter()
        .collect();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.find("a", "1", "p").unwrap().image, "x");
    }

    #[test]
    fn test_ledger_status_is_typed() {
        let ledger: ImageLedger = std::iter::once(image("a", "1", "p", "x")).collect();
        let status = ledger.to_status();
        assert_eq!(status.kind, "WorkerStatus");
        assert_eq!(status.machine_images, ledger.images());
    }

    // =========================================================================
    // Story Tests: Resolution order
    // =========================================================================

    /// Story: Configuration wins over a conflicting persisted entry
    #[test]
    fn story_configuration_wins() {
        let config = config();
        let persisted = std::iter::once(image("ubuntu", "1", "kubevirt", "img-stale")).collect();
        let resolver = ImageResolver::with_ledger(&config, persisted);

        let resolved = resolver.resolve("ubuntu", "1", "kubevirt").unwrap();
        assert_eq!(resolved.image, "img-123");
    }

    /// Story: An image dropped from configuration still resolves for running pools
    #[test]
    fn story_persisted_ledger_is_the_fallback() {
        let config = ControllerConfiguration::default();
        let raw = br#"{"kind":"WorkerStatus","machineImages":[
            {"name":"ubuntu","version":"1","cloudProfile":"kubevirt","image":"img-123"}]}"#;
        let resolver = ImageResolver::new(&config, Some(raw), &JsonStatusDecoder).unwrap();

        let resolved = resolver.resolve("ubuntu", "1", "kubevirt").unwrap();
        assert_eq!(resolved, image("ubuntu", "1", "kubevirt", "img-123"));
    }

    #[test]
    fn story_unknown_image_is_not_found() {
        let config = config();
        let resolver = ImageResolver::new(&config, None, &JsonStatusDecoder).unwrap();

        let err = resolver.resolve("ubuntu", "2", "kubevirt").unwrap_err();
        assert!(matches!(
            err,
            Error::ImageNotFound { ref name, ref version, ref profile }
                if name == "ubuntu" && version == "2" && profile == "kubevirt"
        ));
    }

    /// Story: A corrupt ledger is surfaced, not treated as empty
    #[test]
    fn story_decode_failure_is_distinct_from_not_found() {
        let config = config();
        let mut decoder = MockStatusDecoder::new();
        decoder
            .expect_decode_worker_status()
            .times(1)
            .returning(|_| Err(Error::status_decode("WorkerStatus", "truncated")));

        let err = ImageResolver::new(&config, Some(b"{"), &decoder)
            .err()
            .expect("decode failure should be returned");
        assert!(matches!(err, Error::StatusDecode { .. }));
    }

    #[test]
    fn test_missing_status_is_not_decoded() {
        let config = config();
        let mut decoder = MockStatusDecoder::new();
        decoder.expect_decode_worker_status().never();

        let resolver = ImageResolver::new(&config, None, &decoder).unwrap();
        assert!(resolver.persisted().is_empty());
    }
}
