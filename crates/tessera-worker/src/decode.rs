//! Decoding of persisted provider status
//!
//! Provider status documents arrive as opaque bytes (the raw extension stored
//! on the Worker). Empty or malformed bytes are a decode error, never an empty
//! status: treating a corrupt ledger as empty would silently drop the images
//! running pools depend on.

use k8s_openapi::apimachinery::pkg::runtime::RawExtension;
#[cfg(test)]
use mockall::automock;
use serde::de::DeserializeOwned;
use tessera_common::crd::{
    InfrastructureStatus, WorkerStatus, INFRASTRUCTURE_STATUS_KIND, WORKER_STATUS_KIND,
};
use tessera_common::{Error, Result};

/// Decodes typed status documents from persisted bytes
#[cfg_attr(test, automock)]
pub trait StatusDecoder: Send + Sync {
    /// Decode the persisted image ledger
    fn decode_worker_status(&self, raw: &[u8]) -> Result<WorkerStatus>;

    /// Decode the infrastructure controller's status
    fn decode_infrastructure_status(&self, raw: &[u8]) -> Result<InfrastructureStatus>;
}

/// JSON decoder for status documents
///
/// A document that declares a `kind` must declare the expected one.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonStatusDecoder;

impl StatusDecoder for JsonStatusDecoder {
    fn decode_worker_status(&self, raw: &[u8]) -> Result<WorkerStatus> {
        let status: WorkerStatus = decode_document(raw, WORKER_STATUS_KIND)?;
        check_kind(&status.kind, WORKER_STATUS_KIND)?;
        Ok(status)
    }

    fn decode_infrastructure_status(&self, raw: &[u8]) -> Result<InfrastructureStatus> {
        let status: InfrastructureStatus = decode_document(raw, INFRASTRUCTURE_STATUS_KIND)?;
        check_kind(&status.kind, INFRASTRUCTURE_STATUS_KIND)?;
        Ok(status)
    }
}

/// Bytes of a raw extension as stored on the Worker
pub fn raw_extension_bytes(raw: &RawExtension, kind: &str) -> Result<Vec<u8>> {
    serde_json::to_vec(&raw.0).map_err(|e| Error::status_decode(kind, e.to_string()))
}

fn decode_document<T: DeserializeOwned>(raw: &[u8], kind: &str) -> Result<T> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| Error::status_decode(kind, format!("not valid UTF-8: {e}")))?;
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(Error::status_decode(kind, "status is empty"));
    }
    serde_json::from_str(trimmed).map_err(|e| Error::status_decode(kind, e.to_string()))
}

fn check_kind(actual: &str, expected: &str) -> Result<()> {
    if !actual.is_empty() && actual != expected {
        return Err(Error::status_decode(
            expected,
            format!("unexpected kind {actual:?}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn story_persisted_ledger_decodes() {
        let raw = br#"{
            "apiVersion": "worker.tessera.dev/v1alpha1",
            "kind": "WorkerStatus",
            "machineImages": [
                {"name": "ubuntu", "version": "1", "cloudProfile": "kubevirt", "image": "img-123"}
            ]
        }"#;
        let status = JsonStatusDecoder.decode_worker_status(raw).unwrap();
        assert_eq!(status.machine_images.len(), 1);
        assert_eq!(status.machine_images[0].image, "img-123");
    }

    #[test]
    fn story_untyped_document_is_accepted() {
        let status = JsonStatusDecoder
            .decode_worker_status(br#"{"machineImages": []}"#)
            .unwrap();
        assert!(status.machine_images.is_empty());
    }

    /// Story: Corrupt or empty bytes are an error, not an empty ledger
    #[test]
    fn story_corrupt_status_is_a_decode_error() {
        let cases: [&[u8]; 6] = [b"", b"   ", b"null", b"{not json", b"[1,2]", &[0xff, 0xfe]];
        for raw in cases {
            let err = JsonStatusDecoder.decode_worker_status(raw).unwrap_err();
            assert!(
                matches!(err, Error::StatusDecode { ref kind, .. } if kind == WORKER_STATUS_KIND),
                "{raw:?} should fail to decode"
            );
        }
    }

    #[test]
    fn story_wrong_kind_is_rejected() {
        let err = JsonStatusDecoder
            .decode_worker_status(br#"{"kind": "InfrastructureStatus"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("unexpected kind"));
    }

    #[test]
    fn test_infrastructure_status_from_raw_extension() {
        let raw = RawExtension(json!({
            "kind": "InfrastructureStatus",
            "securityGroups": [{"purpose": "nodes", "name": "shoot--foo--bar-nodes"}],
            "node": {"keyName": "shoot--foo--bar-ssh"},
            "networks": {"id": "net-1"}
        }));
        let bytes = raw_extension_bytes(&raw, INFRASTRUCTURE_STATUS_KIND).unwrap();
        let status = JsonStatusDecoder
            .decode_infrastructure_status(&bytes)
            .unwrap();
        assert_eq!(status.node.key_name, "shoot--foo--bar-ssh");
        assert_eq!(status.networks.id, "net-1");
    }

    #[test]
    fn test_null_raw_extension_is_a_decode_error() {
        let bytes = raw_extension_bytes(&RawExtension(serde_json::Value::Null), "x").unwrap();
        assert!(JsonStatusDecoder.decode_infrastructure_status(&bytes).is_err());
    }
}
