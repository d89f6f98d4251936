//! Transportable form of aggregate failures.
//!
//! A token is base64 over a JSON envelope. The envelope carries the format
//! version, the aggregate kind, a `sha256:<hex>` digest of the rendered
//! message, and the aggregate itself. Decoding rejects incompatible versions,
//! digests that do not match, and reports that no longer render to the
//! carried message, so a decoded aggregate renders exactly the text that was
//! encoded.

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::aggregate::{
    Aggregate, AggregateError, AggregateKind, ConfigurationError, CreationError, ProvisionError,
};
use crate::error::EngineError;

pub const FORMAT_VERSION: &str = "1.0.0";
const SUPPORTED_FORMATS: &str = "^1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportEnvelope {
    pub format_version: String,
    pub kind: AggregateKind,
    pub digest: String,
    pub payload: serde_json::Value,
}

/// Computes the SHA-256 digest of `message` in `sha256:hex` format.
pub fn message_digest(message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(message.as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

pub fn to_envelope<A: Aggregate + Serialize>(aggregate: &A) -> Result<TransportEnvelope, EngineError> {
    let payload = serde_json::to_value(aggregate)
        .map_err(|e| EngineError::SerializationError(e.to_string()))?;
    Ok(TransportEnvelope {
        format_version: FORMAT_VERSION.to_string(),
        kind: aggregate.kind(),
        digest: message_digest(aggregate.message()),
        payload,
    })
}

/// Encodes `aggregate` as a base64 transport token.
pub fn encode<A: Aggregate + Serialize>(aggregate: &A) -> Result<String, EngineError> {
    let envelope = to_envelope(aggregate)?;
    let json = serde_json::to_vec(&envelope)
        .map_err(|e| EngineError::SerializationError(e.to_string()))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(json))
}

/// Decodes a token into its envelope, checking only the format version.
pub fn open(token: &str) -> Result<TransportEnvelope, EngineError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(token.trim())
        .map_err(|e| EngineError::TransportError(format!("invalid base64 token: {e}")))?;
    let envelope: TransportEnvelope = serde_json::from_slice(&bytes)
        .map_err(|e| EngineError::TransportError(format!("invalid envelope: {e}")))?;
    check_format_version(&envelope.format_version)?;
    Ok(envelope)
}

/// Rebuilds an aggregate from its envelope, verifying the message digest and
/// that the report re-renders to the same message.
pub fn from_envelope(envelope: TransportEnvelope) -> Result<AggregateError, EngineError> {
    let aggregate: AggregateError = match envelope.kind {
        AggregateKind::Provision => AggregateError::Provision(payload::<ProvisionError>(envelope.payload)?),
        AggregateKind::Configuration => {
            AggregateError::Configuration(payload::<ConfigurationError>(envelope.payload)?)
        }
        AggregateKind::Creation => AggregateError::Creation(payload::<CreationError>(envelope.payload)?),
    };
    let actual = message_digest(aggregate.message());
    if actual != envelope.digest {
        return Err(EngineError::TransportError(format!(
            "message digest mismatch: expected {}, got {actual}",
            envelope.digest
        )));
    }
    if !aggregate.renders_message() {
        return Err(EngineError::TransportError(
            "payload report does not render to the carried message".to_string(),
        ));
    }
    Ok(aggregate)
}

pub fn decode(token: &str) -> Result<AggregateError, EngineError> {
    from_envelope(open(token)?)
}

fn payload<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, EngineError> {
    serde_json::from_value(value).map_err(|e| EngineError::TransportError(format!("invalid payload: {e}")))
}

fn check_format_version(raw: &str) -> Result<(), EngineError> {
    let req = semver::VersionReq::parse(SUPPORTED_FORMATS)
        .map_err(|e| EngineError::TransportError(format!("invalid supported format range: {e}")))?;
    let version = semver::Version::parse(raw).map_err(|e| {
        EngineError::TransportError(format!("format version '{raw}' is not valid semver: {e}"))
    })?;
    if !req.matches(&version) {
        return Err(EngineError::TransportError(format!(
            "format version '{version}' does not satisfy '{SUPPORTED_FORMATS}'"
        )));
    }
    let current = semver::Version::parse(FORMAT_VERSION)
        .map_err(|e| EngineError::TransportError(format!("invalid format version: {e}")))?;
    if version > current {
        warn!(%version, %current, "decoding envelope from a newer format version");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let a = message_digest("1) boom");
        assert_eq!(a, message_digest("1) boom"));
        assert!(a.starts_with("sha256:"));
    }

    #[test]
    fn rejects_major_version_bump() {
        let err = check_format_version("2.0.0").unwrap_err();
        assert!(err.to_string().contains("does not satisfy"));
    }

    #[test]
    fn accepts_newer_minor_version() {
        assert!(check_format_version("1.4.0").is_ok());
    }

    #[test]
    fn rejects_garbage_token() {
        let err = decode("!!!not base64!!!").unwrap_err();
        assert!(err.to_string().contains("invalid base64 token"));
    }
}
