//! Error types for cmdb-sync data types.

use thiserror::Error;

/// Errors that can occur while encoding, decoding or interpreting sync data.
#[derive(Debug, Error)]
pub enum TypesError {
    /// MessagePack serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] rmp_serde::encode::Error),

    /// MessagePack deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] rmp_serde::decode::Error),

    /// Unknown resource type name
    #[error("unknown resource type: {0}")]
    UnknownResource(String),

    /// Unknown sync role name
    #[error("unknown sync role: {0}")]
    UnknownRole(String),

    /// A document field is missing or has the wrong type
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// Name of the offending field.
        field: String,
        /// Why the field was rejected.
        reason: String,
    },
}

impl TypesError {
    /// Shorthand for an [`TypesError::InvalidField`] error.
    pub fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TypesError::UnknownResource("cluster".into());
        assert_eq!(err.to_string(), "unknown resource type: cluster");

        let err = TypesError::invalid_field("bk_host_id", "missing");
        assert_eq!(err.to_string(), "invalid field bk_host_id: missing");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TypesError>();
    }
}
