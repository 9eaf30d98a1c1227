//! Reconcile errors

use fabric_core::FabricError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Kubernetes error: {0}")]
    Kube(#[source] kube::Error),

    /// The status write lost an optimistic concurrency race.
    #[error("write conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Fabric(#[from] FabricError),

    #[error("status serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<kube::Error> for ReconcileError {
    fn from(error: kube::Error) -> Self {
        match error {
            kube::Error::Api(response) if response.code == 409 => {
                ReconcileError::Conflict(response.message)
            }
            other => ReconcileError::Kube(other),
        }
    }
}

impl ReconcileError {
    pub fn is_validation(&self) -> bool {
        matches!(self, ReconcileError::Fabric(e) if e.is_validation())
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::Kube(_) => "kube",
            ReconcileError::Conflict(_) => "conflict",
            ReconcileError::Fabric(e) if e.is_validation() => "validation",
            ReconcileError::Fabric(_) => "malformed",
            ReconcileError::Serialize(_) => "serialize",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_core::{SwitchRole, ValidationError};
    use kube::core::ErrorResponse;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "the object has been modified".to_string(),
            reason: "Conflict".to_string(),
            code,
        })
    }

    #[test]
    fn test_409_maps_to_conflict() {
        let error = ReconcileError::from(api_error(409));
        assert!(matches!(error, ReconcileError::Conflict(_)));
        assert_eq!(error.kind(), "conflict");

        let error = ReconcileError::from(api_error(500));
        assert!(matches!(error, ReconcileError::Kube(_)));
    }

    #[test]
    fn test_validation_kind() {
        let error = ReconcileError::from(FabricError::from(ValidationError::RoleContradiction {
            stored: SwitchRole::Spine,
            computed: SwitchRole::Leaf,
        }));
        assert!(error.is_validation());
        assert_eq!(error.kind(), "validation");

        let error = ReconcileError::from(FabricError::malformed("cidr", "10.0.0.0/99", "bad prefix"));
        assert!(!error.is_validation());
        assert_eq!(error.kind(), "malformed");
    }
}
